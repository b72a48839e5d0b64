use std::{
    error::Error,
    fmt,
};


/// Failure kinds surfaced by the readers, the mask builders and the projectors.
///
/// They travel inside `anyhow::Error`; use `err.downcast_ref::<FleurError>()` to tell them apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FleurError {
    /// File missing or unreadable.
    Io(String),

    /// Required HDF5 path missing, or DOS columns inconsistent with the expected layout.
    Format(String),

    /// Tensor dimensions mutually inconsistent.
    Shape(String),

    /// Selection index out of range or the wrong number of entries selected.
    Selection(String),
}


impl fmt::Display for FleurError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg)        => write!(f, "IO error: {}", msg),
            Self::Format(msg)    => write!(f, "Format error: {}", msg),
            Self::Shape(msg)     => write!(f, "Shape error: {}", msg),
            Self::Selection(msg) => write!(f, "Selection error: {}", msg),
        }
    }
}

impl Error for FleurError {}


/// Shorthand for `Err(FleurError::$kind(format!(...)).into())`.
#[macro_export]
macro_rules! fleur_bail {
    ($kind:ident, $($arg:tt)*) => {
        return Err($crate::error::FleurError::$kind(format!($($arg)*)).into())
    };
}


/// Shorthand for `if !cond { fleur_bail!(...) }`.
#[macro_export]
macro_rules! fleur_ensure {
    ($cond:expr, $kind:ident, $($arg:tt)*) => {
        if !$cond {
            $crate::fleur_bail!($kind, $($arg)*);
        }
    };
}


/// Returns the kind of a `FleurError` wrapped in `err`, if any.
pub fn error_kind(err: &anyhow::Error) -> Option<&FleurError> {
    err.downcast_ref::<FleurError>()
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::types::Result;

    fn failing(i: usize) -> Result<usize> {
        fleur_ensure!(i < 3, Selection, "index {} out of range 0..{}", i, 3);
        Ok(i)
    }

    #[test]
    fn test_downcast() {
        assert_eq!(failing(1).unwrap(), 1);
        let err = failing(5).unwrap_err();
        assert_eq!(error_kind(&err),
                   Some(&FleurError::Selection("index 5 out of range 0..3".to_string())));
        assert_eq!(err.to_string(), "Selection error: index 5 out of range 0..3");
    }
}
