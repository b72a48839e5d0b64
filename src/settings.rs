//! Persistent user defaults.
//!
//! Built-in defaults are merged with `<config dir>/rsfleur/config.toml` and then with
//! `RSFLEUR_*` environment variables, later sources winning.

use std::path::{
    Path,
    PathBuf,
};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{
        Serialized,
        Toml,
        Env,
        Format,
    },
};
use log::debug;
use serde::{
    Serialize,
    Deserialize,
};

use crate::{
    types::Result,
    weights::{
        WeightOptions,
        WEIGHT_THRESHOLD,
    },
};


pub const ENV_PREFIX: &str = "RSFLEUR_";


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub weight_threshold:          f64,
    pub unfolding_exponent:        f64,
    pub use_unfolding:             bool,
    pub ignore_group_multiplicity: bool,
}


impl Default for Settings {
    fn default() -> Self {
        let opts = WeightOptions::default();
        Self {
            weight_threshold:          WEIGHT_THRESHOLD,
            unfolding_exponent:        opts.exponent,
            use_unfolding:             opts.use_unfolding,
            ignore_group_multiplicity: opts.ignore_group_multiplicity,
        }
    }
}


impl Settings {
    /// `config.toml` in the platform configuration directory, if one can be determined.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "rsfleur")
            .map(|d| d.config_dir().join("config.toml"))
    }

    /// Defaults, then the user's `config.toml`, then the environment.
    pub fn from_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::figment(None).extract::<Self>()?),
        }
    }

    /// Defaults, then `path` when it exists, then the environment.
    pub fn from_file(path: &(impl AsRef<Path> + ?Sized)) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading settings from {:?}", path);
        let ret: Self = Self::figment(Some(path)).extract()?;
        debug!("Settings: {:?}", ret);
        Ok(ret)
    }

    fn figment(path: Option<&Path>) -> Figment {
        let fig = Figment::from(Serialized::defaults(Self::default()));
        let fig = match path {
            Some(p) => fig.merge(Toml::file(p)),
            None => fig,
        };
        fig.merge(Env::prefixed(ENV_PREFIX).only(&[
            "weight_threshold",
            "unfolding_exponent",
            "use_unfolding",
            "ignore_group_multiplicity",
        ]))
    }

    pub fn weight_options(&self) -> WeightOptions {
        WeightOptions {
            use_unfolding:             self.use_unfolding,
            exponent:                  self.unfolding_exponent,
            ignore_group_multiplicity: self.ignore_group_multiplicity,
        }
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use tempdir::TempDir;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.weight_threshold, 1E-4);
        assert_eq!(s.unfolding_exponent, 1.0);
        assert!(s.use_unfolding);
        assert!(!s.ignore_group_multiplicity);
        assert_eq!(s.weight_options(), WeightOptions::default());
    }

    #[test]
    fn test_from_file() {
        let dir = TempDir::new("rsfleur_settings").unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "unfolding_exponent = 2.5\nignore_group_multiplicity = true\n").unwrap();

        let s = Settings::from_file(&path).unwrap();
        assert_eq!(s.unfolding_exponent, 2.5);
        assert!(s.ignore_group_multiplicity);
        assert_eq!(s.weight_threshold, 1E-4);

        let missing = Settings::from_file(&dir.path().join("nothing.toml")).unwrap();
        assert_eq!(missing, Settings::default());

        fs::write(&path, "use_unfolding = \"sometimes\"\n").unwrap();
        assert!(Settings::from_file(&path).is_err());
    }
}
