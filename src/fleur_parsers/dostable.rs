//! Whitespace separated DOS tables (`DOS.1`, `DOS.2`) and their column layout.
//!
//! Column layout, 0-indexed, with `G` atom groups and `C` orbital characters:
//!
//! ```text
//! 0  1      2             3     4     5 .. 5+G   5+G .. 5+2G   ...   5+C*G .. 5+(C+1)*G
//! E  total  interstitial  vac1  vac2  group tot  group s       ...   group <last char>
//! ```

use std::{
    fs,
    path::Path,
};

use log::{
    info,
    debug,
};

use crate::{
    fleur_bail,
    fleur_ensure,
    error::FleurError,
    types::{
        Result,
        Vector,
        Matrix,
    },
};


pub const ENERGY_COLUMN:       usize = 0;
pub const TOTAL_COLUMN:        usize = 1;
pub const INTERSTITIAL_COLUMN: usize = 2;
pub const VACUUM_COLUMNS:      [usize; 2] = [3, 4];
pub const HEADER_COLUMNS:      usize = 5;


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DosLayout {
    pub num_groups:     usize,
    pub num_characters: usize,
}


impl DosLayout {
    pub fn new(num_groups: usize, num_characters: usize) -> Self {
        Self { num_groups, num_characters }
    }

    /// `5 + (1 + C) * G`
    pub fn expected_columns(&self) -> usize {
        HEADER_COLUMNS + (1 + self.num_characters) * self.num_groups
    }

    /// Infer the number of groups from the column count, given the number of characters.
    pub fn infer(ncols: usize, num_characters: usize) -> Result<Self> {
        let per_group = 1 + num_characters;
        fleur_ensure!(ncols > HEADER_COLUMNS && (ncols - HEADER_COLUMNS) % per_group == 0, Format,
            "{} columns cannot hold {} fixed columns plus (1 + {}) columns per atom group",
            ncols, HEADER_COLUMNS, num_characters);

        Ok(Self::new((ncols - HEADER_COLUMNS) / per_group, num_characters))
    }

    /// Check a table's column count against this layout.
    pub fn check(&self, ncols: usize) -> Result<()> {
        fleur_ensure!(ncols == self.expected_columns(), Format,
            "DOS table has {} columns, expected {} for {} atom groups and {} characters",
            ncols, self.expected_columns(), self.num_groups, self.num_characters);
        Ok(())
    }

    /// Column with the total DOS of group `ig` (0-based).
    pub fn group_total_column(&self, ig: usize) -> usize {
        HEADER_COLUMNS + ig
    }

    /// Column of character `ic` of group `ig` (both 0-based).
    pub fn character_column(&self, ic: usize, ig: usize) -> usize {
        HEADER_COLUMNS + (1 + ic) * self.num_groups + ig
    }
}


/// Numerical content of a DOS table, [irow, icol].
#[derive(Clone, Debug)]
pub struct DosTable {
    pub data: Matrix<f64>,
}


impl DosTable {
    pub fn from_file(path: &(impl AsRef<Path> + ?Sized)) -> Result<Self> {
        let path = path.as_ref();
        info!("Reading DOS table from {:?}", path);
        let txt = fs::read_to_string(path)
            .map_err(|e| FleurError::Io(format!("cannot read {:?}: {}", path, e)))?;
        Self::from_txt(&txt)
    }

    /// Parse the table; blank lines and lines starting with `#` are skipped.
    pub fn from_txt(txt: &str) -> Result<Self> {
        let mut ncols = 0usize;
        let mut nrows = 0usize;
        let mut values = Vec::<f64>::new();

        for (iline, line) in data_lines(txt) {
            let row = parse_row(line, iline)?;
            if nrows == 0 {
                ncols = row.len();
            } else {
                fleur_ensure!(row.len() == ncols, Format,
                    "line {} has {} columns while previous lines have {}", iline + 1, row.len(), ncols);
            }
            values.extend(row);
            nrows += 1;
        }

        fleur_ensure!(nrows > 0, Format, "DOS table contains no data");
        debug!("DOS table: {} rows x {} columns", nrows, ncols);

        Ok(Self {
            data: Matrix::from_shape_vec((nrows, ncols), values)?,
        })
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    pub fn column(&self, icol: usize) -> Vector<f64> {
        self.data.column(icol).to_owned()
    }

    pub fn energies(&self) -> Vector<f64> {
        self.column(ENERGY_COLUMN)
    }

    pub fn total(&self) -> Vector<f64> {
        self.column(TOTAL_COLUMN)
    }

    pub fn layout(&self, num_characters: usize) -> Result<DosLayout> {
        DosLayout::infer(self.ncols(), num_characters)
    }
}


fn data_lines(txt: &str) -> impl Iterator<Item = (usize, &str)> {
    txt.lines()
        .enumerate()
        .filter(|(_, l)| {
            let l = l.trim();
            !l.is_empty() && !l.starts_with('#')
        })
}


fn parse_row(line: &str, iline: usize) -> Result<Vec<f64>> {
    line.split_whitespace()
        .map(|x| -> Result<f64> {
            x.parse::<f64>()
             .map_err(|_| FleurError::Format(format!("cannot parse `{}` on line {} as a number", x, iline + 1)).into())
        })
        .collect()
}


/// Look at the first data line of a DOS file only and infer its layout.
pub fn sniff_layout(path: &(impl AsRef<Path> + ?Sized), num_characters: usize) -> Result<DosLayout> {
    let path = path.as_ref();
    let txt = fs::read_to_string(path)
        .map_err(|e| FleurError::Io(format!("cannot read {:?}: {}", path, e)))?;

    let first = data_lines(&txt).next();
    match first {
        Some((iline, line)) => DosLayout::infer(parse_row(line, iline)?.len(), num_characters),
        None => fleur_bail!(Format, "{:?} contains no data", path),
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use ndarray::arr1;

    const SAMPLE: &str = "\
# E total int vac1 vac2 tot(2) s(2) p(2) d(2) f(2)
-1.0  3.0  0.5  0.0  0.0  1.25  1.25  0.5  0.25  0.5  0.5  0.25  0.25  0.0  0.25

 0.0  1.0  0.2  0.0  0.0  0.40  0.40  0.1  0.1   0.1  0.1  0.1   0.1   0.1  0.1
";

    #[test]
    fn test_layout() {
        let layout = DosLayout::new(2, 4);
        assert_eq!(layout.expected_columns(), 15);
        assert_eq!(layout.group_total_column(1), 6);
        assert_eq!(layout.character_column(0, 0), 7);
        assert_eq!(layout.character_column(3, 1), 14);

        assert_eq!(DosLayout::infer(15, 4).unwrap(), layout);
        assert_eq!(DosLayout::infer(10, 4).unwrap(), DosLayout::new(1, 4));
        assert_eq!(DosLayout::infer(13, 3).unwrap(), DosLayout::new(2, 3));
        assert!(DosLayout::infer(14, 4).is_err());
        assert!(DosLayout::infer(5, 4).is_err());
        assert!(layout.check(14).is_err());
    }

    #[test]
    fn test_from_txt() {
        let table = DosTable::from_txt(SAMPLE).unwrap();
        assert_eq!(table.nrows(), 2);
        assert_eq!(table.ncols(), 15);
        assert_eq!(table.energies(), arr1(&[-1.0, 0.0]));
        assert_eq!(table.total(), arr1(&[3.0, 1.0]));
        assert_eq!(table.layout(4).unwrap(), DosLayout::new(2, 4));
    }

    #[test]
    fn test_malformed() {
        let err = DosTable::from_txt("1.0 2.0 3.0\n1.0 2.0\n").unwrap_err();
        assert!(matches!(err.downcast_ref::<FleurError>(), Some(FleurError::Format(_))));
        assert!(DosTable::from_txt("1.0 abc\n").is_err());
        assert!(DosTable::from_txt("# only a comment\n\n").is_err());
    }
}
