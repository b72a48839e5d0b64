use std::{
    io::Write,
    fs,
    path::Path,
};

use serde::{
    Serialize,
    Deserialize,
};
use log::{
    info,
    warn,
};
use anyhow::{
    bail,
    Context,
};

use crate::{
    fleur_bail,
    fleur_ensure,
    error::FleurError,
    types::{
        Result,
        Vector,
        range_parse_bounded,
        index_transform,
    },
    fleur_parsers::banddos::BandData,
    selection::{
        Selection,
        parse_characters,
    },
};


pub fn write_array_to_txt(file_name: &(impl AsRef<Path> + ?Sized), ys: Vec<&Vector<f64>>, comment: &str) -> Result<()> {
    let ncol = ys.len();

    let x = ys.first().context("At least one data set is needed")?;
    let nrow = x.len();

    if !ys.iter().all(|y| y.len() == nrow) {
        bail!("[WRT_ARRAY]: input data sets don't have consistent lengths");
    }

    let mut f = fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(file_name.as_ref())
        .map_err(|e| FleurError::Io(format!("cannot write {:?}: {}", file_name.as_ref(), e)))?;

    writeln!(f, "# {}", comment.trim())?;

    for irow in 0 .. nrow {
        let mut s = String::with_capacity(17 * ncol + 1);
        for y in ys.iter() {
            s.push_str(&format!("  {:15.6}", y[irow]));
        }
        s.push('\n');

        f.write_all(s.as_bytes())?;
    }

    Ok(())
}


/// Insert `suffix` before the extension: `band.txt` -> `band_up_1.txt`.
pub fn suffixed_path(path: &Path, suffix: &str) -> std::path::PathBuf {
    let stem = path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, suffix, ext.to_string_lossy()),
        None      => format!("{}_{}", stem, suffix),
    };
    path.with_file_name(name)
}


/// One `[[selection]]` entry as written by the user, before it is checked against any data.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct RawSelection {
    pub spins:        Option<String>,
    pub characters:   Option<String>,
    pub groups:       Option<String>,
    pub bands:        Option<String>,
    pub label:        Option<String>,
    pub factor:       Option<f64>,
    pub interstitial: Option<bool>,
    pub vacuum:       Option<bool>,
}


impl RawSelection {
    /// Parse the spin options, the result is sorted and deduplicated.
    ///
    /// For nspin = 1 files, whatever in, vec![0] out;
    /// For nspin = 2 files, it accepts 'u' 'up' '1' 'd' 'dn' 'down' '2' and uppercased strings.
    pub fn parse_ispins(input: Option<&str>, nspin: usize) -> Result<Vec<usize>> {
        let mut ret = if let Some(spins) = input {
            fleur_ensure!(!spins.trim().is_empty(), Selection, "no spin component selected");

            if nspin == 2 {
                spins.split_whitespace()
                    .map(|x| -> Result<usize> {
                        match x.to_ascii_lowercase().as_ref() {
                            "u" | "up" | "1"            => Ok(0),
                            "d" | "dn" | "down" | "2"   => Ok(1),
                            _ => fleur_bail!(Selection,
                                "invalid spin component `{}`, available components are `up` and `down`", x),
                        }
                    }).collect::<Result<Vec<_>>>()?
            } else {
                warn!("This system is not spin-polarized, only one spin component is available, selected by default.");
                vec![0usize]
            }
        } else {
            (0 .. nspin).collect()
        };

        ret.sort_unstable();
        ret.dedup();
        Ok(ret)
    }

    /// Parse the character names, whitespace separated.
    pub fn parse_icharacters(input: Option<&str>, nchar: usize) -> Result<Vec<usize>> {
        if let Some(chars) = input {
            let names = chars.split_whitespace().collect::<Vec<_>>();
            fleur_ensure!(!names.is_empty(), Selection, "no character selected");
            parse_characters(&names, nchar)
        } else {
            Ok((0 .. nchar).collect())
        }
    }

    /// Resolve the two characters of a comparison, keeping the given order.
    pub fn parse_character_pair<S: AsRef<str>>(names: &[S], nchar: usize) -> Result<[usize; 2]> {
        fleur_ensure!(names.len() == 2, Selection,
            "comparing orbital characters needs exactly two of them, got {}", names.len());
        let first = parse_characters(&names[0 .. 1], nchar)?;
        let second = parse_characters(&names[1 .. 2], nchar)?;
        fleur_ensure!(first != second, Selection,
            "comparing orbital characters needs two different ones, got `{}` twice", names[0].as_ref());
        Ok([first[0], second[0]])
    }

    /// Parse the 1-based atom group ids into 0-based indices.
    ///
    /// Negative indices count from the tail and `0` selects all groups. All the indices are
    /// sorted and deduplicated.
    pub fn parse_igroups(input: Option<&str>, ngroups: usize) -> Result<Vec<usize>> {
        parse_indices(input, ngroups, "atom group")
    }

    /// Parse the 1-based band indices into 0-based indices, same rules as atom groups.
    pub fn parse_ibands(input: Option<&str>, nbands: usize) -> Result<Vec<usize>> {
        parse_indices(input, nbands, "band")
    }

    pub fn factor(&self) -> f64 {
        self.factor.unwrap_or(1.0)
    }

    /// Label used in output headers and file names, `sel<i>` when left blank.
    pub fn label_or(&self, i: usize) -> String {
        match self.label.as_deref().map(str::trim) {
            Some(l) if !l.is_empty() => l.to_string(),
            _ => format!("sel{}", i + 1),
        }
    }

    /// Check this entry against loaded band data and build the masks.
    pub fn to_selection(&self, data: &BandData) -> Result<Selection> {
        let ispins = Self::parse_ispins(self.spins.as_deref(), data.nspin)?;
        let ichars = Self::parse_icharacters(self.characters.as_deref(), data.nchar)?;
        let igroups = Self::parse_igroups(self.groups.as_deref(), data.ngroups)?;
        let ibands = Self::parse_ibands(self.bands.as_deref(), data.nbands)?;

        Selection::from_indices(data, Some(&ispins), Some(&ichars), Some(&igroups), Some(&ibands))
    }
}


fn parse_indices(input: Option<&str>, len: usize, what: &str) -> Result<Vec<usize>> {
    let Some(input) = input else {
        return Ok((0 .. len).collect());
    };

    let mut ret = input.split_whitespace()
        .map(|x| -> Result<Vec<i32>> {
            range_parse_bounded(x, len).map_err(|e| FleurError::Selection(format!("{} `{}`: {}", what, x, e)).into())
        })
        .collect::<Result<Vec<Vec<i32>>>>()?
        .into_iter()
        .flat_map(|x| index_transform(x, len))
        .map(|i| -> Result<usize> {
            fleur_ensure!(i >= 1 && i <= len, Selection,
                "{} index out of range, only {} available", what, len);
            Ok(i - 1)
        })
        .collect::<Result<Vec<usize>>>()?;

    fleur_ensure!(!ret.is_empty(), Selection, "no {} selected", what);

    ret.sort_unstable();
    ret.dedup();
    Ok(ret)
}


/// Content of a `--config` file.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct SelectionConfig {
    #[serde(default)]
    pub selection: Vec<RawSelection>,
}


impl SelectionConfig {
    pub fn from_file(path: &(impl AsRef<Path> + ?Sized)) -> Result<Self> {
        let path = path.as_ref();
        info!("Reading selections from {:?}", path);
        let txt = fs::read_to_string(path)
            .map_err(|e| FleurError::Io(format!("cannot read {:?}: {}", path, e)))?;
        Self::from_txt(&txt)
    }

    pub fn from_txt(txt: &str) -> Result<Self> {
        let ret: Self = toml::from_str(txt)
            .map_err(|e| FleurError::Format(format!("invalid selection file: {}", e)))?;
        fleur_ensure!(!ret.selection.is_empty(), Selection, "the selection file holds no `[[selection]]` entry");
        Ok(ret)
    }

    pub fn write_template(path: &(impl AsRef<Path> + ?Sized)) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, SELECTION_TEMPLATE)
            .map_err(|e| FleurError::Io(format!("cannot write {:?}: {}", path, e)))?;
        info!("Template file written to {:?}. Exiting", path);
        Ok(())
    }
}


pub const SELECTION_TEMPLATE: &str = r#"# rsfleur selection file, one [[selection]] table per curve.
#
# Every field is optional, a missing field selects everything on that axis.
#
# spins:        "up" / "u" / "1", "down" / "dn" / "d" / "2", whitespace separated
# characters:   any of "s p d f"
# groups:       1-based atom group ids, ranges like "1..3 5", negative ids count from the tail,
#               "0" selects all groups
# bands:        1-based band indices, same syntax as groups (band structure only)
# label:        name used in the output header and file name
# factor:       scale of the projected DOS (DOS only)
# interstitial: add the interstitial column (DOS only)
# vacuum:       add both vacuum columns (DOS only)

[[selection]]
label      = "first_group_s_p"
spins      = "up"
characters = "s p"
groups     = "1"

[[selection]]
label        = "all_d"
characters   = "d"
groups       = "0"
factor       = 1.0
interstitial = false
vacuum       = false
"#;
