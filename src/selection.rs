//! Boolean masks over spin, orbital character, atom group and band.
//!
//! Indices handed to the mask builders are 0-based. `None` selects everything; an explicit
//! list selects exactly the listed entries.

use log::debug;

use crate::{
    fleur_bail,
    fleur_ensure,
    types::{
        Result,
        Mask,
    },
    fleur_parsers::banddos::{
        BandData,
        CHARACTER_NAMES,
    },
};


fn build_mask(which: Option<&[usize]>, len: usize, what: &str) -> Result<Mask> {
    match which {
        None => Ok(vec![true; len]),
        Some(idx) => {
            let mut mask = vec![false; len];
            for &i in idx {
                fleur_ensure!(i < len, Selection,
                    "{} index {} out of range, only {} available", what, i + 1, len);
                mask[i] = true;
            }
            Ok(mask)
        }
    }
}


pub fn spin_mask(which: Option<&[usize]>, nspin: usize) -> Result<Mask> {
    build_mask(which, nspin, "spin")
}

pub fn character_mask(which: Option<&[usize]>, nchar: usize) -> Result<Mask> {
    build_mask(which, nchar, "character")
}

pub fn group_mask(which: Option<&[usize]>, ngroups: usize) -> Result<Mask> {
    build_mask(which, ngroups, "atom group")
}

pub fn band_mask(which: Option<&[usize]>, nbands: usize) -> Result<Mask> {
    build_mask(which, nbands, "band")
}


/// Positions of the `true` entries.
pub fn selected_indices(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(i, &m)| if m { Some(i) } else { None })
        .collect()
}


/// Map character names (`s`, `p`, `d`, `f`, case insensitive) onto 0-based indices,
/// restricted to the first `nchar` characters. Sorted and deduplicated.
pub fn parse_characters<S: AsRef<str>>(names: &[S], nchar: usize) -> Result<Vec<usize>> {
    let available = &CHARACTER_NAMES[.. nchar.min(CHARACTER_NAMES.len())];

    let mut ret = names.iter()
        .map(|n| -> Result<usize> {
            let n = n.as_ref().trim().to_ascii_lowercase();
            match available.iter().position(|c| *c == n) {
                Some(i) => Ok(i),
                None => fleur_bail!(Selection,
                    "character `{}` not available, choose from {:?}", n, available),
            }
        })
        .collect::<Result<Vec<usize>>>()?;

    ret.sort_unstable();
    ret.dedup();
    Ok(ret)
}


/// One complete selection for the weight engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub spins:      Mask,
    pub characters: Mask,
    pub groups:     Mask,
    pub bands:      Mask,
}


impl Selection {
    /// Everything selected, for all spins.
    pub fn all(data: &BandData) -> Self {
        Self {
            spins:      vec![true; data.nspin],
            characters: vec![true; data.nchar],
            groups:     vec![true; data.ngroups],
            bands:      vec![true; data.nbands],
        }
    }

    /// Build from 0-based index lists; `None` selects all entries of that axis.
    pub fn from_indices(data: &BandData,
                        spins:      Option<&[usize]>,
                        characters: Option<&[usize]>,
                        groups:     Option<&[usize]>,
                        bands:      Option<&[usize]>) -> Result<Self> {
        let ret = Self {
            spins:      spin_mask(spins, data.nspin)?,
            characters: character_mask(characters, data.nchar)?,
            groups:     group_mask(groups, data.ngroups)?,
            bands:      band_mask(bands, data.nbands)?,
        };
        debug!("Selection built: {:?}", ret);
        Ok(ret)
    }

    /// Same selection restricted to a single spin channel.
    pub fn with_spin(&self, ispin: usize) -> Result<Self> {
        Ok(Self {
            spins: spin_mask(Some(&[ispin]), self.spins.len())?,
            ..self.clone()
        })
    }

    /// Same selection with a different character mask.
    pub fn with_characters(&self, characters: Mask) -> Self {
        Self {
            characters,
            ..self.clone()
        }
    }

    /// The single selected spin, error if zero or several are selected.
    pub fn single_spin(&self) -> Result<usize> {
        let spins = selected_indices(&self.spins);
        fleur_ensure!(spins.len() == 1, Selection,
            "exactly one spin channel should be selected, got {:?}", spins);
        Ok(spins[0])
    }

    /// Check that every mask has the length `data` demands.
    pub fn check_against(&self, data: &BandData) -> Result<()> {
        let pairs = [
            ("spin",       self.spins.len(),      data.nspin),
            ("character",  self.characters.len(), data.nchar),
            ("atom group", self.groups.len(),     data.ngroups),
            ("band",       self.bands.len(),      data.nbands),
        ];
        for (what, got, expected) in pairs {
            fleur_ensure!(got == expected, Selection,
                "{} mask has length {}, expected {}", what, got, expected);
        }
        Ok(())
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::error::FleurError;

    #[test]
    fn test_masks() {
        assert_eq!(spin_mask(None, 2).unwrap(), vec![true, true]);
        assert_eq!(character_mask(Some(&[0, 2]), 4).unwrap(), vec![true, false, true, false]);
        assert_eq!(group_mask(Some(&[]), 3).unwrap(), vec![false; 3]);
        assert_eq!(band_mask(Some(&[4, 4]), 5).unwrap(), vec![false, false, false, false, true]);

        let err = band_mask(Some(&[5]), 5).unwrap_err();
        assert!(matches!(err.downcast_ref::<FleurError>(), Some(FleurError::Selection(_))));
        assert!(character_mask(Some(&[4]), 4).is_err());
    }

    #[test]
    fn test_selected_indices() {
        assert_eq!(selected_indices(&[false, true, true, false, true]), vec![1, 2, 4]);
        assert!(selected_indices(&[false, false]).is_empty());
    }

    #[test]
    fn test_parse_characters() {
        assert_eq!(parse_characters(&["p", "S", "p"], 4).unwrap(), vec![0, 1]);
        assert_eq!(parse_characters(&["f", "d"], 4).unwrap(), vec![2, 3]);
        assert!(parse_characters(&["f"], 3).is_err());
        assert!(parse_characters(&["x"], 4).is_err());
        assert!(parse_characters::<&str>(&[], 4).unwrap().is_empty());
    }

    #[test]
    fn test_single_spin() {
        let sel = Selection {
            spins:      vec![true, true],
            characters: vec![true; 4],
            groups:     vec![true],
            bands:      vec![true; 3],
        };
        assert!(sel.single_spin().is_err());
        assert_eq!(sel.with_spin(1).unwrap().single_spin().unwrap(), 1);
        assert!(sel.with_spin(2).is_err());
    }
}
