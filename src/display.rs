//! Value domains offered to an interactive front end, and the reverse mapping from picked
//! labels to selection masks.

use std::fmt;

use anyhow::bail;
use log::debug;

use crate::{
    fleur_bail,
    fleur_ensure,
    types::{
        Result,
        Mask,
    },
    fleur_parsers::{
        banddos::{
            BandData,
            CHARACTER_NAMES,
        },
        dostable::DosLayout,
        elements::UNKNOWN_ELEMENT,
    },
    selection::{
        character_mask,
        group_mask,
        band_mask,
        parse_characters,
    },
};


/// Which data sources are loaded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub bands: bool,
    pub dos:   bool,
}


/// Slider selecting an interval.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RangeSlider {
    pub min:     f64,
    pub max:     f64,
    pub step:    f64,
    pub initial: [f64; 2],
}


/// Slider selecting one value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValueSlider {
    pub min:     f64,
    pub max:     f64,
    pub step:    f64,
    pub initial: f64,
}


#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupOption {
    /// 1-based atom group id
    pub id:    usize,
    pub label: String,
}


#[derive(Clone, Debug, PartialEq)]
pub struct SpecialPoint {
    pub k_distance: f64,
    pub label:      String,
}


/// Masks produced by [`DisplayValues::convert_selections`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PickedMasks {
    pub characters: Mask,
    pub groups:     Mask,
    /// Empty when no band data is loaded.
    pub bands:      Mask,
}


pub const EXPONENT_SLIDER: ValueSlider = ValueSlider { min: 0.0, max: 4.0, step: 0.01, initial: 1.0 };
pub const MARKER_SLIDER:   ValueSlider = ValueSlider { min: 0.0, max: 10.0, step: 0.01, initial: 1.0 };


#[derive(Clone, Debug, PartialEq)]
pub struct DisplayValues {
    pub capabilities:   Capabilities,
    pub characters:     Vec<String>,
    pub groups:         Vec<GroupOption>,
    pub num_groups:     usize,
    pub num_bands:      usize,
    pub band_slider:    Option<RangeSlider>,
    pub energy_slider:  Option<RangeSlider>,
    pub exponent:       ValueSlider,
    pub marker_size:    ValueSlider,
    pub special_points: Vec<SpecialPoint>,
}


impl DisplayValues {
    /// Collect the display domains. Band data takes precedence over the DOS layout for the
    /// character and group domains.
    pub fn new(band: Option<&BandData>, dos: Option<&DosLayout>) -> Result<Self> {
        let capabilities = Capabilities {
            bands: band.is_some(),
            dos:   dos.is_some(),
        };

        let ret = match (band, dos) {
            (Some(data), _) => Self {
                capabilities,
                characters:     data.character_names(),
                groups:         band_groups(data),
                num_groups:     data.ngroups,
                num_bands:      data.nbands,
                band_slider:    Some(band_slider(data.nbands)),
                energy_slider:  Some(energy_slider(data.energy_range_ev())),
                exponent:       EXPONENT_SLIDER,
                marker_size:    MARKER_SLIDER,
                special_points: data.special_point_k.iter()
                    .zip(data.special_point_labels.iter())
                    .map(|(&k_distance, label)| SpecialPoint { k_distance, label: label.clone() })
                    .collect(),
            },

            (None, Some(layout)) => Self {
                capabilities,
                characters:     CHARACTER_NAMES.iter()
                    .take(layout.num_characters)
                    .map(|s| s.to_string())
                    .collect(),
                groups:         (1 ..= layout.num_groups)
                    .map(|id| GroupOption { id, label: id.to_string() })
                    .collect(),
                num_groups:     layout.num_groups,
                num_bands:      0,
                band_slider:    None,
                energy_slider:  None,
                exponent:       EXPONENT_SLIDER,
                marker_size:    MARKER_SLIDER,
                special_points: vec![],
            },

            (None, None) => bail!("Neither band data nor a DOS table is loaded."),
        };

        debug!("Display capabilities: {:?}", ret.capabilities);
        Ok(ret)
    }


    /// Map picked character names, group ids or labels and 1-based band indices onto masks.
    ///
    /// An empty list selects everything on that axis.
    pub fn convert_selections(&self, characters: &[&str], groups: &[&str], bands: &[usize]) -> Result<PickedMasks> {
        let nchar = self.characters.len();
        let characters = if characters.is_empty() {
            character_mask(None, nchar)?
        } else {
            character_mask(Some(&parse_characters(characters, nchar)?), nchar)?
        };

        let groups = if groups.is_empty() {
            group_mask(None, self.num_groups)?
        } else {
            let igroups = groups.iter()
                .map(|g| self.group_index(g))
                .collect::<Result<Vec<usize>>>()?;
            group_mask(Some(&igroups), self.num_groups)?
        };

        let bands = if bands.is_empty() {
            band_mask(None, self.num_bands)?
        } else {
            fleur_ensure!(self.capabilities.bands, Selection, "bands picked but no band data is loaded");
            let ibands = bands.iter()
                .map(|&b| -> Result<usize> {
                    fleur_ensure!(b >= 1, Selection, "band indices count from 1, got {}", b);
                    Ok(b - 1)
                })
                .collect::<Result<Vec<usize>>>()?;
            band_mask(Some(&ibands), self.num_bands)?
        };

        Ok(PickedMasks { characters, groups, bands })
    }


    /// 0-based position of a group given by its id or its full label.
    fn group_index(&self, picked: &str) -> Result<usize> {
        let picked = picked.trim();
        if let Some(opt) = self.groups.iter().find(|o| o.label == picked) {
            return Ok(opt.id - 1);
        }

        match picked.parse::<usize>() {
            Ok(id) if id >= 1 && id <= self.num_groups => Ok(id - 1),
            _ => fleur_bail!(Selection, "atom group `{}` not available", picked),
        }
    }
}


impl fmt::Display for DisplayValues {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "bands: {}, dos: {}", self.capabilities.bands, self.capabilities.dos)?;
        writeln!(f, "characters: {}", self.characters.join(" "))?;
        writeln!(f, "atom groups:")?;
        for g in self.groups.iter() {
            writeln!(f, "  {}", g.label)?;
        }
        if let Some(s) = self.band_slider {
            writeln!(f, "band slider:     [{}, {}] step {}", s.min, s.max, s.step)?;
        }
        if let Some(s) = self.energy_slider {
            writeln!(f, "energy slider:   [{}, {}] step {} eV", s.min, s.max, s.step)?;
        }
        writeln!(f, "exponent slider: [{}, {}] step {} initial {}",
                 self.exponent.min, self.exponent.max, self.exponent.step, self.exponent.initial)?;
        writeln!(f, "marker slider:   [{}, {}] step {} initial {}",
                 self.marker_size.min, self.marker_size.max, self.marker_size.step, self.marker_size.initial)?;
        for p in self.special_points.iter() {
            writeln!(f, "  {:>10.5}  {}", p.k_distance, p.label)?;
        }
        Ok(())
    }
}


fn band_groups(data: &BandData) -> Vec<GroupOption> {
    let mut ids = data.atom_group_keys();
    ids.sort_unstable();
    ids.into_iter()
        .map(|id| {
            let sym = data.group_element(id).unwrap_or(UNKNOWN_ELEMENT);
            GroupOption {
                id,
                label: format!("{}  {}  : {}", id, sym, data.atoms_per_group[id - 1]),
            }
        })
        .collect()
}


fn band_slider(nbands: usize) -> RangeSlider {
    RangeSlider {
        min: 1.0,
        max: nbands as f64,
        step: 1.0,
        initial: [1.0, nbands as f64],
    }
}


/// Whole-eV bounds around the eigenvalue range; finer steps for narrow windows.
fn energy_slider((emin, emax): (f64, f64)) -> RangeSlider {
    let min = emin.floor();
    let max = emax.ceil();
    let step = if max - min > 10.0 { 0.1 } else { 0.01 };
    RangeSlider {
        min,
        max,
        step,
        initial: [min, max],
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use ndarray::{
        arr2,
        Array3,
        Array5,
    };
    use crate::{
        error::FleurError,
        fleur_parsers::banddos::RawBandData,
    };

    fn sample() -> BandData {
        BandData::new(RawBandData {
            eigenvalues: Array3::from_shape_vec((1, 2, 3), vec![-0.2, 0.0, 0.1, -0.1, 0.05, 0.2]).unwrap(),
            llikecharge: Array5::from_elem((1, 2, 3, 2, 4), 0.1),
            kpoints: arr2(&[[0.0, 0.0, 0.0], [0.5, 0.0, 0.0]]),
            kpoint_weights: None,
            special_point_indices: vec![1, 2],
            special_point_labels: vec!["Γ".to_string(), "X".to_string()],
            reciprocal_cell: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            bravais: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            atom_positions: arr2(&[[0.0, 0.0, 0.0], [0.5, 0.5, 0.5], [0.25, 0.25, 0.25]]),
            atoms_group: vec![2, 1, 2],
            atoms_elements: vec!["O".to_string(), "Fe".to_string(), "O".to_string()],
            fermi_energy: 0.0,
            band_unfolding: false,
            unfolding_weights: None,
        }).unwrap()
    }

    #[test]
    fn test_from_band_data() {
        let data = sample();
        let dv = DisplayValues::new(Some(&data), None).unwrap();

        assert_eq!(dv.capabilities, Capabilities { bands: true, dos: false });
        assert_eq!(dv.characters, vec!["s", "p", "d", "f"]);
        assert_eq!(dv.groups, vec![
            GroupOption { id: 1, label: "1  Fe  : 1".to_string() },
            GroupOption { id: 2, label: "2  O  : 2".to_string() },
        ]);
        assert_eq!(dv.band_slider, Some(RangeSlider { min: 1.0, max: 3.0, step: 1.0, initial: [1.0, 3.0] }));

        let e = dv.energy_slider.unwrap();
        assert_eq!(e.min, (-0.2 * 27.2114f64).floor());
        assert_eq!(e.max, (0.2 * 27.2114f64).ceil());
        assert_eq!(e.initial, [e.min, e.max]);
        assert_eq!(e.step, 0.1);

        assert_eq!(dv.exponent, EXPONENT_SLIDER);
        assert_eq!(dv.marker_size.max, 10.0);
        assert_eq!(dv.special_points[1], SpecialPoint { k_distance: 0.5, label: "X".to_string() });
    }

    #[test]
    fn test_from_dos_layout() {
        let layout = DosLayout::new(3, 4);
        let dv = DisplayValues::new(None, Some(&layout)).unwrap();
        assert_eq!(dv.capabilities, Capabilities { bands: false, dos: true });
        assert_eq!(dv.groups.len(), 3);
        assert_eq!(dv.groups[2].label, "3");
        assert!(dv.band_slider.is_none());
        assert!(DisplayValues::new(None, None).is_err());
    }

    #[test]
    fn test_convert_selections() {
        let data = sample();
        let dv = DisplayValues::new(Some(&data), None).unwrap();

        let all = dv.convert_selections(&[], &[], &[]).unwrap();
        assert_eq!(all.characters, vec![true; 4]);
        assert_eq!(all.groups, vec![true; 2]);
        assert_eq!(all.bands, vec![true; 3]);

        let picked = dv.convert_selections(&["p", "s"], &["2  O  : 2"], &[3]).unwrap();
        assert_eq!(picked.characters, vec![true, true, false, false]);
        assert_eq!(picked.groups, vec![false, true]);
        assert_eq!(picked.bands, vec![false, false, true]);

        assert_eq!(dv.convert_selections(&[], &["1"], &[]).unwrap().groups, vec![true, false]);

        for err in [
            dv.convert_selections(&["x"], &[], &[]).unwrap_err(),
            dv.convert_selections(&[], &["3"], &[]).unwrap_err(),
            dv.convert_selections(&[], &[], &[0]).unwrap_err(),
            dv.convert_selections(&[], &[], &[4]).unwrap_err(),
        ] {
            assert!(matches!(err.downcast_ref::<FleurError>(), Some(FleurError::Selection(_))));
        }

        let dos_only = DisplayValues::new(None, Some(&DosLayout::new(2, 4))).unwrap();
        assert!(dos_only.convert_selections(&[], &[], &[1]).is_err());
        assert!(dos_only.convert_selections(&[], &[], &[]).unwrap().bands.is_empty());
    }
}
