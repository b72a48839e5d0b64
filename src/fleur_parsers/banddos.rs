//! Reader for the `banddos.hdf` container written by Fleur band structure runs.
//!
//! Every dataset is copied into owned `ndarray` storage before the file handle is
//! released, so a `BandData` never refers back to the file it came from.

use std::path::Path;

use anyhow::Context;
use hdf5::{
    File as H5File,
    Dataset,
    Attribute,
    types::{
        VarLenUnicode,
        VarLenAscii,
        FixedAscii,
    },
};
use indexmap::IndexMap;
use log::{
    info,
    debug,
    warn,
};
use ndarray::{
    Array,
    Array5,
    Dimension,
    Ix1,
    Ix2,
    Ix3,
    Ix5,
};

use crate::{
    fleur_bail,
    fleur_ensure,
    error::FleurError,
    physics::{
        kpath_distance,
        atoms_cartesian,
    },
    types::{
        Result,
        Vector,
        Matrix,
        Cube,
        Mat33,
        HARTREE,
    },
    fleur_parsers::elements::{
        element_symbol,
        UNKNOWN_ELEMENT,
    },
};


/// Orbital characters in the order of the last axis of `llikecharge`.
pub const CHARACTER_NAMES: [&str; 4] = ["s", "p", "d", "f"];


/// Values exactly as stored in the file, already copied into memory.
#[derive(Clone, Debug)]
pub struct RawBandData {
    pub eigenvalues:           Cube<f64>,           // [ispin, ikpoint, iband], Hartree
    pub llikecharge:           Array5<f64>,         // [ispin, ikpoint, iband, igroup, ichar]
    pub kpoints:               Matrix<f64>,         // [ikpoint, 3], fractional
    pub kpoint_weights:        Option<Vector<f64>>,
    pub special_point_indices: Vec<usize>,          // 1-based
    pub special_point_labels:  Vec<String>,
    pub reciprocal_cell:       Mat33<f64>,
    pub bravais:               Mat33<f64>,          // Bohr
    pub atom_positions:        Matrix<f64>,         // [iatom, 3], fractional
    pub atoms_group:           Vec<usize>,          // 1-based group id of each atom
    pub atoms_elements:        Vec<String>,
    pub fermi_energy:          f64,                 // Hartree
    pub band_unfolding:        bool,
    pub unfolding_weights:     Option<Cube<f64>>,   // [ispin, ikpoint, iband]
}


/// Band structure with orbital projections, validated and with derived quantities.
#[derive(Clone, Debug)]
pub struct BandData {
    pub nspin:                 usize,
    pub nkpoints:              usize,
    pub nbands:                usize,
    pub ngroups:               usize,
    pub nchar:                 usize,

    pub eigenvalues:           Cube<f64>,
    pub llikecharge:           Array5<f64>,
    pub kpoints:               Matrix<f64>,
    pub kpoint_weights:        Option<Vector<f64>>,
    pub special_point_indices: Vec<usize>,
    pub special_point_labels:  Vec<String>,
    pub reciprocal_cell:       Mat33<f64>,
    pub bravais:               Mat33<f64>,
    pub atom_positions:        Matrix<f64>,
    pub atoms_group:           Vec<usize>,
    pub atoms_elements:        Vec<String>,
    pub fermi_energy:          f64,
    pub band_unfolding:        bool,
    pub unfolding_weights:     Option<Cube<f64>>,

    /// Group id -> number of atoms, in order of first occurrence.
    pub atoms_per_group_dict:  IndexMap<usize, usize>,
    /// Dense multiplicities, `atoms_per_group[g-1]` for group id `g`, zero for absent ids.
    pub atoms_per_group:       Vec<usize>,
    pub k_distance:            Vector<f64>,
    pub special_point_k:       Vector<f64>,
}


impl BandData {
    /// Read `banddos.hdf`; the file is closed again before this returns.
    pub fn from_file(path: &(impl AsRef<Path> + ?Sized)) -> Result<Self> {
        let path = path.as_ref();
        fleur_ensure!(path.is_file(), Io, "{:?} does not exist or is not a file", path);

        info!("Reading band data from {:?}", path);
        let raw = {
            let file = H5File::open(path)
                .map_err(|e| FleurError::Io(format!("cannot open {:?} as HDF5: {}", path, e)))?;
            RawBandData::from_h5(&file)?
        };

        Self::new(raw)
    }


    /// Validate the shapes of `raw` and compute the derived quantities.
    pub fn new(raw: RawBandData) -> Result<Self> {
        let RawBandData {
            eigenvalues,
            llikecharge,
            kpoints,
            kpoint_weights,
            special_point_indices,
            special_point_labels,
            reciprocal_cell,
            bravais,
            atom_positions,
            atoms_group,
            atoms_elements,
            fermi_energy,
            band_unfolding,
            unfolding_weights,
        } = raw;

        let (nspin, nkpoints, nbands, ngroups, nchar) = llikecharge.dim();
        debug!("lLikeCharge shape: nspin = {}, nkpoints = {}, nbands = {}, ngroups = {}, nchar = {}",
               nspin, nkpoints, nbands, ngroups, nchar);

        fleur_ensure!((1 ..= CHARACTER_NAMES.len()).contains(&nchar), Shape,
            "lLikeCharge should carry 1 to {} orbital characters, got {}", CHARACTER_NAMES.len(), nchar);
        fleur_ensure!(eigenvalues.dim() == (nspin, nkpoints, nbands), Shape,
            "eigenvalues of shape {:?} mismatch lLikeCharge of shape {:?}",
            eigenvalues.shape(), llikecharge.shape());
        fleur_ensure!(kpoints.dim() == (nkpoints, 3), Shape,
            "k-point coordinates of shape {:?} mismatch NK = {}", kpoints.shape(), nkpoints);
        if let Some(w) = kpoint_weights.as_ref() {
            fleur_ensure!(w.len() == nkpoints, Shape,
                "{} k-point weights mismatch NK = {}", w.len(), nkpoints);
        }

        fleur_ensure!(special_point_indices.len() == special_point_labels.len(), Shape,
            "{} special point indices but {} labels",
            special_point_indices.len(), special_point_labels.len());
        if let Some(&i) = special_point_indices.iter().find(|&&i| i == 0 || i > nkpoints) {
            fleur_bail!(Shape, "special point index {} out of range 1..={}", i, nkpoints);
        }

        let natoms = atoms_group.len();
        fleur_ensure!(atom_positions.dim() == (natoms, 3), Shape,
            "atom positions of shape {:?} mismatch {} atoms", atom_positions.shape(), natoms);
        fleur_ensure!(atoms_elements.len() == natoms, Shape,
            "{} element symbols mismatch {} atoms", atoms_elements.len(), natoms);
        if let Some(&g) = atoms_group.iter().find(|&&g| g == 0 || g > ngroups) {
            fleur_bail!(Shape, "atom group id {} out of range 1..={}", g, ngroups);
        }

        let unfolding_weights = match (band_unfolding, unfolding_weights) {
            (true, Some(w)) => {
                fleur_ensure!(w.dim() == (nspin, nkpoints, nbands), Shape,
                    "band unfolding weights of shape {:?} mismatch eigenvalues of shape {:?}",
                    w.shape(), eigenvalues.shape());
                fleur_ensure!(w.iter().all(|&x| x >= 0.0), Format,
                    "band unfolding weights should be non-negative");
                Some(w)
            },
            (true, None) => fleur_bail!(Format, "band unfolding is enabled but no weights are available"),
            (false, Some(_)) => {
                warn!("Band unfolding weights present while band unfolding is disabled, ignored.");
                None
            },
            (false, None) => None,
        };

        let mut atoms_per_group_dict = IndexMap::<usize, usize>::new();
        for &g in atoms_group.iter() {
            *atoms_per_group_dict.entry(g).or_insert(0) += 1;
        }
        let mut atoms_per_group = vec![0usize; ngroups];
        for (&g, &n) in atoms_per_group_dict.iter() {
            atoms_per_group[g - 1] = n;
        }

        let k_distance = kpath_distance(&kpoints, &reciprocal_cell)?;
        let special_point_k = special_point_indices.iter()
            .map(|&i| k_distance[i - 1])
            .collect::<Vector<f64>>();

        Ok(Self {
            nspin,
            nkpoints,
            nbands,
            ngroups,
            nchar,
            eigenvalues,
            llikecharge,
            kpoints,
            kpoint_weights,
            special_point_indices,
            special_point_labels,
            reciprocal_cell,
            bravais,
            atom_positions,
            atoms_group,
            atoms_elements,
            fermi_energy,
            band_unfolding,
            unfolding_weights,
            atoms_per_group_dict,
            atoms_per_group,
            k_distance,
            special_point_k,
        })
    }


    /// Distinct group ids in order of first occurrence.
    pub fn atom_group_keys(&self) -> Vec<usize> {
        self.atoms_per_group_dict.keys().copied().collect()
    }

    /// Names of the orbital characters present in this file.
    pub fn character_names(&self) -> Vec<String> {
        CHARACTER_NAMES.iter()
            .take(self.nchar)
            .map(|s| s.to_string())
            .collect()
    }

    /// Element symbol of the first atom belonging to group `g` (1-based).
    pub fn group_element(&self, g: usize) -> Option<&str> {
        self.atoms_group.iter()
            .position(|&x| x == g)
            .map(|i| self.atoms_elements[i].as_str())
    }

    /// Atom positions in Angstrom.
    pub fn atom_positions_cartesian(&self) -> Result<Matrix<f64>> {
        atoms_cartesian(&self.atom_positions, &self.bravais)
    }

    /// Minimum and maximum eigenvalue in eV relative to the Fermi level.
    pub fn energy_range_ev(&self) -> (f64, f64) {
        let shift = |e: f64| (e - self.fermi_energy) * HARTREE;
        let emin = self.eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);
        let emax = self.eigenvalues.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (shift(emin), shift(emax))
    }
}


impl RawBandData {
    /// Copy all datasets this crate consumes out of an opened `banddos.hdf`.
    pub fn from_h5(file: &H5File) -> Result<Self> {
        let eigenvalues = read_array::<Ix3>(file, "eigenvalues/eigenvalues")?;
        let llikecharge = read_array::<Ix5>(file, "eigenvalues/lLikeCharge")?;

        let kpoints = read_array::<Ix2>(file, "kpts/coordinates")?;
        let kpoint_weights = if path_exists(file, "kpts/weights") {
            Some(read_array::<Ix1>(file, "kpts/weights")?)
        } else {
            None
        };
        let special_point_indices = read_indices(file, "kpts/specialPointIndices")?;
        let special_point_labels = read_strings(&open_dataset(file, "kpts/specialPointLabels")?)
            .context("Reading `/kpts/specialPointLabels` failed")?
            .iter()
            .map(|l| special_point_label(l))
            .collect::<Vec<_>>();

        let reciprocal_cell = read_mat33(file, "cell/reciprocalCell")?;
        let bravais = read_mat33(file, "cell/bravaisMatrix")?;

        let atom_positions = read_array::<Ix2>(file, "atoms/positions")?;
        let atoms_group = read_indices(file, "atoms/equivAtomsGroup")?;
        let atoms_elements = if path_exists(file, "atoms/atomicNumbers") {
            open_dataset(file, "atoms/atomicNumbers")?
                .read_raw::<i64>()
                .context("Reading `/atoms/atomicNumbers` failed")?
                .into_iter()
                .map(|z| element_symbol(z).unwrap_or(UNKNOWN_ELEMENT).to_string())
                .collect()
        } else {
            warn!("No `/atoms/atomicNumbers` found, element symbols are unknown.");
            vec![UNKNOWN_ELEMENT.to_string(); atoms_group.len()]
        };

        let general = file.group("general")
            .map_err(|e| FleurError::Format(format!("required group `/general` is missing: {}", e)))?;
        let band_unfolding = read_flag(&open_attr(&general, "bandUnfolding")?)?;
        let fermi_energy = open_attr(&general, "lastFermiEnergy")?
            .read_raw::<f64>()
            .context("Reading attribute `lastFermiEnergy` failed")?
            .first()
            .copied()
            .ok_or_else(|| FleurError::Format("attribute `lastFermiEnergy` is empty".to_string()))?;

        let unfolding_weights = if band_unfolding {
            Some(read_array::<Ix3>(file, "bandUnfolding/weights")?)
        } else {
            None
        };

        debug!("Fermi energy = {} Ha, band unfolding = {}", fermi_energy, band_unfolding);

        Ok(Self {
            eigenvalues,
            llikecharge,
            kpoints,
            kpoint_weights,
            special_point_indices,
            special_point_labels,
            reciprocal_cell,
            bravais,
            atom_positions,
            atoms_group,
            atoms_elements,
            fermi_energy,
            band_unfolding,
            unfolding_weights,
        })
    }
}


/// `g` is Fleur's spelling of the Brillouin zone centre.
fn special_point_label(raw: &str) -> String {
    let label = raw.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if label == "g" {
        "Γ".to_string()
    } else {
        label.to_string()
    }
}


fn path_exists(file: &H5File, path: &str) -> bool {
    let mut cur = String::new();
    for part in path.split('/').filter(|p| !p.is_empty()) {
        if !cur.is_empty() {
            cur.push('/');
        }
        cur.push_str(part);
        if !file.link_exists(&cur) {
            return false;
        }
    }
    true
}


fn open_dataset(file: &H5File, path: &str) -> Result<Dataset> {
    file.dataset(path)
        .map_err(|e| FleurError::Format(format!("required dataset `/{}` is missing: {}", path, e)).into())
}


fn open_attr(group: &hdf5::Group, name: &str) -> Result<Attribute> {
    group.attr(name)
        .map_err(|e| FleurError::Format(format!("required attribute `{}` is missing: {}", name, e)).into())
}


fn read_array<D: Dimension>(file: &H5File, path: &str) -> Result<Array<f64, D>> {
    let arr = open_dataset(file, path)?
        .read_dyn::<f64>()
        .with_context(|| format!("Reading `/{}` failed", path))?;
    let shape = arr.shape().to_vec();

    arr.into_dimensionality::<D>()
        .map_err(|_| FleurError::Shape(format!("`/{}` has unexpected shape {:?}", path, shape)).into())
}


fn read_mat33(file: &H5File, path: &str) -> Result<Mat33<f64>> {
    let m = read_array::<Ix2>(file, path)?;
    fleur_ensure!(m.dim() == (3, 3), Shape, "`/{}` should be 3x3, got {:?}", path, m.shape());

    let mut ret = [[0.0f64; 3]; 3];
    for (i, row) in m.rows().into_iter().enumerate() {
        for (j, &v) in row.iter().enumerate() {
            ret[i][j] = v;
        }
    }
    Ok(ret)
}


fn read_indices(file: &H5File, path: &str) -> Result<Vec<usize>> {
    let v = open_dataset(file, path)?
        .read_raw::<i64>()
        .with_context(|| format!("Reading `/{}` failed", path))?;

    v.into_iter()
        .map(|i| -> Result<usize> {
            usize::try_from(i)
                .map_err(|_| FleurError::Shape(format!("negative index {} in `/{}`", i, path)).into())
        })
        .collect()
}


fn read_flag(attr: &Attribute) -> Result<bool> {
    if let Ok(v) = attr.read_raw::<bool>() {
        if let Some(&b) = v.first() {
            return Ok(b);
        }
    }

    let v = attr.read_raw::<i64>().context("Reading boolean attribute failed")?;
    Ok(v.first().copied().unwrap_or(0) != 0)
}


fn read_strings(ds: &Dataset) -> Result<Vec<String>> {
    if let Ok(v) = ds.read_raw::<VarLenUnicode>() {
        return Ok(v.iter().map(|s| s.as_str().to_string()).collect());
    }

    if let Ok(v) = ds.read_raw::<VarLenAscii>() {
        return Ok(v.iter().map(|s| s.as_str().to_string()).collect());
    }

    // Try the larger widths first, a narrower one would silently truncate the labels.
    macro_rules! try_fixed_ascii {
        ($($n:expr),*) => {
            $(
                if let Ok(v) = ds.read_raw::<FixedAscii<$n>>() {
                    return Ok(v.iter().map(|s| s.as_str().to_string()).collect());
                }
            )*
        };
    }
    try_fixed_ascii!(64, 32, 16, 8, 4, 2, 1);

    fleur_bail!(Format, "unsupported string type in dataset `{}`", ds.name())
}


#[cfg(test)]
mod test {
    use super::*;
    use ndarray::{
        arr1,
        arr2,
        Array3,
    };

    fn sample_raw() -> RawBandData {
        let mut llc = Array5::<f64>::zeros((1, 2, 1, 1, 4));
        llc.slice_mut(ndarray::s![0, 0, 0, 0, ..]).assign(&arr1(&[0.2, 0.3, 0.1, 0.0]));
        llc.slice_mut(ndarray::s![0, 1, 0, 0, ..]).assign(&arr1(&[0.0, 0.0, 0.5, 0.5]));

        RawBandData {
            eigenvalues: Array3::from_shape_vec((1, 2, 1), vec![0.1, 0.2]).unwrap(),
            llikecharge: llc,
            kpoints: arr2(&[[0.0, 0.0, 0.0], [0.5, 0.0, 0.0]]),
            kpoint_weights: None,
            special_point_indices: vec![1, 2],
            special_point_labels: vec!["Γ".to_string(), "X".to_string()],
            reciprocal_cell: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            bravais: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            atom_positions: arr2(&[[0.0, 0.0, 0.0]]),
            atoms_group: vec![1],
            atoms_elements: vec!["Fe".to_string()],
            fermi_energy: 0.15,
            band_unfolding: false,
            unfolding_weights: None,
        }
    }

    fn kind(err: anyhow::Error) -> FleurError {
        err.downcast::<FleurError>().unwrap()
    }

    #[test]
    fn test_special_point_label() {
        assert_eq!(special_point_label("g"), "Γ");
        assert_eq!(special_point_label("g\0\0"), "Γ");
        assert_eq!(special_point_label("X"), "X");
        assert_eq!(special_point_label("G"), "G");
        assert_eq!(special_point_label("gX"), "gX");
    }

    #[test]
    fn test_derived() {
        let mut raw = sample_raw();
        raw.llikecharge = Array5::zeros((1, 2, 1, 3, 4));
        raw.atoms_group = vec![3, 1, 3];
        raw.atoms_elements = vec!["O".into(), "Fe".into(), "O".into()];
        raw.atom_positions = Array::zeros((3, 3));

        let data = BandData::new(raw).unwrap();
        assert_eq!(data.atom_group_keys(), vec![3, 1]);
        assert_eq!(data.atoms_per_group, vec![1, 0, 2]);
        assert_eq!(data.atoms_per_group_dict[&3], 2);
        assert_eq!(data.group_element(3), Some("O"));
        assert_eq!(data.group_element(2), None);
        assert_eq!(data.character_names(), vec!["s", "p", "d", "f"]);
        assert_eq!(data.k_distance, arr1(&[0.0, 0.5]));
        assert_eq!(data.special_point_k, arr1(&[0.0, 0.5]));
    }

    #[test]
    fn test_inconsistent_shapes() {
        let mut raw = sample_raw();
        raw.eigenvalues = Array3::zeros((1, 3, 1));
        assert!(matches!(kind(BandData::new(raw).unwrap_err()), FleurError::Shape(_)));

        let mut raw = sample_raw();
        raw.special_point_indices = vec![1, 3];
        assert!(matches!(kind(BandData::new(raw).unwrap_err()), FleurError::Shape(_)));

        let mut raw = sample_raw();
        raw.atoms_group = vec![2];
        assert!(matches!(kind(BandData::new(raw).unwrap_err()), FleurError::Shape(_)));

        let mut raw = sample_raw();
        raw.band_unfolding = true;
        assert!(matches!(kind(BandData::new(raw).unwrap_err()), FleurError::Format(_)));

        let mut raw = sample_raw();
        raw.band_unfolding = true;
        raw.unfolding_weights = Some(Array3::from_elem((1, 2, 1), -0.5));
        assert!(matches!(kind(BandData::new(raw).unwrap_err()), FleurError::Format(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = BandData::from_file("/nonexistent/banddos.hdf").unwrap_err();
        assert!(matches!(kind(err), FleurError::Io(_)));
    }
}
