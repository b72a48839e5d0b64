//! Per-(band, k-point) projection weights computed from the l-like charge.
//!
//! For a single spin the weight of band `n` at k-point `k` is
//!
//! ```text
//!          Σ_{g ∈ G_sel} m[g] Σ_{c ∈ C_sel} L[k, n, g, c]
//! W[n,k] = -----------------------------------------------  (× U[k, n]^e with unfolding)
//!          Σ_{g}         m[g] Σ_{c}         L[k, n, g, c]
//! ```
//!
//! where `m[g]` is the number of atoms in group `g`. Cells whose denominator vanishes are
//! reported as zero and counted.

use log::{
    debug,
    warn,
};
use ndarray::{
    s,
    Axis,
    Zip,
};
use rayon::prelude::*;

use crate::{
    fleur_ensure,
    types::{
        Result,
        Vector,
        Matrix,
        HARTREE,
    },
    fleur_parsers::banddos::BandData,
    selection::{
        Selection,
        character_mask,
        selected_indices,
    },
};


/// Points with weight at or below this are dropped when plotting.
pub const WEIGHT_THRESHOLD: f64 = 1E-4;

/// Regulariser of the colour ratio in the two-character view.
pub const COLOR_EPSILON: f64 = 1E-20;

/// Colour values of the two-character view are spread over `0 ..= PALETTE_RANGE`.
pub const PALETTE_RANGE: f64 = 255.0;


#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightOptions {
    /// Multiply by the band unfolding weights, if the file carries them.
    pub use_unfolding: bool,
    /// Exponent applied to the unfolding weights, must be non-negative.
    pub exponent: f64,
    /// Count every atom group once regardless of how many atoms it holds.
    pub ignore_group_multiplicity: bool,
}

impl Default for WeightOptions {
    fn default() -> Self {
        Self {
            use_unfolding: true,
            exponent: 1.0,
            ignore_group_multiplicity: false,
        }
    }
}


/// Weights of the selected bands of one spin channel.
#[derive(Clone, Debug)]
pub struct BandWeights {
    pub ispin:             usize,
    /// Selected band indices (0-based) in ascending order, rows of `weights`.
    pub ibands:            Vec<usize>,
    /// [iband', ikpoint]
    pub weights:           Matrix<f64>,
    /// Number of cells where the normalisation vanished and zero was substituted.
    pub zero_denominators: usize,
}


/// Colour and size of each (band, k-point) when comparing two orbital characters.
#[derive(Clone, Debug)]
pub struct CharacterComparison {
    pub ispin:      usize,
    pub ibands:     Vec<usize>,
    /// Index of the two compared characters.
    pub characters: [usize; 2],
    /// `w₁ / (w₁ + w₂ + ε)` scaled to `0 ..= PALETTE_RANGE`.
    pub color:      Matrix<f64>,
    /// `w₁ + w₂`
    pub size:       Matrix<f64>,
}


/// Scatter-plot ready arrays, all of the same length.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointCloud {
    pub k:      Vector<f64>,
    /// E - E_fermi in eV.
    pub energy: Vector<f64>,
    pub weight: Vector<f64>,
}


#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColoredPointCloud {
    pub k:      Vector<f64>,
    pub energy: Vector<f64>,
    pub color:  Vector<f64>,
    pub size:   Vector<f64>,
}


/// Weight of each atom group: its number of atoms, or 1 with `ignore_group_multiplicity`.
pub fn group_multiplicities(data: &BandData, opts: &WeightOptions) -> Vec<f64> {
    if opts.ignore_group_multiplicity {
        vec![1.0; data.ngroups]
    } else {
        data.atoms_per_group.iter()
            .map(|&n| n as f64)
            .collect()
    }
}


// Returns the weights and the number of vanishing denominators. With `normalize` unset the
// numerator alone is returned and nothing is counted.
fn weights_kernel(data: &BandData, sel: &Selection, opts: &WeightOptions, normalize: bool)
    -> Result<(usize, Vec<usize>, Matrix<f64>, usize)> {
    sel.check_against(data)?;
    let ispin = sel.single_spin()?;
    fleur_ensure!(opts.exponent >= 0.0 && opts.exponent.is_finite(), Selection,
        "unfolding exponent should be a finite non-negative number, got {}", opts.exponent);

    let ibands = selected_indices(&sel.bands);
    let nkpoints = data.nkpoints;

    let m_all = group_multiplicities(data, opts);
    let m_sel = m_all.iter()
        .zip(sel.groups.iter())
        .map(|(&m, &selected)| if selected { m } else { 0.0 })
        .collect::<Vec<f64>>();
    let characters = &sel.characters;

    let llc = data.llikecharge.index_axis(Axis(0), ispin);   // [ikpoint, iband, igroup, ichar]
    let unfolding = match (opts.use_unfolding, data.unfolding_weights.as_ref()) {
        (true, Some(u)) if data.band_unfolding => Some(u.index_axis(Axis(0), ispin)),
        _ => None,
    };

    debug!("Computing weights of {} bands x {} k-points for spin {}", ibands.len(), nkpoints, ispin + 1);

    let rows = ibands.par_iter()
        .map(|&iband| {
            let mut row = vec![0.0f64; nkpoints];
            let mut nzero = 0usize;

            for (ik, w) in row.iter_mut().enumerate() {
                let proj = llc.slice(s![ik, iband, .., ..]);   // [igroup, ichar]

                let mut num = 0.0f64;
                let mut den = 0.0f64;
                for (ig, chars) in proj.outer_iter().enumerate() {
                    let partial = chars.iter()
                        .zip(characters.iter())
                        .filter(|(_, &selected)| selected)
                        .map(|(v, _)| v)
                        .sum::<f64>();
                    num += m_sel[ig] * partial;
                    den += m_all[ig] * chars.sum();
                }

                *w = if !normalize {
                    num
                } else if den == 0.0 {
                    nzero += 1;
                    0.0
                } else {
                    num / den
                };

                if let Some(u) = unfolding.as_ref() {
                    *w *= u[[ik, iband]].powf(opts.exponent);
                }
            }

            (row, nzero)
        })
        .collect::<Vec<(Vec<f64>, usize)>>();

    let zero_denominators = rows.iter().map(|(_, n)| n).sum::<usize>();
    let flat = rows.into_iter()
        .flat_map(|(row, _)| row.into_iter())
        .collect::<Vec<f64>>();
    let weights = Matrix::from_shape_vec((ibands.len(), nkpoints), flat)?;

    Ok((ispin, ibands, weights, zero_denominators))
}


/// Normalised projection weights of the selected bands for the single selected spin.
///
/// Without band unfolding every value lies in `[0, 1]`.
pub fn band_weights(data: &BandData, sel: &Selection, opts: &WeightOptions) -> Result<BandWeights> {
    let (ispin, ibands, weights, zero_denominators) = weights_kernel(data, sel, opts, true)?;

    if zero_denominators > 0 {
        warn!("Spin {}: projection normalisation vanished at {} (band, k-point) cells, weights set to zero there.",
              ispin + 1, zero_denominators);
    }

    Ok(BandWeights {
        ispin,
        ibands,
        weights,
        zero_denominators,
    })
}


/// Compare exactly two selected orbital characters, the lower character index first.
///
/// Each character's multiplicity-weighted projection is computed on its own; the colour is the
/// share of the first one and the size the sum of both.
pub fn compare_characters(data: &BandData, sel: &Selection, opts: &WeightOptions) -> Result<CharacterComparison> {
    let chars = selected_indices(&sel.characters);
    fleur_ensure!(chars.len() == 2, Selection,
        "comparing orbital characters needs exactly two of them, got {}", chars.len());

    compare_character_pair(data, sel, [chars[0], chars[1]], opts)
}


/// Same as [`compare_characters`] with an explicit order: the colour is the share of `pair[0]`.
///
/// The character mask of `sel` is ignored.
pub fn compare_character_pair(data: &BandData, sel: &Selection, pair: [usize; 2], opts: &WeightOptions)
    -> Result<CharacterComparison> {
    fleur_ensure!(pair[0] != pair[1], Selection,
        "comparing orbital characters needs two different ones, got {:?} twice", pair[0]);

    let first  = sel.with_characters(character_mask(Some(&pair[0 .. 1]), data.nchar)?);
    let second = sel.with_characters(character_mask(Some(&pair[1 .. 2]), data.nchar)?);

    let (ispin, ibands, w1, _) = weights_kernel(data, &first, opts, false)?;
    let (_, _, w2, _) = weights_kernel(data, &second, opts, false)?;

    let size = &w1 + &w2;
    let color = Zip::from(&w1)
        .and(&w2)
        .map_collect(|&a, &b| a / (a + b + COLOR_EPSILON) * PALETTE_RANGE);

    Ok(CharacterComparison {
        ispin,
        ibands,
        characters: pair,
        color,
        size,
    })
}


/// Eigenvalues (Hartree) of the given bands of one spin, shaped [iband', ikpoint].
pub fn selected_eigenvalues(data: &BandData, ispin: usize, ibands: &[usize]) -> Matrix<f64> {
    data.eigenvalues
        .index_axis(Axis(0), ispin)
        .select(Axis(1), ibands)
        .reversed_axes()
}


fn check_flatten_shapes(w: &Matrix<f64>, eigs: &Matrix<f64>, k_distance: &Vector<f64>) -> Result<()> {
    fleur_ensure!(w.dim() == eigs.dim(), Shape,
        "weights of shape {:?} mismatch eigenvalues of shape {:?}", w.shape(), eigs.shape());
    fleur_ensure!(w.ncols() == k_distance.len(), Shape,
        "weights have {} k-points but k-path has {}", w.ncols(), k_distance.len());
    Ok(())
}


/// Flatten [iband', ikpoint] arrays into a point cloud.
///
/// `k` is the k-path tiled over bands, `energy` is `(E - E_fermi) * HARTREE` and `weight` is
/// `w` in row-major order. With a threshold, points with `weight <= threshold` are dropped.
pub fn flatten(w: &Matrix<f64>,
               eigs: &Matrix<f64>,
               k_distance: &Vector<f64>,
               fermi_energy: f64,
               threshold: Option<f64>) -> Result<PointCloud> {
    check_flatten_shapes(w, eigs, k_distance)?;

    let npoints = w.len();
    let mut k      = Vec::with_capacity(npoints);
    let mut energy = Vec::with_capacity(npoints);
    let mut weight = Vec::with_capacity(npoints);

    for (wrow, erow) in w.rows().into_iter().zip(eigs.rows()) {
        for ((&wi, &ei), &ki) in wrow.iter().zip(erow.iter()).zip(k_distance.iter()) {
            if threshold.map_or(false, |t| wi <= t) {
                continue;
            }
            k.push(ki);
            energy.push((ei - fermi_energy) * HARTREE);
            weight.push(wi);
        }
    }

    Ok(PointCloud {
        k:      Vector::from_vec(k),
        energy: Vector::from_vec(energy),
        weight: Vector::from_vec(weight),
    })
}


/// Same as [`flatten`] for the two-character view; the threshold applies to `size`.
pub fn flatten_colored(color: &Matrix<f64>,
                       size: &Matrix<f64>,
                       eigs: &Matrix<f64>,
                       k_distance: &Vector<f64>,
                       fermi_energy: f64,
                       threshold: Option<f64>) -> Result<ColoredPointCloud> {
    check_flatten_shapes(size, eigs, k_distance)?;
    fleur_ensure!(color.dim() == size.dim(), Shape,
        "colors of shape {:?} mismatch sizes of shape {:?}", color.shape(), size.shape());

    let base = flatten(size, eigs, k_distance, fermi_energy, threshold)?;
    let color = color.iter()
        .zip(size.iter())
        .filter(|(_, &si)| !threshold.map_or(false, |t| si <= t))
        .map(|(&c, _)| c)
        .collect::<Vector<f64>>();

    Ok(ColoredPointCloud {
        k:      base.k,
        energy: base.energy,
        color,
        size:   base.weight,
    })
}


impl BandWeights {
    pub fn to_points(&self, data: &BandData, threshold: Option<f64>) -> Result<PointCloud> {
        let eigs = selected_eigenvalues(data, self.ispin, &self.ibands);
        flatten(&self.weights, &eigs, &data.k_distance, data.fermi_energy, threshold)
    }
}


impl CharacterComparison {
    pub fn to_points(&self, data: &BandData, threshold: Option<f64>) -> Result<ColoredPointCloud> {
        let eigs = selected_eigenvalues(data, self.ispin, &self.ibands);
        flatten_colored(&self.color, &self.size, &eigs, &data.k_distance, data.fermi_energy, threshold)
    }
}
