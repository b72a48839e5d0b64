//! Conversions from fractional to physical coordinates.

use ndarray::{
    arr2,
    Axis,
};

use crate::{
    fleur_ensure,
    types::{
        Result,
        Vector,
        Matrix,
        Mat33,
        BOHR_TO_ANGSTROM,
    },
};


/// Physical k-vectors, `k_phys = k_frac · Bᵀ`, where `B` is the reciprocal cell.
pub fn kpoints_cartesian(kfrac: &Matrix<f64>, reciprocal_cell: &Mat33<f64>) -> Result<Matrix<f64>> {
    fleur_ensure!(kfrac.ncols() == 3, Shape,
        "k-points should be of shape [NK, 3], got {:?}", kfrac.shape());
    let b = arr2(reciprocal_cell);
    Ok(kfrac.dot(&b.t()))
}


/// Cumulative arc length along the k-path.
///
/// `dist[0] = 0` and `dist[i] = dist[i-1] + |B·(k_i - k_{i-1})|`.
pub fn kpath_distance(kfrac: &Matrix<f64>, reciprocal_cell: &Mat33<f64>) -> Result<Vector<f64>> {
    let kcart = kpoints_cartesian(kfrac, reciprocal_cell)?;
    let nk = kcart.nrows();

    let mut dist = Vector::<f64>::zeros(nk);
    for ik in 1 .. nk {
        let dk = &kcart.row(ik) - &kcart.row(ik - 1);
        dist[ik] = dist[ik - 1] + dk.dot(&dk).sqrt();
    }

    Ok(dist)
}


/// Physical atom positions in Angstrom from fractional positions and the Bravais matrix (Bohr),
/// lattice vectors being the rows of `bravais`.
pub fn atoms_cartesian(frac_pos: &Matrix<f64>, bravais: &Mat33<f64>) -> Result<Matrix<f64>> {
    fleur_ensure!(frac_pos.len_of(Axis(1)) == 3, Shape,
        "atom positions should be of shape [NATOMS, 3], got {:?}", frac_pos.shape());
    let a = arr2(bravais);
    Ok(frac_pos.dot(&a) * BOHR_TO_ANGSTROM)
}


#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr1;

    #[test]
    fn test_kpath_distance() {
        let rec = [[2.0, 0.0, 0.0],
                   [0.0, 1.0, 0.0],
                   [0.0, 0.0, 1.0]];
        let kfrac = arr2(&[[0.0, 0.0, 0.0],
                           [0.5, 0.0, 0.0],
                           [0.5, 0.5, 0.0],
                           [0.5, 0.5, 0.0]]);

        let dist = kpath_distance(&kfrac, &rec).unwrap();
        assert_relative_eq!(dist, arr1(&[0.0, 1.0, 1.5, 1.5]));
        assert!(dist.windows(2).into_iter().all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_kpoints_cartesian_transposed() {
        let rec = [[1.0, 2.0, 0.0],
                   [0.0, 1.0, 0.0],
                   [0.0, 0.0, 1.0]];
        let kfrac = arr2(&[[1.0, 1.0, 0.0]]);
        let kcart = kpoints_cartesian(&kfrac, &rec).unwrap();
        assert_relative_eq!(kcart, arr2(&[[3.0, 1.0, 0.0]]));

        assert!(kpoints_cartesian(&arr2(&[[1.0, 1.0]]), &rec).is_err());
    }

    #[test]
    fn test_atoms_cartesian() {
        let bravais = [[10.0, 0.0, 0.0],
                       [0.0, 10.0, 0.0],
                       [0.0, 0.0, 20.0]];
        let pos = arr2(&[[0.5, 0.0, 0.25]]);
        let cart = atoms_cartesian(&pos, &bravais).unwrap();
        assert_relative_eq!(cart, arr2(&[[2.6, 0.0, 2.6]]), epsilon = 1E-12);
    }
}
