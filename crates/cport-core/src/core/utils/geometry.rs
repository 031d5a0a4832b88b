use crate::core::models::structure::DistanceTable;
use nalgebra::Point3;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Smallest distance between any atom of `a` and any atom of `b`.
pub fn min_distance(a: &[Point3<f64>], b: &[Point3<f64>]) -> Option<f64> {
    a.iter()
        .flat_map(|pa| b.iter().map(move |pb| nalgebra::distance_squared(pa, pb)))
        .min_by(|x, y| x.total_cmp(y))
        .map(f64::sqrt)
}

/// Builds the sparse residue distance table from per-residue atom coordinates, keeping
/// only the pairs whose closest atoms are within `cutoff` Angstroms.
pub fn residue_distance_table(
    residues: &BTreeMap<isize, Vec<Point3<f64>>>,
    cutoff: f64,
) -> DistanceTable {
    let entries: Vec<(isize, &[Point3<f64>])> = residues
        .iter()
        .filter(|(_, atoms)| !atoms.is_empty())
        .map(|(&n, atoms)| (n, atoms.as_slice()))
        .collect();

    let pairs: Vec<(usize, usize)> = (0..entries.len())
        .flat_map(|i| ((i + 1)..entries.len()).map(move |j| (i, j)))
        .collect();

    pairs
        .par_iter()
        .filter_map(|&(i, j)| {
            let (res_a, atoms_a) = entries[i];
            let (res_b, atoms_b) = entries[j];
            min_distance(atoms_a, atoms_b)
                .filter(|&d| d <= cutoff)
                .map(|d| (res_a, res_b, d))
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn min_distance_finds_closest_atom_pair() {
        let a = [Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0)];
        let b = [Point3::new(13.0, 4.0, 0.0), Point3::new(50.0, 0.0, 0.0)];
        assert!(f64_approx_equal(min_distance(&a, &b).unwrap(), 5.0));
        assert_eq!(min_distance(&a, &[]), None);
    }

    #[test]
    fn residue_distance_table_keeps_only_close_pairs() {
        let residues = BTreeMap::from([
            (1, vec![Point3::new(0.0, 0.0, 0.0)]),
            (2, vec![Point3::new(3.0, 0.0, 0.0)]),
            (3, vec![Point3::new(20.0, 0.0, 0.0)]),
            (4, vec![]),
        ]);

        let table = residue_distance_table(&residues, 6.5);

        assert_eq!(table.len(), 1);
        assert!(f64_approx_equal(table.get(2, 1).unwrap(), 3.0));
        assert_eq!(table.get(1, 3), None);
    }
}
