//! Radius-based point thinning over a kd-tree.
//!
//! Thinning removes near-duplicate points so that no two survivors lie
//! closer than a tolerance. The result is order-dependent by contract:
//! points are visited in input order, each not-yet-removed point claims its
//! neighborhood, and everything inside the claimed radius is dropped. A
//! point that has been removed never initiates a query of its own, but it
//! stays in the tree and can still appear in later query results.

use kiddo::{ImmutableKdTree, SquaredEuclidean};

use crate::geometry::Vector3d;

/// Thin `points` in place so that no two survivors are closer than
/// `tolerance`.
///
/// Survivors keep their relative input order, and every removed point has
/// a survivor strictly closer than `tolerance`. Neighbors at exactly the
/// tolerance are kept.
pub fn thin(points: &mut Vec<Vector3d>, tolerance: f64) {
    assert!(tolerance > 0.0);

    if points.len() < 2 {
        return;
    }

    let entries: Vec<[f64; 3]> = points.iter().map(|p| p.to_array()).collect();
    let tree: ImmutableKdTree<f64, 3> = ImmutableKdTree::new_from_slice(&entries);

    let radius_squared = tolerance * tolerance;
    let mut removed = vec![false; points.len()];

    for (index, entry) in entries.iter().enumerate() {
        if removed[index] {
            continue;
        }

        for neighbor in tree.within_unsorted::<SquaredEuclidean>(entry, radius_squared) {
            let other = neighbor.item as usize;
            if other != index && neighbor.distance < radius_squared {
                removed[other] = true;
            }
        }
    }

    let mut keep = removed.iter();
    points.retain(|_| !keep.next().unwrap());
}

/// Distance between the two closest points in `points`, or `None` when
/// there are fewer than two points.
///
/// The result is the natural thinning tolerance for a cloud: thinning at
/// any value up to this distance removes nothing.
pub fn closest_pair_distance(points: &[Vector3d]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }

    let entries: Vec<[f64; 3]> = points.iter().map(|p| p.to_array()).collect();
    let tree: ImmutableKdTree<f64, 3> = ImmutableKdTree::new_from_slice(&entries);

    let mut min_squared = f64::MAX;
    for (index, entry) in entries.iter().enumerate() {
        // Two neighbors: the nearest result is the query point itself
        // unless a coincident point sorts first.
        for neighbor in tree.nearest_n::<SquaredEuclidean>(entry, 2) {
            if neighbor.item as usize != index {
                min_squared = min_squared.min(neighbor.distance);
            }
        }
    }

    Some(min_squared.sqrt())
}

#[cfg(test)]
mod test {
    use itertools::Itertools;
    use rand::prelude::*;

    use super::*;

    fn sample_cloud() -> Vec<Vector3d> {
        vec![
            Vector3d::new(0.0, 0.0, 0.0),
            Vector3d::new(1.5, 0.0, 0.0),
            Vector3d::new(0.0, 1.5, 0.0),
            Vector3d::new(0.0, 0.0, 1.5),
            Vector3d::new(-10.0, 0.0, 0.0),
            Vector3d::new(0.0, 10.0, 0.0),
            Vector3d::new(0.0, 0.0, 10.0),
            Vector3d::new(2.0, 0.0, 0.0),
            Vector3d::new(0.0, 2.0, 0.0),
            Vector3d::new(0.0, 0.0, 2.0),
        ]
    }

    fn random_cloud(npoints: usize, seed: u64) -> Vec<Vector3d> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);

        (0..npoints)
            .map(|_| {
                Vector3d::new(
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                )
            })
            .collect()
    }

    #[test]
    fn test_closest_pair() {
        // The 1.5-away and 2.0-away axis points are each other's nearest
        // neighbors at 0.5.
        let distance = closest_pair_distance(&sample_cloud()).unwrap();
        assert!((distance - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_closest_pair_trivial_inputs() {
        assert!(closest_pair_distance(&[]).is_none());
        assert!(closest_pair_distance(&[Vector3d::new(1.0, 2.0, 3.0)]).is_none());
    }

    #[test]
    fn test_closest_pair_matches_brute_force() {
        let points = random_cloud(200, 7);

        let expected = points
            .iter()
            .tuple_combinations()
            .map(|(a, b)| a.distance_to(*b))
            .fold(f64::MAX, f64::min);

        let actual = closest_pair_distance(&points).unwrap();
        assert!((actual - expected).abs() < 1e-12);
    }

    #[test]
    fn test_thinning_subsumption() {
        // The origin's query removes all three points 1.5 away; the points
        // at 2.0 survive because they never get claimed.
        let mut points = sample_cloud();
        thin(&mut points, 1.51);

        let expected = vec![
            Vector3d::new(0.0, 0.0, 0.0),
            Vector3d::new(-10.0, 0.0, 0.0),
            Vector3d::new(0.0, 10.0, 0.0),
            Vector3d::new(0.0, 0.0, 10.0),
            Vector3d::new(2.0, 0.0, 0.0),
            Vector3d::new(0.0, 2.0, 0.0),
            Vector3d::new(0.0, 0.0, 2.0),
        ];
        assert_eq!(points, expected);
    }

    #[test]
    fn test_thinning_at_closest_pair_distance_removes_nothing() {
        let mut points = sample_cloud();
        let tolerance = closest_pair_distance(&points).unwrap();

        thin(&mut points, tolerance);
        assert_eq!(points.len(), sample_cloud().len());
    }

    #[test]
    fn test_survivors_separated_and_removals_witnessed() {
        let original = random_cloud(500, 42);
        let tolerance = 0.25;

        let mut survivors = original.clone();
        thin(&mut survivors, tolerance);

        // No two survivors closer than the tolerance.
        for (a, b) in survivors.iter().tuple_combinations() {
            assert!(a.distance_to(*b) >= tolerance);
        }

        // Every removed point has a survivor strictly within the tolerance.
        for removed in original.iter().filter(|p| !survivors.contains(p)) {
            let witness = survivors
                .iter()
                .map(|s| s.distance_to(*removed))
                .fold(f64::MAX, f64::min);
            assert!(witness < tolerance);
        }
    }

    #[test]
    fn test_survivors_keep_input_order() {
        let original = random_cloud(300, 3);

        let mut survivors = original.clone();
        thin(&mut survivors, 0.3);

        // The survivor list is a subsequence of the input.
        let mut cursor = original.iter();
        for survivor in &survivors {
            assert!(cursor.any(|p| p == survivor));
        }
    }

    #[test]
    fn test_removed_point_does_not_initiate_query() {
        // b is removed by a, so b never claims c; c is outside a's radius
        // and must survive even though it is within the tolerance of b.
        let mut points = vec![
            Vector3d::new(0.0, 0.0, 0.0),
            Vector3d::new(0.9, 0.0, 0.0),
            Vector3d::new(1.8, 0.0, 0.0),
        ];
        thin(&mut points, 1.0);

        assert_eq!(
            points,
            vec![Vector3d::new(0.0, 0.0, 0.0), Vector3d::new(1.8, 0.0, 0.0)]
        );
    }

    #[test]
    fn test_thinning_single_point() {
        let mut points = vec![Vector3d::new(1.0, 1.0, 1.0)];
        thin(&mut points, 0.5);
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn test_coincident_points_collapse_to_one() {
        let mut points = vec![Vector3d::new(0.5, 0.5, 0.5); 6];
        thin(&mut points, 0.1);
        assert_eq!(points.len(), 1);
    }
}
