//! Voxel addressing and sorting.
//!
//! A [VoxelAddress] is the integer `(i, j, k)` index of a cell in a
//! discretized space. A [VoxelSorter] carries the parameters of one such
//! discretization and maps any point to the address of the cell that
//! contains it. The routing hash over addresses is part of the wire
//! contract of the distributed pipeline: readers and workers must agree on
//! it bit-for-bit, since `hash mod worker_count` decides which worker owns
//! a region of space.

use std::collections::HashMap;

use crate::geometry::Vector3d;

/// Integer index of a voxel in a discretized space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VoxelAddress {
    /// Cell index along x.
    pub i: i64,
    /// Cell index along y.
    pub j: i64,
    /// Cell index along z.
    pub k: i64,
}

impl VoxelAddress {
    /// Create an address from its cell indices.
    pub fn new(i: i64, j: i64, k: i64) -> Self {
        Self { i, j, k }
    }

    /// Deterministic routing hash.
    ///
    /// Evaluated in wrapping unsigned 64-bit arithmetic so that every peer
    /// computes the identical value for the same address regardless of
    /// platform. Used modulo the worker count to pick the worker that owns
    /// this address.
    pub fn route_hash(&self) -> u64 {
        let mut hash = self.i as u64;
        hash = hash.wrapping_mul(37).wrapping_add(self.j as u64);
        hash = hash.wrapping_mul(37).wrapping_add(self.k as u64);
        hash
    }
}

impl std::fmt::Display for VoxelAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.i, self.j, self.k)
    }
}

/// A point together with the voxel address it was sorted into.
///
/// The discretization parameters are not stored with the point; the address
/// is only meaningful relative to the sorter that produced it.
#[derive(Clone, Copy, Debug)]
pub struct LocatedPoint {
    /// The original point location.
    pub location: Vector3d,
    /// Address of the voxel containing the point.
    pub address: VoxelAddress,
}

/// Maps points to voxel addresses for one spatial discretization.
#[derive(Clone, Copy, Debug)]
pub struct VoxelSorter {
    dx: f64,
    dy: f64,
    dz: f64,
    x0: f64,
    y0: f64,
    z0: f64,
}

impl VoxelSorter {
    /// Create a sorter with the given cell spacings and grid origin.
    ///
    /// All spacings must be positive.
    pub fn new(dx: f64, dy: f64, dz: f64, x0: f64, y0: f64, z0: f64) -> Self {
        assert!(dx > 0.0 && dy > 0.0 && dz > 0.0);
        Self {
            dx,
            dy,
            dz,
            x0,
            y0,
            z0,
        }
    }

    /// Cubic sorter for the fine output grid with origin at zero.
    pub fn fine(voxel_distance: f64) -> Self {
        Self::new(
            voxel_distance,
            voxel_distance,
            voxel_distance,
            0.0,
            0.0,
            0.0,
        )
    }

    /// Cubic sorter for the coarse region grid used to bucket points for
    /// thinning.
    ///
    /// The spacing is the smallest multiple of `voxel_distance` that is at
    /// least `binning_distance`, so a thinning neighborhood never spans
    /// more than one cell boundary per axis. The shifted variant offsets
    /// the origin by half a cell along every axis; running one shifted and
    /// one unshifted pass covers the boundary regions each grid misses.
    pub fn coarse(voxel_distance: f64, binning_distance: f64, shifted: bool) -> Self {
        let mut mult = 1;
        while voxel_distance * mult as f64 < binning_distance {
            mult += 1;
        }
        let dv = voxel_distance * mult as f64;

        if shifted {
            Self::new(dv, dv, dv, dv / 2.0, dv / 2.0, dv / 2.0)
        } else {
            Self::new(dv, dv, dv, 0.0, 0.0, 0.0)
        }
    }

    /// Address of the cell containing `point`.
    ///
    /// A point exactly on a cell face belongs to the higher-indexed cell on
    /// that axis.
    pub fn identify(&self, point: Vector3d) -> VoxelAddress {
        VoxelAddress::new(
            ((point.x - self.x0) / self.dx).floor() as i64,
            ((point.y - self.y0) / self.dy).floor() as i64,
            ((point.z - self.z0) / self.dz).floor() as i64,
        )
    }

    /// Pair `point` with the address of its containing cell.
    pub fn locate(&self, point: Vector3d) -> LocatedPoint {
        LocatedPoint {
            location: point,
            address: self.identify(point),
        }
    }
}

/// Sparse per-voxel intensity map: the number of points in each non-empty
/// voxel of the fine grid.
#[derive(Clone, Debug, Default)]
pub struct VoxelCounts {
    counts: HashMap<VoxelAddress, u64>,
}

impl VoxelCounts {
    /// Create an empty intensity map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the intensity of the voxel at `address`.
    pub fn increment(&mut self, address: VoxelAddress) {
        *self.counts.entry(address).or_default() += 1;
    }

    /// Intensity of the voxel at `address`; zero if the voxel is empty.
    pub fn count(&self, address: VoxelAddress) -> u64 {
        self.counts.get(&address).copied().unwrap_or(0)
    }

    /// Number of non-empty voxels.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// True if no voxel has been incremented yet.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Total number of points across all voxels.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Iterate over `(address, intensity)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&VoxelAddress, &u64)> {
        self.counts.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_identify_unit_origin() {
        let sorter = VoxelSorter::new(1.0, 2.0, 3.0, 0.0, 0.0, 0.0);

        assert_eq!(
            sorter.identify(Vector3d::new(0.0, 0.0, 0.0)),
            VoxelAddress::new(0, 0, 0)
        );
        assert_eq!(
            sorter.identify(Vector3d::new(0.5, 1.5, 2.5)),
            VoxelAddress::new(0, 0, 0)
        );
        assert_eq!(
            sorter.identify(Vector3d::new(1.5, 2.5, 3.5)),
            VoxelAddress::new(1, 1, 1)
        );
    }

    #[test]
    fn test_identify_shifted_negative() {
        let sorter = VoxelSorter::new(1.0, 1.0, 1.0, 0.5, -1.5, -2.0);

        assert_eq!(
            sorter.identify(Vector3d::new(0.0, 0.0, 0.0)),
            VoxelAddress::new(-1, 1, 2)
        );
        assert_eq!(
            sorter.identify(Vector3d::new(-3.2, 4.1, -4.2)),
            VoxelAddress::new(-4, 5, -3)
        );
    }

    #[test]
    fn test_identify_on_cell_face() {
        // A point exactly on a bin face belongs to the higher-indexed bin.
        let sorter = VoxelSorter::new(0.5, 0.5, 0.5, 0.0, 0.0, 0.0);

        assert_eq!(
            sorter.identify(Vector3d::new(1.0, -0.5, 0.0)),
            VoxelAddress::new(2, -1, 0)
        );
    }

    #[test]
    fn test_coarse_spacing_multiple_of_voxel_distance() {
        // voxel 0.3, binning 1.0 -> spacing 1.2 with shifted origin 0.6.
        let shifted = VoxelSorter::coarse(0.3, 1.0, true);
        assert_eq!(
            shifted.identify(Vector3d::new(0.59, 0.61, 1.81)),
            VoxelAddress::new(-1, 0, 1)
        );

        let unshifted = VoxelSorter::coarse(0.3, 1.0, false);
        assert_eq!(
            unshifted.identify(Vector3d::new(1.19, 1.21, -0.01)),
            VoxelAddress::new(0, 1, -1)
        );
    }

    #[test]
    fn test_coarse_exact_multiple() {
        // binning an exact multiple of voxel keeps the spacing unchanged.
        let sorter = VoxelSorter::coarse(0.5, 1.0, false);
        assert_eq!(
            sorter.identify(Vector3d::new(0.99, 1.0, 2.99)),
            VoxelAddress::new(0, 1, 2)
        );
    }

    #[test]
    fn test_two_phase_coverage() {
        // Any two points within binning_distance share a coarse cell in at
        // least one of the two phases.
        let voxel = 0.25;
        let binning = 1.0;
        let shifted = VoxelSorter::coarse(voxel, binning, true);
        let unshifted = VoxelSorter::coarse(voxel, binning, false);

        let mut x = -3.0;
        while x < 3.0 {
            let a = Vector3d::new(x, 0.1, 0.1);
            let b = Vector3d::new(x + 0.49, 0.1, 0.1);

            let together_shifted = shifted.identify(a) == shifted.identify(b);
            let together_unshifted = unshifted.identify(a) == unshifted.identify(b);
            assert!(
                together_shifted || together_unshifted,
                "pair at x = {} split in both phases",
                x
            );

            x += 0.013;
        }
    }

    #[test]
    fn test_route_hash_stable() {
        // The hash is a wire contract; these values must never change.
        assert_eq!(VoxelAddress::new(0, 0, 0).route_hash(), 0);
        assert_eq!(VoxelAddress::new(1, 0, 0).route_hash(), 37 * 37);
        assert_eq!(VoxelAddress::new(0, 1, 0).route_hash(), 37);
        assert_eq!(VoxelAddress::new(0, 0, 1).route_hash(), 1);
        assert_eq!(
            VoxelAddress::new(-1, -1, -1).route_hash(),
            0u64.wrapping_sub(1407)
        );
    }

    #[test]
    fn test_route_hash_component_sensitive() {
        let base = VoxelAddress::new(12, -7, 3).route_hash();

        assert_ne!(VoxelAddress::new(13, -7, 3).route_hash(), base);
        assert_ne!(VoxelAddress::new(12, -6, 3).route_hash(), base);
        assert_ne!(VoxelAddress::new(12, -7, 4).route_hash(), base);
    }

    #[test]
    fn test_routing_covers_all_workers() {
        // Worker selection is hash mod worker count: always in range, and
        // a spread of nearby addresses lands on every worker rather than
        // piling onto one.
        let workers = 5u64;
        let mut owned = vec![0usize; workers as usize];

        for i in -6..6 {
            for j in -6..6 {
                for k in -6..6 {
                    let worker = VoxelAddress::new(i, j, k).route_hash() % workers;
                    owned[worker as usize] += 1;
                }
            }
        }

        assert!(owned.iter().all(|&count| count > 0), "idle worker: {:?}", owned);
    }

    #[test]
    fn test_intensity_increment() {
        let sorter = VoxelSorter::fine(1.0);
        let points = [
            Vector3d::new(0.0, 0.0, 0.0),
            Vector3d::new(1.0, 0.0, 0.0),
            Vector3d::new(1.0, 0.0, 0.0),
            Vector3d::new(0.0, 1.0, 0.0),
            Vector3d::new(0.0, 1.0, 0.0),
            Vector3d::new(0.0, 1.0, 0.0),
        ];

        let mut counts = VoxelCounts::new();
        assert!(counts.is_empty());
        for &p in &points {
            counts.increment(sorter.identify(p));
        }

        assert!(!counts.is_empty());
        assert_eq!(counts.len(), 3);
        assert_eq!(counts.count(VoxelAddress::new(0, 0, 0)), 1);
        assert_eq!(counts.count(VoxelAddress::new(1, 0, 0)), 2);
        assert_eq!(counts.count(VoxelAddress::new(0, 1, 0)), 3);
        assert_eq!(counts.total(), 6);
    }
}
