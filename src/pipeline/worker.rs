//! The worker: receive, thin, and emit.

use std::collections::HashMap;

use log::{debug, info};
use mpi::traits::Communicator;

use crate::config::Configuration;
use crate::error::Result;
use crate::geometry::Vector3d;
use crate::io;
use crate::pipeline::directory::{Directory, DIRECTOR_RANK};
use crate::pipeline::protocol::{self, ControlCode, Message};
use crate::thinning;
use crate::voxel::{VoxelAddress, VoxelCounts, VoxelSorter};

/// One worker peer.
///
/// A worker buckets incoming points by their coarse voxel address and
/// thins each bucket independently; the coarse grid is wide enough that a
/// thinning neighborhood never spans more than one bucket boundary per
/// axis, and the phase-1/phase-2 grid shift covers the boundaries one
/// phase misses. Phase 1 persists the survivors to a binary scratch file
/// for re-routing; phase 2 voxelizes them onto the fine grid and writes
/// this worker's share of the final output.
pub struct Worker<'a> {
    config: &'a Configuration,
    number: usize,
}

impl<'a> Worker<'a> {
    /// Create the worker at `rank`.
    pub fn new(directory: Directory, config: &'a Configuration, rank: i32) -> Self {
        Self {
            config,
            number: directory.worker_number(rank),
        }
    }

    /// Run both worker phases.
    pub fn run<C: Communicator>(&self, comm: &C) -> Result<()> {
        // Phase 1: receive on the shifted grid, thin, persist to scratch.
        let sorter = VoxelSorter::coarse(
            self.config.voxel_distance,
            self.config.binning_distance,
            true,
        );
        let mut regions = self.receive_regions(comm, &sorter)?;
        self.thin_regions(&mut regions);
        info!(
            "worker {}: thinned {} phase 1 regions",
            self.number,
            regions.len()
        );

        let survivors = regions.values().flatten().copied();
        let written = io::write_binary_points(self.config.scratch_file(self.number), survivors)?;
        info!(
            "worker {}: wrote {} points to scratch",
            self.number, written
        );
        protocol::send_control(comm, DIRECTOR_RANK, ControlCode::WorkerDone);

        // Phase 2: receive on the unshifted grid, thin, voxelize.
        let sorter = VoxelSorter::coarse(
            self.config.voxel_distance,
            self.config.binning_distance,
            false,
        );
        let mut regions = self.receive_regions(comm, &sorter)?;
        self.thin_regions(&mut regions);
        info!(
            "worker {}: thinned {} phase 2 regions",
            self.number,
            regions.len()
        );

        let fine = VoxelSorter::fine(self.config.voxel_distance);
        let mut counts = VoxelCounts::new();
        for point in regions.values().flatten() {
            counts.increment(fine.identify(*point));
        }

        io::write_sparsevox(self.config.final_file(self.number), &counts)?;
        info!(
            "worker {}: wrote {} voxels ({} points)",
            self.number,
            counts.len(),
            counts.total()
        );
        protocol::send_control(comm, DIRECTOR_RANK, ControlCode::WorkerDone);

        Ok(())
    }

    /// Receive bulk messages into region buckets until the director sends
    /// the start instruction.
    ///
    /// Buckets are created lazily; every point lands in the bucket of its
    /// coarse address under `sorter`.
    fn receive_regions<C: Communicator>(
        &self,
        comm: &C,
        sorter: &VoxelSorter,
    ) -> Result<HashMap<VoxelAddress, Vec<Vector3d>>> {
        let mut regions: HashMap<VoxelAddress, Vec<Vector3d>> = HashMap::new();
        let mut received = 0usize;

        loop {
            match protocol::receive_any(comm)? {
                (Message::Control(ControlCode::StartWorking), _) => break,
                (Message::Control(_), _) => continue,
                (Message::Points(points), source) => {
                    if self.config.debug {
                        debug!(
                            "worker {}: received {} points from rank {}",
                            self.number,
                            points.len(),
                            source
                        );
                    }
                    received += points.len();
                    for point in points {
                        let located = sorter.locate(point);
                        regions
                            .entry(located.address)
                            .or_default()
                            .push(located.location);
                    }
                }
            }
        }

        info!(
            "worker {}: received {} points in {} regions",
            self.number,
            received,
            regions.len()
        );
        Ok(regions)
    }

    fn thin_regions(&self, regions: &mut HashMap<VoxelAddress, Vec<Vector3d>>) {
        for bucket in regions.values_mut() {
            thinning::thin(bucket, self.config.thinning_distance);
        }
    }
}
