//! The reader: streaming ingestion, routing, and batching.

use std::path::PathBuf;

use log::{debug, info, warn};
use mpi::traits::Communicator;

use crate::config::Configuration;
use crate::error::Result;
use crate::geometry::Vector3d;
use crate::io;
use crate::pipeline::directory::{Directory, DIRECTOR_RANK};
use crate::pipeline::protocol::{self, ControlCode, SEND_BATCH};
use crate::voxel::VoxelSorter;

/// One streaming reader peer.
///
/// A reader never holds more than one open file and one batch per worker
/// in memory. Points flow line by line from the current file through the
/// coarse sorter into per-worker transmit buffers, which are flushed as
/// bulk messages whenever one fills up and at the end of every file.
pub struct Reader<'a> {
    directory: Directory,
    config: &'a Configuration,
    number: usize,
    buffers: Vec<Vec<Vector3d>>,
    send_buffer: Vec<f64>,
}

impl<'a> Reader<'a> {
    /// Create the reader at `rank`.
    pub fn new(directory: Directory, config: &'a Configuration, rank: i32) -> Self {
        let buffers = (0..directory.n_workers())
            .map(|_| Vec::with_capacity(SEND_BATCH))
            .collect();

        Self {
            directory,
            config,
            number: directory.reader_number(rank),
            buffers,
            send_buffer: Vec::with_capacity(3 * SEND_BATCH),
        }
    }

    /// Run both reading phases.
    pub fn run<C: Communicator>(&mut self, comm: &C) -> Result<()> {
        // Phase 1: stream the text input files on the shifted coarse grid.
        let sorter = VoxelSorter::coarse(
            self.config.voxel_distance,
            self.config.binning_distance,
            true,
        );
        let mut total = 0;
        for file in self.assigned(self.config.input_files.iter().map(PathBuf::from)) {
            total += self.stream_text_file(comm, &file, &sorter);
        }
        info!(
            "reader {}: distributed {} phase 1 points",
            self.number, total
        );
        protocol::send_control(comm, DIRECTOR_RANK, ControlCode::ReaderDone);

        protocol::await_start(comm)?;

        // Phase 2: stream the worker scratch files on the unshifted grid.
        let sorter = VoxelSorter::coarse(
            self.config.voxel_distance,
            self.config.binning_distance,
            false,
        );
        let scratch_files: Vec<PathBuf> = (0..self.directory.n_workers())
            .map(|worker| self.config.scratch_file(worker))
            .collect();
        let mut total = 0;
        for file in self.assigned(scratch_files.into_iter()) {
            total += self.stream_binary_file(comm, &file, &sorter);
        }
        info!(
            "reader {}: distributed {} phase 2 points",
            self.number, total
        );
        protocol::send_control(comm, DIRECTOR_RANK, ControlCode::ReaderDone);

        Ok(())
    }

    /// This reader's share of a file list: every file whose index is
    /// congruent to the reader-number modulo the reader count.
    fn assigned(&self, files: impl Iterator<Item = PathBuf>) -> Vec<PathBuf> {
        files
            .enumerate()
            .filter(|(index, _)| index % self.directory.n_readers() == self.number)
            .map(|(_, file)| file)
            .collect()
    }

    /// Stream one text input file. Returns the number of points routed.
    ///
    /// An unopenable file is skipped with a warning; the rest of the
    /// assignment still goes out.
    fn stream_text_file<C: Communicator>(
        &mut self,
        comm: &C,
        file: &PathBuf,
        sorter: &VoxelSorter,
    ) -> usize {
        info!("reader {}: processing {}", self.number, file.display());

        let points = match io::open_text_points(file) {
            Ok(points) => points,
            Err(error) => {
                warn!(
                    "reader {}: could not read {}: {}",
                    self.number,
                    file.display(),
                    error
                );
                return 0;
            }
        };

        let mut count = 0;
        for point in points {
            self.route(comm, point, sorter);
            count += 1;
        }
        self.flush_all(comm);
        count
    }

    /// Stream one binary scratch file and delete it afterwards. Returns
    /// the number of points routed.
    fn stream_binary_file<C: Communicator>(
        &mut self,
        comm: &C,
        file: &PathBuf,
        sorter: &VoxelSorter,
    ) -> usize {
        info!("reader {}: processing {}", self.number, file.display());

        let points = match io::open_binary_points(file) {
            Ok(points) => points,
            Err(error) => {
                warn!(
                    "reader {}: could not read {}: {}",
                    self.number,
                    file.display(),
                    error
                );
                return 0;
            }
        };

        let mut count = 0;
        for point in points {
            self.route(comm, point, sorter);
            count += 1;
        }
        self.flush_all(comm);

        if let Err(error) = std::fs::remove_file(file) {
            warn!(
                "reader {}: could not delete {}: {}",
                self.number,
                file.display(),
                error
            );
        }
        count
    }

    /// Sort `point` onto the coarse grid, pick its worker from the routing
    /// hash, and buffer it; a full buffer is flushed immediately.
    fn route<C: Communicator>(&mut self, comm: &C, point: Vector3d, sorter: &VoxelSorter) {
        let address = sorter.identify(point);
        let worker = (address.route_hash() % self.directory.n_workers() as u64) as usize;

        self.buffers[worker].push(point);
        if self.buffers[worker].len() >= SEND_BATCH {
            self.flush(comm, worker);
        }
    }

    /// Send and clear one worker's transmit buffer.
    fn flush<C: Communicator>(&mut self, comm: &C, worker: usize) {
        if self.buffers[worker].is_empty() {
            return;
        }
        if self.config.debug {
            debug!(
                "reader {}: transmitting {} points to worker {}",
                self.number,
                self.buffers[worker].len(),
                worker
            );
        }

        protocol::send_points(
            comm,
            self.directory.worker_rank(worker),
            &self.buffers[worker],
            &mut self.send_buffer,
        );
        self.buffers[worker].clear();
    }

    /// Flush every non-empty transmit buffer, as done at end-of-file.
    fn flush_all<C: Communicator>(&mut self, comm: &C) {
        for worker in 0..self.directory.n_workers() {
            self.flush(comm, worker);
        }
    }
}
