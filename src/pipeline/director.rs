//! The director: phase-barrier coordination and the final merge.

use std::path::PathBuf;

use log::{debug, info};
use mpi::traits::Communicator;

use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::io;
use crate::pipeline::directory::{Directory, Role};
use crate::pipeline::protocol::{self, ControlCode, Message};

/// Name of the merged output file, written to the working directory.
pub const MERGED_OUTPUT: &str = "combined_results.sparsevox";

/// The rank-0 coordinator.
///
/// The director holds no point data. It walks a fixed barrier sequence:
/// wait for all readers, release the workers, wait for the workers,
/// release the readers into phase 2, and so on, finishing with the merge
/// of the per-worker output files.
pub struct Director<'a> {
    directory: Directory,
    config: &'a Configuration,
}

impl<'a> Director<'a> {
    /// Create a director for this run.
    pub fn new(directory: Directory, config: &'a Configuration) -> Self {
        Self { directory, config }
    }

    /// Run both phases to completion and merge the results.
    pub fn run<C: Communicator>(&self, comm: &C) -> Result<()> {
        self.print_banner();

        self.wait_for(comm, Role::Reader, ControlCode::ReaderDone)?;
        info!("director: all readers have distributed phase 1 data");

        self.start_role(comm, Role::Worker);
        self.wait_for(comm, Role::Worker, ControlCode::WorkerDone)?;
        info!("director: all workers have finished phase 1 thinning");

        self.start_role(comm, Role::Reader);
        self.wait_for(comm, Role::Reader, ControlCode::ReaderDone)?;
        info!("director: all readers have distributed phase 2 data");

        self.start_role(comm, Role::Worker);
        self.wait_for(comm, Role::Worker, ControlCode::WorkerDone)?;
        info!("director: all workers have finished phase 2 thinning and voxelization");

        self.merge()?;
        info!("director: run complete, output merged to {}", MERGED_OUTPUT);
        Ok(())
    }

    fn print_banner(&self) {
        info!(
            "pipeline run: {} ranks ({} readers, {} workers), {} input files",
            self.directory.world_size(),
            self.directory.n_readers(),
            self.directory.n_workers(),
            self.config.input_files.len()
        );
        info!(
            "voxel distance {}, binning distance {}, thinning distance {}",
            self.config.voxel_distance, self.config.binning_distance, self.config.thinning_distance
        );
        info!("scratch directory: {}", self.config.scratch_directory);
        if let Some(output) = &self.config.output_directory {
            info!("output directory: {}", output);
        }
    }

    /// Release every peer of `role` into its next phase.
    fn start_role<C: Communicator>(&self, comm: &C, role: Role) {
        match role {
            Role::Reader => {
                for reader in 0..self.directory.n_readers() {
                    protocol::send_control(
                        comm,
                        self.directory.reader_rank(reader),
                        ControlCode::StartWorking,
                    );
                }
            }
            Role::Worker => {
                for worker in 0..self.directory.n_workers() {
                    protocol::send_control(
                        comm,
                        self.directory.worker_rank(worker),
                        ControlCode::StartWorking,
                    );
                }
            }
            Role::Director => unreachable!("the director never releases itself"),
        }
    }

    /// Block until every peer of `role` has reported `expected`.
    ///
    /// Control codes other than the expected one can arrive out of phase
    /// and are ignored; in this protocol they are always preceded by the
    /// expected code from the same peer.
    fn wait_for<C: Communicator>(
        &self,
        comm: &C,
        role: Role,
        expected: ControlCode,
    ) -> Result<()> {
        let count = match role {
            Role::Reader => self.directory.n_readers(),
            Role::Worker => self.directory.n_workers(),
            Role::Director => unreachable!("the director never waits on itself"),
        };
        let mut done = vec![false; count];

        while !done.iter().all(|&d| d) {
            match protocol::receive_any(comm)? {
                (Message::Control(code), source) if code == expected => {
                    let number = match role {
                        Role::Reader => self.directory.reader_number(source),
                        Role::Worker => self.directory.worker_number(source),
                        Role::Director => unreachable!(),
                    };
                    done[number] = true;
                    debug!(
                        "director: {:?} {} reported {:?}",
                        role, number, expected
                    );
                }
                (Message::Control(_), _) => continue,
                (Message::Points(_), source) => {
                    return Err(Error::Protocol(format!(
                        "bulk message from rank {} arrived at the director",
                        source
                    )))
                }
            }
        }
        Ok(())
    }

    /// Concatenate the per-worker final files, in worker-number order, into
    /// the merged output in the working directory.
    fn merge(&self) -> Result<()> {
        let sources: Vec<PathBuf> = (0..self.directory.n_workers())
            .map(|worker| self.config.final_file(worker))
            .collect();

        io::merge_sparsevox(&sources, MERGED_OUTPUT)?;
        Ok(())
    }
}
