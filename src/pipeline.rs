//! The three-role distributed pipeline.
//!
//! A fixed set of ranks runs one identical binary: rank 0 coordinates as
//! the [director](director::Director), the next ranks
//! [stream and route input points](reader::Reader), and the remaining
//! ranks [bucket, thin, and voxelize them](worker::Worker). Role
//! assignment is a pure function of the world size and the configuration,
//! so no membership negotiation happens on the wire; everything the peers
//! exchange flows through the two message tags of [protocol].

use log::info;
use mpi::traits::Communicator;

use crate::config::Configuration;
use crate::error::Result;

pub mod directory;
pub mod director;
pub mod protocol;
pub mod reader;
pub mod worker;

use directory::{Directory, Role};

/// Run this peer's role of the pipeline to completion.
///
/// Called identically on every rank after MPI initialization; the rank
/// decides what the peer does. Returns once the peer's share of both
/// phases is finished — for the director that includes the final merge.
pub fn run<C: Communicator>(comm: &C, config: &Configuration) -> Result<()> {
    let directory = Directory::new(comm.size() as usize, config.input_files.len())?;
    let rank = comm.rank();
    let role = directory.role_of(rank);

    if role != Role::Director {
        // Let the director print its banner before the check-in lines.
        std::thread::sleep(std::time::Duration::from_secs(2));
    }
    info!("rank {} checking in as {:?}", rank, role);

    match role {
        Role::Director => director::Director::new(directory, config).run(comm),
        Role::Reader => reader::Reader::new(directory, config, rank).run(comm),
        Role::Worker => worker::Worker::new(directory, config, rank).run(comm),
    }
}
