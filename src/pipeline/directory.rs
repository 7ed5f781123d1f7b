//! Role assignment and rank addressing.
//!
//! The directory is computed independently on every peer from the world
//! size and the input file count alone. No communication happens during
//! construction; the mapping is a pure function, identical everywhere,
//! which is what lets readers route points to workers that they have never
//! exchanged a message with.

use crate::error::{Error, Result};

/// Rank of the director peer.
pub const DIRECTOR_RANK: i32 = 0;

/// The three peer roles of a pipeline run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Phase-barrier coordinator; holds no point data.
    Director,
    /// Streams input files and routes points to workers.
    Reader,
    /// Buckets, thins, and voxelizes routed points.
    Worker,
}

/// Deterministic role table for a world of N ranks.
///
/// Rank 0 is the director. The next `n_readers` ranks are readers, where
/// the reader count is a quarter of the world clamped to at least one and
/// at most the number of input files. All remaining ranks are workers.
#[derive(Clone, Copy, Debug)]
pub struct Directory {
    world_size: usize,
    n_readers: usize,
    n_workers: usize,
}

impl Directory {
    /// Compute the role table for `world_size` ranks and `n_input_files`
    /// input files.
    ///
    /// Fails when the world is too small to hold a director, the readers,
    /// and at least one worker.
    pub fn new(world_size: usize, n_input_files: usize) -> Result<Self> {
        let n_readers = (world_size / 4).clamp(1, n_input_files.max(1));

        if world_size < n_readers + 2 {
            return Err(Error::Config(format!(
                "world size {} leaves no worker rank ({} readers)",
                world_size, n_readers
            )));
        }
        let n_workers = world_size - 1 - n_readers;

        Ok(Self {
            world_size,
            n_readers,
            n_workers,
        })
    }

    /// Number of ranks in the world.
    pub fn world_size(&self) -> usize {
        self.world_size
    }

    /// Number of reader peers.
    pub fn n_readers(&self) -> usize {
        self.n_readers
    }

    /// Number of worker peers.
    pub fn n_workers(&self) -> usize {
        self.n_workers
    }

    /// Role of the peer at `rank`.
    pub fn role_of(&self, rank: i32) -> Role {
        let rank = rank as usize;
        if rank == DIRECTOR_RANK as usize {
            Role::Director
        } else if rank <= self.n_readers {
            Role::Reader
        } else {
            Role::Worker
        }
    }

    /// Rank of the reader with the given reader-number.
    pub fn reader_rank(&self, reader: usize) -> i32 {
        (1 + reader) as i32
    }

    /// Rank of the worker with the given worker-number.
    pub fn worker_rank(&self, worker: usize) -> i32 {
        (1 + self.n_readers + worker) as i32
    }

    /// Reader-number of the reader at `rank`.
    pub fn reader_number(&self, rank: i32) -> usize {
        rank as usize - 1
    }

    /// Worker-number of the worker at `rank`.
    pub fn worker_number(&self, rank: i32) -> usize {
        rank as usize - 1 - self.n_readers
    }
}
