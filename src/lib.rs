//! Distributed thinning and sparse voxelization of large point clouds.
//!
//! This library turns arbitrarily large unordered point clouds into a
//! sparse voxel occupancy grid: a map from occupied voxel addresses to
//! point-count intensities. Input points are first *thinned* so that no
//! two surviving points lie closer than a tolerance, then binned onto a
//! regular grid with spacing [voxel_distance](config::Configuration::voxel_distance).
//!
//! The work is distributed across MPI ranks in three roles. A single
//! *director* coordinates the run through phase barriers and merges the
//! final output. *Readers* stream points from their share of the input
//! files and route each one — by hashing its coarse voxel address — to the
//! worker that owns that region of space. *Workers* collect their regions,
//! thin each one with a kd-tree radius pass, and either persist the
//! survivors to binary scratch files (phase 1) or voxelize them into the
//! final sparse representation (phase 2).
//!
//! Thinning runs twice because bucketed thinning alone misses pairs that
//! straddle a bucket boundary. Phase 1 bins on a grid shifted by half a
//! cell along every axis, phase 2 on the unshifted grid; a pair of points
//! split by one grid shares a cell in the other, so the two passes
//! together approximate a single global thinning.
//!
//! ## Using the library.
//!
//! The pipeline binary is a thin wrapper around [pipeline::run]:
//! ```no_run
//! use sparsevox::{pipeline, Configuration};
//!
//! let config = Configuration::from_file("run.json").unwrap();
//! let universe = mpi::initialize().unwrap();
//! pipeline::run(&universe.world(), &config).unwrap();
//! ```
//! Every rank calls the same function; the communicator rank decides
//! whether the peer directs, reads, or works. The merged result lands in
//! `combined_results.sparsevox` in the working directory, one
//! `i,j,k,count` line per occupied voxel.
//!
//! The building blocks — [VoxelSorter](voxel::VoxelSorter) addressing,
//! [thinning](thinning::thin), and the file formats in [io] — are plain
//! single-process code and usable on their own; the legacy single-process
//! tools are built from nothing else.
#![cfg_attr(feature = "strict", deny(warnings), deny(unused_crate_dependencies))]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod geometry;
pub mod io;
pub mod pipeline;
pub mod thinning;
pub mod voxel;

pub use crate::config::Configuration;
pub use crate::error::{Error, Result};
pub use crate::geometry::Vector3d;
pub use crate::voxel::{VoxelAddress, VoxelSorter};
