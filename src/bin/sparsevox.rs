//! MPI entry point of the distributed voxelization pipeline.
//!
//! Run one copy per rank, e.g. `mpirun -n 16 sparsevox run.json`. Rank 0
//! becomes the director; see the library docs for the role split.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use sparsevox::{pipeline, Configuration};

#[derive(Parser, Debug)]
#[command(name = "sparsevox", version, about = "Distributed point cloud thinning and voxelization")]
struct Cli {
    /// Path to the JSON configuration file.
    config: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = Configuration::from_file(&cli.config)
        .with_context(|| format!("loading configuration {}", cli.config.display()))?;

    let universe = mpi::initialize().context("MPI initialization failed")?;
    let world = universe.world();

    pipeline::run(&world, &config)?;
    Ok(())
}
