//! Single-process thinning and voxelization.
//!
//! The in-memory counterpart of the distributed pipeline: load one point
//! file, thin it globally, sort it onto the configured grid, and write the
//! sparse voxel result to `output_file`. Useful for data that fits on one
//! machine and as a reference for the pipeline's output.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use sparsevox::config::SingleConfig;
use sparsevox::voxel::VoxelCounts;
use sparsevox::{io, thinning};

#[derive(Parser, Debug)]
#[command(
    name = "thin_voxelize",
    version,
    about = "Thin and voxelize a point cloud in a single process"
)]
struct Cli {
    /// Path to the JSON configuration file.
    config: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = SingleConfig::from_file(&cli.config)
        .with_context(|| format!("loading configuration {}", cli.config.display()))?;

    let mut points = io::load_text_points(&config.input_file)
        .with_context(|| format!("reading {}", config.input_file))?;
    println!("thin_voxelize: loaded {} points from file", points.len());

    thinning::thin(&mut points, config.thinning_distance);
    println!(
        "thin_voxelize: thinning completed, {} points remaining",
        points.len()
    );

    let sorter = config.voxel_space.sorter();
    let mut counts = VoxelCounts::new();
    for &point in &points {
        counts.increment(sorter.identify(point));
    }

    // Replace any previous output.
    let _ = std::fs::remove_file(&config.output_file);
    io::write_sparsevox(&config.output_file, &counts)
        .with_context(|| format!("writing {}", config.output_file))?;
    println!(
        "thin_voxelize: wrote {} voxels to {}",
        counts.len(),
        config.output_file
    );
    Ok(())
}
