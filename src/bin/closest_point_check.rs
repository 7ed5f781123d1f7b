//! Report the minimum pairwise distance of a point cloud.
//!
//! Thinning at any tolerance up to this distance removes nothing, so the
//! reported value is the natural `thinning_distance` for a subsequent
//! pipeline run over the same data.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use sparsevox::{io, thinning};

#[derive(Parser, Debug)]
#[command(
    name = "closest_point_check",
    version,
    about = "Find the distance between the two closest points of a cloud"
)]
struct Cli {
    /// Path to the input point file.
    input: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let points = io::load_text_points(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    println!(
        "closest_point_check: loaded {} points from file",
        points.len()
    );

    let Some(distance) = thinning::closest_pair_distance(&points) else {
        bail!("need at least two points to measure a pairwise distance");
    };
    println!(
        "closest_point_check: closest distance between points is {}",
        distance
    );
    Ok(())
}
