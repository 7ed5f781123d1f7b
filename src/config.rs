//! Run configuration.
//!
//! Every peer loads the same JSON configuration file before any phase, so
//! the settings are part of what lets peers agree on routing without
//! talking to each other.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::voxel::VoxelSorter;

/// Settings of a distributed pipeline run.
#[derive(Clone, Debug, Deserialize)]
pub struct Configuration {
    /// Input point files, distributed round-robin over the readers.
    pub input_files: Vec<String>,
    /// Directory for the per-worker binary scratch files.
    pub scratch_directory: String,
    /// Directory for the per-worker final files before the merge; defaults
    /// to the scratch directory.
    #[serde(default)]
    pub output_directory: Option<String>,
    /// Fine output grid spacing.
    pub voxel_distance: f64,
    /// Minimum coarse region grid spacing used to bucket points for
    /// thinning.
    pub binning_distance: f64,
    /// Thinning tolerance; no two surviving points end up closer than
    /// this.
    pub thinning_distance: f64,
    /// Emit per-batch transmit and receive log lines.
    #[serde(default)]
    pub debug: bool,
}

impl Configuration {
    /// Load and validate a configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Configuration = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.input_files.is_empty() {
            return Err(Error::Config("input_files must not be empty".to_string()));
        }
        if self.voxel_distance <= 0.0 {
            return Err(Error::Config(format!(
                "voxel_distance must be positive, got {}",
                self.voxel_distance
            )));
        }
        if self.thinning_distance <= 0.0 {
            return Err(Error::Config(format!(
                "thinning_distance must be positive, got {}",
                self.thinning_distance
            )));
        }
        if self.binning_distance < self.voxel_distance {
            return Err(Error::Config(format!(
                "binning_distance {} is smaller than voxel_distance {}",
                self.binning_distance, self.voxel_distance
            )));
        }
        if self.binning_distance < self.thinning_distance {
            return Err(Error::Config(format!(
                "binning_distance {} is smaller than thinning_distance {}",
                self.binning_distance, self.thinning_distance
            )));
        }
        Ok(())
    }

    /// Path of the binary scratch file owned by `worker`.
    pub fn scratch_file(&self, worker: usize) -> PathBuf {
        PathBuf::from(&self.scratch_directory).join(format!("worker{}.binary", worker))
    }

    /// Path of the final sparse voxel file owned by `worker`.
    pub fn final_file(&self, worker: usize) -> PathBuf {
        let dir = self
            .output_directory
            .as_deref()
            .unwrap_or(&self.scratch_directory);
        PathBuf::from(dir).join(format!("worker{}_final.sparsevox", worker))
    }
}

/// Grid parameters of the legacy single-process tool.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct VoxelSpace {
    /// Cell spacing along x.
    pub dx: f64,
    /// Cell spacing along y.
    pub dy: f64,
    /// Cell spacing along z.
    pub dz: f64,
    /// Grid origin x.
    #[serde(default)]
    pub x0: f64,
    /// Grid origin y.
    #[serde(default)]
    pub y0: f64,
    /// Grid origin z.
    #[serde(default)]
    pub z0: f64,
}

impl VoxelSpace {
    /// Sorter for this grid.
    pub fn sorter(&self) -> VoxelSorter {
        VoxelSorter::new(self.dx, self.dy, self.dz, self.x0, self.y0, self.z0)
    }
}

/// Settings of the legacy single-process thin-and-voxelize tool.
#[derive(Clone, Debug, Deserialize)]
pub struct SingleConfig {
    /// Input point file.
    pub input_file: String,
    /// Output sparse voxel file.
    pub output_file: String,
    /// Output grid discretization.
    pub voxel_space: VoxelSpace,
    /// Thinning tolerance.
    pub thinning_distance: f64,
}

impl SingleConfig {
    /// Load and validate a configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: SingleConfig = serde_json::from_str(&text)?;

        if config.thinning_distance <= 0.0 {
            return Err(Error::Config(format!(
                "thinning_distance must be positive, got {}",
                config.thinning_distance
            )));
        }
        if config.voxel_space.dx <= 0.0
            || config.voxel_space.dy <= 0.0
            || config.voxel_space.dz <= 0.0
        {
            return Err(Error::Config(
                "voxel_space spacings must be positive".to_string(),
            ));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "input_files": ["plot1.asc", "plot2.asc", "plot3.asc"],
            "scratch_directory": "/tmp/scratch/",
            "output_directory": "/tmp/output/",
            "voxel_distance": 0.05,
            "binning_distance": 0.5,
            "thinning_distance": 0.01,
            "debug": true
        }"#
    }

    #[test]
    fn test_parse_full_configuration() {
        let config: Configuration = serde_json::from_str(sample_json()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.input_files.len(), 3);
        assert_eq!(config.voxel_distance, 0.05);
        assert!(config.debug);
        assert_eq!(
            config.scratch_file(2),
            PathBuf::from("/tmp/scratch/worker2.binary")
        );
        assert_eq!(
            config.final_file(0),
            PathBuf::from("/tmp/output/worker0_final.sparsevox")
        );
    }

    #[test]
    fn test_defaults() {
        let config: Configuration = serde_json::from_str(
            r#"{
                "input_files": ["a.asc"],
                "scratch_directory": "/tmp/scratch/",
                "voxel_distance": 1.0,
                "binning_distance": 1.0,
                "thinning_distance": 0.1
            }"#,
        )
        .unwrap();
        config.validate().unwrap();

        assert!(!config.debug);
        // Final files fall back to the scratch directory.
        assert_eq!(
            config.final_file(1),
            PathBuf::from("/tmp/scratch/worker1_final.sparsevox")
        );
    }

    #[test]
    fn test_rejects_empty_input_files() {
        let config: Configuration = serde_json::from_str(
            r#"{
                "input_files": [],
                "scratch_directory": "/tmp/",
                "voxel_distance": 1.0,
                "binning_distance": 1.0,
                "thinning_distance": 0.1
            }"#,
        )
        .unwrap();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_distances() {
        let mut config: Configuration = serde_json::from_str(sample_json()).unwrap();
        config.voxel_distance = 0.0;
        assert!(config.validate().is_err());

        let mut config: Configuration = serde_json::from_str(sample_json()).unwrap();
        config.binning_distance = 0.04;
        assert!(config.validate().is_err());

        let mut config: Configuration = serde_json::from_str(sample_json()).unwrap();
        config.thinning_distance = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, sample_json()).unwrap();

        let config = Configuration::from_file(&path).unwrap();
        assert_eq!(config.input_files[1], "plot2.asc");

        assert!(Configuration::from_file(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_parse_single_config() {
        let config: SingleConfig = serde_json::from_str(
            r#"{
                "input_file": "plot.asc",
                "output_file": "plot.sparsevox",
                "voxel_space": {"dx": 0.1, "dy": 0.1, "dz": 0.2, "x0": 0.0, "y0": -1.5, "z0": -2.0},
                "thinning_distance": 0.05
            }"#,
        )
        .unwrap();

        assert_eq!(config.voxel_space.dz, 0.2);
        assert_eq!(config.voxel_space.y0, -1.5);
    }
}
