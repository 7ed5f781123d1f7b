//! Error types for the thinning and voxelization pipeline.

use thiserror::Error;

/// Errors surfaced by the library.
///
/// Per-file read failures at a reader are deliberately absent: they are
/// logged and skipped, never propagated. Everything here is fatal at the
/// peer that hits it.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or inconsistent configuration, detected before any work.
    #[error("configuration error: {0}")]
    Config(String),

    /// The configuration file could not be parsed.
    #[error("configuration parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A message arrived with an unknown tag or a malformed payload.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Fatal I/O failure during scratch write, final-file write, or merge.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
