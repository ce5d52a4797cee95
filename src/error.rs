//! Error types for dataset loading and partitioning.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading a dataset or driving a partition.
///
/// A stalled solve is not an error; see [`crate::algorithms::Termination`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Unknown scale or metric, or an unusable solver parameter.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Duplicate unit codes, dangling or malformed adjacency, unparsable rows.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    /// The caller asked for something the current state cannot answer,
    /// e.g. the group of an unplaced unit.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Placements and group membership disagree.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Input slices don't have matching lengths.
    #[error("input sets don't have the same length (expected {expected} items, got {actual})")]
    InputLenMismatch { expected: usize, actual: usize },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
