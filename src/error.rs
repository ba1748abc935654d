//! Crate-level error types.
//!
//! [`VolscanError`] unifies every failure the pipeline can hit behind a
//! single enum. Per-file variants are contained at the scanner boundary
//! (see [`VolscanError::is_scoped`]); the rest abort the run.

use std::path::PathBuf;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VolscanError>;

/// Top-level error type returned by all public APIs.
#[derive(Debug, thiserror::Error)]
pub enum VolscanError {
    /// The input root directory does not exist or is not a directory.
    #[error("trades directory not found: {}", .0.display())]
    RootNotFound(PathBuf),

    /// A trade log could not be opened or read.
    #[error("failed to read {}: {source}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line of a trade log has the wrong arity or an unusable field.
    #[error("{}:{line}: {reason}", .path.display())]
    MalformedRecord {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    /// A trade log holds a header but no trades.
    #[error("no trades in {}", .0.display())]
    EmptyTradeLog(PathBuf),

    /// An environment setting is present but invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The result channel broke while producers were still expected.
    #[error("result channel error: {0}")]
    Channel(String),

    /// A scan worker process could not be spawned or reported garbage.
    #[error("worker error: {0}")]
    Worker(String),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VolscanError {
    /// Returns `true` for failures local to one trade log.
    ///
    /// Scoped failures drop that ticker from the report; everything else is
    /// fatal to the run.
    pub fn is_scoped(&self) -> bool {
        matches!(
            self,
            Self::FileRead { .. }
                | Self::MalformedRecord { .. }
                | Self::EmptyTradeLog(_)
                | Self::Worker(_)
        )
    }
}
