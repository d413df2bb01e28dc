//! Typed error kinds shared across component boundaries.
//!
//! Replaces the "catch everything, log, return an error dict" control flow of
//! the original implementation with explicit per-kind values (spec §7, §9).
//! Per-source errors are caught at the aggregator boundary and folded into
//! that source's result rather than propagated — see `aggregator::ToolResult`.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Bad request shape. Surfaced immediately; no source access is attempted.
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing directory, missing database file, permission denied, or a
    /// corrupt SQLite header. The source is omitted from the response;
    /// aggregation continues.
    #[error("source unavailable ({path}): {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    /// Per-source deadline elapsed. Treated identically to `SourceUnavailable`
    /// by callers, but kept distinct so the aggregator can set `partial`.
    #[error("source timed out after {elapsed_ms}ms")]
    SourceTimeout { elapsed_ms: u64 },

    /// Malformed JSON inside a single record. The offending record is
    /// dropped; siblings continue.
    #[error("decode error: {0}")]
    Decoder(String),

    /// Cache read/write failure. The cache is bypassed; the request runs as
    /// if on a miss.
    #[error("cache error: {0}")]
    Cache(String),

    /// Unexpected internal failure, logged with context.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn source_unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CoreError::SourceUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// `true` for the two kinds that the aggregator must contain to a single
    /// source's branch rather than short-circuit the whole request.
    pub fn is_per_source(&self) -> bool {
        matches!(
            self,
            CoreError::SourceUnavailable { .. } | CoreError::SourceTimeout { .. }
        )
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        CoreError::Internal(e.to_string())
    }
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Cache(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Decoder(e.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
