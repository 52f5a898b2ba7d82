//! Error taxonomy for the benchmark engine.
//!
//! Each concern gets its own error type so callers can tell a programming
//! mistake (`GenerationError`), a configuration bug (`StatisticsError`), a
//! failed storage call (`OperationError`) and a lost metrics batch
//! (`ReportingError`) apart. The storage collaborator itself speaks
//! `anyhow::Error`; it is wrapped here with the action that failed.

use std::path::PathBuf;

use thiserror::Error;

/// Misuse of a [`RandomPayload`](crate::payload::RandomPayload) stream.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("payload chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("read of {length} bytes at offset {offset} exceeds buffer of {capacity} bytes")]
    OutOfBounds {
        offset: usize,
        length: usize,
        capacity: usize,
    },
}

/// Failure to derive statistics from recorded samples.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatisticsError {
    /// No sample was recorded, typically `n = 0` or every unit failed.
    #[error("no samples were recorded; cannot compute statistics")]
    Empty,
}

/// Unrecoverable failure inside a single operation unit.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("{action} failed for '{key}'")]
    Storage {
        action: &'static str,
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("key manifest {path:?}: {reason}")]
    Manifest { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl OperationError {
    /// Wrap a collaborator error with the action and key it was issued for.
    pub fn storage(action: &'static str, key: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Storage {
            action,
            key: key.into(),
            source,
        }
    }
}

/// A metrics batch could not be delivered.
#[derive(Debug, Error)]
pub enum ReportingError {
    #[error("metrics request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("metrics endpoint answered with status {0}")]
    Status(u16),
}

/// Errors surfaced by the execution orchestrator.
#[derive(Debug, Error)]
pub enum BenchmarkError {
    #[error(transparent)]
    Statistics(#[from] StatisticsError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error("operation task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_keeps_source() {
        let err = OperationError::storage("put_object", "abc", anyhow::anyhow!("connection reset"));
        assert_eq!(err.to_string(), "put_object failed for 'abc'");

        let source = std::error::Error::source(&err).expect("source is kept");
        assert_eq!(source.to_string(), "connection reset");
    }

    #[test]
    fn test_statistics_error_converts_into_benchmark_error() {
        let err: BenchmarkError = StatisticsError::Empty.into();
        assert!(matches!(err, BenchmarkError::Statistics(StatisticsError::Empty)));
    }
}
