//! Error types for the ETL stages.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading sources, deriving tables, or
/// writing output.
#[derive(Debug, Error)]
pub enum EtlError {
    /// A source location could not be read at all.
    #[error("source unavailable at {}: {message}", path.display())]
    SourceUnavailable { path: PathBuf, message: String },

    /// A record did not match its declared schema and the malformed-record
    /// policy is `fail`.
    #[error("malformed record in {} at line {line}: {message}", path.display())]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// An output table could not be persisted.
    #[error("failed to write table {table}: {message}")]
    WriteFailure { table: String, message: String },

    /// An error propagated from the core domain layer.
    #[error("derivation error: {0}")]
    Core(#[from] playlake_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

impl EtlError {
    /// Returns `true` when the error came from reading input rather than
    /// deriving or writing tables.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable { .. } | Self::MalformedRecord { .. }
        )
    }
}

/// Convenience alias for ETL results.
pub type EtlResult<T> = std::result::Result<T, EtlError>;
