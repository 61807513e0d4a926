use thiserror::Error;

/// Errors raised by the playlake data model.
#[derive(Debug, Error)]
pub enum Error {
    /// A millisecond epoch timestamp that has no calendar date.
    #[error("timestamp {0} ms is outside the supported calendar range")]
    TimestampOutOfRange(i64),

    /// A UTC offset outside the range chrono accepts (under one day).
    #[error("invalid UTC offset: {0} minutes")]
    InvalidOffset(i32),

    /// A songplay key whose partition index or sequence does not fit its bits.
    #[error("songplay id overflow: partition {partition}, sequence {sequence}")]
    KeyOverflow { partition: u32, sequence: u64 },
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, Error>;
