use thiserror::Error;

/// Every failure a join can surface. All of them are fatal for the join that
/// raised them; memory pressure is handled by growth and never shows up here.
#[derive(Error, Debug)]
pub enum JoinError {
    /// Malformed input row (wrong width, missing key column, ...).
    #[error("Invalid input row: {0}")]
    Input(String),
    /// A join or filter predicate failed to evaluate.
    #[error("Predicate evaluation failed: {0}")]
    Predicate(String),
    #[error("Temporary file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// A spill record ended before its header or body was complete.
    #[error("Could not read from hash-join temporary file for batch {batch}: read only {actual} of {expected} bytes")]
    ShortRead {
        batch: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Failed to encode tuple: {0}")]
    Encode(String),
    #[error("Failed to decode tuple: {0}")]
    Decode(String),
    /// Broken bookkeeping: out-of-range batch or bucket, unexpected phase.
    #[error("Internal hash join error: {0}")]
    Internal(String),
    #[error("Unsupported hash join configuration: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, JoinError>;

impl From<bincode::error::EncodeError> for JoinError {
    fn from(e: bincode::error::EncodeError) -> Self {
        JoinError::Encode(e.to_string())
    }
}

impl From<bincode::error::DecodeError> for JoinError {
    fn from(e: bincode::error::DecodeError) -> Self {
        JoinError::Decode(e.to_string())
    }
}
