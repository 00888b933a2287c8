//! Error types for entity construction and validation.
//!
//! Construction errors are programming errors in the upstream parser and are
//! expected to propagate. Dedup conflicts are routine in noisy sandbox data
//! and are reported as boolean returns, never as errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OntologyError {
    #[error("{0} must have a legitimate value")]
    MissingField(&'static str),

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("invalid GUID: {0}")]
    InvalidGuid(String),

    #[error("start time {start} cannot be greater than end time {end}")]
    StartAfterEnd { start: String, end: String },

    #[error("PID {0} cannot be equal to its parent PID")]
    SelfParent(u32),

    #[error("{0}")]
    ConnectionDetailsMismatch(String),
}

pub type Result<T> = std::result::Result<T, OntologyError>;
