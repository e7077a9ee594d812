//! Error types for the Hostsync engine.

use crate::{FieldPath, PipelineName};
use thiserror::Error;

/// All possible errors from the Hostsync engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Record errors
    #[error("missing field: {0}")]
    MissingField(FieldPath),

    #[error("invalid value for field '{field}': {reason}")]
    InvalidValue { field: FieldPath, reason: String },

    #[error("invalid date: {0}")]
    InvalidDate(String),

    // Schema errors
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("duplicate column: {0}")]
    DuplicateColumn(String),

    // Pipeline errors
    #[error("invalid pipeline '{pipeline}': {reason}")]
    InvalidPipeline {
        pipeline: PipelineName,
        reason: String,
    },

    #[error("unknown rollup policy: {0}")]
    UnknownPolicy(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
