//! Error types shared by the core components.

use thiserror::Error;

/// Errors raised by the durable field store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The slot `offset .. offset + max_length + 1` does not fit in the region.
    #[error("slot at offset {offset} with capacity {max_length} exceeds region of {capacity} bytes")]
    OutOfBounds {
        offset: usize,
        max_length: usize,
        capacity: usize,
    },

    /// The underlying medium failed to initialize or commit.
    #[error("storage medium error: {0}")]
    Medium(String),
}

/// Errors found while validating the field schema.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema has no fields")]
    Empty,

    #[error("field '{name}' ends at byte {end}, past the {capacity}-byte region")]
    OutOfRegion {
        name: &'static str,
        end: usize,
        capacity: usize,
    },

    #[error("fields '{first}' and '{second}' overlap")]
    Overlap {
        first: &'static str,
        second: &'static str,
    },
}

/// A portal submission that cannot be applied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("missing required parameter '{0}'")]
    MissingField(&'static str),
}

/// Radio driver failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("radio error: {0}")]
pub struct RadioError(pub String);

/// Captive DNS responder failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("dns responder error: {0}")]
pub struct DnsError(pub String);

/// Web portal server failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("web portal error: {0}")]
pub struct PortalError(pub String);

/// Errors surfaced by the connectivity controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
