//! Error types for grouped gather/scatter operations.
//!
//! Every variant except [`GroupSelectError::InternalInvariant`] and
//! [`GroupSelectError::Io`] is a precondition violation: the call is rejected
//! before any device work is enqueued and the caller has to fix its
//! arguments. Device allocation failures come from the compute runtime itself.
//! Nothing here is retried.

use std::io;

/// Result type for grouped gather/scatter operations
pub type GroupSelectResult<T> = Result<T, GroupSelectError>;

/// Grouped gather/scatter errors
#[derive(Debug, thiserror::Error)]
pub enum GroupSelectError {
    // Group shape errors
    #[error("{op}: expected {expected} {what}, got {got}")]
    ArityMismatch {
        op: &'static str,
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{op}: item {item} has rank {got}, group rank is {expected}")]
    RankMismatch {
        op: &'static str,
        item: usize,
        expected: usize,
        got: usize,
    },

    #[error(
        "{op}: item {item} selects {got} rows, the number of indices must be the same for the entire group ({expected})"
    )]
    RowCountMismatch {
        op: &'static str,
        item: usize,
        expected: usize,
        got: usize,
    },

    #[error("{op}: input rank must be at least 1")]
    ScalarInput { op: &'static str },

    // Device errors
    #[error("{op}: item {item} is not on the device of the first item")]
    DeviceMismatch { op: &'static str, item: usize },

    // Gradient errors
    #[error("backward: expected {expected} gradients, got {got}")]
    GradientCountMismatch { expected: usize, got: usize },

    #[error("backward: gradient {item} has shape {got:?}, expected {expected:?}")]
    GradientShapeMismatch {
        item: usize,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    // Index errors
    #[error("{op}: item {item} has index {index} outside [{low}, {high})")]
    IndexOutOfRange {
        op: &'static str,
        item: usize,
        index: i64,
        low: i64,
        high: i64,
    },

    #[error("pack_segments: {reason}")]
    InvalidSegmentLengths { reason: String },

    #[error("{what} = {value} does not fit the 32-bit device addressing range")]
    OffsetOverflow { what: &'static str, value: u64 },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // Library faults
    #[error("Internal invariant violated: {0}")]
    InternalInvariant(String),
}

impl GroupSelectError {
    /// Whether the error is a rejected call rather than a runtime or library fault.
    pub fn is_precondition(&self) -> bool {
        !matches!(
            self,
            GroupSelectError::InternalInvariant(_) | GroupSelectError::Io(_)
        )
    }
}
