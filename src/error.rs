//! Error types for the `count-distinct` crate

use std::collections::TryReserveError;

use crate::value::TypeLength;

/// Errors raised while accumulating distinct values.
///
/// Every error aborts the accumulation sequence it was raised in: nothing is
/// retried or skipped. Null values are not errors.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The declared value type is not a fixed-length type passed by value.
    #[error("count_distinct handles only fixed-length types passed by value, got {length:?} (by value: {by_value})")]
    UnsupportedType { length: TypeLength, by_value: bool },

    /// The value type is fixed-length, but there is no table for its width.
    #[error("no distinct set representation for {0}-byte values")]
    UnsupportedWidth(usize),

    /// A value's width differs from the width the set was created with.
    #[error("value width mismatch: set holds {expected}-byte values, got {actual} bytes")]
    WidthMismatch { expected: usize, actual: usize },

    /// Growing a bucket or the bucket array failed.
    #[error("failed to grow distinct set storage: {0}")]
    Allocation(#[from] TryReserveError),

    /// Serialized state could not be turned back into a set.
    #[error("invalid distinct set state: {0}")]
    InvalidState(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
