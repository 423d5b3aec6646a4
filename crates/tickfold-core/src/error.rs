//! Array error types

use thiserror::Error;

/// Errors surfaced synchronously by shape-changing and converting operations.
///
/// Shape errors never truncate or wrap: the offending call fails and the
/// array is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArrayError {
    #[error(
        "cannot reshape {count}x{properties} array to {new_count}x{new_properties}: element counts differ"
    )]
    ShapeMismatch {
        count: usize,
        properties: usize,
        new_count: usize,
        new_properties: usize,
    },

    #[error("slice [{start}, {stop}) out of range for array of {count} items")]
    RangeOutOfBounds {
        start: usize,
        stop: usize,
        count: usize,
    },

    #[error("buffer of {total_bytes} bytes is not a whole number of {record_size}-byte records")]
    RecordSizeMismatch {
        total_bytes: usize,
        record_size: usize,
    },

    #[error("array shape {count}x{properties} must have at least one item and one property")]
    EmptyShape { count: usize, properties: usize },
}
