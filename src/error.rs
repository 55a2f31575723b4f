//! Error kinds recognized at this level. Outcomes that are "not an
//! error" (ray misses, a marcher start outside the mesh, numerical
//! degeneracies) are deliberately *not* variants here — they're ordinary
//! return values instead.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Caller-supplied traversal capacity is not one of {32, 64, 128, 256,
    /// 512, 1024}.
    #[error("invalid traversal capacity {0}: must be one of 32, 64, 128, 256, 512, 1024")]
    InvalidCapacity(usize),

    /// A pre-allocated output buffer does not match the number of queries
    /// it should hold. Stands in for a device allocation failure at a
    /// boundary with no literal GPU allocator.
    #[error("output buffer length mismatch: expected {expected}, got {actual}")]
    BufferLengthMismatch { expected: usize, actual: usize },

    /// A non-finite coordinate (NaN or infinity) or a zero-length ray
    /// direction was found in `context`. Only raised when
    /// `BuildConfig::error_checking` is enabled.
    #[error("invalid input in {0}: non-finite coordinate or zero-length direction")]
    NonFiniteInput(&'static str),
}
