//! Error types for invalid compiler input.

/// An input raster that cannot be compiled.
///
/// Raised before any pyramid work so callers get a synchronous, descriptive
/// failure for the offending image.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    /// Width or height is zero.
    #[error("image has a zero dimension ({width}x{height})")]
    ZeroDimension { width: usize, height: usize },

    /// The pixel buffer is empty.
    #[error("image buffer is empty")]
    EmptyImage,

    /// The pixel buffer length does not equal `width * height`.
    #[error("image buffer holds {actual} bytes, expected {expected} for the given dimensions")]
    DataLengthMismatch { expected: usize, actual: usize },
}
