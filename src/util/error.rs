//! Error types for subpixel.

use thiserror::Error;

/// Result alias for subpixel operations.
pub type SubpixelResult<T> = std::result::Result<T, SubpixelError>;

/// Errors that can occur when building or evaluating a refinement view.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubpixelError {
    /// Image dimensions are zero or overflow.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// Row stride is shorter than a row of samples.
    #[error("invalid stride {stride} for row length {row_len}")]
    InvalidStride { row_len: usize, stride: usize },
    /// Backing buffer cannot hold the described image.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// Two inputs that must agree in size do not.
    #[error("{what} dimensions do not agree: expected {expected:?}, got {got:?}")]
    DimensionMismatch {
        what: &'static str,
        expected: (usize, usize),
        got: (usize, usize),
    },
    /// Multi-channel or multi-plane input was supplied.
    #[error("multi-channel, multi-plane images not supported ({channels} channels, {planes} planes)")]
    UnsupportedFormat { channels: usize, planes: usize },
    /// Correlation kernel must be positive in both dimensions.
    #[error("invalid kernel size: {width}x{height}")]
    InvalidKernel { width: usize, height: usize },
    /// The requested tile is empty.
    #[error("invalid bounding box: [{min_x}, {min_y}) .. [{max_x}, {max_y})")]
    InvalidBBox {
        min_x: i32,
        min_y: i32,
        max_x: i32,
        max_y: i32,
    },
    /// Unknown subpixel algorithm selector.
    #[error("unknown subpixel correlation type: {selector}")]
    UnsupportedAlgorithm { selector: i32 },
    /// The accelerator context may only be initialized once per process.
    #[error("backend context already initialized")]
    BackendAlreadyInitialized,
    /// Image decoding or loading failed.
    #[error("image io error: {reason}")]
    ImageIo { reason: String },
}
