//! Error types for PoroVox

use thiserror::Error;

/// Main error type for PoroVox operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid volume dimensions: {width}x{height}x{depth}")]
    InvalidDimensions { width: i32, height: i32, depth: i32 },

    #[error("Voxel out of bounds: ({x}, {y}, {z}) in volume of size {width}x{height}x{depth}")]
    IndexOutOfBounds {
        x: i32,
        y: i32,
        z: i32,
        width: i32,
        height: i32,
        depth: i32,
    },

    #[error("Buffer length mismatch: expected {expected}, found {found}")]
    SizeMismatch { expected: u64, found: u64 },

    #[error("Layer size mismatch: expected {expected_width}x{expected_height}, got {width}x{height}")]
    LayerMismatch {
        expected_width: i32,
        expected_height: i32,
        width: i32,
        height: i32,
    },

    #[error("Image has not been opened; run the maximal-ball opener first")]
    NotOpened,

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Accelerator error: {0}")]
    Accelerator(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for PoroVox operations
pub type Result<T> = std::result::Result<T, Error>;
