use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegenError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing input file: {}", path.display())]
    MissingInputFile { path: PathBuf },

    #[error("Invalid header in {}: {reason}", path.display())]
    InvalidHeader { path: PathBuf, reason: String },

    #[error("Malformed row at {}:{line}: {reason}", path.display())]
    MalformedRow {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Sample {value} out of 8-bit range at {}:{line}", path.display())]
    SampleOutOfRange {
        path: PathBuf,
        line: usize,
        value: i64,
    },

    #[error("Channel alignment error: {0}")]
    ChannelAlignment(String),

    #[error("Pixel row count mismatch: expected {expected}, got {actual}")]
    PixelCountMismatch { expected: usize, actual: usize },

    #[error("Failed to allocate scratch volume at {}: {source}", path.display())]
    Allocation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write frame image {}: {reason}", path.display())]
    EncodeWrite { path: PathBuf, reason: String },

    #[error("Volume view error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Invalid frame dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Reconstruction cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, RegenError>;
