//! I/O error types

use thiserror::Error;

/// Errors that can occur during I/O operations
#[derive(Debug, Error)]
pub enum IoError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to open file: {0}")]
    OpenFailed(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Invalid value '{value}' in column '{column}' at record {record}")]
    InvalidValue {
        column: String,
        record: usize,
        value: String,
    },

    #[error("Raster has {actual} bands, writer expects {expected}")]
    BandCount { expected: usize, actual: usize },

    #[error("Invalid raster bounds: x [{min_x}, {max_x}], y [{min_y}, {max_y}]")]
    InvalidBounds {
        min_x: f64,
        max_x: f64,
        min_y: f64,
        max_y: f64,
    },

    #[error("EPSG code {0} does not fit a GeoTIFF key")]
    UnsupportedEpsg(u32),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for I/O operations
pub type IoResult<T> = Result<T, IoError>;
