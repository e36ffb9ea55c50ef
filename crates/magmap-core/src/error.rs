//! Error types for magmap-core
//!
//! Every operation fails synchronously to its caller; nothing is retried
//! and no partial results are salvaged.

use magmap_io::IoError;
use thiserror::Error;

/// Main error type for gridding and display operations
#[derive(Error, Debug)]
pub enum GridError {
    /// Zero-width axis while deriving cell counts or sizes automatically
    #[error("Degenerate extent on {axis} axis: all samples share coordinate {value}")]
    DegenerateExtent { axis: Axis, value: f64 },

    /// Unknown interpolation method, filter or colormap name
    #[error("Unsupported method: {name}")]
    UnsupportedMethod { name: String },

    /// Coordinate and value arrays disagree in length
    #[error("Shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// Color limits or midpoint out of order
    #[error("Invalid range: {message}")]
    InvalidRange { message: String },

    /// No usable samples
    #[error("No finite samples to grid")]
    EmptyInput,

    /// Parameter outside its valid domain
    #[error("Invalid parameter {name}: {message}")]
    InvalidParameter { name: String, message: String },

    /// Configuration file could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// File I/O
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

/// Grid axis, for error reporting
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::X => write!(f, "x"),
            Axis::Y => write!(f, "y"),
        }
    }
}

impl GridError {
    pub(crate) fn unsupported(name: impl Into<String>) -> Self {
        GridError::UnsupportedMethod { name: name.into() }
    }

    pub(crate) fn shape(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        GridError::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }

    pub(crate) fn range(message: impl Into<String>) -> Self {
        GridError::InvalidRange {
            message: message.into(),
        }
    }

    pub(crate) fn parameter(name: impl Into<String>, message: impl Into<String>) -> Self {
        GridError::InvalidParameter {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for gridding operations
pub type GridResult<T> = Result<T, GridError>;

/// Validation utilities
pub mod validation {
    use super::*;

    /// Require a strictly positive, finite value
    pub fn positive(name: &str, value: f64) -> GridResult<()> {
        if !(value.is_finite() && value > 0.0) {
            return Err(GridError::parameter(
                name,
                format!("must be positive and finite, got {}", value),
            ));
        }
        Ok(())
    }

    /// Require matching lengths
    pub fn same_len(what: &str, expected: usize, actual: usize) -> GridResult<()> {
        if expected != actual {
            return Err(GridError::shape(what, expected, actual));
        }
        Ok(())
    }

    /// Require `vmin < vmax`, both finite
    pub fn ordered_range(vmin: f64, vmax: f64) -> GridResult<()> {
        if !(vmin.is_finite() && vmax.is_finite()) {
            return Err(GridError::range(format!(
                "limits must be finite, got [{}, {}]",
                vmin, vmax
            )));
        }
        if vmin >= vmax {
            return Err(GridError::range(format!(
                "vmin ({}) must be smaller than vmax ({})",
                vmin, vmax
            )));
        }
        Ok(())
    }
}
