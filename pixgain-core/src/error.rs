//! Error types for pixgain-core.

use thiserror::Error;

/// Result type alias for pixgain operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for pixgain operations.
///
/// Every variant is an input error: it is raised before any pixel is
/// processed, so a run never returns partially computed results.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The event table holds no events at all.
    #[error("event table is empty")]
    EmptyEventTable,

    /// Columns of an event table disagree in length.
    #[error("event table column '{column}' has {actual} entries, expected {expected}")]
    ColumnLengthMismatch {
        column: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Pixel coordinate outside the detector grid.
    #[error("pixel (row {row}, col {col}) outside the {grid_size}x{grid_size} grid")]
    InvalidCoordinate {
        row: u16,
        col: u16,
        grid_size: usize,
    },

    /// Calibration line with an unusable energy or search window.
    #[error("invalid calibration line '{source_name}': {reason}")]
    InvalidCalibrationLine { source_name: String, reason: String },

    /// No preset calibration line with the requested name.
    #[error("unknown calibration line preset: {0}")]
    UnknownLine(String),

    /// Spectrum binning that cannot produce a histogram.
    #[error("invalid spectrum binning: {0}")]
    InvalidBinning(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}
