//! Error types for growth-chart operations.
//!
//! Absent inputs (no calibration, no LMS table, nothing detected) are not
//! errors. They surface as `None` or [`Classification::Unknown`].
//!
//! [`Classification::Unknown`]: crate::classify::Classification::Unknown

use std::path::PathBuf;
use thiserror::Error;

use crate::calibration::CaptureStep;

/// Result type alias for growth-chart operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while calibrating, loading rasters or persisting.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Failed to load or decode a chart raster.
    #[error("Raster load failed: {path}: {reason}")]
    RasterLoad {
        /// Path of the raster that failed to load.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// Pixel buffer length does not match the declared dimensions.
    #[error("Dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        /// Expected (width, height, bytes).
        expected: (usize, usize, usize),
        /// Actual byte count.
        actual: usize,
    },

    /// Zero axis span or coincident reference points on an axis.
    #[error("Degenerate calibration: {0}")]
    DegenerateCalibration(String),

    /// A capture input was NaN or infinite.
    #[error("Non-finite value for {field}: {value}")]
    NonFiniteInput {
        /// Which input was malformed.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// Point-values capture requires a logical value with every click.
    #[error("Missing logical value for the {0} reference point")]
    MissingPointValue(CaptureStep),

    /// No capture session is active.
    #[error("No calibration capture in progress")]
    NoCaptureSession,

    /// Unrecognized metric name.
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    /// Unrecognized sex name.
    #[error("Unknown sex: {0}")]
    UnknownSex(String),

    /// LMS table failed validation.
    #[error("Invalid LMS table: {0}")]
    InvalidLmsTable(String),

    /// Key-value store failure.
    #[error("Store error: {0}")]
    Store(String),

    /// Error importing measurement CSV data.
    #[error("CSV import error at line {line}: {reason}")]
    CsvImport {
        /// Line number where the error occurred.
        line: usize,
        /// Reason for the failure.
        reason: String,
    },

    /// Measurement values out of range.
    #[error("Invalid measurement: {0}")]
    InvalidMeasurement(String),

    /// Unsupported raster format.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// I/O error wrapper.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
