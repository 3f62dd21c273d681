//! # growth-chart
//!
//! Plot anthropometric measurements onto growth-chart rasters and report
//! where they stand, both statistically (LMS z-scores and percentiles) and
//! visually (which printed percentile curve the point lands on).
//!
//! The host supplies decoded chart rasters, pixel clicks and a key-value
//! store. This crate turns three reference clicks into a per-chart
//! calibration, maps points between chart units and pixels, detects the
//! printed curves crossing a point's column and classifies the point against
//! them.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use growth_chart::{Measurement, PlotConfig, PlotSession, Sex};
//!
//! let config = PlotConfig::builder()
//!     .store_path("calibrations.json")
//!     .charts_dir("./charts")
//!     .build();
//! let mut session = PlotSession::open(config)?;
//!
//! session.set_raster(Some(raster))?;
//! session.add_measurement(&Measurement::new(Sex::Boys, 3.0, 0.0, 0.0).with_weight(14.3))?;
//! session.classify_pending();
//! session.results().write_csv(std::io::stdout())?;
//! ```
//!
//! ## Modules
//!
//! - [`chart`]: Metrics, sexes and chart selection
//! - [`lms`]: LMS tables, z-scores and percentiles
//! - [`calibration`]: Calibration records, storage and three-click capture
//! - [`transform`]: Pixel/chart coordinate mapping
//! - [`raster`]: Chart raster surfaces and decoding
//! - [`detect`]: Printed curve detection
//! - [`classify`]: On/between/unknown classification
//! - [`measurement`], [`import`]: Measurements and CSV import
//! - [`report`]: Results table
//! - [`session`]: Plot session tying it together

pub mod calibration;
pub mod chart;
pub mod classify;
pub mod detect;
pub mod error;
pub mod import;
pub mod lms;
pub mod measurement;
pub mod raster;
pub mod report;
pub mod session;
pub mod transform;

// Re-export commonly used types
pub use calibration::{
    AxisRange, AxisSource, CalibrationKey, CalibrationMethod, CalibrationRecord, CalibrationStore,
    Calibrator, CaptureOutcome, CaptureStep, JsonFileStore, KeyValueStore, LogicalPoint,
    MemoryStore, PixelPoint, ReferenceClick, ReferencePoints,
};
pub use chart::{ChartId, Metric, Sex, age_to_months, chart_for};
pub use classify::{Classification, Classifier, PlottedPoint, PointId};
pub use detect::{DetectorConfig, detect_curves};
pub use error::{Error, Result};
pub use import::{CsvSchema, MeasurementImporter};
pub use lms::{LmsModel, LmsSample, LmsTable, ZScore};
pub use measurement::Measurement;
pub use raster::{ChartRaster, RasterId, RasterSource, RasterSurface};
pub use report::{ResultRow, ResultsTable};
pub use session::{PlotConfig, PlotSession};
pub use transform::ChartTransform;
