//! Per-chart calibration records.
//!
//! A calibration ties three reference clicks on a chart raster (the origin,
//! a point at the far end of the x axis and a point at the top of the y axis)
//! to a logical axis range. Records are keyed by (metric, sex, chart) and are
//! only ever created by a completed [`CaptureSession`] or shipped as a
//! [preset](presets).
//!
//! Persisted shape:
//!
//! ```json
//! {
//!   "axis": { "xmin": 24, "xmax": 228, "ymin": 5, "ymax": 90 },
//!   "points": {
//!     "origin": { "x": 236, "y": 3307 },
//!     "xMax": { "x": 2244.5, "y": 3307 },
//!     "yMax": { "x": 236, "y": 1453.5 }
//!   },
//!   "method": "manual"
//! }
//! ```

mod capture;
pub mod presets;
mod store;

use serde::{Deserialize, Serialize};

use crate::chart::{ChartId, Metric, Sex};
use crate::error::{Error, Result};

pub use capture::{
    AxisSource, Calibrator, CaptureOutcome, CaptureSession, CaptureState, CaptureStep,
    ReferenceClick, Rejection,
};
pub use store::{CalibrationStore, JsonFileStore, KeyValueStore, MemoryStore};

/// A position in raster pixel coordinates (x right, y down).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// True if both coordinates are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A position in chart (logical) units, e.g. months and kilograms.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LogicalPoint {
    pub x: f64,
    pub y: f64,
}

impl LogicalPoint {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Logical axis range of a chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl AxisRange {
    #[must_use]
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Self {
        Self { xmin, xmax, ymin, ymax }
    }

    /// Reject non-finite bounds and empty or inverted spans.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("xmin", self.xmin),
            ("xmax", self.xmax),
            ("ymin", self.ymin),
            ("ymax", self.ymax),
        ] {
            if !value.is_finite() {
                return Err(Error::NonFiniteInput { field, value });
            }
        }
        if self.xmax <= self.xmin {
            return Err(Error::DegenerateCalibration(format!(
                "x axis range {}..{} is empty",
                self.xmin, self.xmax
            )));
        }
        if self.ymax <= self.ymin {
            return Err(Error::DegenerateCalibration(format!(
                "y axis range {}..{} is empty",
                self.ymin, self.ymax
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn x_span(&self) -> f64 {
        self.xmax - self.xmin
    }

    #[must_use]
    pub fn y_span(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// True if the logical point lies inside the range (inclusive).
    #[must_use]
    pub fn contains(&self, point: LogicalPoint) -> bool {
        (self.xmin..=self.xmax).contains(&point.x) && (self.ymin..=self.ymax).contains(&point.y)
    }
}

/// The three reference clicks, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencePoints {
    /// Pixel of (xmin, ymin).
    pub origin: PixelPoint,
    /// Pixel of (xmax, ymin).
    pub x_max: PixelPoint,
    /// Pixel of (xmin, ymax).
    pub y_max: PixelPoint,
}

impl ReferencePoints {
    /// Reject references that collapse an axis.
    pub fn validate(&self) -> Result<()> {
        if self.x_max.x == self.origin.x {
            return Err(Error::DegenerateCalibration(
                "x-axis reference shares the origin's pixel column".to_string(),
            ));
        }
        if self.y_max.y == self.origin.y {
            return Err(Error::DegenerateCalibration(
                "y-axis reference shares the origin's pixel row".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logical values the operator supplied for the reference points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointValues {
    pub origin: LogicalPoint,
    pub x_max: LogicalPoint,
    pub y_max: LogicalPoint,
}

impl PointValues {
    /// Axis range implied by the reference values.
    #[must_use]
    pub fn axis(&self) -> AxisRange {
        AxisRange {
            xmin: self.origin.x,
            xmax: self.x_max.x,
            ymin: self.origin.y,
            ymax: self.y_max.y,
        }
    }
}

/// How a calibration was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CalibrationMethod {
    /// Axis range declared up front, three clicks captured.
    #[default]
    Manual,
    /// Axis range derived from logical values given with each click.
    PointValues,
    /// Shipped with a pre-rendered chart raster.
    Preset,
}

/// A persisted pixel/logical calibration for one chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationRecord {
    pub axis: AxisRange,
    pub points: ReferencePoints,
    #[serde(default)]
    pub method: CalibrationMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point_values: Option<PointValues>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl CalibrationRecord {
    /// Build a manual record from a declared axis range.
    #[must_use]
    pub fn new(axis: AxisRange, points: ReferencePoints) -> Self {
        Self {
            axis,
            points,
            method: CalibrationMethod::Manual,
            point_values: None,
            captured_at: None,
            source: None,
        }
    }

    /// Build a record whose axis comes from reference-point values.
    #[must_use]
    pub fn from_point_values(points: ReferencePoints, values: PointValues) -> Self {
        Self {
            axis: values.axis(),
            points,
            method: CalibrationMethod::PointValues,
            point_values: Some(values),
            captured_at: None,
            source: None,
        }
    }

    /// Stamp the capture time.
    #[must_use]
    pub fn captured_now(mut self) -> Self {
        self.captured_at = Some(chrono::Utc::now());
        self
    }

    /// Check every invariant a persisted record must satisfy.
    pub fn validate(&self) -> Result<()> {
        for (field, p) in [
            ("origin", self.points.origin),
            ("xMax", self.points.x_max),
            ("yMax", self.points.y_max),
        ] {
            if !p.x.is_finite() {
                return Err(Error::NonFiniteInput { field, value: p.x });
            }
            if !p.y.is_finite() {
                return Err(Error::NonFiniteInput { field, value: p.y });
            }
        }
        self.axis.validate()?;
        self.points.validate()
    }
}

/// Storage key of a calibration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CalibrationKey {
    pub metric: Metric,
    pub sex: Sex,
    pub chart: ChartId,
}

impl CalibrationKey {
    pub const PREFIX: &'static str = "calib_";

    #[must_use]
    pub fn new(metric: Metric, sex: Sex, chart: ChartId) -> Self {
        Self { metric, sex, chart }
    }

    /// Parse a storage key back into its parts.
    #[must_use]
    pub fn parse(key: &str) -> Option<Self> {
        let rest = key.strip_prefix(Self::PREFIX)?;
        let mut parts = rest.splitn(3, '_');
        let metric = Metric::from_str_loose(parts.next()?)?;
        let sex = Sex::from_str_loose(parts.next()?)?;
        let chart = parts.next().filter(|c| !c.is_empty())?;
        Some(Self::new(metric, sex, ChartId::new(chart)))
    }
}

impl std::fmt::Display for CalibrationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}_{}_{}", Self::PREFIX, self.metric, self.sex, self.chart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_record() -> CalibrationRecord {
        CalibrationRecord::new(
            AxisRange::new(24.0, 228.0, 5.0, 90.0),
            ReferencePoints {
                origin: PixelPoint::new(236.0, 3307.0),
                x_max: PixelPoint::new(2244.5, 3307.0),
                y_max: PixelPoint::new(236.0, 1453.5),
            },
        )
    }

    #[test]
    fn test_record_json_shape() {
        let json = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(json["axis"]["xmax"], 228.0);
        assert_eq!(json["points"]["xMax"]["x"], 2244.5);
        assert_eq!(json["points"]["yMax"]["y"], 1453.5);
        assert_eq!(json["method"], "manual");
        assert!(json.get("pointValues").is_none());
    }

    #[test]
    fn test_record_parses_without_method() {
        let json = r#"{"axis":{"xmin":0,"xmax":10,"ymin":0,"ymax":5},
            "points":{"origin":{"x":0,"y":100},"xMax":{"x":100,"y":100},"yMax":{"x":0,"y":0}}}"#;
        let record: CalibrationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.method, CalibrationMethod::Manual);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_degenerate() {
        let mut record = sample_record();
        record.points.x_max.x = record.points.origin.x;
        assert!(matches!(record.validate(), Err(Error::DegenerateCalibration(_))));

        let mut record = sample_record();
        record.points.y_max.y = record.points.origin.y;
        assert!(matches!(record.validate(), Err(Error::DegenerateCalibration(_))));

        let mut record = sample_record();
        record.axis.ymax = record.axis.ymin;
        assert!(matches!(record.validate(), Err(Error::DegenerateCalibration(_))));

        let mut record = sample_record();
        record.axis.xmin = f64::NAN;
        assert!(matches!(record.validate(), Err(Error::NonFiniteInput { .. })));
    }

    #[test]
    fn test_point_values_axis() {
        let values = PointValues {
            origin: LogicalPoint::new(65.0, 6.0),
            x_max: LogicalPoint::new(120.0, 6.0),
            y_max: LogicalPoint::new(65.0, 30.0),
        };
        let record = CalibrationRecord::from_point_values(sample_record().points, values);
        assert_eq!(record.axis, AxisRange::new(65.0, 120.0, 6.0, 30.0));
        assert_eq!(record.method, CalibrationMethod::PointValues);
    }

    #[test]
    fn test_key_format_and_parse() {
        let key = CalibrationKey::new(
            Metric::WeightForAge,
            Sex::Boys,
            ChartId::new("Weight-and-height_Boys_2-19-years.png"),
        );
        let s = key.to_string();
        assert_eq!(s, "calib_weightForAge_boys_Weight-and-height_Boys_2-19-years.png");
        assert_eq!(CalibrationKey::parse(&s), Some(key));
        assert_eq!(CalibrationKey::parse("png_migration_done"), None);
    }
}
