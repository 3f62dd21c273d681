//! Pixel ↔ logical coordinate mapping derived from a calibration.
//!
//! Each axis is an independent linear map. Direction is inferred from the
//! reference clicks: `xDir = +1` when the x reference lies at or right of the
//! origin, `yDir = +1` when the y reference lies at or below it. Raster rows
//! grow downward while chart values grow upward, so `yDir` is normally -1.
//!
//! | Quantity | Definition |
//! |----------|------------|
//! | `pxPerX` | `|xMax.px - origin.px| / xSpan` |
//! | `pxPerY` | `|yMax.py - origin.py| / ySpan` |
//! | pixel x  | `origin.px + (vx - xmin) * pxPerX * xDir` |
//! | logical x | `xmin + (px - origin.px) / (pxPerX * xDir)` |
//!
//! Rotated or non-monotonic axes are not supported.
//!
//! The free functions take `Option<&CalibrationRecord>` and return `None`
//! when the chart is uncalibrated so callers can skip silently.

use crate::calibration::{CalibrationRecord, LogicalPoint, PixelPoint};

/// Per-axis linear transform for one calibrated chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartTransform {
    origin: PixelPoint,
    xmin: f64,
    ymin: f64,
    x_dir: f64,
    y_dir: f64,
    px_per_x: f64,
    px_per_y: f64,
}

impl ChartTransform {
    /// Derive the transform from a calibration record.
    ///
    /// A zero logical span is treated as 1 so the transform never divides by
    /// zero; persisted records cannot have one.
    #[must_use]
    pub fn new(record: &CalibrationRecord) -> Self {
        let axis = &record.axis;
        let points = &record.points;

        let x_span = guard_span(axis.xmax - axis.xmin);
        let y_span = guard_span(axis.ymax - axis.ymin);

        Self {
            origin: points.origin,
            xmin: axis.xmin,
            ymin: axis.ymin,
            x_dir: if points.x_max.x >= points.origin.x { 1.0 } else { -1.0 },
            y_dir: if points.y_max.y >= points.origin.y { 1.0 } else { -1.0 },
            px_per_x: (points.x_max.x - points.origin.x).abs() / x_span,
            px_per_y: (points.y_max.y - points.origin.y).abs() / y_span,
        }
    }

    /// Map a logical point to raster pixels.
    #[must_use]
    pub fn to_pixel(&self, value: LogicalPoint) -> PixelPoint {
        PixelPoint {
            x: self.origin.x + (value.x - self.xmin) * self.px_per_x * self.x_dir,
            y: self.origin.y + (value.y - self.ymin) * self.px_per_y * self.y_dir,
        }
    }

    /// Logical x of a pixel column.
    #[must_use]
    pub fn to_logical_x(&self, px: f64) -> f64 {
        self.xmin + (px - self.origin.x) / (self.px_per_x * self.x_dir)
    }

    /// Logical y of a pixel row.
    #[must_use]
    pub fn to_logical_y(&self, py: f64) -> f64 {
        self.ymin + (py - self.origin.y) / (self.px_per_y * self.y_dir)
    }

    /// Map a pixel back to logical coordinates.
    #[must_use]
    pub fn to_logical(&self, pixel: PixelPoint) -> LogicalPoint {
        LogicalPoint {
            x: self.to_logical_x(pixel.x),
            y: self.to_logical_y(pixel.y),
        }
    }

    /// Horizontal direction sign.
    #[must_use]
    pub fn x_dir(&self) -> f64 {
        self.x_dir
    }

    /// Vertical direction sign.
    #[must_use]
    pub fn y_dir(&self) -> f64 {
        self.y_dir
    }

    /// Pixels per logical unit on each axis.
    #[must_use]
    pub fn scale(&self) -> (f64, f64) {
        (self.px_per_x, self.px_per_y)
    }
}

fn guard_span(span: f64) -> f64 {
    if span == 0.0 { 1.0 } else { span }
}

/// Map a logical point to pixels, or `None` without a calibration.
#[must_use]
pub fn to_pixel(calibration: Option<&CalibrationRecord>, value: LogicalPoint) -> Option<PixelPoint> {
    calibration.map(|record| ChartTransform::new(record).to_pixel(value))
}

/// Logical x of a pixel column, or `None` without a calibration.
#[must_use]
pub fn to_logical_x(calibration: Option<&CalibrationRecord>, px: f64) -> Option<f64> {
    calibration.map(|record| ChartTransform::new(record).to_logical_x(px))
}

/// Logical y of a pixel row, or `None` without a calibration.
#[must_use]
pub fn to_logical_y(calibration: Option<&CalibrationRecord>, py: f64) -> Option<f64> {
    calibration.map(|record| ChartTransform::new(record).to_logical_y(py))
}
