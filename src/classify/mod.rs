//! Classification of plotted points against printed percentile curves.
//!
//! [`Classifier::classify`] maps the point to pixels, detects the curves
//! crossing its column, converts each crossing row back to a chart value and
//! labels the crossings with the canonical percentile set for their count.
//! The point is `On` the nearest curve when it lies within the pixel
//! tolerance, otherwise `Between` the two curves that bracket its value.
//!
//! When an LMS table exists, an `On` label is replaced by the canonical
//! percentile closest to the statistical percentile: detection decides that
//! the point sits on a curve, the model decides which of the closely spaced
//! curves it is.
//!
//! Every absent input degrades to [`Classification::Unknown`]. Classification
//! is pure, so batches run in parallel via [`classify_all`] and are applied
//! through a [`RasterGate`] that drops results computed against a raster
//! that is no longer current.

mod gate;

use std::sync::OnceLock;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub use gate::{RasterGate, TaggedClassification};

use crate::calibration::{CalibrationRecord, LogicalPoint};
use crate::chart::{ChartId, Metric, PERCENTILES_3, PERCENTILES_5, PERCENTILES_7, PERCENTILES_9, Sex, XAxis};
use crate::detect::{DetectorConfig, detect_curves};
use crate::lms::LmsModel;
use crate::raster::{ChartRaster, RasterSurface};
use crate::transform::ChartTransform;

/// Where a point sits relative to the printed curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Classification {
    /// On the curve for this percentile.
    On { percentile: u8 },
    /// Between two adjacent curves.
    Between { lower: u8, upper: u8 },
    /// No curve could be matched.
    Unknown,
}

impl Classification {
    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::On { percentile } => write!(f, "on P{percentile}"),
            Self::Between { lower, upper } => write!(f, "between P{lower} and P{upper}"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Identity of a plotted point within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointId(pub u64);

impl std::fmt::Display for PointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A measurement placed on a chart.
///
/// Everything except the classification is fixed at construction. The
/// classification slot accepts exactly one value.
#[derive(Debug, Clone)]
pub struct PlottedPoint {
    id: PointId,
    metric: Metric,
    sex: Sex,
    chart: ChartId,
    logical: LogicalPoint,
    age_months: f64,
    classification: OnceLock<Classification>,
}

impl PlottedPoint {
    #[must_use]
    pub fn new(
        id: PointId,
        metric: Metric,
        sex: Sex,
        chart: ChartId,
        logical: LogicalPoint,
        age_months: f64,
    ) -> Self {
        Self {
            id,
            metric,
            sex,
            chart,
            logical,
            age_months,
            classification: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> PointId {
        self.id
    }

    #[must_use]
    pub fn metric(&self) -> Metric {
        self.metric
    }

    #[must_use]
    pub fn sex(&self) -> Sex {
        self.sex
    }

    #[must_use]
    pub fn chart(&self) -> &ChartId {
        &self.chart
    }

    /// Chart coordinates (horizontal axis value, plotted value).
    #[must_use]
    pub fn logical(&self) -> LogicalPoint {
        self.logical
    }

    #[must_use]
    pub fn age_months(&self) -> f64 {
        self.age_months
    }

    /// The x at which the LMS table is evaluated.
    #[must_use]
    pub fn lms_x(&self) -> f64 {
        match self.metric.x_axis() {
            XAxis::AgeMonths => self.age_months,
            XAxis::StatureCm => self.logical.x,
        }
    }

    #[must_use]
    pub fn classification(&self) -> Option<Classification> {
        self.classification.get().copied()
    }

    /// Attach the classification. Returns `false` if one was already set.
    pub fn attach_classification(&self, classification: Classification) -> bool {
        self.classification.set(classification).is_ok()
    }
}

/// Percentile labels for `count` detected curves on a `metric` chart.
///
/// Counts with a canonical set use it; other counts take a prefix of the
/// metric's own set, which may be shorter than `count`.
#[must_use]
pub fn labels_for_count(metric: Metric, count: usize) -> &'static [u8] {
    match count {
        9 => &PERCENTILES_9,
        7 => &PERCENTILES_7,
        5 => &PERCENTILES_5,
        3 => &PERCENTILES_3,
        _ => {
            let canonical = metric.canonical_percentiles();
            &canonical[..count.min(canonical.len())]
        }
    }
}

/// Canonical percentile of `metric` closest to `percentile`.
///
/// Equidistant candidates resolve to the lower percentile.
#[must_use]
pub fn nearest_canonical(metric: Metric, percentile: f64) -> Option<u8> {
    metric
        .canonical_percentiles()
        .iter()
        .copied()
        .reduce(|best, p| {
            if (f64::from(p) - percentile).abs() < (f64::from(best) - percentile).abs() {
                p
            } else {
                best
            }
        })
}

/// Classification tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Classifier {
    pub detector: DetectorConfig,
    /// Maximum pixel distance from a curve for the point to be on it.
    pub on_curve_tolerance_px: f64,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            on_curve_tolerance_px: 6.0,
        }
    }
}

impl Classifier {
    /// Classify one point.
    ///
    /// Never fails: a missing calibration, raster or curve match yields
    /// [`Classification::Unknown`], and a missing LMS table only skips
    /// refinement.
    #[must_use]
    pub fn classify(
        &self,
        point: &PlottedPoint,
        calibration: Option<&CalibrationRecord>,
        surface: Option<&dyn RasterSurface>,
        lms: &LmsModel,
    ) -> Classification {
        let Some(calibration) = calibration else {
            tracing::debug!(point = %point.id, chart = %point.chart, "no calibration, skipping classification");
            return Classification::Unknown;
        };
        let Some(surface) = surface else {
            tracing::debug!(point = %point.id, chart = %point.chart, "no raster, skipping classification");
            return Classification::Unknown;
        };

        let transform = ChartTransform::new(calibration);
        let pixel = transform.to_pixel(point.logical);
        if !pixel.is_finite() {
            return Classification::Unknown;
        }

        let rows = detect_curves(surface, pixel.x, &self.detector);
        if rows.is_empty() {
            return Classification::Unknown;
        }

        // (row, chart value), ascending by value so labels run low to high
        let mut curves: Vec<(usize, f64)> = rows
            .iter()
            .map(|&row| (row, transform.to_logical_y(row as f64)))
            .collect();
        curves.sort_by(|a, b| a.1.total_cmp(&b.1));
        let labels = labels_for_count(point.metric, curves.len());

        let nearest = curves
            .iter()
            .enumerate()
            .map(|(i, &(row, _))| (i, (row as f64 - pixel.y).abs()))
            .reduce(|best, c| if c.1 < best.1 { c } else { best });

        if let Some((idx, distance)) = nearest {
            if distance <= self.on_curve_tolerance_px {
                let percentile = match labels.get(idx) {
                    Some(&visual) => Some(self.refine(point, visual, lms)),
                    // Unlabelled curve: only the model can name it
                    None => self.lms_percentile(point, lms),
                };
                return percentile.map_or(Classification::Unknown, |percentile| {
                    Classification::On { percentile }
                });
            }
        }

        let value = point.logical.y;
        for (i, pair) in curves.windows(2).enumerate() {
            let (lo, hi) = (pair[0].1.min(pair[1].1), pair[0].1.max(pair[1].1));
            if value >= lo && value <= hi {
                return match (labels.get(i), labels.get(i + 1)) {
                    (Some(&lower), Some(&upper)) => Classification::Between { lower, upper },
                    _ => Classification::Unknown,
                };
            }
        }
        Classification::Unknown
    }

    /// Canonical percentile nearest the point's LMS percentile.
    fn lms_percentile(&self, point: &PlottedPoint, lms: &LmsModel) -> Option<u8> {
        let z = lms.compute_z(point.metric, point.sex, point.lms_x(), point.logical.y);
        z.percentile.and_then(|p| nearest_canonical(point.metric, p))
    }

    fn refine(&self, point: &PlottedPoint, visual: u8, lms: &LmsModel) -> u8 {
        let Some(refined) = self.lms_percentile(point, lms) else {
            return visual;
        };
        if refined != visual {
            tracing::debug!(
                point = %point.id,
                visual,
                refined,
                "statistical percentile overrides detected curve label"
            );
        }
        refined
    }
}

/// A point queued for batch classification with its chart's calibration.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyJob<'a> {
    pub point: &'a PlottedPoint,
    pub calibration: Option<&'a CalibrationRecord>,
}

/// Classify many points against one raster in parallel.
///
/// Results carry the raster id so they can be checked for staleness when
/// applied.
#[must_use]
pub fn classify_all(
    classifier: &Classifier,
    jobs: &[ClassifyJob<'_>],
    raster: &ChartRaster,
    lms: &LmsModel,
) -> Vec<TaggedClassification> {
    let raster_id = raster.id();
    jobs.par_iter()
        .map(|job| TaggedClassification {
            point: job.point.id(),
            raster: raster_id,
            classification: classifier.classify(job.point, job.calibration, Some(raster), lms),
        })
        .collect()
}
