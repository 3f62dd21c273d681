//! Submitted measurements and the chart points they produce.

use serde::{Deserialize, Serialize};

use crate::calibration::LogicalPoint;
use crate::chart::{ChartId, Metric, Sex, age_to_months, chart_for};
use crate::classify::{PlottedPoint, PointId};
use crate::error::{Error, Result};

/// One visit's measurements for a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub sex: Sex,
    #[serde(default)]
    pub age_years: f64,
    #[serde(default)]
    pub age_months: f64,
    #[serde(default)]
    pub age_days: f64,
    pub weight_kg: Option<f64>,
    pub stature_cm: Option<f64>,
    pub head_circumference_cm: Option<f64>,
}

impl Measurement {
    /// A measurement with only sex and age set.
    #[must_use]
    pub fn new(sex: Sex, age_years: f64, age_months: f64, age_days: f64) -> Self {
        Self {
            sex,
            age_years,
            age_months,
            age_days,
            weight_kg: None,
            stature_cm: None,
            head_circumference_cm: None,
        }
    }

    #[must_use]
    pub fn with_weight(mut self, kg: f64) -> Self {
        self.weight_kg = Some(kg);
        self
    }

    #[must_use]
    pub fn with_stature(mut self, cm: f64) -> Self {
        self.stature_cm = Some(cm);
        self
    }

    #[must_use]
    pub fn with_head_circumference(mut self, cm: f64) -> Self {
        self.head_circumference_cm = Some(cm);
        self
    }

    /// Age in fractional months.
    #[must_use]
    pub fn total_age_months(&self) -> f64 {
        age_to_months(self.age_years, self.age_months, self.age_days)
    }

    /// Check ages are non-negative and values positive and finite.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("age_years", self.age_years),
            ("age_months", self.age_months),
            ("age_days", self.age_days),
        ] {
            if !value.is_finite() {
                return Err(Error::NonFiniteInput { field, value });
            }
            if value < 0.0 {
                return Err(Error::InvalidMeasurement(format!("{field} is negative ({value})")));
            }
        }
        for (field, value) in [
            ("weight_kg", self.weight_kg),
            ("stature_cm", self.stature_cm),
            ("head_circumference_cm", self.head_circumference_cm),
        ] {
            let Some(value) = value else { continue };
            if !value.is_finite() {
                return Err(Error::NonFiniteInput { field, value });
            }
            if value <= 0.0 {
                return Err(Error::InvalidMeasurement(format!("{field} must be positive ({value})")));
            }
        }
        Ok(())
    }

    /// Chart coordinates for a metric, if the needed values were recorded.
    #[must_use]
    pub fn logical_point(&self, metric: Metric) -> Option<LogicalPoint> {
        let age = self.total_age_months();
        let (x, y) = match metric {
            Metric::WeightForAge => (age, self.weight_kg?),
            Metric::StatureForAge => (age, self.stature_cm?),
            Metric::HeadCircumference => (age, self.head_circumference_cm?),
            Metric::WeightForStature => (self.stature_cm?, self.weight_kg?),
        };
        Some(LogicalPoint::new(x, y))
    }

    /// Chart the point for `metric` is plotted on.
    #[must_use]
    pub fn chart(&self, metric: Metric) -> ChartId {
        chart_for(metric, self.sex, self.total_age_months())
    }

    /// One point per requested metric that has values, numbered from
    /// `first_id`.
    pub fn plotted_points(&self, metrics: &[Metric], first_id: u64) -> Result<Vec<PlottedPoint>> {
        self.validate()?;
        let age = self.total_age_months();
        Ok(metrics
            .iter()
            .filter_map(|&metric| self.logical_point(metric).map(|p| (metric, p)))
            .zip(first_id..)
            .map(|((metric, logical), id)| {
                PlottedPoint::new(PointId(id), metric, self.sex, self.chart(metric), logical, age)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visit() -> Measurement {
        Measurement::new(Sex::Boys, 3.0, 0.0, 0.0)
            .with_weight(14.3)
            .with_stature(95.2)
    }

    #[test]
    fn test_points_per_metric() {
        let points = visit().plotted_points(Metric::all(), 10).unwrap();
        // No head circumference recorded
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].id(), PointId(10));
        assert_eq!(points[2].id(), PointId(12));

        let wfs = points
            .iter()
            .find(|p| p.metric() == Metric::WeightForStature)
            .unwrap();
        assert_eq!(wfs.logical(), LogicalPoint::new(95.2, 14.3));
        assert_eq!(wfs.chart().as_str(), "Weight-for-height_Boys.pdf");

        let wfa = &points[0];
        assert_eq!(wfa.logical(), LogicalPoint::new(36.0, 14.3));
        assert_eq!(wfa.chart().as_str(), "Weight-and-height_Boys_2-19-years.pdf");
    }

    #[test]
    fn test_metric_subset() {
        let points = visit()
            .with_head_circumference(49.0)
            .plotted_points(&[Metric::HeadCircumference], 0)
            .unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].chart().as_str(), "Head-circumference_Boys.pdf");
    }

    #[test]
    fn test_validate() {
        assert!(visit().validate().is_ok());
        assert!(matches!(
            visit().with_weight(f64::NAN).validate(),
            Err(Error::NonFiniteInput { field: "weight_kg", .. })
        ));
        assert!(matches!(
            Measurement::new(Sex::Girls, -1.0, 0.0, 0.0).validate(),
            Err(Error::InvalidMeasurement(_))
        ));
        assert!(visit().with_stature(0.0).plotted_points(Metric::all(), 0).is_err());
    }

    #[test]
    fn test_total_age() {
        let m = Measurement::new(Sex::Girls, 1.0, 6.0, 30.4375);
        assert!((m.total_age_months() - 19.0).abs() < 1e-12);
    }
}
