//! LMS (Box-Cox) statistical model for growth percentiles.
//!
//! Each metric/sex pair has a sparse table of `{x, L, M, S}` samples sorted by
//! `x` (age in months, or stature in cm for weight-for-stature). Parameters
//! between samples are linearly interpolated; outside the table they clamp
//! to the nearest endpoint.
//!
//! ## Z-score
//!
//! | L | z |
//! |---|---|
//! | 0 | `ln(value / M) / S` |
//! | otherwise | `((value / M)^L - 1) / (L * S)` |
//!
//! The percentile is `100 * Φ(z)`, with `Φ` evaluated through the
//! Abramowitz-Stegun approximation of `erf` (absolute error ≤ 1.5e-7).

mod tables;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chart::{Metric, Sex};
use crate::error::{Error, Result};

/// One LMS sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LmsSample {
    /// Age in months or stature in cm.
    pub x: f64,
    /// Box-Cox power.
    #[serde(rename = "L")]
    pub l: f64,
    /// Median.
    #[serde(rename = "M")]
    pub m: f64,
    /// Coefficient of variation.
    #[serde(rename = "S")]
    pub s: f64,
}

impl LmsSample {
    /// Z-score of a measurement under these parameters.
    #[must_use]
    pub fn z_score(&self, value: f64) -> f64 {
        if self.l == 0.0 {
            (value / self.m).ln() / self.s
        } else {
            ((value / self.m).powf(self.l) - 1.0) / (self.l * self.s)
        }
    }
}

/// Ascending-by-x LMS samples for one metric and sex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LmsSample>", into = "Vec<LmsSample>")]
pub struct LmsTable {
    samples: Vec<LmsSample>,
}

impl LmsTable {
    /// Build a table, validating ordering and parameters.
    ///
    /// Requires at least two samples with strictly ascending, finite `x`,
    /// finite `L`, and positive `M` and `S`.
    pub fn new(samples: Vec<LmsSample>) -> Result<Self> {
        if samples.len() < 2 {
            return Err(Error::InvalidLmsTable(format!(
                "need at least 2 samples, got {}",
                samples.len()
            )));
        }
        for sample in &samples {
            if !(sample.x.is_finite() && sample.l.is_finite()) || !(sample.m > 0.0 && sample.s > 0.0)
            {
                return Err(Error::InvalidLmsTable(format!(
                    "invalid parameters at x={}",
                    sample.x
                )));
            }
        }
        if samples.windows(2).any(|w| w[1].x <= w[0].x) {
            return Err(Error::InvalidLmsTable(
                "sample x values must be strictly ascending".to_string(),
            ));
        }
        Ok(Self { samples })
    }

    /// The samples, ascending by x.
    #[must_use]
    pub fn samples(&self) -> &[LmsSample] {
        &self.samples
    }

    /// Interpolate L, M and S at `x`.
    ///
    /// At or below the first sample returns the first sample; at or above
    /// the last returns the last. No extrapolation. A NaN `x` clamps to the
    /// first sample.
    #[must_use]
    pub fn interpolate(&self, x: f64) -> LmsSample {
        let first = self.samples[0];
        let last = self.samples[self.samples.len() - 1];
        if x.is_nan() || x <= first.x {
            return first;
        }
        if x >= last.x {
            return last;
        }

        // First sample strictly above x; its predecessor is at or below.
        let upper = self.samples.partition_point(|s| s.x <= x);
        let a = self.samples[upper - 1];
        let b = self.samples[upper];
        if a.x == x {
            return a;
        }
        let t = (x - a.x) / (b.x - a.x);
        LmsSample {
            x,
            l: a.l + t * (b.l - a.l),
            m: a.m + t * (b.m - a.m),
            s: a.s + t * (b.s - a.s),
        }
    }
}

impl TryFrom<Vec<LmsSample>> for LmsTable {
    type Error = Error;

    fn try_from(samples: Vec<LmsSample>) -> Result<Self> {
        Self::new(samples)
    }
}

impl From<LmsTable> for Vec<LmsSample> {
    fn from(table: LmsTable) -> Self {
        table.samples
    }
}

/// Interpolate an LMS table at `x`.
#[must_use]
pub fn interpolate(table: &LmsTable, x: f64) -> LmsSample {
    table.interpolate(x)
}

/// Z-score and percentile pair; both `None` when no table applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ZScore {
    pub z: Option<f64>,
    pub percentile: Option<f64>,
}

impl ZScore {
    /// The absent result.
    #[must_use]
    pub fn absent() -> Self {
        Self::default()
    }

    /// Build from a z value.
    #[must_use]
    pub fn from_z(z: f64) -> Self {
        Self {
            z: Some(z),
            percentile: Some(z_to_percentile(z)),
        }
    }
}

/// Abramowitz-Stegun 7.1.26 approximation of the error function.
#[must_use]
pub fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();
    sign * y
}

/// Convert a z-score to a percentile in 0..=100.
#[must_use]
pub fn z_to_percentile(z: f64) -> f64 {
    100.0 * 0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// LMS tables for every metric/sex pair that has one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LmsModel {
    tables: BTreeMap<(Metric, Sex), LmsTable>,
}

/// On-disk shape: `{ metric: { sex: [ {x, L, M, S}, ... ] } }`.
type LmsFile = BTreeMap<Metric, BTreeMap<Sex, LmsTable>>;

impl LmsModel {
    /// A model with no tables; every z-score is absent.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in reference tables for all metrics and both sexes.
    #[must_use]
    pub fn builtin() -> Self {
        let mut tables = BTreeMap::new();
        for &metric in Metric::all() {
            for &sex in Sex::all() {
                let samples = tables::builtin_samples(metric, sex).to_vec();
                tables.insert((metric, sex), LmsTable { samples });
            }
        }
        Self { tables }
    }

    /// Parse tables from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: LmsFile = serde_json::from_str(json)?;
        let tables = file
            .into_iter()
            .flat_map(|(metric, by_sex)| {
                by_sex
                    .into_iter()
                    .map(move |(sex, table)| ((metric, sex), table))
            })
            .collect();
        Ok(Self { tables })
    }

    /// Load tables from a JSON file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Serialize tables to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        let mut file = LmsFile::new();
        for ((metric, sex), table) in &self.tables {
            file.entry(*metric).or_default().insert(*sex, table.clone());
        }
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Insert or replace a table.
    pub fn insert(&mut self, metric: Metric, sex: Sex, table: LmsTable) {
        self.tables.insert((metric, sex), table);
    }

    /// Table for a metric and sex, if any.
    #[must_use]
    pub fn table(&self, metric: Metric, sex: Sex) -> Option<&LmsTable> {
        self.tables.get(&(metric, sex))
    }

    /// True if the metric has a table for the sex.
    #[must_use]
    pub fn has_table(&self, metric: Metric, sex: Sex) -> bool {
        self.tables.contains_key(&(metric, sex))
    }

    /// Compute the z-score and percentile of `value` at `x`.
    ///
    /// Returns [`ZScore::absent`] when no table exists for the metric/sex
    /// or when the value is not a positive finite number.
    #[must_use]
    pub fn compute_z(&self, metric: Metric, sex: Sex, x: f64, value: f64) -> ZScore {
        let Some(table) = self.table(metric, sex) else {
            return ZScore::absent();
        };
        if !(value.is_finite() && value > 0.0 && x.is_finite()) {
            tracing::debug!(%metric, %sex, x, value, "measurement outside LMS domain");
            return ZScore::absent();
        }
        let z = table.interpolate(x).z_score(value);
        if z.is_finite() {
            ZScore::from_z(z)
        } else {
            ZScore::absent()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> LmsTable {
        LmsTable::new(vec![
            LmsSample { x: 0.0, l: 1.0, m: 50.0, s: 0.04 },
            LmsSample { x: 12.0, l: 0.5, m: 75.0, s: 0.03 },
            LmsSample { x: 24.0, l: 0.0, m: 87.0, s: 0.02 },
        ])
        .unwrap()
    }

    #[test]
    fn test_interpolate_exact_sample() {
        let t = table();
        assert_eq!(t.interpolate(12.0), t.samples()[1]);
        assert_eq!(t.interpolate(0.0), t.samples()[0]);
        assert_eq!(t.interpolate(24.0), t.samples()[2]);
    }

    #[test]
    fn test_interpolate_clamps() {
        let t = table();
        assert_eq!(t.interpolate(-5.0), t.samples()[0]);
        assert_eq!(t.interpolate(100.0), t.samples()[2]);
    }

    #[test]
    fn test_interpolate_midpoint() {
        let lms = interpolate(&table(), 6.0);
        assert!((lms.l - 0.75).abs() < 1e-12);
        assert!((lms.m - 62.5).abs() < 1e-12);
        assert!((lms.s - 0.035).abs() < 1e-12);
        assert_eq!(lms.x, 6.0);
    }

    #[test]
    fn test_table_validation() {
        assert!(LmsTable::new(vec![LmsSample { x: 0.0, l: 1.0, m: 1.0, s: 0.1 }]).is_err());
        assert!(
            LmsTable::new(vec![
                LmsSample { x: 5.0, l: 1.0, m: 1.0, s: 0.1 },
                LmsSample { x: 5.0, l: 1.0, m: 1.0, s: 0.1 },
            ])
            .is_err()
        );
        assert!(
            LmsTable::new(vec![
                LmsSample { x: 0.0, l: 1.0, m: 0.0, s: 0.1 },
                LmsSample { x: 5.0, l: 1.0, m: 1.0, s: 0.1 },
            ])
            .is_err()
        );
    }

    #[test]
    fn test_interpolate_non_finite_clamps() {
        let table = LmsTable::new(vec![
            LmsSample { x: 0.0, l: 1.0, m: 3.3, s: 0.14 },
            LmsSample { x: 12.0, l: 0.5, m: 9.6, s: 0.11 },
        ])
        .unwrap();
        assert_eq!(table.interpolate(f64::NAN), table.samples()[0]);
        assert_eq!(interpolate(&table, f64::NEG_INFINITY), table.samples()[0]);
        assert_eq!(table.interpolate(f64::INFINITY), table.samples()[1]);
    }

    #[test]
    fn test_erf_known_values() {
        assert!(erf(0.0).abs() < 1e-8);
        assert!((erf(1.0) - 0.8427007929).abs() < 2e-7);
        assert!((erf(-1.0) + 0.8427007929).abs() < 2e-7);
        assert!((erf(3.0) - 0.9999779095).abs() < 2e-7);
    }

    #[test]
    fn test_percentile_symmetry() {
        assert!((z_to_percentile(0.0) - 50.0).abs() < 1e-5);
        assert!((z_to_percentile(1.0) + z_to_percentile(-1.0) - 100.0).abs() < 1e-5);
        assert!((z_to_percentile(1.959964) - 97.5).abs() < 1e-3);
    }

    #[test]
    fn test_z_at_median_both_branches() {
        let mut model = LmsModel::empty();
        model.insert(Metric::WeightForAge, Sex::Boys, table());

        // L != 0 at x=0 and x=12
        for (x, m) in [(0.0, 50.0), (12.0, 75.0)] {
            let z = model.compute_z(Metric::WeightForAge, Sex::Boys, x, m);
            assert!(z.z.unwrap().abs() < 1e-12);
            assert!((z.percentile.unwrap() - 50.0).abs() < 1e-5);
        }

        // L == 0 at x=24
        let z = model.compute_z(Metric::WeightForAge, Sex::Boys, 24.0, 87.0);
        assert!(z.z.unwrap().abs() < 1e-12);
        assert!((z.percentile.unwrap() - 50.0).abs() < 1e-5);
    }

    #[test]
    fn test_z_log_branch() {
        let sample = LmsSample { x: 0.0, l: 0.0, m: 10.0, s: 0.1 };
        let z = sample.z_score(10.0 * 0.1f64.exp());
        assert!((z - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_table_is_absent() {
        let model = LmsModel::empty();
        let z = model.compute_z(Metric::HeadCircumference, Sex::Girls, 12.0, 45.0);
        assert_eq!(z, ZScore::absent());
    }

    #[test]
    fn test_non_positive_value_is_absent() {
        let model = LmsModel::builtin();
        assert_eq!(
            model.compute_z(Metric::WeightForAge, Sex::Boys, 12.0, 0.0),
            ZScore::absent()
        );
    }

    #[test]
    fn test_builtin_covers_all_pairs() {
        let model = LmsModel::builtin();
        for &metric in Metric::all() {
            for &sex in Sex::all() {
                assert!(model.has_table(metric, sex), "{metric}/{sex}");
            }
        }
        let z = model.compute_z(Metric::StatureForAge, Sex::Girls, 24.0, 85.713);
        assert!((z.percentile.unwrap() - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_json_roundtrip_shape() {
        let model = LmsModel::builtin();
        let json = model.to_json().unwrap();
        assert!(json.contains("\"weightForStature\""));
        assert!(json.contains("\"L\""));
        let parsed = LmsModel::from_json(&json).unwrap();
        assert_eq!(parsed, model);
    }

    #[test]
    fn test_json_rejects_unsorted() {
        let json = r#"{"weightForAge":{"boys":[{"x":12,"L":1,"M":9,"S":0.1},{"x":0,"L":1,"M":3,"S":0.1}]}}"#;
        assert!(LmsModel::from_json(json).is_err());
    }
}
