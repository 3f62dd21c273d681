//! Results table for plotted measurements.
//!
//! One row per plotted point with its statistical standing and visual
//! classification, newest first. Serializes to JSON or CSV.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chart::{ChartId, Metric, Sex};
use crate::classify::{Classification, PlottedPoint, PointId};
use crate::error::Result;
use crate::lms::{LmsModel, ZScore};

/// One plotted measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub point: PointId,
    pub metric: Metric,
    pub sex: Sex,
    /// Plotted value (kg or cm).
    pub value: f64,
    pub age_months: f64,
    /// LMS z-score, absent without a table.
    pub z: Option<f64>,
    /// LMS percentile, absent without a table.
    pub percentile: Option<f64>,
    pub chart: ChartId,
    /// Visual classification, absent until classified.
    pub classification: Option<Classification>,
}

impl ResultRow {
    /// Build a row, computing the LMS standing of the point.
    #[must_use]
    pub fn from_point(point: &PlottedPoint, lms: &LmsModel) -> Self {
        let ZScore { z, percentile } =
            lms.compute_z(point.metric(), point.sex(), point.lms_x(), point.logical().y);
        Self {
            point: point.id(),
            metric: point.metric(),
            sex: point.sex(),
            value: point.logical().y,
            age_months: point.age_months(),
            z,
            percentile,
            chart: point.chart().clone(),
            classification: point.classification(),
        }
    }
}

/// Rows newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsTable {
    pub rows: Vec<ResultRow>,

    /// When this table was generated.
    #[serde(with = "chrono_serde")]
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Default for ResultsTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultsTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Add a row as the newest entry.
    pub fn push(&mut self, row: ResultRow) {
        self.rows.insert(0, row);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows for one metric, newest first.
    pub fn rows_for_metric(&self, metric: Metric) -> impl Iterator<Item = &ResultRow> {
        self.rows.iter().filter(move |r| r.metric == metric)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Write the table as CSV.
    pub fn write_csv<W: Write>(&self, out: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(out);

        wtr.write_record([
            "point",
            "metric",
            "sex",
            "value",
            "age_months",
            "z",
            "percentile",
            "chart",
            "classification",
        ])?;

        for row in &self.rows {
            wtr.write_record([
                &row.point.0.to_string(),
                &row.metric.to_string(),
                &row.sex.to_string(),
                &format!("{:.2}", row.value),
                &format!("{:.2}", row.age_months),
                &row.z.map_or(String::new(), |z| format!("{z:.3}")),
                &row.percentile.map_or(String::new(), |p| format!("{p:.1}")),
                &row.chart.to_string(),
                &row.classification.map_or(String::new(), |c| c.to_string()),
            ])?;
        }

        wtr.flush()?;
        Ok(())
    }

    pub fn write_csv_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_csv(file)
    }
}

mod chrono_serde {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        dt.to_rfc3339().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
