//! CSV import of measurement visits.
//!
//! Column names are matched case-insensitively, first against any name set
//! on the [`CsvSchema`], then against common aliases. Only the sex column is
//! required; age columns default to zero and measurement columns to absent.
//!
//! ## Example
//!
//! ```rust,ignore
//! use growth_chart::import::{CsvSchema, MeasurementImporter};
//!
//! let schema = CsvSchema::builder().weight_column("kg").build();
//! let visits = MeasurementImporter::new(schema).import("visits.csv")?;
//! ```

use std::io::Read;
use std::path::Path;

use crate::chart::Sex;
use crate::error::{Error, Result};
use crate::measurement::Measurement;

/// Column overrides for CSV import.
#[derive(Debug, Clone, Default)]
pub struct CsvSchema {
    pub sex_column: Option<String>,
    pub age_years_column: Option<String>,
    pub age_months_column: Option<String>,
    pub age_days_column: Option<String>,
    pub weight_column: Option<String>,
    pub stature_column: Option<String>,
    pub head_column: Option<String>,
}

impl CsvSchema {
    #[must_use]
    pub fn builder() -> CsvSchemaBuilder {
        CsvSchemaBuilder::default()
    }

    /// Try to find a column index by name (case-insensitive, with aliases).
    fn find_column(&self, headers: &[&str], primary: Option<&str>, aliases: &[&str]) -> Option<usize> {
        if let Some(idx) = primary.and_then(|name| find_header_index(headers, name)) {
            return Some(idx);
        }
        aliases.iter().find_map(|alias| find_header_index(headers, alias))
    }
}

/// Builder for [`CsvSchema`].
#[derive(Debug, Default)]
pub struct CsvSchemaBuilder {
    schema: CsvSchema,
}

impl CsvSchemaBuilder {
    #[must_use]
    pub fn sex_column(mut self, name: impl Into<String>) -> Self {
        self.schema.sex_column = Some(name.into());
        self
    }

    #[must_use]
    pub fn age_years_column(mut self, name: impl Into<String>) -> Self {
        self.schema.age_years_column = Some(name.into());
        self
    }

    #[must_use]
    pub fn age_months_column(mut self, name: impl Into<String>) -> Self {
        self.schema.age_months_column = Some(name.into());
        self
    }

    #[must_use]
    pub fn age_days_column(mut self, name: impl Into<String>) -> Self {
        self.schema.age_days_column = Some(name.into());
        self
    }

    #[must_use]
    pub fn weight_column(mut self, name: impl Into<String>) -> Self {
        self.schema.weight_column = Some(name.into());
        self
    }

    #[must_use]
    pub fn stature_column(mut self, name: impl Into<String>) -> Self {
        self.schema.stature_column = Some(name.into());
        self
    }

    #[must_use]
    pub fn head_column(mut self, name: impl Into<String>) -> Self {
        self.schema.head_column = Some(name.into());
        self
    }

    #[must_use]
    pub fn build(self) -> CsvSchema {
        self.schema
    }
}

struct Columns {
    sex: usize,
    years: Option<usize>,
    months: Option<usize>,
    days: Option<usize>,
    weight: Option<usize>,
    stature: Option<usize>,
    head: Option<usize>,
}

/// Reads [`Measurement`]s from CSV.
#[derive(Debug, Clone, Default)]
pub struct MeasurementImporter {
    schema: CsvSchema,
}

impl MeasurementImporter {
    #[must_use]
    pub fn new(schema: CsvSchema) -> Self {
        Self { schema }
    }

    /// Importer relying on alias detection only.
    #[must_use]
    pub fn auto_detect() -> Self {
        Self::default()
    }

    /// Import measurements from a CSV file.
    pub fn import(&self, path: impl AsRef<Path>) -> Result<Vec<Measurement>> {
        let reader = csv::Reader::from_path(path.as_ref())?;
        self.read(reader)
    }

    /// Import measurements from any reader.
    pub fn import_reader<R: Read>(&self, input: R) -> Result<Vec<Measurement>> {
        self.read(csv::Reader::from_reader(input))
    }

    fn columns(&self, headers: &[&str]) -> Result<Columns> {
        let s = &self.schema;
        let sex = s
            .find_column(headers, s.sex_column.as_deref(), &["sex", "gender"])
            .ok_or_else(|| Error::CsvImport {
                line: 1,
                reason: "Could not find sex/gender column".to_string(),
            })?;
        Ok(Columns {
            sex,
            years: s.find_column(headers, s.age_years_column.as_deref(), &["age_years", "years", "y"]),
            months: s.find_column(
                headers,
                s.age_months_column.as_deref(),
                &["age_months", "months", "m"],
            ),
            days: s.find_column(headers, s.age_days_column.as_deref(), &["age_days", "days", "d"]),
            weight: s.find_column(
                headers,
                s.weight_column.as_deref(),
                &["weight", "weight_kg", "wt", "kg"],
            ),
            stature: s.find_column(
                headers,
                s.stature_column.as_deref(),
                &["stature", "stature_cm", "height", "length", "height_cm", "length_cm"],
            ),
            head: s.find_column(
                headers,
                s.head_column.as_deref(),
                &["head", "head_circumference", "head_circumference_cm", "hc", "hc_cm"],
            ),
        })
    }

    fn read<R: Read>(&self, mut reader: csv::Reader<R>) -> Result<Vec<Measurement>> {
        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();
        let cols = self.columns(&header_refs)?;

        let mut measurements = Vec::new();
        for (line_num, record) in reader.records().enumerate() {
            // +2 for 1-based lines and the header
            let line = line_num + 2;
            let record = record.map_err(|e| Error::CsvImport {
                line,
                reason: e.to_string(),
            })?;

            let sex_field = record.get(cols.sex).unwrap_or("").trim();
            if sex_field.is_empty() {
                continue;
            }
            let sex = Sex::from_str_loose(sex_field).ok_or_else(|| Error::CsvImport {
                line,
                reason: format!("unrecognized sex '{sex_field}'"),
            })?;

            let number = |idx: Option<usize>, name: &str| -> Result<Option<f64>> {
                let Some(raw) = idx.and_then(|i| record.get(i)).map(str::trim) else {
                    return Ok(None);
                };
                if raw.is_empty() {
                    return Ok(None);
                }
                raw.parse().map(Some).map_err(|_| Error::CsvImport {
                    line,
                    reason: format!("invalid {name} '{raw}'"),
                })
            };

            let measurement = Measurement {
                sex,
                age_years: number(cols.years, "age in years")?.unwrap_or(0.0),
                age_months: number(cols.months, "age in months")?.unwrap_or(0.0),
                age_days: number(cols.days, "age in days")?.unwrap_or(0.0),
                weight_kg: number(cols.weight, "weight")?,
                stature_cm: number(cols.stature, "stature")?,
                head_circumference_cm: number(cols.head, "head circumference")?,
            };
            measurement.validate().map_err(|e| Error::CsvImport {
                line,
                reason: e.to_string(),
            })?;
            measurements.push(measurement);
        }

        tracing::debug!(count = measurements.len(), "imported measurements");
        Ok(measurements)
    }
}

/// Find a header index by name (case-insensitive).
fn find_header_index(headers: &[&str], name: &str) -> Option<usize> {
    let name_lower = name.to_lowercase();
    headers.iter().position(|h| h.to_lowercase() == name_lower)
}
