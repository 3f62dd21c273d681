//! Chart catalogue: which printed chart a measurement is plotted on.
//!
//! Charts are identified by their file name ([`ChartId`]). Weight and
//! stature for age switch from the 0-2 year chart to the 2-19 year chart at
//! 24 months; head circumference and weight-for-stature have a single chart
//! per sex.

mod metric;

use serde::{Deserialize, Serialize};

pub use metric::{
    Metric, PERCENTILES_3, PERCENTILES_5, PERCENTILES_7, PERCENTILES_9, Sex, XAxis,
};

/// Average month length in days.
pub const DAYS_PER_MONTH: f64 = 30.4375;

/// Age at which the infant charts give way to the 2-19 year charts.
pub const INFANT_CHART_LIMIT_MONTHS: f64 = 24.0;

/// Identifier of a chart document or raster (its file name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChartId(String);

impl ChartId {
    /// Create a chart id from a file name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The underlying file name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the chart is a directly loadable raster image.
    #[must_use]
    pub fn is_raster(&self) -> bool {
        let lower = self.0.to_lowercase();
        lower.ends_with(".png") || lower.ends_with(".jpg") || lower.ends_with(".jpeg")
    }
}

impl std::fmt::Display for ChartId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChartId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Convert a years/months/days age to fractional months.
#[must_use]
pub fn age_to_months(years: f64, months: f64, days: f64) -> f64 {
    years * 12.0 + months + days / DAYS_PER_MONTH
}

/// Select the standard chart for a metric, sex and age.
#[must_use]
pub fn chart_for(metric: Metric, sex: Sex, age_months: f64) -> ChartId {
    let sex_name = match sex {
        Sex::Boys => "Boys",
        Sex::Girls => "Girls",
    };
    let name = match metric {
        Metric::HeadCircumference => format!("Head-circumference_{sex_name}.pdf"),
        Metric::WeightForStature => format!("Weight-for-height_{sex_name}.pdf"),
        Metric::WeightForAge | Metric::StatureForAge => {
            if age_months < INFANT_CHART_LIMIT_MONTHS {
                format!("Weight-and-length_{sex_name}_0-2-years.pdf")
            } else {
                format!("Weight-and-height_{sex_name}_2-19-years.pdf")
            }
        }
    };
    ChartId(name)
}

/// Chart documents that are served by a pre-rendered raster.
const RASTER_ALIASES: &[(&str, &str)] = &[(
    "Weight-and-height_Boys_2-19-years.pdf",
    "Weight-and-height_Boys_2-19-years.png",
)];

/// Raster alias for a chart document, if one exists.
#[must_use]
pub fn raster_alias(chart: &ChartId) -> Option<ChartId> {
    RASTER_ALIASES
        .iter()
        .find(|(doc, _)| *doc == chart.as_str())
        .map(|(_, raster)| ChartId::new(*raster))
}

/// All registered (document, raster) alias pairs.
pub fn raster_aliases() -> impl Iterator<Item = (ChartId, ChartId)> {
    RASTER_ALIASES
        .iter()
        .map(|(doc, raster)| (ChartId::new(*doc), ChartId::new(*raster)))
}

/// The chart id that should actually be loaded as a raster.
#[must_use]
pub fn resolve_raster_alias(chart: &ChartId) -> ChartId {
    raster_alias(chart).unwrap_or_else(|| chart.clone())
}
