//! Measurement metrics and sexes.

use serde::{Deserialize, Serialize};

/// Canonical 9-curve percentile set printed on most charts.
pub const PERCENTILES_9: [u8; 9] = [3, 5, 10, 25, 50, 75, 90, 95, 97];

/// Canonical 7-curve percentile set (WHO weight-for-stature).
pub const PERCENTILES_7: [u8; 7] = [5, 10, 25, 50, 75, 90, 95];

/// Canonical 5-curve percentile set.
pub const PERCENTILES_5: [u8; 5] = [10, 25, 50, 75, 90];

/// Canonical 3-curve percentile set.
pub const PERCENTILES_3: [u8; 3] = [5, 50, 95];

/// An anthropometric measurement plotted on a growth chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    /// Weight (kg) against age (months).
    WeightForAge,
    /// Length/height (cm) against age (months).
    StatureForAge,
    /// Head circumference (cm) against age (months).
    HeadCircumference,
    /// Weight (kg) against length/height (cm).
    WeightForStature,
}

/// What the horizontal chart axis (and the LMS table x) measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum XAxis {
    /// Age in months.
    AgeMonths,
    /// Stature in centimetres.
    StatureCm,
}

impl Metric {
    /// Get all metric variants.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[
            Self::WeightForAge,
            Self::StatureForAge,
            Self::HeadCircumference,
            Self::WeightForStature,
        ]
    }

    /// Parse from string (case-insensitive, with aliases).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "weightforage" | "wfa" | "weight" => Some(Self::WeightForAge),
            "statureforage" | "heightforage" | "lengthforage" | "sfa" | "stature" | "height" => {
                Some(Self::StatureForAge)
            }
            "headcircumference" | "hc" | "head" | "hcfa" => Some(Self::HeadCircumference),
            "weightforstature" | "weightforheight" | "weightforlength" | "wfs" | "wfh" => {
                Some(Self::WeightForStature)
            }
            _ => None,
        }
    }

    /// Quantity on the horizontal axis.
    #[must_use]
    pub fn x_axis(self) -> XAxis {
        match self {
            Self::WeightForStature => XAxis::StatureCm,
            _ => XAxis::AgeMonths,
        }
    }

    /// Percentile curves printed on this metric's charts, ascending.
    ///
    /// Weight-for-stature charts carry the 7-curve WHO set; every other
    /// chart carries the 9-curve set.
    #[must_use]
    pub fn canonical_percentiles(self) -> &'static [u8] {
        match self {
            Self::WeightForStature => &PERCENTILES_7,
            _ => &PERCENTILES_9,
        }
    }

    /// Unit of the plotted (vertical) value.
    #[must_use]
    pub fn value_unit(self) -> &'static str {
        match self {
            Self::WeightForAge | Self::WeightForStature => "kg",
            Self::StatureForAge | Self::HeadCircumference => "cm",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WeightForAge => write!(f, "weightForAge"),
            Self::StatureForAge => write!(f, "statureForAge"),
            Self::HeadCircumference => write!(f, "headCircumference"),
            Self::WeightForStature => write!(f, "weightForStature"),
        }
    }
}

impl std::str::FromStr for Metric {
    type Err = crate::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_str_loose(s).ok_or_else(|| crate::Error::UnknownMetric(s.to_string()))
    }
}

/// Sex of the subject; selects the chart and LMS table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Boys,
    Girls,
}

impl Sex {
    /// Both sexes.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[Self::Boys, Self::Girls]
    }

    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "boys" | "boy" | "male" | "m" => Some(Self::Boys),
            "girls" | "girl" | "female" | "f" => Some(Self::Girls),
            _ => None,
        }
    }
}

impl std::fmt::Display for Sex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Boys => write!(f, "boys"),
            Self::Girls => write!(f, "girls"),
        }
    }
}

impl std::str::FromStr for Sex {
    type Err = crate::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_str_loose(s).ok_or_else(|| crate::Error::UnknownSex(s.to_string()))
    }
}
