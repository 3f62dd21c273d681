//! Built-in sparse LMS tables.
//!
//! Yearly samples of the WHO/CDC reference parameters, enough for linear
//! interpolation between anchors. Weight-for-stature is keyed by stature in
//! cm, every other metric by age in months.

use super::LmsSample;
use crate::chart::{Metric, Sex};

const fn s(x: f64, l: f64, m: f64, sigma: f64) -> LmsSample {
    LmsSample { x, l, m, s: sigma }
}

const WEIGHT_FOR_AGE_BOYS: &[LmsSample] = &[
    s(0.0, -0.3053, 3.3464, 0.14602),
    s(12.0, -0.0501, 9.626, 0.11135),
    s(24.0, 0.0903, 12.227, 0.10956),
    s(36.0, 0.3809, 14.3256, 0.10826),
    s(48.0, 0.5218, 16.003, 0.1069),
];

const WEIGHT_FOR_AGE_GIRLS: &[LmsSample] = &[
    s(0.0, -0.3833, 3.2322, 0.14171),
    s(12.0, -0.1118, 8.9477, 0.11316),
    s(24.0, 0.0843, 11.5718, 0.1108),
    s(36.0, 0.2297, 13.9003, 0.1094),
    s(48.0, 0.3149, 15.702, 0.1083),
];

const STATURE_FOR_AGE_BOYS: &[LmsSample] = &[
    s(0.0, 1.0, 49.9889, 0.03795),
    s(12.0, 1.0, 75.687, 0.0321),
    s(24.0, 1.0, 87.1525, 0.03134),
    s(36.0, 1.0, 95.1641, 0.03115),
    s(48.0, 1.0, 101.6042, 0.03119),
];

const STATURE_FOR_AGE_GIRLS: &[LmsSample] = &[
    s(0.0, 1.0, 49.2864, 0.0379),
    s(12.0, 1.0, 74.0831, 0.03227),
    s(24.0, 1.0, 85.713, 0.03167),
    s(36.0, 1.0, 94.2136, 0.03199),
    s(48.0, 1.0, 100.9977, 0.0324),
];

const HEAD_CIRCUMFERENCE_BOYS: &[LmsSample] = &[
    s(0.0, 1.0, 34.4618, 0.03686),
    s(12.0, 1.0, 46.0221, 0.02431),
    s(24.0, 1.0, 48.255, 0.02328),
    s(36.0, 1.0, 49.4742, 0.02295),
];

const HEAD_CIRCUMFERENCE_GIRLS: &[LmsSample] = &[
    s(0.0, 1.0, 33.8787, 0.03496),
    s(12.0, 1.0, 44.7997, 0.02409),
    s(24.0, 1.0, 47.0745, 0.02362),
    s(36.0, 1.0, 48.2732, 0.02342),
];

const WEIGHT_FOR_STATURE_BOYS: &[LmsSample] = &[
    s(65.0, -0.3521, 7.4327, 0.08217),
    s(75.0, -0.3521, 9.4831, 0.08217),
    s(85.0, -0.3521, 11.3172, 0.08217),
    s(95.0, -0.3521, 13.611, 0.08217),
];

const WEIGHT_FOR_STATURE_GIRLS: &[LmsSample] = &[
    s(65.0, -0.3833, 7.1264, 0.081),
    s(75.0, -0.3833, 9.1385, 0.081),
    s(85.0, -0.3833, 10.9773, 0.081),
    s(95.0, -0.3833, 13.3197, 0.081),
];

/// Built-in samples for a metric and sex.
pub(super) fn builtin_samples(metric: Metric, sex: Sex) -> &'static [LmsSample] {
    match (metric, sex) {
        (Metric::WeightForAge, Sex::Boys) => WEIGHT_FOR_AGE_BOYS,
        (Metric::WeightForAge, Sex::Girls) => WEIGHT_FOR_AGE_GIRLS,
        (Metric::StatureForAge, Sex::Boys) => STATURE_FOR_AGE_BOYS,
        (Metric::StatureForAge, Sex::Girls) => STATURE_FOR_AGE_GIRLS,
        (Metric::HeadCircumference, Sex::Boys) => HEAD_CIRCUMFERENCE_BOYS,
        (Metric::HeadCircumference, Sex::Girls) => HEAD_CIRCUMFERENCE_GIRLS,
        (Metric::WeightForStature, Sex::Boys) => WEIGHT_FOR_STATURE_BOYS,
        (Metric::WeightForStature, Sex::Girls) => WEIGHT_FOR_STATURE_GIRLS,
    }
}
