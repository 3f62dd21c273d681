//! Printed percentile curve detection.
//!
//! A thin vertical slice of a growth chart is dominated by the printed
//! percentile curves crossing it. The detector averages luminance across a
//! narrow band around the requested column, takes the central-difference
//! gradient of that profile and keeps the strongest local peaks:
//!
//! 1. Band of `±half_band` columns around `x`, clamped to the surface.
//! 2. Row luminance `0.299R + 0.587G + 0.114B`, averaged over the band.
//! 3. `|lum[y+1] - lum[y-1]|` for interior rows.
//! 4. Adaptive threshold at the `threshold_quantile` of all gradients.
//! 5. Local maxima at or above the threshold, strongest first, each kept only
//!    if more than `min_separation` rows from every row already kept, up to
//!    `max_curves`.
//!
//! Rows are returned in ascending order.

use serde::{Deserialize, Serialize};

use crate::raster::RasterSurface;

/// Detector tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Columns averaged on each side of the sampled column.
    pub half_band: usize,
    /// Quantile of the gradient distribution used as the peak threshold.
    pub threshold_quantile: f64,
    /// Peaks closer than this (in rows) to a stronger peak are dropped.
    pub min_separation: usize,
    /// Maximum number of curves reported.
    pub max_curves: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            half_band: 6,
            threshold_quantile: 0.9,
            min_separation: 6,
            max_curves: 12,
        }
    }
}

/// Average band luminance for every row.
///
/// `center` is clamped to the surface. An empty surface yields an empty
/// profile.
#[must_use]
pub fn luminance_profile<R: RasterSurface + ?Sized>(
    surface: &R,
    center: usize,
    half_band: usize,
) -> Vec<f64> {
    let width = surface.width();
    let height = surface.height();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let center = center.min(width - 1);
    let start = center.saturating_sub(half_band);
    let end = (center + half_band).min(width - 1);
    let columns = (end - start + 1) as f64;

    (0..height)
        .map(|y| {
            let sum: f64 = (start..=end)
                .map(|x| {
                    let p = surface.pixel_at(x, y);
                    0.299 * f64::from(p.r) + 0.587 * f64::from(p.g) + 0.114 * f64::from(p.b)
                })
                .sum();
            sum / columns
        })
        .collect()
}

/// Central-difference gradient magnitude. Edge rows are zero.
#[must_use]
pub fn gradient(profile: &[f64]) -> Vec<f64> {
    let mut grad = vec![0.0; profile.len()];
    for y in 1..profile.len().saturating_sub(1) {
        grad[y] = (profile[y + 1] - profile[y - 1]).abs();
    }
    grad
}

fn quantile_threshold(grad: &[f64], quantile: f64) -> f64 {
    if grad.is_empty() {
        return 0.0;
    }
    let mut sorted = grad.to_vec();
    sorted.sort_by(f64::total_cmp);
    let q = quantile.clamp(0.0, 1.0);
    let idx = ((sorted.len() as f64 * q).floor() as usize).min(sorted.len() - 1);
    sorted[idx]
}

/// Rows at which printed curves cross column `x`.
///
/// A non-finite column or an empty surface yields no rows.
#[must_use]
pub fn detect_curves<R: RasterSurface + ?Sized>(
    surface: &R,
    x: f64,
    config: &DetectorConfig,
) -> Vec<usize> {
    let width = surface.width();
    let height = surface.height();
    if !x.is_finite() || width == 0 || height == 0 {
        return Vec::new();
    }
    let column = x.round().clamp(0.0, (width - 1) as f64) as usize;

    let profile = luminance_profile(surface, column, config.half_band);
    let grad = gradient(&profile);
    let threshold = quantile_threshold(&grad, config.threshold_quantile);

    let mut peaks: Vec<(usize, f64)> = (2..height.saturating_sub(2))
        .filter_map(|y| {
            let g = grad[y];
            let is_peak = g > 0.0 && g >= threshold && g >= grad[y - 1] && g >= grad[y + 1];
            is_peak.then_some((y, g))
        })
        .collect();

    // Strongest first; equal strength keeps the upper row
    peaks.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut chosen: Vec<usize> = Vec::with_capacity(config.max_curves);
    for (y, _) in peaks {
        if chosen.len() >= config.max_curves {
            break;
        }
        if chosen.iter().all(|&c| c.abs_diff(y) > config.min_separation) {
            chosen.push(y);
        }
    }
    chosen.sort_unstable();

    tracing::debug!(column, threshold, curves = chosen.len(), "detected curve rows");
    chosen
}
