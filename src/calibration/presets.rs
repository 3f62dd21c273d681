//! Calibrations shipped with pre-rendered chart rasters.
//!
//! The boys' 2-19 year weight chart raster was measured once:
//! (24 months, 5 kg) sits at pixel (236, 3307) and (228 months, 90 kg) at
//! (2244.5, 1453.5). The x and y references follow from those two corners.

use super::{
    AxisRange, CalibrationMethod, CalibrationRecord, CalibrationStore, KeyValueStore, PixelPoint,
    ReferencePoints,
};
use crate::chart::{ChartId, Metric, Sex};
use crate::error::Result;

/// A calibration bundled with a known raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub metric: Metric,
    pub sex: Sex,
    pub chart: ChartId,
    pub record: CalibrationRecord,
}

/// Weight-for-age, boys, on `Weight-and-height_Boys_2-19-years.png`.
#[must_use]
pub fn weight_for_age_boys_2_19() -> Preset {
    Preset {
        metric: Metric::WeightForAge,
        sex: Sex::Boys,
        chart: ChartId::new("Weight-and-height_Boys_2-19-years.png"),
        record: CalibrationRecord {
            axis: AxisRange::new(24.0, 228.0, 5.0, 90.0),
            points: ReferencePoints {
                origin: PixelPoint::new(236.0, 3307.0),
                x_max: PixelPoint::new(2244.5, 3307.0),
                y_max: PixelPoint::new(236.0, 1453.5),
            },
            method: CalibrationMethod::Preset,
            point_values: None,
            captured_at: None,
            source: Some("growth-chart presets".to_string()),
        },
    }
}

/// All shipped presets.
#[must_use]
pub fn all() -> Vec<Preset> {
    vec![weight_for_age_boys_2_19()]
}

/// Presets that apply to a chart.
#[must_use]
pub fn for_chart(chart: &ChartId) -> Vec<Preset> {
    all().into_iter().filter(|p| &p.chart == chart).collect()
}

impl<S: KeyValueStore> CalibrationStore<S> {
    /// Store a preset unless a calibration already exists for its key.
    ///
    /// Returns `true` if the preset was written.
    pub fn install_preset(&mut self, preset: &Preset) -> Result<bool> {
        if self.get(preset.metric, preset.sex, &preset.chart)?.is_some() {
            return Ok(false);
        }
        self.set(preset.metric, preset.sex, &preset.chart, &preset.record)?;
        tracing::debug!(chart = %preset.chart, metric = %preset.metric, "installed preset calibration");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::MemoryStore;
    use crate::calibration::LogicalPoint;
    use crate::transform::ChartTransform;

    #[test]
    fn test_preset_maps_far_corner() {
        let preset = weight_for_age_boys_2_19();
        let transform = ChartTransform::new(&preset.record);
        let px = transform.to_pixel(LogicalPoint::new(228.0, 90.0));
        assert!((px.x - 2244.5).abs() < 1e-9);
        assert!((px.y - 1453.5).abs() < 1e-9);
    }

    #[test]
    fn test_install_does_not_overwrite() {
        let preset = weight_for_age_boys_2_19();
        let mut store = CalibrationStore::new(MemoryStore::new());
        assert!(store.install_preset(&preset).unwrap());
        assert!(!store.install_preset(&preset).unwrap());
        let stored = store.get(preset.metric, preset.sex, &preset.chart).unwrap().unwrap();
        assert_eq!(stored.method, CalibrationMethod::Preset);
    }

    #[test]
    fn test_for_chart() {
        assert_eq!(for_chart(&ChartId::new("Weight-and-height_Boys_2-19-years.png")).len(), 1);
        assert!(for_chart(&ChartId::new("Head-circumference_Boys.pdf")).is_empty());
    }
}
