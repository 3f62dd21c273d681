//! Raster-tagged classification results.

use serde::{Deserialize, Serialize};

use super::{Classification, PointId};
use crate::raster::RasterId;

/// A classification together with the raster it was computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedClassification {
    pub point: PointId,
    pub raster: RasterId,
    pub classification: Classification,
}

/// Admits only results computed against the current raster.
///
/// The classification itself lives in the point's write-once slot; the gate
/// only tracks which raster is current.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterGate {
    raster: Option<RasterId>,
}

impl RasterGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raster whose results are accepted.
    #[must_use]
    pub fn current_raster(&self) -> Option<RasterId> {
        self.raster
    }

    pub fn set_current_raster(&mut self, raster: Option<RasterId>) {
        self.raster = raster;
    }

    /// Whether `tagged` was computed against the current raster.
    pub fn admits(&self, tagged: &TaggedClassification) -> bool {
        if self.raster != Some(tagged.raster) {
            tracing::warn!(
                point = %tagged.point,
                raster = %tagged.raster,
                "discarding classification computed against a replaced raster"
            );
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartId;
    use crate::raster::ChartRaster;

    fn raster_id(fill: u8) -> RasterId {
        ChartRaster::from_rgb_slice(ChartId::new("c.png"), &[fill; 12], 2, 2)
            .unwrap()
            .id()
    }

    fn tagged(point: u64, raster: RasterId) -> TaggedClassification {
        TaggedClassification {
            point: PointId(point),
            raster,
            classification: Classification::On { percentile: 50 },
        }
    }

    #[test]
    fn test_admits_current() {
        let mut gate = RasterGate::new();
        let a = raster_id(1);
        gate.set_current_raster(Some(a));
        assert!(gate.admits(&tagged(1, a)));
        assert_eq!(gate.current_raster(), Some(a));
    }

    #[test]
    fn test_stale_result_refused() {
        let mut gate = RasterGate::new();
        let a = raster_id(1);
        gate.set_current_raster(Some(a));
        let in_flight = tagged(7, a);

        gate.set_current_raster(Some(raster_id(2)));
        assert!(!gate.admits(&in_flight));
    }

    #[test]
    fn test_no_raster_admits_nothing() {
        let mut gate = RasterGate::new();
        assert!(!gate.admits(&tagged(1, raster_id(1))));

        let a = raster_id(1);
        gate.set_current_raster(Some(a));
        gate.set_current_raster(None);
        assert!(!gate.admits(&tagged(1, a)));
    }
}
