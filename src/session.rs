//! Plot session: calibration, plotting and classification for one subject.
//!
//! [`PlotSession`] threads every piece of state the workflow needs: the
//! calibration store, the single capture in progress, the current chart
//! raster, plotted points and their classifications. Nothing is global.
//!
//! Calibrations are looked up under the chart actually displayed, so a point
//! whose chart document is served by a raster alias uses the raster's
//! calibration.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::calibration::{
    AxisSource, CalibrationKey, CalibrationRecord, CalibrationStore, Calibrator, CaptureOutcome,
    CaptureStep, JsonFileStore, KeyValueStore, LogicalPoint, MemoryStore, PixelPoint,
    ReferenceClick, presets,
};
use crate::chart::{ChartId, Metric, Sex, chart_for, raster_aliases, resolve_raster_alias};
use crate::classify::{
    Classification, Classifier, ClassifyJob, PlottedPoint, PointId,
    RasterGate, TaggedClassification, classify_all,
};
use crate::detect::DetectorConfig;
use crate::error::Result;
use crate::lms::LmsModel;
use crate::measurement::Measurement;
use crate::raster::{ChartRaster, RasterId, RasterSource};
use crate::report::{ResultRow, ResultsTable};
use crate::transform;

/// Configuration for a plot session.
#[derive(Debug, Clone)]
pub struct PlotConfig {
    /// JSON file backing the calibration store; in-memory when unset.
    pub store_path: Option<PathBuf>,

    /// Directory holding chart rasters.
    pub charts_dir: Option<PathBuf>,

    /// Detector and on-curve tolerance.
    pub classifier: Classifier,

    /// Statistical reference tables.
    pub lms: LmsModel,

    /// Metrics plotted for each submitted measurement.
    pub metrics: Vec<Metric>,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PlotConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> PlotConfigBuilder {
        PlotConfigBuilder::default()
    }

    /// Open the configured calibration store.
    pub fn open_store(&self) -> Result<Box<dyn KeyValueStore>> {
        Ok(match &self.store_path {
            Some(path) => Box::new(JsonFileStore::open(path)?),
            None => Box::new(MemoryStore::new()),
        })
    }

    /// Raster source over the configured charts directory.
    #[cfg(feature = "decode")]
    #[must_use]
    pub fn raster_source(&self) -> Option<crate::raster::DirectoryRasterSource> {
        self.charts_dir
            .as_ref()
            .map(|dir| crate::raster::DirectoryRasterSource::new(dir.clone()))
    }
}

/// Builder for [`PlotConfig`].
#[derive(Debug, Default)]
pub struct PlotConfigBuilder {
    store_path: Option<PathBuf>,
    charts_dir: Option<PathBuf>,
    detector: Option<DetectorConfig>,
    on_curve_tolerance_px: Option<f64>,
    lms: Option<LmsModel>,
    metrics: Option<Vec<Metric>>,
}

impl PlotConfigBuilder {
    /// Persist calibrations to this JSON file.
    #[must_use]
    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Load chart rasters from this directory.
    #[must_use]
    pub fn charts_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.charts_dir = Some(path.into());
        self
    }

    #[must_use]
    pub fn detector(mut self, detector: DetectorConfig) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Maximum pixel distance for a point to count as on a curve.
    #[must_use]
    pub fn on_curve_tolerance_px(mut self, px: f64) -> Self {
        self.on_curve_tolerance_px = Some(px);
        self
    }

    #[must_use]
    pub fn lms(mut self, lms: LmsModel) -> Self {
        self.lms = Some(lms);
        self
    }

    #[must_use]
    pub fn metrics(mut self, metrics: Vec<Metric>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> PlotConfig {
        let defaults = Classifier::default();
        PlotConfig {
            store_path: self.store_path,
            charts_dir: self.charts_dir,
            classifier: Classifier {
                detector: self.detector.unwrap_or(defaults.detector),
                on_curve_tolerance_px: self
                    .on_curve_tolerance_px
                    .unwrap_or(defaults.on_curve_tolerance_px),
            },
            lms: self.lms.unwrap_or_else(LmsModel::builtin),
            metrics: self.metrics.unwrap_or_else(|| Metric::all().to_vec()),
        }
    }
}

/// Session state for plotting one subject.
///
/// # Example
///
/// ```rust,ignore
/// use growth_chart::{PlotConfig, PlotSession, Measurement, Sex};
///
/// let config = PlotConfig::builder().store_path("calibrations.json").build();
/// let mut session = PlotSession::open(config)?;
/// session.set_raster(Some(raster))?;
/// session.add_measurement(&Measurement::new(Sex::Boys, 3.0, 0.0, 0.0).with_weight(14.3))?;
/// session.classify_pending();
/// let table = session.results();
/// ```
pub struct PlotSession<S> {
    config: PlotConfig,
    store: CalibrationStore<S>,
    calibrator: Calibrator,
    raster: Option<ChartRaster>,
    points: Vec<PlottedPoint>,
    gate: RasterGate,
    next_id: u64,
}

impl PlotSession<Box<dyn KeyValueStore>> {
    /// Create a session over the store named by the configuration.
    pub fn open(config: PlotConfig) -> Result<Self> {
        let kv = config.open_store()?;
        Ok(Self::new(config, kv))
    }
}

impl<S: KeyValueStore> PlotSession<S> {
    #[must_use]
    pub fn new(config: PlotConfig, kv: S) -> Self {
        Self {
            config,
            store: CalibrationStore::new(kv),
            calibrator: Calibrator::new(),
            raster: None,
            points: Vec::new(),
            gate: RasterGate::new(),
            next_id: 0,
        }
    }

    #[must_use]
    pub fn config(&self) -> &PlotConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &CalibrationStore<S> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut CalibrationStore<S> {
        &mut self.store
    }

    /// The current raster, if any.
    #[must_use]
    pub fn raster(&self) -> Option<&ChartRaster> {
        self.raster.as_ref()
    }

    /// Replace the current raster.
    ///
    /// Results computed against the previous raster are dropped. For a raster
    /// that serves a chart document, calibrations stored under the document
    /// are carried over and any shipped preset is installed.
    pub fn set_raster(&mut self, raster: Option<ChartRaster>) -> Result<()> {
        self.gate.set_current_raster(raster.as_ref().map(ChartRaster::id));
        if let Some(r) = &raster {
            for (doc, alias) in raster_aliases() {
                if &alias == r.chart() {
                    self.store.migrate_alias(&doc, &alias)?;
                }
            }
            for preset in presets::for_chart(r.chart()) {
                self.store.install_preset(&preset)?;
            }
            tracing::debug!(chart = %r.chart(), raster = %r.id(), "raster is current");
        }
        self.raster = raster;
        Ok(())
    }

    /// Load the raster for `chart` and make it current.
    ///
    /// On failure the session is left without a current raster.
    pub fn load_raster<R: RasterSource + ?Sized>(
        &mut self,
        source: &R,
        chart: &ChartId,
    ) -> Result<RasterId> {
        match source.load(chart) {
            Ok(raster) => {
                let id = raster.id();
                self.set_raster(Some(raster))?;
                Ok(id)
            }
            Err(err) => {
                tracing::warn!(%chart, %err, "chart raster unavailable");
                self.set_raster(None)?;
                Err(err)
            }
        }
    }

    /// Plot a point on the standard chart for its metric, sex and age.
    pub fn add_point(
        &mut self,
        metric: Metric,
        sex: Sex,
        logical: LogicalPoint,
        age_months: f64,
    ) -> PointId {
        let id = PointId(self.next_id);
        self.next_id += 1;
        let chart = chart_for(metric, sex, age_months);
        self.points
            .push(PlottedPoint::new(id, metric, sex, chart, logical, age_months));
        id
    }

    /// Plot every configured metric the measurement has values for.
    pub fn add_measurement(&mut self, measurement: &Measurement) -> Result<Vec<PointId>> {
        let points = measurement.plotted_points(&self.config.metrics, self.next_id)?;
        self.next_id += points.len() as u64;
        let ids = points.iter().map(PlottedPoint::id).collect();
        self.points.extend(points);
        Ok(ids)
    }

    #[must_use]
    pub fn points(&self) -> &[PlottedPoint] {
        &self.points
    }

    #[must_use]
    pub fn point(&self, id: PointId) -> Option<&PlottedPoint> {
        self.points.iter().find(|p| p.id() == id)
    }

    /// Remove every plotted point and its classification.
    pub fn clear_points(&mut self) {
        self.points.clear();
    }

    /// Calibration for the chart a point is displayed on.
    ///
    /// Store failures are logged and treated as uncalibrated.
    #[must_use]
    pub fn calibration_for(&self, metric: Metric, sex: Sex, chart: &ChartId) -> Option<CalibrationRecord> {
        let displayed = resolve_raster_alias(chart);
        match self.store.get(metric, sex, &displayed) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(%metric, %sex, chart = %displayed, %err, "calibration lookup failed");
                None
            }
        }
    }

    /// Raster position of a point for overlay drawing, `None` when its
    /// chart is uncalibrated.
    #[must_use]
    pub fn pixel_position(&self, id: PointId) -> Option<PixelPoint> {
        let point = self.point(id)?;
        let calibration = self.calibration_for(point.metric(), point.sex(), point.chart());
        transform::to_pixel(calibration.as_ref(), point.logical())
    }

    /// Start capturing a calibration, cancelling any capture in progress.
    pub fn begin_calibration(&mut self, key: CalibrationKey, axis: AxisSource) -> Result<CaptureStep> {
        self.calibrator.begin(key, axis)
    }

    /// Abandon the capture in progress.
    pub fn cancel_calibration(&mut self) {
        self.calibrator.cancel();
    }

    #[must_use]
    pub fn is_calibrating(&self) -> bool {
        self.calibrator.is_active()
    }

    /// Feed a raster click to the capture in progress.
    pub fn click(&mut self, click: ReferenceClick) -> Result<CaptureOutcome> {
        self.calibrator.click(&mut self.store, click)
    }

    /// Classify every unclassified point on the current raster's chart.
    ///
    /// Returns the number of points classified.
    pub fn classify_pending(&mut self) -> usize {
        let Some(raster) = &self.raster else {
            return 0;
        };

        let pending: Vec<&PlottedPoint> = self
            .points
            .iter()
            .filter(|p| p.classification().is_none())
            .filter(|p| &resolve_raster_alias(p.chart()) == raster.chart())
            .collect();
        if pending.is_empty() {
            return 0;
        }

        let mut calibrations: HashMap<(Metric, Sex), Option<CalibrationRecord>> = HashMap::new();
        for p in &pending {
            calibrations
                .entry((p.metric(), p.sex()))
                .or_insert_with(|| self.calibration_for(p.metric(), p.sex(), p.chart()));
        }

        let jobs: Vec<ClassifyJob<'_>> = pending
            .iter()
            .map(|&point| ClassifyJob {
                point,
                calibration: calibrations
                    .get(&(point.metric(), point.sex()))
                    .and_then(Option::as_ref),
            })
            .collect();
        let results = classify_all(&self.config.classifier, &jobs, raster, &self.config.lms);
        self.apply(results)
    }

    /// Apply classifications computed elsewhere.
    ///
    /// Results for a raster that is no longer current are discarded, as
    /// are results for points already classified. Returns the number
    /// attached.
    pub fn apply(&mut self, results: impl IntoIterator<Item = TaggedClassification>) -> usize {
        let mut applied = 0;
        for tagged in results {
            if !self.gate.admits(&tagged) {
                continue;
            }
            let attached = self
                .points
                .iter()
                .find(|p| p.id() == tagged.point)
                .is_some_and(|p| p.attach_classification(tagged.classification));
            if attached {
                applied += 1;
            }
        }
        applied
    }

    /// Classification of a point, once computed.
    #[must_use]
    pub fn classification(&self, id: PointId) -> Option<Classification> {
        self.point(id).and_then(PlottedPoint::classification)
    }

    /// Results table, newest first.
    #[must_use]
    pub fn results(&self) -> ResultsTable {
        let mut table = ResultsTable::new();
        for point in &self.points {
            table.push(ResultRow::from_point(point, &self.config.lms));
        }
        table
    }
}
