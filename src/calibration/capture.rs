//! Three-click calibration capture.
//!
//! Capture walks `AwaitOrigin → AwaitXMax → AwaitYMax → Complete`, consuming
//! one pixel click per step. [`CaptureState::advance`] is a pure transition;
//! the host wires real input events to it through a [`CaptureSession`], and
//! [`Calibrator`] owns the single active session and persists the result.
//!
//! A click that would collapse an axis (an x reference in the origin's
//! column, a y reference in the origin's row, or a non-increasing logical
//! value in point-values mode) is discarded and the state stays on the step
//! that produced it, forcing re-collection.

use serde::{Deserialize, Serialize};

use super::{
    AxisRange, CalibrationKey, CalibrationRecord, CalibrationStore, KeyValueStore, LogicalPoint,
    PixelPoint, PointValues, ReferencePoints,
};
use crate::error::{Error, Result};

/// A step of the capture protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureStep {
    Origin,
    XMax,
    YMax,
}

impl CaptureStep {
    /// Operator prompt for this step.
    #[must_use]
    pub fn prompt(self) -> &'static str {
        match self {
            Self::Origin => "Click origin (Xmin, Ymin)",
            Self::XMax => "Click Xmax",
            Self::YMax => "Click Ymax",
        }
    }

    /// 1-based position in the protocol.
    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            Self::Origin => 1,
            Self::XMax => 2,
            Self::YMax => 3,
        }
    }
}

impl std::fmt::Display for CaptureStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Origin => write!(f, "origin"),
            Self::XMax => write!(f, "xMax"),
            Self::YMax => write!(f, "yMax"),
        }
    }
}

/// Where the logical axis range comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisSource {
    /// Range typed in before clicking.
    Declared(AxisRange),
    /// Range derived from a logical value supplied with every click.
    PointValues,
}

/// One operator click.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceClick {
    pub pixel: PixelPoint,
    /// Logical value of the clicked point (point-values mode only).
    pub value: Option<LogicalPoint>,
}

impl ReferenceClick {
    /// A plain pixel click.
    #[must_use]
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            pixel: PixelPoint::new(x, y),
            value: None,
        }
    }

    /// A click carrying the logical value of the clicked point.
    #[must_use]
    pub fn with_value(mut self, x: f64, y: f64) -> Self {
        self.value = Some(LogicalPoint::new(x, y));
        self
    }
}

impl From<PixelPoint> for ReferenceClick {
    fn from(pixel: PixelPoint) -> Self {
        Self { pixel, value: None }
    }
}

/// Capture progress.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    AwaitOrigin,
    AwaitXMax {
        origin: ReferenceClick,
    },
    AwaitYMax {
        origin: ReferenceClick,
        x_max: ReferenceClick,
    },
    Complete(CalibrationRecord),
}

/// A click that was discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// Step that must be collected again.
    pub step: CaptureStep,
    pub reason: String,
}

/// Result of a pure transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: CaptureState,
    pub rejection: Option<Rejection>,
}

impl Transition {
    fn next(state: CaptureState) -> Self {
        Self { state, rejection: None }
    }

    fn reject(state: CaptureState, step: CaptureStep, reason: impl Into<String>) -> Self {
        Self {
            state,
            rejection: Some(Rejection {
                step,
                reason: reason.into(),
            }),
        }
    }
}

impl CaptureState {
    /// Step awaiting input, or `None` once complete.
    #[must_use]
    pub fn step(&self) -> Option<CaptureStep> {
        match self {
            Self::AwaitOrigin => Some(CaptureStep::Origin),
            Self::AwaitXMax { .. } => Some(CaptureStep::XMax),
            Self::AwaitYMax { .. } => Some(CaptureStep::YMax),
            Self::Complete(_) => None,
        }
    }

    /// Consume one click.
    ///
    /// Non-finite input is an error and leaves the caller's state untouched.
    /// Degenerate input yields a [`Rejection`] and the same step again.
    /// Clicks after completion are ignored.
    pub fn advance(&self, axis: &AxisSource, click: ReferenceClick) -> Result<Transition> {
        let Some(step) = self.step() else {
            return Ok(Transition::next(self.clone()));
        };
        check_click(axis, step, &click)?;

        Ok(match self {
            Self::AwaitOrigin => Transition::next(Self::AwaitXMax { origin: click }),
            Self::AwaitXMax { origin } => {
                if click.pixel.x == origin.pixel.x {
                    return Ok(Transition::reject(
                        self.clone(),
                        CaptureStep::XMax,
                        "x reference is in the same pixel column as the origin",
                    ));
                }
                if let (Some(o), Some(v)) = (origin.value, click.value) {
                    if v.x <= o.x {
                        return Ok(Transition::reject(
                            self.clone(),
                            CaptureStep::XMax,
                            format!("x value {} must exceed origin x value {}", v.x, o.x),
                        ));
                    }
                }
                Transition::next(Self::AwaitYMax {
                    origin: *origin,
                    x_max: click,
                })
            }
            Self::AwaitYMax { origin, x_max } => {
                if click.pixel.y == origin.pixel.y {
                    return Ok(Transition::reject(
                        self.clone(),
                        CaptureStep::YMax,
                        "y reference is in the same pixel row as the origin",
                    ));
                }
                if let (Some(o), Some(v)) = (origin.value, click.value) {
                    if v.y <= o.y {
                        return Ok(Transition::reject(
                            self.clone(),
                            CaptureStep::YMax,
                            format!("y value {} must exceed origin y value {}", v.y, o.y),
                        ));
                    }
                }
                let record = build_record(axis, origin, x_max, &click)?;
                match record.validate() {
                    Ok(()) => Transition::next(Self::Complete(record)),
                    Err(err) => Transition::reject(self.clone(), CaptureStep::YMax, err.to_string()),
                }
            }
            Self::Complete(_) => Transition::next(self.clone()),
        })
    }
}

fn check_click(axis: &AxisSource, step: CaptureStep, click: &ReferenceClick) -> Result<()> {
    let field = match step {
        CaptureStep::Origin => "origin",
        CaptureStep::XMax => "xMax",
        CaptureStep::YMax => "yMax",
    };
    if !click.pixel.is_finite() {
        let value = if click.pixel.x.is_finite() { click.pixel.y } else { click.pixel.x };
        return Err(Error::NonFiniteInput { field, value });
    }
    if matches!(axis, AxisSource::PointValues) {
        let value = click.value.ok_or(Error::MissingPointValue(step))?;
        if !value.is_finite() {
            let v = if value.x.is_finite() { value.y } else { value.x };
            return Err(Error::NonFiniteInput { field, value: v });
        }
    }
    Ok(())
}

fn build_record(
    axis: &AxisSource,
    origin: &ReferenceClick,
    x_max: &ReferenceClick,
    y_max: &ReferenceClick,
) -> Result<CalibrationRecord> {
    let points = ReferencePoints {
        origin: origin.pixel,
        x_max: x_max.pixel,
        y_max: y_max.pixel,
    };
    Ok(match axis {
        AxisSource::Declared(range) => CalibrationRecord::new(*range, points),
        AxisSource::PointValues => {
            let values = PointValues {
                origin: origin.value.ok_or(Error::MissingPointValue(CaptureStep::Origin))?,
                x_max: x_max.value.ok_or(Error::MissingPointValue(CaptureStep::XMax))?,
                y_max: y_max.value.ok_or(Error::MissingPointValue(CaptureStep::YMax))?,
            };
            CalibrationRecord::from_point_values(points, values)
        }
    })
}

/// What a click did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// Point accepted; the session now awaits this step.
    Next(CaptureStep),
    /// Point discarded; the session awaits this step again.
    Rejected(Rejection),
    /// All three points accepted and the record validated.
    Complete(CalibrationRecord),
}

/// An in-progress capture for one chart key.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    key: CalibrationKey,
    axis: AxisSource,
    state: CaptureState,
}

impl CaptureSession {
    /// Start a capture. A declared axis range is validated immediately.
    pub fn new(key: CalibrationKey, axis: AxisSource) -> Result<Self> {
        if let AxisSource::Declared(range) = &axis {
            range.validate()?;
        }
        Ok(Self {
            key,
            axis,
            state: CaptureState::AwaitOrigin,
        })
    }

    #[must_use]
    pub fn key(&self) -> &CalibrationKey {
        &self.key
    }

    #[must_use]
    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    #[must_use]
    pub fn axis(&self) -> &AxisSource {
        &self.axis
    }

    /// Feed one click through the state machine.
    pub fn click(&mut self, click: ReferenceClick) -> Result<CaptureOutcome> {
        let transition = self.state.advance(&self.axis, click)?;
        self.state = transition.state;
        if let Some(rejection) = transition.rejection {
            tracing::warn!(key = %self.key, step = %rejection.step, reason = %rejection.reason, "calibration point rejected");
            return Ok(CaptureOutcome::Rejected(rejection));
        }
        Ok(match &self.state {
            CaptureState::AwaitOrigin => CaptureOutcome::Next(CaptureStep::Origin),
            CaptureState::AwaitXMax { .. } => CaptureOutcome::Next(CaptureStep::XMax),
            CaptureState::AwaitYMax { .. } => CaptureOutcome::Next(CaptureStep::YMax),
            CaptureState::Complete(record) => CaptureOutcome::Complete(record.clone()),
        })
    }
}

/// Owner of the single active capture session.
#[derive(Debug, Default)]
pub struct Calibrator {
    session: Option<CaptureSession>,
}

impl Calibrator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start capturing `key`, cancelling any capture in progress.
    pub fn begin(&mut self, key: CalibrationKey, axis: AxisSource) -> Result<CaptureStep> {
        let session = CaptureSession::new(key, axis)?;
        if let Some(previous) = self.session.replace(session) {
            tracing::debug!(key = %previous.key, "cancelled in-progress calibration");
        }
        Ok(CaptureStep::Origin)
    }

    /// Abandon the active capture, if any.
    pub fn cancel(&mut self) -> Option<CaptureSession> {
        self.session.take()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    #[must_use]
    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    /// Feed a click to the active session, persisting the record on
    /// completion and leaving capture mode.
    ///
    /// If persisting fails the final click is discarded and the session
    /// stays on the y-axis step.
    pub fn click<S: KeyValueStore>(
        &mut self,
        store: &mut CalibrationStore<S>,
        click: ReferenceClick,
    ) -> Result<CaptureOutcome> {
        let session = self.session.as_mut().ok_or(Error::NoCaptureSession)?;
        let before = session.state.clone();
        let outcome = session.click(click)?;

        if let CaptureOutcome::Complete(record) = &outcome {
            let key = session.key.clone();
            let record = record.clone().captured_now();
            if let Err(err) = store.set(key.metric, key.sex, &key.chart, &record) {
                session.state = before;
                return Err(err);
            }
            self.session = None;
            return Ok(CaptureOutcome::Complete(record));
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::MemoryStore;
    use crate::chart::{ChartId, Metric, Sex};

    fn key() -> CalibrationKey {
        CalibrationKey::new(Metric::WeightForAge, Sex::Girls, ChartId::new("chart.png"))
    }

    fn declared() -> AxisSource {
        AxisSource::Declared(AxisRange::new(24.0, 240.0, 0.0, 100.0))
    }

    #[test]
    fn test_happy_path_persists_once() {
        let mut store = CalibrationStore::new(MemoryStore::new());
        let mut calibrator = Calibrator::new();
        calibrator.begin(key(), declared()).unwrap();

        assert_eq!(
            calibrator.click(&mut store, ReferenceClick::at(50.0, 900.0)).unwrap(),
            CaptureOutcome::Next(CaptureStep::XMax)
        );
        assert_eq!(
            calibrator.click(&mut store, ReferenceClick::at(850.0, 900.0)).unwrap(),
            CaptureOutcome::Next(CaptureStep::YMax)
        );
        let outcome = calibrator.click(&mut store, ReferenceClick::at(50.0, 100.0)).unwrap();
        let CaptureOutcome::Complete(record) = outcome else {
            panic!("expected completion");
        };
        assert!(record.captured_at.is_some());
        assert!(!calibrator.is_active());

        let stored = store.get(Metric::WeightForAge, Sex::Girls, &key().chart).unwrap().unwrap();
        assert_eq!(stored.points.x_max, PixelPoint::new(850.0, 900.0));
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_persist_stays_on_ymax() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let kv = crate::calibration::JsonFileStore::open(blocker.join("calibrations.json")).unwrap();
        let mut store = CalibrationStore::new(kv);
        let mut calibrator = Calibrator::new();
        calibrator.begin(key(), declared()).unwrap();
        calibrator.click(&mut store, ReferenceClick::at(50.0, 900.0)).unwrap();
        calibrator.click(&mut store, ReferenceClick::at(850.0, 900.0)).unwrap();

        assert!(calibrator.click(&mut store, ReferenceClick::at(50.0, 100.0)).is_err());
        assert_eq!(
            calibrator.session().unwrap().state().step(),
            Some(CaptureStep::YMax)
        );
        assert_eq!(store.get(Metric::WeightForAge, Sex::Girls, &key().chart).unwrap(), None);
    }

    #[test]
    fn test_xmax_same_column_rewinds() {
        let mut store = CalibrationStore::new(MemoryStore::new());
        let mut calibrator = Calibrator::new();
        calibrator.begin(key(), declared()).unwrap();
        calibrator.click(&mut store, ReferenceClick::at(50.0, 900.0)).unwrap();

        let outcome = calibrator.click(&mut store, ReferenceClick::at(50.0, 500.0)).unwrap();
        let CaptureOutcome::Rejected(rejection) = outcome else {
            panic!("expected rejection");
        };
        assert_eq!(rejection.step, CaptureStep::XMax);
        assert_eq!(
            calibrator.session().unwrap().state().step(),
            Some(CaptureStep::XMax)
        );
        assert!(store.list().unwrap().is_empty());

        // Re-collection proceeds normally
        assert_eq!(
            calibrator.click(&mut store, ReferenceClick::at(850.0, 900.0)).unwrap(),
            CaptureOutcome::Next(CaptureStep::YMax)
        );
    }

    #[test]
    fn test_ymax_same_row_rewinds() {
        let state = CaptureState::AwaitYMax {
            origin: ReferenceClick::at(50.0, 900.0),
            x_max: ReferenceClick::at(850.0, 900.0),
        };
        let t = state.advance(&declared(), ReferenceClick::at(50.0, 900.0)).unwrap();
        assert_eq!(t.state, state);
        assert_eq!(t.rejection.unwrap().step, CaptureStep::YMax);
    }

    #[test]
    fn test_non_finite_blocks_without_state_change() {
        let mut session = CaptureSession::new(key(), declared()).unwrap();
        let err = session.click(ReferenceClick::at(f64::NAN, 3.0));
        assert!(matches!(err, Err(Error::NonFiniteInput { .. })));
        assert_eq!(session.state(), &CaptureState::AwaitOrigin);
    }

    #[test]
    fn test_declared_axis_validated_at_begin() {
        let mut calibrator = Calibrator::new();
        let bad = AxisSource::Declared(AxisRange::new(10.0, 10.0, 0.0, 1.0));
        assert!(calibrator.begin(key(), bad).is_err());
        assert!(!calibrator.is_active());
    }

    #[test]
    fn test_point_values_mode() {
        let mut session = CaptureSession::new(key(), AxisSource::PointValues).unwrap();
        session
            .click(ReferenceClick::at(100.0, 800.0).with_value(65.0, 6.0))
            .unwrap();

        // Missing value is a validation error
        assert!(matches!(
            session.click(ReferenceClick::at(900.0, 800.0)),
            Err(Error::MissingPointValue(CaptureStep::XMax))
        ));

        // Non-increasing logical x is rejected
        let outcome = session
            .click(ReferenceClick::at(900.0, 800.0).with_value(60.0, 6.0))
            .unwrap();
        assert!(matches!(outcome, CaptureOutcome::Rejected(_)));

        session
            .click(ReferenceClick::at(900.0, 800.0).with_value(120.0, 6.0))
            .unwrap();
        let outcome = session
            .click(ReferenceClick::at(100.0, 50.0).with_value(65.0, 30.0))
            .unwrap();
        let CaptureOutcome::Complete(record) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(record.axis, AxisRange::new(65.0, 120.0, 6.0, 30.0));
        assert!(record.point_values.is_some());
    }

    #[test]
    fn test_begin_cancels_previous() {
        let mut store = CalibrationStore::new(MemoryStore::new());
        let mut calibrator = Calibrator::new();
        calibrator.begin(key(), declared()).unwrap();
        calibrator.click(&mut store, ReferenceClick::at(50.0, 900.0)).unwrap();

        let other = CalibrationKey::new(Metric::StatureForAge, Sex::Boys, ChartId::new("b.png"));
        calibrator.begin(other.clone(), declared()).unwrap();
        let session = calibrator.session().unwrap();
        assert_eq!(session.key(), &other);
        assert_eq!(session.state(), &CaptureState::AwaitOrigin);
    }

    #[test]
    fn test_click_without_session() {
        let mut store = CalibrationStore::new(MemoryStore::new());
        let mut calibrator = Calibrator::new();
        assert!(matches!(
            calibrator.click(&mut store, ReferenceClick::at(1.0, 1.0)),
            Err(Error::NoCaptureSession)
        ));
    }

    #[test]
    fn test_complete_ignores_further_clicks() {
        let mut session = CaptureSession::new(key(), declared()).unwrap();
        session.click(ReferenceClick::at(0.0, 100.0)).unwrap();
        session.click(ReferenceClick::at(100.0, 100.0)).unwrap();
        session.click(ReferenceClick::at(0.0, 0.0)).unwrap();
        let again = session.click(ReferenceClick::at(5.0, 5.0)).unwrap();
        assert!(matches!(again, CaptureOutcome::Complete(_)));
    }
}
