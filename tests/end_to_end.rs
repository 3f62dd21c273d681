//! Classification over synthetic chart rasters, driven through a session.

use growth_chart::{
    AxisRange, AxisSource, CalibrationKey, CaptureOutcome, ChartId, ChartRaster, Classification,
    LmsModel, LogicalPoint, MemoryStore, Metric, PlotConfig, PlotSession, ReferenceClick, Sex,
    chart_for, detect_curves, DetectorConfig,
};
use imgref::ImgVec;
use rgb::RGB8;

const WIDTH: usize = 120;
const HEIGHT: usize = 200;
/// Rows of the printed curves for P3..P97.
const CURVE_ROWS: [usize; 9] = [20, 40, 60, 80, 100, 120, 140, 160, 180];

fn nine_line_raster(chart: &ChartId) -> ChartRaster {
    lined_raster(chart, 30)
}

fn lined_raster(chart: &ChartId, ink: u8) -> ChartRaster {
    let mut pixels = vec![RGB8::new(255, 255, 255); WIDTH * HEIGHT];
    for &row in &CURVE_ROWS {
        for x in 0..WIDTH {
            pixels[row * WIDTH + x] = RGB8::new(ink, ink, ink);
        }
    }
    ChartRaster::new(chart.clone(), ImgVec::new(pixels, WIDTH, HEIGHT))
}

/// Capture a calibration mapping logical 0..100 one-to-one onto pixels.
fn calibrate<S: growth_chart::KeyValueStore>(session: &mut PlotSession<S>, metric: Metric, chart: &ChartId) {
    let key = CalibrationKey::new(metric, Sex::Boys, chart.clone());
    session
        .begin_calibration(key, AxisSource::Declared(AxisRange::new(0.0, 100.0, 0.0, 100.0)))
        .unwrap();
    session.click(ReferenceClick::at(0.0, 0.0)).unwrap();
    session.click(ReferenceClick::at(100.0, 0.0)).unwrap();
    let outcome = session.click(ReferenceClick::at(0.0, 100.0)).unwrap();
    assert!(matches!(outcome, CaptureOutcome::Complete(_)));
}

#[test]
fn test_detects_nine_lines_at_any_column() {
    let raster = nine_line_raster(&ChartId::new("lines.png"));
    for x in [0.0, 7.5, 60.0, 119.0] {
        let rows = detect_curves(&raster, x, &DetectorConfig::default());
        assert_eq!(rows.len(), 9);
        for (found, expected) in rows.iter().zip(CURVE_ROWS) {
            assert!(found.abs_diff(expected) <= 1);
        }
    }
}

#[test]
fn test_on_and_between_classification() {
    let chart = chart_for(Metric::HeadCircumference, Sex::Boys, 10.0);
    let config = PlotConfig::builder().lms(LmsModel::empty()).build();
    let mut session = PlotSession::new(config, MemoryStore::new());
    calibrate(&mut session, Metric::HeadCircumference, &chart);
    session.set_raster(Some(nine_line_raster(&chart))).unwrap();

    // Logical y 100 sits on the P50 row; 90 lies between P25 and P50
    let on = session.add_point(Metric::HeadCircumference, Sex::Boys, LogicalPoint::new(10.0, 100.0), 10.0);
    let between = session.add_point(Metric::HeadCircumference, Sex::Boys, LogicalPoint::new(10.0, 90.0), 10.0);

    assert_eq!(session.classify_pending(), 2);
    assert_eq!(session.classification(on), Some(Classification::On { percentile: 50 }));
    assert_eq!(
        session.classification(between),
        Some(Classification::Between { lower: 25, upper: 50 })
    );

    let table = session.results();
    assert_eq!(table.len(), 2);
    assert_eq!(table.rows[0].point, between);
    assert_eq!(table.rows[0].z, None);
}

#[test]
fn test_uniform_raster_is_unknown() {
    let chart = chart_for(Metric::HeadCircumference, Sex::Boys, 10.0);
    let mut session = PlotSession::new(PlotConfig::default(), MemoryStore::new());
    calibrate(&mut session, Metric::HeadCircumference, &chart);
    let flat = ChartRaster::new(
        chart.clone(),
        ImgVec::new(vec![RGB8::new(240, 240, 240); WIDTH * HEIGHT], WIDTH, HEIGHT),
    );
    session.set_raster(Some(flat)).unwrap();

    let id = session.add_point(Metric::HeadCircumference, Sex::Boys, LogicalPoint::new(10.0, 45.0), 10.0);
    session.classify_pending();
    assert_eq!(session.classification(id), Some(Classification::Unknown));
}

#[test]
fn test_replacing_raster_reclassifies_nothing_stale() {
    let chart = chart_for(Metric::HeadCircumference, Sex::Boys, 10.0);
    let mut session = PlotSession::new(PlotConfig::default(), MemoryStore::new());
    calibrate(&mut session, Metric::HeadCircumference, &chart);

    let first = nine_line_raster(&chart);
    session.set_raster(Some(first.clone())).unwrap();
    let id = session.add_point(Metric::HeadCircumference, Sex::Boys, LogicalPoint::new(10.0, 100.0), 10.0);

    // Results computed against the first raster arrive after it was replaced
    let point = session.point(id).unwrap().clone();
    let calibration = session.calibration_for(point.metric(), point.sex(), point.chart());
    let jobs = [growth_chart::classify::ClassifyJob {
        point: &point,
        calibration: calibration.as_ref(),
    }];
    let results = growth_chart::classify::classify_all(
        &session.config().classifier,
        &jobs,
        &first,
        &session.config().lms,
    );

    let replacement = lined_raster(&chart, 60);
    assert_ne!(replacement.id(), first.id());
    session.set_raster(Some(replacement)).unwrap();

    assert_eq!(session.apply(results), 0);
    assert_eq!(session.classification(id), None);

    assert_eq!(session.classify_pending(), 1);
    assert!(session.classification(id).is_some());
}

#[test]
fn test_calibration_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibrations.json");
    let chart = ChartId::new("Head-circumference_Boys.pdf");

    {
        let config = PlotConfig::builder().store_path(&path).build();
        let mut session = PlotSession::open(config).unwrap();
        calibrate(&mut session, Metric::HeadCircumference, &chart);
    }

    let config = PlotConfig::builder().store_path(&path).build();
    let mut session = PlotSession::open(config).unwrap();
    let id = session.add_point(Metric::HeadCircumference, Sex::Boys, LogicalPoint::new(12.0, 46.0), 12.0);
    let px = session.pixel_position(id).unwrap();
    assert!((px.x - 12.0).abs() < 1e-9);
    assert!((px.y - 46.0).abs() < 1e-9);
}
