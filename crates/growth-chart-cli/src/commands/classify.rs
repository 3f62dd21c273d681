use std::path::PathBuf;

use anyhow::Context;
use growth_chart::chart::{XAxis, resolve_raster_alias};
use growth_chart::{ChartRaster, LogicalPoint, Metric, PlotConfig, PlotSession, Sex};

pub fn run(
    config: PlotConfig,
    metric: Metric,
    sex: Sex,
    age_months: f64,
    stature: Option<f64>,
    value: f64,
    raster: Option<PathBuf>,
) -> anyhow::Result<()> {
    let x = match metric.x_axis() {
        XAxis::AgeMonths => age_months,
        XAxis::StatureCm => stature.context("--stature is required for weight-for-stature")?,
    };

    let mut session = PlotSession::open(config).context("Failed to open calibration store")?;
    let id = session.add_point(metric, sex, LogicalPoint::new(x, value), age_months);
    let chart = session
        .point(id)
        .map(|p| resolve_raster_alias(p.chart()))
        .context("Point was not plotted")?;

    match raster {
        Some(path) => {
            let raster = ChartRaster::open(&path, chart.clone())
                .with_context(|| format!("Failed to load raster {}", path.display()))?;
            session.set_raster(Some(raster))?;
        }
        None => {
            let source = session
                .config()
                .raster_source()
                .context("No chart raster: pass --raster or --charts")?;
            session
                .load_raster(&source, &chart)
                .with_context(|| format!("Failed to load chart {chart}"))?;
        }
    }

    session.classify_pending();

    println!("{metric} {sex}: {value} {} on {chart}", metric.value_unit());
    match session.pixel_position(id) {
        Some(px) => println!("  pixel:          ({:.1}, {:.1})", px.x, px.y),
        None => println!("  pixel:          uncalibrated"),
    }
    if let Some(row) = session.results().rows.first() {
        if let (Some(z), Some(p)) = (row.z, row.percentile) {
            println!("  z-score:        {z:.3}");
            println!("  percentile:     {p:.1}");
        }
    }
    let classification = session
        .classification(id)
        .map_or_else(|| "unclassified".to_string(), |c| c.to_string());
    println!("  classification: {classification}");
    Ok(())
}
