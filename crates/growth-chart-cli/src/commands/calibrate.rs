use anyhow::Context;
use growth_chart::calibration::presets;
use growth_chart::{
    AxisRange, AxisSource, CalibrationKey, CaptureOutcome, ChartId, LogicalPoint, Metric,
    PixelPoint, PlotConfig, PlotSession, ReferenceClick, Sex,
};

use crate::CalibrationsAction;

pub struct CalibrateArgs {
    pub metric: Metric,
    pub sex: Sex,
    pub chart: String,
    pub axis: Option<AxisRange>,
    /// Origin, x reference and y reference, in capture order.
    pub clicks: [(PixelPoint, Option<LogicalPoint>); 3],
}

/// Replay three reference clicks through the capture protocol.
pub fn run(config: PlotConfig, args: CalibrateArgs, verbose: bool) -> anyhow::Result<()> {
    let axis = match args.axis {
        Some(range) => AxisSource::Declared(range),
        None => {
            if args.clicks.iter().any(|(_, value)| value.is_none()) {
                anyhow::bail!(
                    "Either --axis or all of --origin-value, --x-max-value and --y-max-value are required"
                );
            }
            AxisSource::PointValues
        }
    };

    let mut session = PlotSession::open(config).context("Failed to open calibration store")?;
    let key = CalibrationKey::new(args.metric, args.sex, ChartId::new(args.chart));
    let mut step = session
        .begin_calibration(key.clone(), axis)
        .with_context(|| format!("Cannot calibrate {key}"))?;

    for (pixel, value) in args.clicks {
        if verbose {
            eprintln!("Step {}: {}", step.number(), step.prompt());
        }
        let click = ReferenceClick { pixel, value };
        match session.click(click)? {
            CaptureOutcome::Next(next) => step = next,
            CaptureOutcome::Rejected(rejection) => {
                session.cancel_calibration();
                anyhow::bail!("{} point rejected: {}", rejection.step, rejection.reason);
            }
            CaptureOutcome::Complete(record) => {
                println!("Saved {key}");
                println!("{}", serde_json::to_string_pretty(&record)?);
                return Ok(());
            }
        }
    }

    anyhow::bail!("Calibration of {key} did not complete")
}

/// List stored keys or show one record.
pub fn list(config: PlotConfig, action: CalibrationsAction) -> anyhow::Result<()> {
    let session = PlotSession::open(config).context("Failed to open calibration store")?;

    match action {
        CalibrationsAction::List => {
            let keys = session.store().list()?;
            if keys.is_empty() {
                println!("No calibrations stored");
            }
            for key in keys {
                println!("{key}");
            }
        }
        CalibrationsAction::Show { metric, sex, chart } => {
            let chart = ChartId::new(chart);
            match session.store().get(metric, sex, &chart)? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => anyhow::bail!("No calibration for {metric} {sex} on {chart}"),
            }
        }
    }
    Ok(())
}

/// Install every shipped preset that has no calibration yet.
pub fn preset(config: PlotConfig) -> anyhow::Result<()> {
    let mut session = PlotSession::open(config).context("Failed to open calibration store")?;

    for preset in presets::all() {
        let key = CalibrationKey::new(preset.metric, preset.sex, preset.chart.clone());
        if session.store_mut().install_preset(&preset)? {
            println!("Installed {key}");
        } else {
            println!("Kept existing {key}");
        }
    }
    Ok(())
}
