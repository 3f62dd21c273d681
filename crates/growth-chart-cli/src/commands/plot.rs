use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use growth_chart::chart::resolve_raster_alias;
use growth_chart::{ChartId, MeasurementImporter, PlotConfig, PlotSession};

use crate::OutputFormat;

/// Plot every measurement in a CSV file and write the results table.
pub fn run(
    config: PlotConfig,
    input: PathBuf,
    output: Option<PathBuf>,
    format: OutputFormat,
    classify: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    let measurements = MeasurementImporter::auto_detect()
        .import(&input)
        .with_context(|| format!("Failed to import {}", input.display()))?;

    let mut session = PlotSession::open(config).context("Failed to open calibration store")?;
    for measurement in &measurements {
        session.add_measurement(measurement)?;
    }
    if verbose {
        eprintln!(
            "Imported {} measurement(s), {} point(s)",
            measurements.len(),
            session.points().len()
        );
    }

    if classify {
        match session.config().raster_source() {
            Some(source) => {
                let charts: BTreeSet<ChartId> = session
                    .points()
                    .iter()
                    .map(|p| resolve_raster_alias(p.chart()))
                    .collect();
                for chart in charts {
                    // Missing rasters leave their points unclassified
                    if session.load_raster(&source, &chart).is_ok() {
                        let n = session.classify_pending();
                        tracing::info!(%chart, classified = n, "classified points");
                    }
                }
            }
            None => tracing::warn!("no charts directory configured, skipping classification"),
        }
    }

    let table = session.results();
    match (output, format) {
        (Some(path), OutputFormat::Csv) => table.write_csv_file(&path)?,
        (Some(path), OutputFormat::Json) => table.write_json(&path)?,
        (None, OutputFormat::Csv) => table.write_csv(std::io::stdout().lock())?,
        (None, OutputFormat::Json) => {
            let mut out = std::io::stdout().lock();
            writeln!(out, "{}", table.to_json()?)?;
        }
    }
    Ok(())
}
