use std::path::PathBuf;

use anyhow::Context;
use growth_chart::{ChartRaster, DetectorConfig, RasterSurface, detect_curves};

pub fn run(
    raster: PathBuf,
    x: f64,
    half_band: Option<usize>,
    max_curves: Option<usize>,
    verbose: bool,
) -> anyhow::Result<()> {
    let chart = super::chart_id_for_path(&raster)?;
    let raster = ChartRaster::open(&raster, chart)
        .with_context(|| format!("Failed to load raster {}", raster.display()))?;

    let mut config = DetectorConfig::default();
    if let Some(half_band) = half_band {
        config.half_band = half_band;
    }
    if let Some(max_curves) = max_curves {
        config.max_curves = max_curves;
    }

    if verbose {
        eprintln!(
            "{} ({}x{}, id {})",
            raster.chart(),
            raster.width(),
            raster.height(),
            raster.id()
        );
    }

    let rows = detect_curves(&raster, x, &config);
    println!("{} curve(s) at x={x}", rows.len());
    for row in rows {
        println!("  y={row}");
    }
    Ok(())
}
