//! Subcommand implementations.

pub mod calibrate;
pub mod classify;
pub mod detect;
pub mod plot;
pub mod zscore;

use std::path::Path;

use anyhow::Context;
use growth_chart::ChartId;

/// Chart identity of a raster file: its file name.
pub fn chart_id_for_path(path: &Path) -> anyhow::Result<ChartId> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("No file name in {}", path.display()))?;
    Ok(ChartId::new(name))
}
