use growth_chart::{Metric, PlotConfig, Sex};

pub fn run(config: &PlotConfig, metric: Metric, sex: Sex, x: f64, value: f64) -> anyhow::Result<()> {
    if !config.lms.has_table(metric, sex) {
        anyhow::bail!("No LMS table for {metric} ({sex})");
    }

    let score = config.lms.compute_z(metric, sex, x, value);
    match (score.z, score.percentile) {
        (Some(z), Some(p)) => {
            println!("{metric} {sex}: {value} {}", metric.value_unit());
            println!("  z-score:    {z:.3}");
            println!("  percentile: {p:.1}");
        }
        _ => println!("{metric} {sex}: no z-score for value {value}"),
    }
    Ok(())
}
