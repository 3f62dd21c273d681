//! growth-chart CLI - growth chart calibration and percentile classification

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use growth_chart::{AxisRange, LogicalPoint, Metric, PixelPoint, PlotConfig, Sex};
use tracing_subscriber::EnvFilter;

mod commands;

/// Growth chart calibration, LMS percentiles and printed-curve classification.
#[derive(Parser)]
#[command(name = "growth-chart")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Calibration store (JSON file)
    #[arg(long, global = true, env = "GROWTH_CHART_STORE", default_value = "calibrations.json")]
    store: PathBuf,

    /// Directory holding chart rasters
    #[arg(long, global = true, env = "GROWTH_CHART_DIR")]
    charts: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the LMS z-score and percentile of a measurement
    Zscore {
        /// Metric (weightForAge, statureForAge, headCircumference, weightForStature)
        #[arg(long)]
        metric: Metric,

        /// Sex (boys, girls)
        #[arg(long)]
        sex: Sex,

        /// Age in months, or stature in cm for weight-for-stature
        #[arg(long)]
        x: f64,

        /// Measured value (kg or cm)
        #[arg(long)]
        value: f64,
    },

    /// Detect printed curve rows at a raster column
    Detect {
        /// Chart raster (PNG or JPEG)
        raster: PathBuf,

        /// Pixel column to sample
        #[arg(long)]
        x: f64,

        /// Columns averaged on each side of the sampled column
        #[arg(long)]
        half_band: Option<usize>,

        /// Maximum curves reported
        #[arg(long)]
        max_curves: Option<usize>,
    },

    /// Capture a calibration from three reference clicks
    Calibrate {
        #[arg(long)]
        metric: Metric,

        #[arg(long)]
        sex: Sex,

        /// Chart file name the calibration applies to
        #[arg(long)]
        chart: String,

        /// Declared axis range as xmin,xmax,ymin,ymax
        #[arg(long, value_parser = parse_axis)]
        axis: Option<AxisRange>,

        /// Origin pixel as x,y
        #[arg(long, value_parser = parse_pixel)]
        origin: PixelPoint,

        /// X reference pixel as x,y
        #[arg(long, value_parser = parse_pixel)]
        x_max: PixelPoint,

        /// Y reference pixel as x,y
        #[arg(long, value_parser = parse_pixel)]
        y_max: PixelPoint,

        /// Chart value at the origin (when no axis is declared)
        #[arg(long, value_parser = parse_logical)]
        origin_value: Option<LogicalPoint>,

        /// Chart value at the x reference
        #[arg(long, value_parser = parse_logical)]
        x_max_value: Option<LogicalPoint>,

        /// Chart value at the y reference
        #[arg(long, value_parser = parse_logical)]
        y_max_value: Option<LogicalPoint>,
    },

    /// List or show stored calibrations
    Calibrations {
        #[command(subcommand)]
        action: CalibrationsAction,
    },

    /// Install the shipped preset calibrations
    Preset,

    /// Classify one measurement against its chart
    Classify {
        #[arg(long)]
        metric: Metric,

        #[arg(long)]
        sex: Sex,

        /// Age in months
        #[arg(long)]
        age_months: f64,

        /// Stature in cm (horizontal axis of weight-for-stature)
        #[arg(long)]
        stature: Option<f64>,

        /// Measured value (kg or cm)
        #[arg(long)]
        value: f64,

        /// Chart raster to use instead of looking in the charts directory
        #[arg(long)]
        raster: Option<PathBuf>,
    },

    /// Plot measurements from CSV and write the results table
    Plot {
        /// Input CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "csv")]
        format: OutputFormat,

        /// Skip visual classification
        #[arg(long)]
        no_classify: bool,
    },
}

#[derive(Subcommand)]
pub enum CalibrationsAction {
    /// List stored calibration keys
    List,

    /// Show one calibration record
    Show {
        #[arg(long)]
        metric: Metric,

        #[arg(long)]
        sex: Sex,

        #[arg(long)]
        chart: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Json,
}

fn parse_numbers<const N: usize>(s: &str) -> Result<[f64; N], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(format!("expected {N} comma-separated numbers, got '{s}'"));
    }
    let mut out = [0.0; N];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part
            .parse()
            .map_err(|_| format!("'{part}' is not a number"))?;
    }
    Ok(out)
}

fn parse_pixel(s: &str) -> Result<PixelPoint, String> {
    let [x, y] = parse_numbers::<2>(s)?;
    Ok(PixelPoint::new(x, y))
}

fn parse_logical(s: &str) -> Result<LogicalPoint, String> {
    let [x, y] = parse_numbers::<2>(s)?;
    Ok(LogicalPoint::new(x, y))
}

fn parse_axis(s: &str) -> Result<AxisRange, String> {
    let [xmin, xmax, ymin, ymax] = parse_numbers::<4>(s)?;
    Ok(AxisRange::new(xmin, xmax, ymin, ymax))
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut builder = PlotConfig::builder().store_path(&cli.store);
    if let Some(dir) = &cli.charts {
        builder = builder.charts_dir(dir);
    }
    let config = builder.build();

    match cli.command {
        Commands::Zscore { metric, sex, x, value } => {
            commands::zscore::run(&config, metric, sex, x, value)
        }
        Commands::Detect { raster, x, half_band, max_curves } => {
            commands::detect::run(raster, x, half_band, max_curves, cli.verbose)
        }
        Commands::Calibrate {
            metric,
            sex,
            chart,
            axis,
            origin,
            x_max,
            y_max,
            origin_value,
            x_max_value,
            y_max_value,
        } => commands::calibrate::run(
            config,
            commands::calibrate::CalibrateArgs {
                metric,
                sex,
                chart,
                axis,
                clicks: [
                    (origin, origin_value),
                    (x_max, x_max_value),
                    (y_max, y_max_value),
                ],
            },
            cli.verbose,
        ),
        Commands::Calibrations { action } => commands::calibrate::list(config, action),
        Commands::Preset => commands::calibrate::preset(config),
        Commands::Classify { metric, sex, age_months, stature, value, raster } => {
            commands::classify::run(config, metric, sex, age_months, stature, value, raster)
        }
        Commands::Plot { input, output, format, no_classify } => {
            commands::plot::run(config, input, output, format, !no_classify, cli.verbose)
        }
    }
}
