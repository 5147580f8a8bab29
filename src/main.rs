use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use dose_windows::{
    AnalysisParams, DoseLoader, DoseWindows, LengthUnit, ReportPlan, SliceOrder,
};

#[derive(Parser, Debug)]
#[command(name = "dose-windows")]
#[command(about = "Select significant axial dose slices and locate the dose maximum")]
struct Args {
    /// RT Dose files, or a single directory of .dcm files (doses are summed)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Fraction of the global maximum a slice must exceed
    #[arg(long)]
    threshold: Option<f64>,

    /// Windows closer than this are merged
    #[arg(long)]
    merge_distance: Option<f64>,

    /// Extension added to both ends of each window
    #[arg(long)]
    margin: Option<f64>,

    /// Length unit of grid coordinates and distances
    #[arg(long, value_enum, default_value = "cm")]
    unit: LengthUnit,

    /// Image slice positions (comma separated) to select report slices from
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    slice_positions: Option<Vec<f64>>,

    /// Keep every n-th selected slice
    #[arg(long, default_value = "2")]
    print_every: usize,

    /// List report slices from the lowest z up
    #[arg(long)]
    ascending: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Serialize)]
struct Output {
    #[serde(flatten)]
    result: DoseWindows,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<ReportPlan>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut params = AnalysisParams::from_env();
    if let Some(threshold) = args.threshold {
        params.threshold_fraction = threshold;
    }
    if let Some(merge_distance) = args.merge_distance {
        params.merge_distance = merge_distance;
    }
    if let Some(margin) = args.margin {
        params.margin = margin;
    }
    params.validate()?;

    let volume = match args.inputs.as_slice() {
        [dir] if dir.is_dir() => DoseLoader::load_from_directory(dir, args.unit),
        paths => DoseLoader::load_from_file_paths(paths, args.unit),
    }
    .context("failed to load RT Dose")?;

    let result = volume.analyze(&params)?;
    info!(
        windows = result.windows.len(),
        max_dose = result.max_dose,
        "dose analysis complete"
    );

    let order = if args.ascending {
        SliceOrder::Ascending
    } else {
        SliceOrder::Descending
    };
    let report = args
        .slice_positions
        .as_deref()
        .map(|positions| ReportPlan::new(&result, positions, order, args.print_every));

    let output = Output { result, report };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
