//! flatscan-bench: CLI tool for detection tuning and diagnostics.
//!
//! Runs detect -> rectify -> filter on a given photo with configurable
//! parameters, printing per-stage timings and counts. Useful for:
//!
//! - Tuning blur sigma, Canny thresholds and the approximation tolerance
//! - Seeing why a photo falls back to the inset default corners
//! - Measuring per-stage durations to identify bottlenecks
//! - Producing a page JPEG or PDF from the command line
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin flatscan-bench -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use flatscan_export::{DEFAULT_JPEG_QUALITY, PdfOptions, encode_jpeg, to_pdf};
use flatscan_pipeline::diagnostics::duration_ms;
use flatscan_pipeline::{
    Clock, CornerSource, DetectDiagnostics, FilterKind, PipelineConfig, Point, Quad, RgbaImage,
    Scanner, StageDiagnostics, StageMetrics,
};
use tracing::{info, warn};

/// Detection parameter experimentation and diagnostics for flatscan.
///
/// Detects the page in a photo, rectifies it, applies a filter, and
/// prints per-stage timing and count diagnostics.
#[derive(Parser)]
#[command(name = "flatscan-bench", version)]
struct Cli {
    /// Path to the input photo (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Gaussian blur sigma.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BLUR_SIGMA)]
    blur_sigma: f32,

    /// Canny low threshold.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CANNY_LOW)]
    canny_low: f32,

    /// Canny high threshold.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CANNY_HIGH)]
    canny_high: f32,

    /// Polygon approximation tolerance as a fraction of contour perimeter.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_APPROX_EPSILON_RATIO)]
    epsilon_ratio: f64,

    /// Inset of the fallback corners as a fraction of the shorter side.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_INSET_RATIO)]
    inset_ratio: f64,

    /// Window size of the scan filter's local mean (odd, >= 3).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_SCAN_BLOCK_SIZE)]
    scan_block_size: u32,

    /// Offset subtracted from the local mean by the scan filter.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_SCAN_OFFSET)]
    scan_offset: f64,

    /// Page filter applied after rectification: original, grayscale,
    /// scan or magic.
    #[arg(long, default_value_t = FilterKind::Original)]
    filter: FilterKind,

    /// Use these corners instead of detection: eight comma-separated
    /// numbers `x,y,x,y,x,y,x,y` in any corner order.
    #[arg(long, allow_hyphen_values = true)]
    corners: Option<String>,

    /// Write the filtered page as JPEG.
    #[arg(long)]
    jpg: Option<PathBuf>,

    /// Write the filtered page as a one-page A4 PDF.
    #[arg(long)]
    pdf: Option<PathBuf>,

    /// Number of detection runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.  Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(PipelineConfig {
        blur_sigma: cli.blur_sigma,
        canny_low: cli.canny_low,
        canny_high: cli.canny_high,
        approx_epsilon_ratio: cli.epsilon_ratio,
        default_inset_ratio: cli.inset_ratio,
        scan_block_size: cli.scan_block_size,
        scan_offset: cli.scan_offset,
        ..PipelineConfig::default()
    })
}

/// Parse `x,y,x,y,x,y,x,y` into an ordered quadrilateral.
fn parse_corners(text: &str) -> Result<Quad, String> {
    let values = text
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .map_err(|e| format!("Error parsing --corners value {v:?}: {e}"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if values.len() != 8 {
        return Err(format!(
            "--corners needs 8 numbers (4 points), got {}",
            values.len()
        ));
    }
    let points: Vec<Point> = values
        .chunks_exact(2)
        .map(|xy| Point::new(xy[0], xy[1]))
        .collect();
    Quad::from_points(&points).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let config = config_from_cli(cli)?;
    let scanner = Scanner::new(config).map_err(|e| format!("Invalid config: {e}"))?;
    let manual = cli.corners.as_deref().map(parse_corners).transpose()?;

    let image_bytes = std::fs::read(&cli.image_path)
        .map_err(|e| format!("Error reading {}: {e}", cli.image_path.display()))?;
    let image = flatscan_pipeline::decode(&image_bytes)
        .map_err(|e| format!("Error decoding {}: {e}", cli.image_path.display()))?;

    eprintln!(
        "Image: {} ({} bytes, {}x{})",
        cli.image_path.display(),
        image_bytes.len(),
        image.width(),
        image.height(),
    );
    eprintln!("Config: {:#?}", scanner.config());
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);
    let mut detected = None;
    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }
        let (quad, diagnostics) = scanner
            .detect_with_diagnostics(&image, &StdClock)
            .map_err(|e| format!("Detection error: {e}"))?;
        if !cli.json {
            println!("{}", diagnostics.report());
        }
        detected = quad;
        all_diagnostics.push(diagnostics);
    }

    let (quad, source) = match (manual, detected) {
        (Some(quad), _) => (quad, CornerSource::Manual),
        (None, Some(quad)) => (quad, CornerSource::Detected),
        (None, None) => {
            warn!("no quadrilateral found, using inset default corners");
            (
                scanner.default_corners(image.width(), image.height()),
                CornerSource::Fallback,
            )
        }
    };
    info!(%source, ?quad, "corners chosen");

    let (page, rectify) = time_stage(|| {
        let page = scanner
            .rectify(&image, &quad)
            .map_err(|e| format!("Rectification error: {e}"))?;
        let metrics = StageMetrics::Rectify {
            out_width: page.width(),
            out_height: page.height(),
        };
        Ok((page, metrics))
    })?;

    let kind = cli.filter;
    let (filtered, filter) = time_stage(|| {
        Ok::<_, String>((
            scanner.apply_filter(&page, kind),
            StageMetrics::Filter { filter: kind },
        ))
    })?;

    if cli.json {
        let report = serde_json::json!({
            "detect": all_diagnostics,
            "corners": { "source": source, "quad": quad },
            "rectify": rectify,
            "filter": filter,
        });
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
        println!("{json}");
    } else {
        println!();
        println!("Corners ({source}): {:?}", quad.points());
        let total_ms = duration_ms(rectify.duration + filter.duration);
        println!("{}", rectify.report_line("Rectify", total_ms));
        println!("{}", filter.report_line("Filter", total_ms));
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    write_outputs(cli, &filtered)
}

/// Run `f` and wrap its metrics with the elapsed time.
fn time_stage<T, F>(f: F) -> Result<(T, StageDiagnostics), String>
where
    F: FnOnce() -> Result<(T, StageMetrics), String>,
{
    let start = StdClock.now();
    let (value, metrics) = f()?;
    let stage = StageDiagnostics {
        duration: StdClock.elapsed(&start),
        metrics,
    };
    Ok((value, stage))
}

fn write_outputs(cli: &Cli, page: &RgbaImage) -> Result<(), String> {
    if let Some(ref path) = cli.jpg {
        let bytes =
            encode_jpeg(page, DEFAULT_JPEG_QUALITY).map_err(|e| format!("JPEG export error: {e}"))?;
        std::fs::write(path, &bytes)
            .map_err(|e| format!("Error writing JPEG to {}: {e}", path.display()))?;
        eprintln!("JPEG written to {} ({} bytes)", path.display(), bytes.len());
    }

    if let Some(ref path) = cli.pdf {
        let title = cli
            .image_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("flatscan");
        let options = PdfOptions {
            title: title.to_string(),
            ..PdfOptions::default()
        };
        let bytes = to_pdf(&[page], &options).map_err(|e| format!("PDF export error: {e}"))?;
        std::fs::write(path, &bytes)
            .map_err(|e| format!("Error writing PDF to {}: {e}", path.display()))?;
        eprintln!("PDF written to {} ({} bytes)", path.display(), bytes.len());
    }
    Ok(())
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[DetectDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| duration_ms(d.total_duration))
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_count = all_diagnostics[0].stages().len();
    for index in 0..stage_count {
        let name = all_diagnostics[0].stages()[index].0;
        let stage_mean = all_diagnostics
            .iter()
            .map(|d| duration_ms(d.stages()[index].1.duration))
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }

    let found = all_diagnostics
        .iter()
        .filter(|d| d.summary.quad.is_some())
        .count();
    println!();
    println!("Detected in {found}/{} runs", all_diagnostics.len());
}
