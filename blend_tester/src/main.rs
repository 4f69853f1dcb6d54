//! blend_tester - compare the simd_blend strategies on a pair of real images.
//!
//! Decodes a base and an overlay image, runs every strategy for a number of
//! trials, prints timing and speedup statistics, and optionally writes the
//! final outputs as PNG files.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use flexi_logger::{Duplicate, FileSpec, Logger, LoggerHandle};
use log::{error, info};

use simd_blend::bench::{ContenderReport, StrategyStats, TrialPlan, TrialReport, run_trials};
use simd_blend::pipeline::{BlendConfig, BlendPipeline, ImageView, TailPolicy};

/// Saturating grayscale blend benchmark
///
/// Blends OVERLAY onto BASE (`base + overlay / alpha_inversed`, clamped to 255)
/// with the scalar, vector, row-parallel vector and partitioned strategies and
/// reports how much faster each one is than the scalar loop.
#[derive(Parser, Debug)]
#[command(name = "blend_tester")]
#[command(version, about, long_about = None)]
#[command(after_help = "EXIT CODES:
    0 - Success
    1 - An exact strategy produced output different from the scalar loop
    2 - Error (unreadable image, invalid parameter, etc.)")]
struct Cli {
    /// Base image; every output pixel starts from it
    #[arg(value_name = "BASE")]
    base: PathBuf,

    /// Overlay image; any size, converted to 8-bit grayscale
    #[arg(value_name = "OVERLAY")]
    overlay: PathBuf,

    /// Divisor applied to overlay samples (power of two for the vector strategies)
    #[arg(short, long, default_value_t = 4)]
    alpha_inversed: u32,

    /// Worker threads for the parallel strategies [default: logical CPUs]
    #[arg(short, long)]
    threads: Option<usize>,

    /// Number of timed trials
    #[arg(short = 'n', long, default_value_t = 1000)]
    trials: usize,

    /// How the vector strategies handle widths that are not a multiple of 16
    #[arg(long, value_enum, default_value = "scalar-fallback")]
    tail_policy: TailArg,

    /// Write the final output of every strategy as PNG into this directory
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Log specification, e.g. `info` or `debug,simd_blend=trace`
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Also write rotated log files into this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TailArg {
    ScalarFallback,
    Reject,
}

impl From<TailArg> for TailPolicy {
    fn from(arg: TailArg) -> Self {
        match arg {
            TailArg::ScalarFallback => TailPolicy::ScalarFallback,
            TailArg::Reject => TailPolicy::Reject,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _logger = match setup_logging(&cli.log_level, cli.log_dir.as_deref()) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(2);
        }
    };

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(2)
        }
    }
}

fn setup_logging(spec: &str, log_dir: Option<&Path>) -> Result<LoggerHandle> {
    let logger = Logger::try_with_str(spec).context("invalid log specification")?;
    let logger = match log_dir {
        Some(dir) => logger
            .log_to_file(FileSpec::default().directory(dir))
            .duplicate_to_stderr(Duplicate::All)
            .rotate(
                flexi_logger::Criterion::Size(1024 * 1024),
                flexi_logger::Naming::Timestamps,
                flexi_logger::Cleanup::KeepLogFiles(5),
            ),
        None => logger.log_to_stderr(),
    };
    logger.start().context("logger initialization failed")
}

/// Runs the benchmark. Returns `false` when an exact strategy disagreed with
/// the baseline.
fn run(cli: &Cli) -> Result<bool> {
    let base_image = image::open(&cli.base)
        .with_context(|| format!("failed to read base image {}", cli.base.display()))?
        .to_luma8();
    let overlay_image = image::open(&cli.overlay)
        .with_context(|| format!("failed to read overlay image {}", cli.overlay.display()))?
        .to_luma8();

    let base = ImageView::from_gray(&base_image).context("invalid base image")?;
    let overlay = ImageView::from_gray(&overlay_image).context("invalid overlay image")?;
    info!(
        "base {}x{} ({} indices), overlay {}x{}",
        base.cols(),
        base.rows(),
        base.len(),
        overlay.cols(),
        overlay.rows()
    );

    let defaults = BlendConfig::default();
    let config = BlendConfig {
        alpha_inversed: cli.alpha_inversed,
        thread_count: cli.threads.unwrap_or(defaults.thread_count),
        tail_policy: cli.tail_policy.into(),
    };
    let pipeline = BlendPipeline::new(config).context("failed to build blend pipeline")?;
    info!(
        "alpha_inversed {}, {} threads, {} lanes, {} trials",
        pipeline.config().alpha_inversed,
        pipeline.config().thread_count,
        pipeline.lane_backend().name(),
        cli.trials
    );

    let plan = TrialPlan {
        trials: cli.trials,
        ..TrialPlan::default()
    };
    let report = run_trials(&pipeline, &base, &overlay, &plan).context("benchmark failed")?;
    print_report(&report);

    let mut exact = true;
    for contender in &report.contenders {
        if contender.stats.strategy.is_exact() && contender.mismatched_trials > 0 {
            error!(
                "{} disagreed with {} in {} trials",
                contender.stats.strategy, report.baseline.strategy, contender.mismatched_trials
            );
            exact = false;
        }
    }

    if let Some(dir) = &cli.output_dir {
        save_outputs(report, dir)?;
    }
    Ok(exact)
}

fn format_stats(stats: &StrategyStats) -> String {
    format!(
        "{:<12} mean {:>10}  min {:>10}  max {:>10}",
        stats.strategy.name(),
        format!("{:.3?}", stats.mean()),
        format!("{:.3?}", stats.min),
        format!("{:.3?}", stats.max)
    )
}

fn format_contender(contender: &ContenderReport) -> String {
    let speedup = match contender.speedup.mean() {
        Some(mean) => format!("{mean:.2}x"),
        None => "n/a".to_string(),
    };
    let mut line = format!("{}  speedup {speedup:>7}", format_stats(&contender.stats));
    if contender.speedup.unresolved > 0 {
        line.push_str(&format!(" ({} unresolved)", contender.speedup.unresolved));
    }
    if contender.mismatched_trials > 0 {
        line.push_str(&format!(
            "  differs in {} trials (up to {} px)",
            contender.mismatched_trials, contender.max_mismatched_pixels
        ));
    }
    line
}

fn print_report(report: &TrialReport) {
    println!("{} trials", report.trials);
    if report.trials == 0 {
        return;
    }
    println!("{}", format_stats(&report.baseline));
    for contender in &report.contenders {
        println!("{}", format_contender(contender));
    }
}

fn save_outputs(report: TrialReport, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    for timed in report.last_results {
        let path = dir.join(format!("{}.png", timed.strategy.name()));
        timed
            .result
            .into_gray_image()
            .context("output buffer does not fit an image")?
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("wrote {}", path.display());
    }
    Ok(())
}
