//! patina: compare before/after photographs of equipment.
//!
//! # Usage
//!
//! ```text
//! patina compare <BEFORE> <AFTER> --out <PATH> [OPTIONS]
//! patina batch <BEFORE_DIR> <AFTER_DIR> --out-dir <DIR> [--ext jpg]
//! ```
//!
//! Logs go to stderr and honor `RUST_LOG` (default `info`).

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use patina_export::{ObjectSummary, build_report, text_summary, to_json};
use patina_pipeline::CompareConfig;
use tracing_subscriber::EnvFilter;

/// Quantified change detection between two photographs of the same
/// equipment.
#[derive(Parser)]
#[command(name = "patina", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compare one before/after pair.
    Compare {
        /// "Before" image (PNG, JPEG, BMP, WebP).
        before: PathBuf,

        /// "After" image.
        after: PathBuf,

        /// Annotated output image; other artifacts are written beside it.
        #[arg(long)]
        out: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,

        /// Print the JSON record instead of the text summary.
        #[arg(long)]
        json: bool,

        /// Also write the report-builder JSON to this path.
        #[arg(long)]
        report: Option<PathBuf>,

        /// Print per-stage timing and counts.
        #[arg(long)]
        diagnostics: bool,
    },

    /// Compare every same-named pair in two directories.
    Batch {
        /// Directory of "before" images.
        before_dir: PathBuf,

        /// Directory of "after" images.
        after_dir: PathBuf,

        /// Directory receiving one subdirectory per pair and the summary.
        #[arg(long)]
        out_dir: PathBuf,

        /// Only pair files with this extension.
        #[arg(long, default_value = "jpg")]
        ext: String,

        #[command(flatten)]
        config: ConfigArgs,
    },
}

/// Comparison parameters shared by both subcommands.
#[derive(Args)]
struct ConfigArgs {
    /// Skip feature-based alignment.
    #[arg(long)]
    no_align: bool,

    /// Seed for the alignment sampler.
    #[arg(long, default_value_t = patina_pipeline::AlignmentConfig::DEFAULT_SEED)]
    seed: u64,

    /// Multi-scale factors, each in (0, 1].
    #[arg(long, value_delimiter = ',', default_values_t = CompareConfig::DEFAULT_SCALES)]
    scales: Vec<f64>,

    /// Working width ceiling in pixels.
    #[arg(long, default_value_t = CompareConfig::DEFAULT_MAX_WIDTH)]
    max_width: u32,

    /// Full comparison config as a JSON string.
    ///
    /// When provided, all other comparison flags are ignored. Missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

impl ConfigArgs {
    /// Build a [`CompareConfig`] from the flags or `--config-json`.
    fn to_config(&self) -> Result<CompareConfig, String> {
        if let Some(ref json) = self.config_json {
            return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
        }
        let mut config = CompareConfig {
            enable_alignment: !self.no_align,
            scales: self.scales.clone(),
            max_width: self.max_width,
            ..CompareConfig::default()
        };
        config.alignment.seed = self.seed;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let outcome = match cli.command {
        Command::Compare {
            before,
            after,
            out,
            config,
            json,
            report,
            diagnostics,
        } => config.to_config().and_then(|config| {
            run_compare(&before, &after, &out, &config, json, report.as_deref(), diagnostics)
        }),
        Command::Batch {
            before_dir,
            after_dir,
            out_dir,
            ext,
            config,
        } => config
            .to_config()
            .and_then(|config| run_batch(&before_dir, &after_dir, &out_dir, &ext, &config)),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn run_compare(
    before: &Path,
    after: &Path,
    out: &Path,
    config: &CompareConfig,
    json: bool,
    report: Option<&Path>,
    diagnostics: bool,
) -> Result<(), String> {
    let result = if diagnostics {
        let clock = patina_io::StdClock::new();
        let (result, diagnostics) = patina_io::compare_files_with_diagnostics(before, after, out, config, &clock)
            .map_err(|e| e.to_string())?;
        eprintln!("{}", diagnostics.report());
        result
    } else {
        patina_io::compare_files(before, after, out, config).map_err(|e| e.to_string())?
    };

    if json {
        println!("{}", to_json(&result).map_err(|e| e.to_string())?);
    } else {
        print!("{}", text_summary(&result));
    }

    if let Some(path) = report {
        let report = build_report(&result.analysis, ObjectSummary::default());
        let text = serde_json::to_string_pretty(&report).map_err(|e| format!("Error serializing report: {e}"))?;
        std::fs::write(path, text).map_err(|e| format!("Error writing {}: {e}", path.display()))?;
        eprintln!("Report written to {}", path.display());
    }
    Ok(())
}

fn run_batch(before_dir: &Path, after_dir: &Path, out_dir: &Path, ext: &str, config: &CompareConfig) -> Result<(), String> {
    let ext = Some(ext).filter(|e| !e.is_empty());
    let summary = patina_io::run_batch(before_dir, after_dir, out_dir, ext, config).map_err(|e| e.to_string())?;
    print!("{}", summary.report());
    println!(
        "Summary written to {}",
        out_dir.join(patina_io::SUMMARY_FILE_NAME).display()
    );
    Ok(())
}
