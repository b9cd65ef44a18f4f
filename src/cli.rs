//! Command line definitions and the non-interactive subcommands.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pic_scanner::config::history::{append_history, HistoryEntry};
use pic_scanner::config::{settings, AppConfig};
use pic_scanner::core::{
    gather_picture_files, lowest_unit_size, Concern, FileCollection, ImageScanner, InferenceClient,
    InterestLevel, InterestPolicy, ScanReport, ScanTargets,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::browse;

#[derive(Parser, Debug)]
#[command(name = "pic-scanner", version, about)]
pub struct Cli {
    /// Keep config and history in this directory instead of the platform default
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send images to the inference server and list what it found
    Scan(ScanArgs),
    /// Show size and extension totals for the pictures in a directory
    Stats {
        dir: PathBuf,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Scan a directory and step through its images interactively
    Browse {
        /// Defaults to the last directory loaded
        dir: Option<PathBuf>,
    },
    /// Print program information
    Info {
        #[arg(long)]
        authors: bool,
        #[arg(long)]
        description: bool,
        #[arg(long)]
        full_version: bool,
    },
    /// Inspect or reset the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Image files or directories
    #[arg(required = true)]
    pub paths: Vec<String>,
    #[arg(long)]
    pub threaded: bool,
    #[arg(long)]
    pub workers: Option<usize>,
    #[arg(long)]
    pub base_url: Option<String>,
    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
    /// Descend into subdirectories of directory arguments
    #[arg(short, long)]
    pub recursive: bool,
    /// Include the SHA-256 of every scanned file
    #[arg(long)]
    pub checksum: bool,
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum ConfigAction {
    Show,
    Path,
    Reset,
}

pub fn run(cli: Cli) -> Result<()> {
    let config_dir = cli.config_dir.as_deref();
    match cli.command {
        Commands::Scan(args) => run_scan(args, config_dir),
        Commands::Stats { dir, recursive } => run_stats(&dir, recursive, config_dir),
        Commands::Browse { dir } => browse::run(dir, config_dir),
        Commands::Info {
            authors,
            description,
            full_version,
        } => {
            print_info(authors, description, full_version);
            Ok(())
        }
        Commands::Config { action } => run_config(action, config_dir),
    }
}

#[derive(Serialize)]
struct ImageSummary<'a> {
    path: &'a Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    checksum: Option<String>,
    concerning: bool,
    concerns: &'a [Concern],
}

#[derive(Serialize)]
struct FailureSummary<'a> {
    path: &'a Path,
    error: String,
}

#[derive(Serialize)]
struct ScanSummary<'a> {
    images: Vec<ImageSummary<'a>>,
    failed: Vec<FailureSummary<'a>>,
}

fn run_scan(args: ScanArgs, config_dir: Option<&Path>) -> Result<()> {
    let mut config = settings::load_config(config_dir)?;
    config.threaded |= args.threaded;
    config.recursive |= args.recursive;
    if let Some(workers) = args.workers {
        config.worker_count = workers;
    }
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(timeout) = args.timeout {
        config.request_timeout_secs = timeout;
    }

    let mut targets = Vec::new();
    for raw in &args.paths {
        let path = PathBuf::from(raw);
        if path.is_dir() {
            targets.extend(gather_picture_files(&path, config.recursive, &config.exclude_dir_names)?);
        } else {
            targets.push(path);
        }
    }
    let targets: ScanTargets = targets.into();
    let policy = config.interest_policy_or_recommended();

    let client = InferenceClient::new(config.base_url.clone(), config.request_timeout())?;
    let scanner = ImageScanner::new(Arc::new(client), config.scan_options());

    let bar = ProgressBar::new(targets.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/dim}] {pos}/{len} {wide_msg}")?
            .progress_chars("━╸─"),
    );
    bar.enable_steady_tick(Duration::from_millis(80));
    let report = scanner.scan_with_progress(targets, Arc::new(AtomicBool::new(false)), |progress| {
        bar.set_position(progress.processed as u64);
        if let Some(name) = progress.current_path.file_name() {
            bar.set_message(name.to_string_lossy().into_owned());
        }
    })?;
    bar.finish_and_clear();

    let root = args.paths.first().map(PathBuf::from).unwrap_or_default();
    let history = HistoryEntry::new(root, report.scanned_count(), report.failed_count());
    if let Err(e) = append_history(history, config_dir) {
        tracing::warn!("Could not record scan history: {}", e);
    }

    if args.json {
        let summary = summarize(&report, &policy, args.checksum);
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_report(&report, &policy, args.checksum);
    }
    Ok(())
}

fn summarize<'a>(report: &'a ScanReport, policy: &InterestPolicy, checksum: bool) -> ScanSummary<'a> {
    ScanSummary {
        images: report
            .images
            .iter()
            .map(|image| ImageSummary {
                path: image.image_path(),
                checksum: checksum
                    .then(|| image.checksum().ok().map(str::to_string))
                    .flatten(),
                concerning: policy.is_concerning(image),
                concerns: image.concerns(),
            })
            .collect(),
        failed: report
            .failed
            .iter()
            .map(|f| FailureSummary {
                path: &f.path,
                error: f.error.to_string(),
            })
            .collect(),
    }
}

fn print_report(report: &ScanReport, policy: &InterestPolicy, checksum: bool) {
    for image in &report.images {
        let marker = if policy.is_concerning(image) { "!" } else { " " };
        println!("{marker} {}", image.image_path().display());
        if checksum {
            match image.checksum() {
                Ok(sum) => println!("    sha256 {sum}"),
                Err(e) => println!("    sha256 unavailable: {e}"),
            }
        }
        for concern in image.concerns() {
            let level = match policy.level_of(concern.name()) {
                Some(InterestLevel::Concerning) => "concerning",
                Some(InterestLevel::PointOfInterest) => "of interest",
                Some(InterestLevel::NonInteresting) | None => continue,
            };
            println!(
                "    {:<26} {:>5.1}%  {:<12} {:?}",
                concern.name(),
                concern.score_percentage(),
                level,
                concern.location()
            );
        }
    }
    for failure in &report.failed {
        eprintln!("failed: {failure}");
    }
    println!(
        "{} scanned, {} failed, {} with concerning content",
        report.scanned_count(),
        report.failed_count(),
        report.images.iter().filter(|i| policy.is_concerning(i)).count()
    );
}

fn run_stats(dir: &Path, recursive: bool, config_dir: Option<&Path>) -> Result<()> {
    let config = settings::load_config(config_dir)?;
    let collection = FileCollection::from_directory(dir, recursive, &config.exclude_dir_names)
        .with_context(|| format!("Could not read {}", dir.display()))?;

    println!("{collection}");
    for (extension, stats) in collection.extensions() {
        let (size, unit) = lowest_unit_size(stats.total_size);
        println!(
            "  {:<6} {:>6} file(s) {:>10.2} {}",
            if extension.is_empty() { "(none)" } else { extension.as_str() },
            stats.total_files,
            size,
            unit
        );
    }
    Ok(())
}

fn print_info(authors: bool, description: bool, full_version: bool) {
    let version = env!("CARGO_PKG_VERSION");
    if full_version {
        println!("{} {} ({})", env!("CARGO_PKG_NAME"), version, std::env::consts::ARCH);
    } else {
        println!("{} {}", env!("CARGO_PKG_NAME"), version);
    }
    if authors {
        println!("Authors: {}", env!("CARGO_PKG_AUTHORS"));
    }
    if description {
        println!("{}", env!("CARGO_PKG_DESCRIPTION"));
    }
}

fn run_config(action: ConfigAction, config_dir: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config: AppConfig = settings::load_config(config_dir)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            let path = settings::get_config_file_path(config_dir)
                .context("Could not determine config directory")?;
            println!("{}", path.display());
        }
        ConfigAction::Reset => {
            settings::reset_config(config_dir)?;
            println!("Configuration reset to defaults.");
        }
    }
    Ok(())
}
