//! Line-oriented terminal front end for the browsing controller.
//!
//! Each line read from stdin is resolved through the control registry and
//! dispatched as a command. Events coming back from the controller are
//! rendered by a task on the runtime.

use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use pic_scanner::app::commands;
use pic_scanner::app::controls::{ControlRegistry, KeyFormat, MainBlueprint};
use pic_scanner::app::events::UserEvent;
use pic_scanner::app::state::AppState;
use pic_scanner::app::view_model::ViewState;
use pic_scanner::config::settings;
use pic_scanner::core::{InferenceClient, InterestLevel};
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub fn run(dir: Option<PathBuf>, config_dir: Option<&Path>) -> Result<()> {
    let config = settings::load_config(config_dir)?;
    let Some(dir) = dir.or_else(|| config.last_directory.clone()) else {
        bail!("No directory given and no previous directory recorded");
    };

    // The blocking client owns its own runtime and must be built outside ours.
    let client = InferenceClient::new(config.base_url.clone(), config.request_timeout())?;
    let state = Arc::new(Mutex::new(
        AppState::new(config, Arc::new(client))
            .with_directories(config_dir.map(Path::to_path_buf), config_dir.map(Path::to_path_buf)),
    ));

    let mut registry = ControlRegistry::new();
    MainBlueprint::create(KeyFormat::default().with_prefix("main"), &mut registry)?;
    print_help(&registry);

    let rt = tokio::runtime::Runtime::new()?;
    let (tx, mut rx) = mpsc::unbounded_channel::<UserEvent>();
    rt.spawn(async move {
        let mut bar = None;
        while let Some(event) = rx.recv().await {
            render(event, &mut bar);
        }
    });

    {
        let _guard = rt.enter();
        tracing::info!("📂 Loading {}", dir.display());
        commands::load_directory(dir, tx.clone(), state.clone());
    }

    for line in io::stdin().lock().lines() {
        let line = line?;
        if matches!(line.trim(), "?" | "help") {
            print_help(&registry);
            continue;
        }
        let Some(command) = registry.handle_event(&line) else {
            eprintln!("Unknown input {:?}, type ? for help", line.trim());
            continue;
        };
        let _guard = rt.enter();
        if !commands::dispatch(command, tx.clone(), state.clone()) {
            break;
        }
    }

    drop(tx);
    rt.shutdown_timeout(Duration::from_secs(2));
    Ok(())
}

fn print_help(registry: &ControlRegistry) {
    println!("Controls:");
    for control in registry.controls() {
        println!("  {:<14} {}", control.aliases.join(", "), control.label);
    }
    println!("  {:<14} Help", "?");
}

fn render(event: UserEvent, bar: &mut Option<ProgressBar>) {
    match event {
        UserEvent::StateUpdate(view) => {
            if view.is_scanning && bar.is_some() {
                return;
            }
            if let Some(bar) = bar.take() {
                bar.finish_and_clear();
            }
            print_view(&view);
        }
        UserEvent::ScanProgress(progress) => {
            let bar = bar.get_or_insert_with(|| {
                let bar = ProgressBar::new(progress.total as u64);
                if let Ok(style) =
                    ProgressStyle::with_template("{spinner:.cyan} Scanning [{bar:30.cyan/dim}] {pos}/{len} {wide_msg}")
                {
                    bar.set_style(style.progress_chars("━╸─"));
                }
                bar
            });
            bar.set_position(progress.processed as u64);
            bar.set_message(format!("{} failed", progress.failed));
        }
        UserEvent::ScanFinished { scanned, failed } => {
            if let Some(bar) = bar.take() {
                bar.finish_and_clear();
            }
            println!("✅ Scan finished: {scanned} scanned, {failed} failed");
        }
        UserEvent::ShowError(message) => {
            if let Some(bar) = bar.take() {
                bar.abandon();
            }
            eprintln!("error: {message}");
        }
        UserEvent::FileRemoved { path, backup } => {
            println!("Removed {} (backup at {})", path.display(), backup.display());
        }
        UserEvent::FileBackedUp { path, backup } => {
            println!("Backed up {} to {}", path.display(), backup.display());
        }
    }
}

fn print_view(view: &ViewState) {
    println!();
    match &view.current_image {
        Some(image) => {
            let backed_up = if image.is_backed_up { " [backed up]" } else { "" };
            println!("[{}/{}] {}{}", view.position, view.total, image.path.display(), backed_up);
            if !image.scanned {
                println!("  (not scanned)");
            } else if image.concerns.is_empty() {
                println!("  nothing of interest");
            }
            for concern in &image.concerns {
                let level = match concern.level {
                    Some(InterestLevel::Concerning) => "!",
                    _ => " ",
                };
                println!(
                    "  {level} {:<26} {:>5.1}%  {:?}",
                    concern.name, concern.score_percentage, concern.location
                );
            }
        }
        None => println!("No images loaded."),
    }
    println!("{} | {}", view.collection_stats, view.status_message);
}
