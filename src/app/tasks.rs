use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::events::UserEvent;
use super::helpers::{lock_state, notify_state};
use super::proxy::EventProxy;
use super::state::AppState;

use crate::config::history::{append_history, HistoryEntry};
use crate::config::settings::save_config;
use crate::core::{CoreError, FileCollection, ImageScanner, ScanReport};

/// Starts loading and scanning `path`.
///
/// A file path scans its parent directory. Any scan already running is
/// cancelled first. Returns immediately; progress and results arrive as
/// events on `proxy`.
pub fn start_scan_on_path<P: EventProxy>(path: PathBuf, proxy: P, state: Arc<Mutex<AppState>>) {
    tokio::spawn(async move {
        let directory_path = if path.is_dir() {
            path
        } else {
            path.parent().map(|p| p.to_path_buf()).unwrap_or(path)
        };

        if !directory_path.is_dir() {
            proxy.send_event(UserEvent::ShowError(format!(
                "{} is not a valid directory.",
                directory_path.display()
            )));
            return;
        }

        let mut state_guard = lock_state(&state);
        state_guard.reset_directory_state();

        state_guard.current_path = Some(directory_path.clone());
        state_guard.config.last_directory = Some(directory_path);
        if let Err(e) = save_config(&state_guard.config, state_guard.config_dir.as_deref()) {
            tracing::warn!("Could not persist last directory: {}", e);
        }

        state_guard.is_scanning = true;
        state_guard.status_message = "Initializing scan...".to_string();

        let new_cancel_flag = Arc::new(AtomicBool::new(false));
        state_guard.scan_cancellation_flag = new_cancel_flag.clone();

        let proxy_clone = proxy.clone();
        let state_clone = state.clone();

        tracing::info!("Spawning scan task");
        let handle = tokio::spawn(async move {
            scan_directory_task(proxy_clone, state_clone, new_cancel_flag).await;
        });
        state_guard.scan_task = Some(handle);

        notify_state(&state_guard, &proxy);
    });
}

/// Gathers the directory's pictures and runs them through the scanner.
async fn scan_directory_task<P: EventProxy>(
    proxy: P,
    state: Arc<Mutex<AppState>>,
    cancel_flag: Arc<AtomicBool>,
) {
    let (root, config, backend, data_dir) = {
        let state_lock = lock_state(&state);
        let Some(root) = state_lock.current_path.clone() else {
            return;
        };
        (
            root,
            state_lock.config.clone(),
            state_lock.backend.clone(),
            state_lock.data_dir.clone(),
        )
    };

    let progress_proxy = proxy.clone();
    let progress_state = state.clone();
    let blocking_root = root.clone();
    let blocking_flag = cancel_flag.clone();
    let scan_result = tokio::task::spawn_blocking(move || -> Result<(FileCollection, ScanReport), CoreError> {
        let cancel_flag = blocking_flag;
        let files =
            FileCollection::from_directory(&blocking_root, config.recursive, &config.exclude_dir_names)?;
        store_gathered_files(&progress_state, &cancel_flag, files.clone())?;

        let scanner = ImageScanner::new(backend, config.scan_options());
        let report = scanner.scan_with_progress(files.paths().to_vec(), cancel_flag, |progress| {
            lock_state(&progress_state).scan_progress = Some(progress.clone());
            progress_proxy.send_event(UserEvent::ScanProgress(progress));
        })?;
        Ok((files, report))
    })
    .await;

    let (files, report) = match scan_result {
        Ok(Ok(result)) => result,
        Ok(Err(CoreError::Cancelled)) => {
            tracing::info!("Scan of {} was cancelled", root.display());
            return;
        }
        Ok(Err(e)) => return finish_with_error(&proxy, &state, e.to_string()),
        Err(join_error) => {
            tracing::error!("Scan task failed: {}", join_error);
            return finish_with_error(&proxy, &state, format!("Scan task failed: {join_error}"));
        }
    };

    let mut state_lock = lock_state(&state);
    if !state_lock.is_scanning || cancel_flag.load(Ordering::SeqCst) {
        tracing::warn!("Scan was cancelled in the meantime. Discarding results.");
        return;
    }

    let (scanned, failed) = (report.scanned_count(), report.failed_count());
    if let Err(e) = append_history(HistoryEntry::new(&root, scanned, failed), data_dir.as_deref()) {
        tracing::warn!("Could not record scan history: {}", e);
    }

    state_lock.files = files;
    state_lock.report = Some(report);
    state_lock.cursor = 0;
    state_lock.is_scanning = false;
    state_lock.scan_progress = None;
    state_lock.scan_task = None;
    state_lock.status_message = format!("Scan complete. {scanned} scanned, {failed} failed.");

    proxy.send_event(UserEvent::ScanFinished { scanned, failed });
    notify_state(&state_lock, &proxy);
    tracing::info!("Scan results stored: {} scanned, {} failed", scanned, failed);
}

/// Publishes freshly gathered files, unless the scan was cancelled while
/// gathering. A cancelled scan may already have been replaced by a newer one.
fn store_gathered_files(
    state: &Arc<Mutex<AppState>>,
    cancel_flag: &AtomicBool,
    files: FileCollection,
) -> Result<(), CoreError> {
    let mut state_lock = lock_state(state);
    if cancel_flag.load(Ordering::SeqCst) {
        return Err(CoreError::Cancelled);
    }
    state_lock.files = files;
    Ok(())
}

fn finish_with_error<P: EventProxy>(proxy: &P, state: &Arc<Mutex<AppState>>, message: String) {
    tracing::error!("Scan ended with an error: {}", message);
    let mut state_lock = lock_state(state);
    if !state_lock.is_scanning {
        return;
    }
    state_lock.is_scanning = false;
    state_lock.scan_progress = None;
    state_lock.scan_task = None;
    state_lock.status_message = format!("Scan failed: {message}");
    proxy.send_event(UserEvent::ShowError(message));
    notify_state(&state_lock, proxy);
}
