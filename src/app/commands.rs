//! Command handlers invoked by the front end.
//!
//! Every handler takes the shared state and a proxy, performs its mutation
//! and notifies the front end with a fresh `StateUpdate`.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::controls::Command;
use super::events::UserEvent;
use super::helpers::{lock_state, notify_state, with_state_and_notify};
use super::proxy::EventProxy;
use super::state::AppState;
use super::tasks::start_scan_on_path;
use crate::core::ScannedImage;

/// Loads `path` and scans it.
pub fn load_directory<P: EventProxy>(path: PathBuf, proxy: P, state: Arc<Mutex<AppState>>) {
    start_scan_on_path(path, proxy, state);
}

/// Scans the currently loaded directory again.
pub fn rescan_directory<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    let current_path = lock_state(&state).current_path.clone();
    match current_path {
        Some(path) => start_scan_on_path(path, proxy, state),
        None => proxy.send_event(UserEvent::ShowError("No directory loaded.".to_string())),
    }
}

pub fn next_image<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, AppState::next);
}

pub fn previous_image<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, AppState::previous);
}

pub fn select_image<P: EventProxy>(index: usize, proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, |s| s.select(index));
}

/// Cancels the ongoing scan.
pub fn cancel_scan<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, |s| {
        tracing::info!("Cancel requested");
        s.cancel_current_scan();
    });
}

/// Copies the current image into the configured backup directory.
pub fn backup_current<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    let state_guard = lock_state(&state);
    let Some((path, image)) = current_image(&state_guard) else {
        proxy.send_event(UserEvent::ShowError("No image selected.".to_string()));
        return;
    };

    match image.backup(state_guard.config.backup_directory.as_deref()) {
        Ok(backup) => proxy.send_event(UserEvent::FileBackedUp { path, backup }),
        Err(e) => {
            tracing::error!("Backup of {} failed: {}", path.display(), e);
            proxy.send_event(UserEvent::ShowError(format!("Backup failed: {e}")));
        }
    }
    notify_state(&state_guard, &proxy);
}

/// Backs up the current image, deletes it from disk and drops it from the collection.
///
/// Nothing is deleted when the backup fails.
pub fn remove_current<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    let mut state_guard = lock_state(&state);
    let Some((path, image)) = current_image(&state_guard) else {
        proxy.send_event(UserEvent::ShowError("No image selected.".to_string()));
        return;
    };

    let backup = match image.backup(state_guard.config.backup_directory.as_deref()) {
        Ok(backup) => backup,
        Err(e) => {
            tracing::error!("Refusing to remove {}: backup failed: {}", path.display(), e);
            proxy.send_event(UserEvent::ShowError(format!("Backup failed, file kept: {e}")));
            return;
        }
    };

    if let Err(e) = fs::remove_file(&path) {
        tracing::error!("Could not delete {}: {}", path.display(), e);
        proxy.send_event(UserEvent::ShowError(format!(
            "Could not delete {}: {e}",
            path.display()
        )));
        return;
    }

    if let Err(e) = state_guard.files.remove_file(&path) {
        tracing::warn!("Could not drop {} from the collection: {}", path.display(), e);
    }
    state_guard.clamp_cursor();
    state_guard.status_message = format!("Removed {}", path.display());
    tracing::info!("Removed {} (backup at {})", path.display(), backup.display());

    proxy.send_event(UserEvent::FileRemoved { path, backup });
    notify_state(&state_guard, &proxy);
}

/// Opens the current image in the system viewer.
pub fn open_current<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    let path = lock_state(&state).current_image_path().map(|p| p.to_path_buf());
    let Some(path) = path else {
        proxy.send_event(UserEvent::ShowError("No image selected.".to_string()));
        return;
    };
    if let Err(e) = open::that(&path) {
        proxy.send_event(UserEvent::ShowError(format!(
            "Could not open {}: {e}",
            path.display()
        )));
    }
}

/// Runs `command`. Returns `false` when the front end should shut down.
pub fn dispatch<P: EventProxy>(command: Command, proxy: P, state: Arc<Mutex<AppState>>) -> bool {
    tracing::debug!("Dispatching {:?}", command);
    match command {
        Command::NextImage => next_image(proxy, state),
        Command::PreviousImage => previous_image(proxy, state),
        Command::RemoveCurrent => remove_current(proxy, state),
        Command::BackupCurrent => backup_current(proxy, state),
        Command::OpenCurrent => open_current(proxy, state),
        Command::CancelScan => cancel_scan(proxy, state),
        Command::Rescan => rescan_directory(proxy, state),
        Command::Quit => {
            lock_state(&state).cancel_current_scan();
            return false;
        }
    }
    true
}

/// The current path together with its scan result, or a bare image when
/// the file has not been scanned.
fn current_image(state: &AppState) -> Option<(PathBuf, ScannedImage)> {
    let path = state.current_image_path()?.to_path_buf();
    let image = state
        .current_scanned_image()
        .cloned()
        .unwrap_or_else(|| ScannedImage::new(&path));
    Some((path, image))
}
