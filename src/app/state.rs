//! Defines the central, mutable state of the browsing controller.

use crate::config::AppConfig;
use crate::core::{
    FileCollection, InferenceBackend, InterestPolicy, ScanProgress, ScanReport, ScannedImage,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Holds the complete, mutable state of the application.
///
/// This struct is wrapped in an `Arc<Mutex<...>>` so the front end, the
/// command handlers and the scan task can share it.
pub struct AppState {
    /// The application's configuration settings.
    pub config: AppConfig,
    /// Overrides the platform config directory when set.
    pub config_dir: Option<PathBuf>,
    /// Overrides the platform data directory (history) when set.
    pub data_dir: Option<PathBuf>,
    /// The backend every scan is sent to.
    pub backend: Arc<dyn InferenceBackend>,
    /// The classification used to rank concerns for display.
    pub policy: InterestPolicy,
    /// The directory currently loaded, if any.
    pub current_path: Option<PathBuf>,
    /// The picture files of the loaded directory.
    pub files: FileCollection,
    /// The result of the last completed scan.
    pub report: Option<ScanReport>,
    /// Index into `files` of the image being shown.
    pub cursor: usize,
    /// `true` if a scan is currently in progress.
    pub is_scanning: bool,
    /// The latest progress of the running scan.
    pub scan_progress: Option<ScanProgress>,
    /// A short human-readable status line.
    pub status_message: String,
    /// A handle to the currently running scan task, allowing it to be aborted.
    pub scan_task: Option<JoinHandle<()>>,
    /// A flag used to signal cancellation to the scan workers.
    pub scan_cancellation_flag: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(config: AppConfig, backend: Arc<dyn InferenceBackend>) -> Self {
        let policy = config.interest_policy_or_recommended();

        Self {
            config,
            config_dir: None,
            data_dir: None,
            backend,
            policy,
            current_path: None,
            files: FileCollection::default(),
            report: None,
            cursor: 0,
            is_scanning: false,
            scan_progress: None,
            status_message: "Ready.".to_string(),
            scan_task: None,
            scan_cancellation_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Redirects config and history files, mostly for tests.
    pub fn with_directories(mut self, config_dir: Option<PathBuf>, data_dir: Option<PathBuf>) -> Self {
        self.config_dir = config_dir;
        self.data_dir = data_dir;
        self
    }

    /// Cancels the current scan task, if any, and resets the scanning state.
    pub fn cancel_current_scan(&mut self) {
        self.scan_cancellation_flag.store(true, Ordering::SeqCst);
        if let Some(handle) = self.scan_task.take() {
            tracing::info!("Cancelling running scan");
            handle.abort();
            self.is_scanning = false;
            self.scan_progress = None;
            self.status_message = "Scan cancelled.".to_string();
        } else {
            tracing::debug!("cancel_current_scan called without an active scan");
        }
    }

    /// Resets all state related to a loaded directory.
    pub fn reset_directory_state(&mut self) {
        self.cancel_current_scan();
        self.current_path = None;
        self.files = FileCollection::default();
        self.report = None;
        self.cursor = 0;
        self.is_scanning = false;
        self.scan_progress = None;
        self.status_message = "Ready.".to_string();
    }

    pub fn image_count(&self) -> usize {
        self.files.len()
    }

    pub fn current_image_path(&self) -> Option<&Path> {
        self.files.paths().get(self.cursor).map(PathBuf::as_path)
    }

    /// The scan result for the image under the cursor, if it was scanned.
    pub fn current_scanned_image(&self) -> Option<&ScannedImage> {
        let path = self.current_image_path()?;
        self.report.as_ref()?.images.get_image(path)
    }

    /// Moves the cursor forward, wrapping around at the end.
    pub fn next(&mut self) {
        let count = self.image_count();
        if count > 0 {
            self.cursor = (self.cursor + 1) % count;
        }
    }

    /// Moves the cursor back, wrapping around at the start.
    pub fn previous(&mut self) {
        let count = self.image_count();
        if count > 0 {
            self.cursor = (self.cursor + count - 1) % count;
        }
    }

    /// Points the cursor at `index`, clamped to the last image.
    pub fn select(&mut self, index: usize) {
        self.cursor = index.min(self.image_count().saturating_sub(1));
    }

    /// Keeps the cursor valid after the collection shrank.
    pub fn clamp_cursor(&mut self) {
        self.select(self.cursor);
    }
}
