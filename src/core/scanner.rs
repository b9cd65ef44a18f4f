use super::error::CoreError;
use super::image::{create_scanned_image, ScannedImage, ScannedImageCollection};
use super::inference::InferenceBackend;
use crate::utils::paths::{provision_default, RawPath};
use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

pub const DEFAULT_WORKER_COUNT: usize = 8;
const QUEUE_SLOTS_PER_WORKER: usize = 2;
/// Upper bound on scan threads, whatever the options ask for.
pub const MAX_WORKER_COUNT: usize = 64;

/// One or more paths to scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanTargets(Vec<RawPath>);

impl ScanTargets {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for ScanTargets {
    fn from(value: &str) -> Self {
        Self(vec![value.into()])
    }
}

impl From<String> for ScanTargets {
    fn from(value: String) -> Self {
        Self(vec![value.into()])
    }
}

impl From<&Path> for ScanTargets {
    fn from(value: &Path) -> Self {
        Self(vec![value.into()])
    }
}

impl From<PathBuf> for ScanTargets {
    fn from(value: PathBuf) -> Self {
        Self(vec![value.into()])
    }
}

impl<T: Into<RawPath>> From<Vec<T>> for ScanTargets {
    fn from(values: Vec<T>) -> Self {
        Self(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<RawPath>> FromIterator<T> for ScanTargets {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Fan the batch out over a pool of worker threads.
    pub threaded: bool,
    /// Pool size when `threaded` is set. Zero is treated as one.
    pub worker_count: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            threaded: false,
            worker_count: DEFAULT_WORKER_COUNT,
        }
    }
}

/// A path that could not be scanned, with the reason.
#[derive(Debug)]
pub struct FailedScan {
    pub path: PathBuf,
    pub error: CoreError,
}

impl fmt::Display for FailedScan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

/// What a worker reports back for each item it pulled off the queue.
#[derive(Debug)]
pub enum ScanOutcome {
    Scanned(PathBuf),
    Failed(FailedScan),
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ScanProgress {
    pub processed: usize,
    pub failed: usize,
    pub total: usize,
    pub current_path: PathBuf,
}

/// The result of a batch: the finalized collection plus everything that failed.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub images: ScannedImageCollection,
    pub failed: Vec<FailedScan>,
}

impl ScanReport {
    pub fn scanned_count(&self) -> usize {
        self.images.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn failed_paths(&self) -> Vec<&Path> {
        self.failed.iter().map(|f| f.path.as_path()).collect()
    }
}

/// Drives batches of images through an [`InferenceBackend`].
pub struct ImageScanner {
    backend: Arc<dyn InferenceBackend>,
    options: ScanOptions,
}

impl ImageScanner {
    pub fn new(backend: Arc<dyn InferenceBackend>, options: ScanOptions) -> Self {
        Self { backend, options }
    }

    pub fn options(&self) -> ScanOptions {
        self.options
    }

    /// Scans a single image. Unlike batch scans, errors go straight to the caller.
    pub fn scan_image(&self, path: impl Into<RawPath>) -> Result<ScannedImage, CoreError> {
        let path = provision_default(path)?;
        analyze_and_build(self.backend.as_ref(), &path)
    }

    pub fn scan(&self, targets: impl Into<ScanTargets>) -> Result<ScanReport, CoreError> {
        let cancel_flag = Arc::new(AtomicBool::new(false));
        self.scan_with_progress(targets, cancel_flag, |_| {})
    }

    /// Scans every target, reporting progress after each item.
    ///
    /// Per-image failures are collected in [`ScanReport::failed`]. Setting
    /// `cancel_flag` stops the batch: sequential scans stop before the next
    /// item, threaded scans stop enqueueing and wait for the items already
    /// queued. Either way the call then returns [`CoreError::Cancelled`].
    pub fn scan_with_progress<F>(
        &self,
        targets: impl Into<ScanTargets>,
        cancel_flag: Arc<AtomicBool>,
        progress_callback: F,
    ) -> Result<ScanReport, CoreError>
    where
        F: Fn(ScanProgress),
    {
        let ScanTargets(raw_targets) = targets.into();
        let mut tracker = ProgressTracker::new(raw_targets.len(), progress_callback);

        let mut paths = Vec::with_capacity(raw_targets.len());
        for raw in raw_targets {
            let fallback = raw_display_path(&raw);
            match provision_default(raw) {
                Ok(path) => paths.push(path),
                Err(error) => {
                    tracing::warn!("Skipping {}: {}", fallback.display(), error);
                    tracker.record_failure(FailedScan {
                        path: fallback,
                        error,
                    });
                }
            }
        }

        tracing::info!(
            "🔍 Scanning {} image(s) ({})",
            paths.len(),
            if self.options.threaded { "threaded" } else { "sequential" }
        );

        let mut images = if self.options.threaded {
            self.scan_threaded(paths, &cancel_flag, &mut tracker)?
        } else {
            self.scan_sequential(paths, &cancel_flag, &mut tracker)?
        };
        images.finalize();

        let report = ScanReport {
            images,
            failed: tracker.failed,
        };
        tracing::info!(
            "✅ Scan finished: {} scanned, {} failed",
            report.scanned_count(),
            report.failed_count()
        );
        Ok(report)
    }

    fn scan_sequential<F: Fn(ScanProgress)>(
        &self,
        paths: Vec<PathBuf>,
        cancel_flag: &AtomicBool,
        tracker: &mut ProgressTracker<F>,
    ) -> Result<ScannedImageCollection, CoreError> {
        let mut images = ScannedImageCollection::new();

        for path in paths {
            if cancel_flag.load(Ordering::Relaxed) {
                tracing::info!("🛑 Scan cancelled after {} item(s)", tracker.processed);
                return Err(CoreError::Cancelled);
            }

            match analyze_and_build(self.backend.as_ref(), &path) {
                Ok(image) => {
                    images.add_image(image)?;
                    tracker.record_success(path);
                }
                Err(error) => {
                    tracing::warn!("Failed to scan {}: {}", path.display(), error);
                    tracker.record_failure(FailedScan { path, error });
                }
            }
        }

        Ok(images)
    }

    fn scan_threaded<F: Fn(ScanProgress)>(
        &self,
        paths: Vec<PathBuf>,
        cancel_flag: &AtomicBool,
        tracker: &mut ProgressTracker<F>,
    ) -> Result<ScannedImageCollection, CoreError> {
        let worker_count = pool_size(self.options.worker_count, paths.len());
        let (job_tx, job_rx) = crossbeam_channel::bounded::<Option<PathBuf>>(
            worker_count.saturating_mul(QUEUE_SLOTS_PER_WORKER),
        );
        let (outcome_tx, outcome_rx) = crossbeam_channel::unbounded::<ScanOutcome>();
        let collection = Arc::new(Mutex::new(ScannedImageCollection::new()));

        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let backend = Arc::clone(&self.backend);
            let jobs = job_rx.clone();
            let shared = Arc::clone(&collection);
            let outcomes = outcome_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("scan-worker-{id}"))
                .spawn(move || run_worker(backend.as_ref(), &jobs, &shared, &outcomes))
                .map_err(CoreError::WorkerSpawn)?;
            workers.push(handle);
        }
        // Only workers hold senders from here on, so a dead pool shows up as a disconnect.
        drop(outcome_tx);
        drop(job_rx);

        let mut enqueued = 0_usize;
        let mut received = 0_usize;
        let mut cancelled = false;

        for path in paths {
            if cancel_flag.load(Ordering::Relaxed) {
                cancelled = true;
                break;
            }
            if job_tx.send(Some(path)).is_err() {
                tracing::error!("All scan workers exited early");
                break;
            }
            enqueued += 1;

            while let Ok(outcome) = outcome_rx.try_recv() {
                received += 1;
                tracker.record(outcome);
            }
        }

        while received < enqueued {
            match outcome_rx.recv() {
                Ok(outcome) => {
                    received += 1;
                    tracker.record(outcome);
                }
                Err(_) => {
                    tracing::error!("Scan workers stopped with {} item(s) outstanding", enqueued - received);
                    break;
                }
            }
        }

        for _ in 0..workers.len() {
            job_tx.send(None).ok();
        }
        for handle in workers {
            let name = handle.thread().name().unwrap_or("scan-worker").to_string();
            if handle.join().is_err() {
                tracing::error!("{} terminated abnormally", name);
            }
        }

        if cancelled {
            tracing::info!("🛑 Scan cancelled after {} item(s)", tracker.processed);
            return Err(CoreError::Cancelled);
        }

        let images = match Arc::try_unwrap(collection) {
            Ok(mutex) => mutex.into_inner().unwrap_or_else(PoisonError::into_inner),
            Err(shared) => shared.lock().unwrap_or_else(PoisonError::into_inner).clone(),
        };
        Ok(images)
    }
}

fn analyze_and_build(backend: &dyn InferenceBackend, path: &Path) -> Result<ScannedImage, CoreError> {
    let analysis = backend.analyze(path)?;
    create_scanned_image(analysis)
}

/// Threads to start for `items` targets: at least one, never more than
/// there are targets or than [`MAX_WORKER_COUNT`].
fn pool_size(requested: usize, items: usize) -> usize {
    requested.min(items).clamp(1, MAX_WORKER_COUNT)
}

fn run_worker(
    backend: &dyn InferenceBackend,
    jobs: &Receiver<Option<PathBuf>>,
    collection: &Mutex<ScannedImageCollection>,
    outcomes: &Sender<ScanOutcome>,
) {
    while let Ok(Some(path)) = jobs.recv() {
        let result = panic::catch_unwind(AssertUnwindSafe(|| analyze_and_build(backend, &path)))
            .unwrap_or_else(|payload| Err(CoreError::WorkerPanicked(panic_message(payload.as_ref()))));

        let outcome = match result.and_then(|image| {
            collection
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .add_image(image)
        }) {
            Ok(()) => ScanOutcome::Scanned(path),
            Err(error) => {
                tracing::warn!("Failed to scan {}: {}", path.display(), error);
                ScanOutcome::Failed(FailedScan { path, error })
            }
        };

        if outcomes.send(outcome).is_err() {
            break;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn raw_display_path(raw: &RawPath) -> PathBuf {
    match raw {
        RawPath::Text(text) => PathBuf::from(text),
        RawPath::Structured(path) => path.clone(),
    }
}

struct ProgressTracker<F> {
    total: usize,
    processed: usize,
    failed: Vec<FailedScan>,
    callback: F,
}

impl<F: Fn(ScanProgress)> ProgressTracker<F> {
    fn new(total: usize, callback: F) -> Self {
        Self {
            total,
            processed: 0,
            failed: Vec::new(),
            callback,
        }
    }

    fn record(&mut self, outcome: ScanOutcome) {
        match outcome {
            ScanOutcome::Scanned(path) => self.record_success(path),
            ScanOutcome::Failed(failure) => self.record_failure(failure),
        }
    }

    fn record_success(&mut self, path: PathBuf) {
        self.processed += 1;
        self.report(path);
    }

    fn record_failure(&mut self, failure: FailedScan) {
        self.processed += 1;
        let path = failure.path.clone();
        self.failed.push(failure);
        self.report(path);
    }

    fn report(&self, current_path: PathBuf) {
        (self.callback)(ScanProgress {
            processed: self.processed,
            failed: self.failed.len(),
            total: self.total,
            current_path,
        });
    }
}
