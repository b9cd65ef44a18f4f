//! Responsible for transforming the `AppState` into a `ViewState` view model.
//!
//! This module acts as a presentation layer: it picks the image under the
//! cursor, ranks its concerns with the interest policy and prepares the
//! status lines a front end shows.

use crate::core::{InterestLevel, InterestPolicy, ScanProgress, ScannedImage};
use serde::Serialize;
use std::path::PathBuf;

use super::state::AppState;

/// A serializable representation of the application state for the front end.
#[derive(Serialize, Clone, Debug)]
pub struct ViewState {
    pub current_path: Option<PathBuf>,
    pub current_image: Option<ImageView>,
    /// One-based position of the current image, 0 when there is none.
    pub position: usize,
    pub total: usize,
    pub collection_stats: String,
    pub scanned_count: usize,
    pub failed_count: usize,
    pub is_scanning: bool,
    pub scan_progress: Option<ScanProgress>,
    pub status_message: String,
}

#[derive(Serialize, Clone, Debug)]
pub struct ImageView {
    pub path: PathBuf,
    pub file_name: String,
    pub scanned: bool,
    pub is_backed_up: bool,
    pub concerns: Vec<ConcernView>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ConcernView {
    pub name: String,
    pub description: Option<String>,
    pub score_percentage: f64,
    pub location: [i64; 4],
    pub level: Option<InterestLevel>,
}

/// Creates the complete `ViewState` from the current `AppState`.
pub fn generate_view_state(state: &AppState) -> ViewState {
    let current_image = state.current_image_path().map(|path| {
        let scanned = state.current_scanned_image();
        let backup_dir = state.config.backup_directory.as_deref();
        let is_backed_up = match scanned {
            Some(image) => image.is_backed_up(backup_dir),
            None => ScannedImage::new(path).is_backed_up(backup_dir),
        };

        ImageView {
            path: path.to_path_buf(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            scanned: scanned.is_some(),
            is_backed_up,
            concerns: scanned
                .map(|image| concern_views(image, &state.policy))
                .unwrap_or_default(),
        }
    });

    let status_message = match (&state.scan_progress, state.is_scanning) {
        (Some(progress), true) => format!(
            "Scanning... {}/{} processed, {} failed ({})",
            progress.processed,
            progress.total,
            progress.failed,
            progress.current_path.display()
        ),
        _ => state.status_message.clone(),
    };

    ViewState {
        current_path: state.current_path.clone(),
        position: if current_image.is_some() { state.cursor + 1 } else { 0 },
        current_image,
        total: state.image_count(),
        collection_stats: state.files.to_string(),
        scanned_count: state.report.as_ref().map_or(0, |r| r.scanned_count()),
        failed_count: state.report.as_ref().map_or(0, |r| r.failed_count()),
        is_scanning: state.is_scanning,
        scan_progress: state.scan_progress.clone(),
        status_message,
    }
}

/// Concerns of `image`, most severe level first, then by descending score.
/// Concerns the policy marks as non-interesting are left out.
fn concern_views(image: &ScannedImage, policy: &InterestPolicy) -> Vec<ConcernView> {
    let mut views: Vec<ConcernView> = image
        .concerns()
        .iter()
        .map(|concern| ConcernView {
            name: concern.name().to_string(),
            description: concern.description().map(str::to_string),
            score_percentage: concern.score_percentage(),
            location: concern.location(),
            level: policy.level_of(concern.name()),
        })
        .filter(|view| view.level != Some(InterestLevel::NonInteresting))
        .collect();

    views.sort_by(|a, b| {
        level_rank(a.level)
            .cmp(&level_rank(b.level))
            .then(b.score_percentage.total_cmp(&a.score_percentage))
    });
    views
}

fn level_rank(level: Option<InterestLevel>) -> u8 {
    match level {
        Some(InterestLevel::Concerning) => 0,
        Some(InterestLevel::PointOfInterest) => 1,
        Some(InterestLevel::NonInteresting) | None => 2,
    }
}
