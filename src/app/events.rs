//! Defines the events the backend sends to whatever front end is attached.

use std::path::PathBuf;

use super::view_model::ViewState;
use crate::core::ScanProgress;

/// Events sent from the browsing controller to the front end.
#[derive(Debug)]
pub enum UserEvent {
    /// A complete state update to re-render the view.
    StateUpdate(Box<ViewState>),
    /// A progress update during a scan.
    ScanProgress(ScanProgress),
    /// A scan ran to completion.
    ScanFinished { scanned: usize, failed: usize },
    /// An error message to be displayed to the user.
    ShowError(String),
    /// The current image was deleted after being backed up to `backup`.
    FileRemoved { path: PathBuf, backup: PathBuf },
    /// The current image was copied to `backup`.
    FileBackedUp { path: PathBuf, backup: PathBuf },
}
