//! Defines the custom error type for the `core` module.

use std::path::PathBuf;
use thiserror::Error;

/// The primary error type for the `core` module.
///
/// This enum encapsulates all possible errors that can occur during
/// core operations like path provisioning, inference requests, model
/// construction and file aggregation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A path could not be turned into a usable absolute path.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A provisioned path does not refer to an existing file.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Represents a path that was expected to be a directory but was not.
    #[error("Path is not a valid directory: {0}")]
    NotADirectory(PathBuf),

    /// The inference server answered with a non-success status.
    #[error("Inference server at {url} responded with HTTP {status}")]
    Http { status: u16, url: String },

    /// The request could not complete (connection refused, timeout, DNS).
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The inference server answered with a body that is not a detection response.
    #[error("Invalid inference response: {0}")]
    InvalidResponse(#[source] reqwest::Error),

    /// A detection label outside of the label table.
    #[error("Invalid label: {0}")]
    InvalidLabel(String),

    /// A detection score outside of (0.0, 1.0].
    #[error("Invalid score {0}: must be greater than 0.0 and at most 1.0")]
    InvalidScore(f64),

    /// An append was attempted on a finalized scan collection.
    #[error("The scanned image collection is finalized and no longer accepts images")]
    CollectionClosed,

    /// An extension lookup missed.
    #[error("Extension {0} not found in file collection")]
    UnknownExtension(String),

    /// Represents an I/O error, typically from file system operations.
    #[error("I/O error for path {1}: {0}")]
    Io(#[source] std::io::Error, PathBuf),

    /// A scan worker thread could not be started.
    #[error("Failed to spawn scan worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// A scan worker panicked while processing an image.
    #[error("Scan worker panicked: {0}")]
    WorkerPanicked(String),

    /// Represents a user-initiated cancellation of an operation.
    #[error("Operation was cancelled by the user")]
    Cancelled,
}

impl CoreError {
    /// Returns the HTTP status carried by an [`CoreError::Http`] error.
    pub fn status(&self) -> Option<u16> {
        match self {
            CoreError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
