// components/media_downloader/src/types.rs
use crate::progress::ProgressEstimator;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Required dependency not found: {0}")]
    DependencyNotFound(String),

    #[error("Unusable reference {reference:?}: {reason}")]
    Resolution { reference: String, reason: String },

    #[error("no valid references to download")]
    NoReferences,

    #[error("no files downloaded")]
    EmptyResult,

    #[error("Failed to package {}: {reason}", .path.display())]
    Packaging { path: PathBuf, reason: String },

    #[error("IO error during {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not finish within {}s", .limit.as_secs())]
    Timeout { program: String, limit: Duration },

    #[error("Invalid session transition from {from} to {to}")]
    InvalidTransition {
        from: crate::SessionState,
        to: crate::SessionState,
    },
}

impl DownloadError {
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        DownloadError::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// Observable unit of work reported by an [`AudioFetcher`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    /// A line of human-readable tool output
    Output(String),
    ItemStarted { index: usize, reference: String },
    ItemFinished { index: usize, reference: String },
    ItemFailed {
        index: usize,
        reference: String,
        reason: String,
    },
}

impl FetchEvent {
    /// The log line shown to the caller and written to the report
    pub fn describe(&self, total: usize) -> String {
        match self {
            FetchEvent::Output(line) => line.trim().to_string(),
            FetchEvent::ItemStarted { index, reference } => {
                format!("Downloading ({}/{}): {}", index + 1, total, reference)
            }
            FetchEvent::ItemFinished { reference, .. } => format!("Downloaded: {}", reference),
            FetchEvent::ItemFailed {
                reference, reason, ..
            } => format!("FAILED: {} - {}", reference, reason),
        }
    }
}

/// Retrieves and encodes audio for a list of catalog references
///
/// Per-item problems are reported as [`FetchEvent::ItemFailed`] and never
/// returned as errors. An `Err` means the whole batch cannot continue.
#[async_trait::async_trait]
pub trait AudioFetcher: Send + Sync {
    /// Human readable name of the underlying tool
    fn name(&self) -> &str;

    /// Check if the fetcher is available and has all required dependencies
    async fn check_available(&self) -> Result<(), DownloadError>;

    /// The progress strategy matching the events this fetcher emits
    fn estimator(&self, total: usize) -> Box<dyn ProgressEstimator>;

    /// Fetch every reference into `workspace`, reporting on `events`
    async fn fetch_all(
        &self,
        references: &[String],
        workspace: &Path,
        events: mpsc::Sender<FetchEvent>,
    ) -> Result<(), DownloadError>;
}
