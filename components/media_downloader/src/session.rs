// components/media_downloader/src/session.rs
use crate::workspace::Workspace;
use crate::{DownloadError, FetchEvent};
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};
use track_primitives::SessionId;

/// Lifecycle of a download session
///
/// `Created → FetchingMetadata → Downloading → Packaging → Delivered`,
/// with `Failed` reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    FetchingMetadata,
    Downloading,
    Packaging,
    Delivered,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Delivered | SessionState::Failed)
    }

    pub fn can_advance_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Created, FetchingMetadata)
            | (FetchingMetadata, Downloading)
            | (Downloading, Packaging)
            | (Packaging, Delivered) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "CREATED",
            SessionState::FetchingMetadata => "FETCHING_METADATA",
            SessionState::Downloading => "DOWNLOADING",
            SessionState::Packaging => "PACKAGING",
            SessionState::Delivered => "DELIVERED",
            SessionState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// One batch download request and the workspace it owns
#[derive(Debug)]
pub struct DownloadSession {
    workspace: Workspace,
    input_urls: Vec<String>,
    state: SessionState,
    created_at: DateTime<Utc>,
    succeeded: usize,
    failures: Vec<String>,
}

impl DownloadSession {
    pub fn new(workspace: Workspace, input_urls: Vec<String>) -> Self {
        Self {
            workspace,
            input_urls,
            state: SessionState::Created,
            created_at: Utc::now(),
            succeeded: 0,
            failures: Vec::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.workspace.id()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn workspace_dir(&self) -> &Path {
        self.workspace.dir()
    }

    pub fn input_urls(&self) -> &[String] {
        &self.input_urls
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    pub fn advance(&mut self, next: SessionState) -> Result<(), DownloadError> {
        if !self.state.can_advance_to(next) {
            return Err(DownloadError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(session_id = %self.id(), "{} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Append a timestamped line to the session report
    ///
    /// The report is for auditing only, so write failures are logged and dropped.
    pub async fn report(&self, line: &str) {
        let stamped = format!("[{}] {}", Utc::now().format("%Y-%m-%d %H:%M:%S"), line);
        if let Err(e) = self.workspace.append_report(&stamped).await {
            warn!(session_id = %self.id(), "Failed to write report: {}", e);
        }
    }

    /// Keep count of per-item outcomes
    pub fn record(&mut self, event: &FetchEvent) {
        match event {
            FetchEvent::ItemFinished { .. } => self.succeeded += 1,
            FetchEvent::ItemFailed {
                reference, reason, ..
            } => {
                warn!(session_id = %self.id(), "Failed to download {}: {}", reference, reason);
                self.failures.push(reference.clone());
            }
            FetchEvent::ItemStarted { .. } | FetchEvent::Output(_) => {}
        }
    }

    /// Summary line once the outcome is known
    ///
    /// `produced` is the number of output files. A tool that does not report
    /// items individually only tells us what it produced, so every requested
    /// reference without an output counts as failed.
    pub fn summary(&self, produced: usize) -> String {
        let succeeded = self.succeeded.max(produced);
        let unaccounted = self.input_urls.len().saturating_sub(succeeded);
        let failed = self.failures.len().max(unaccounted);
        format!("{} succeeded, {} failed", succeeded, failed)
    }
}
