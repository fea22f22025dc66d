// components/media_downloader/src/lib.rs
mod archive;
mod progress;
mod session;
mod spotdl;
#[cfg(all(test, unix))]
mod testing;
mod types;
mod utils;
mod workspace;

use futures::Stream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use track_primitives::{ArchiveLocation, DownloadProgress};

pub use progress::{
    ItemCallbackEstimator, LineHeuristicEstimator, ProgressEstimator, ProgressTracker,
    IN_FLIGHT_CEILING,
};
pub use session::{DownloadSession, SessionState};
pub use spotdl::{FetchMode, SpotDlBatch, SpotDlOptions, SpotDlPerItem};
pub use types::{AudioFetcher, DownloadError, FetchEvent};
pub use utils::{normalize_references, validate_reference};
pub use workspace::{Workspace, WorkspaceManager, MANIFEST_FILE, REPORT_FILE};

/// Turns a list of catalog references into one zip archive per request
#[derive(Clone)]
pub struct BatchDownloader {
    workspaces: WorkspaceManager,
    fetcher: Arc<dyn AudioFetcher>,
}

impl BatchDownloader {
    /// Create a downloader driving spotdl, storing sessions under `download_path`
    pub async fn new(
        download_path: impl AsRef<Path>,
        options: SpotDlOptions,
        mode: FetchMode,
    ) -> Result<Self, DownloadError> {
        Self::new_with_fetcher(download_path, mode.into_fetcher(options)).await
    }

    /// Create a downloader with a specific fetcher implementation
    pub async fn new_with_fetcher(
        download_path: impl AsRef<Path>,
        fetcher: Arc<dyn AudioFetcher>,
    ) -> Result<Self, DownloadError> {
        fetcher.check_available().await?;
        let workspaces = WorkspaceManager::new(download_path).await?;

        Ok(Self {
            workspaces,
            fetcher,
        })
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Download `urls` into a fresh session, streaming progress
    ///
    /// Nothing happens until the stream is polled. The stream ends with
    /// exactly one `Done` or `Error` chunk. Dropping it early aborts the
    /// session and leaves its workspace for [`WorkspaceManager::reap_stale`].
    pub fn download(&self, urls: Vec<String>) -> impl Stream<Item = DownloadProgress> + Send + 'static {
        let workspaces = self.workspaces.clone();
        let fetcher = self.fetcher.clone();

        async_stream::stream! {
            let (tx, mut rx) = mpsc::channel(64);
            let _task = AbortOnDrop(tokio::spawn(run_session(workspaces, fetcher, urls, tx)));

            let mut finished = false;
            while let Some(chunk) = rx.recv().await {
                finished = chunk.is_terminal();
                yield chunk;
                if finished {
                    break;
                }
            }

            if !finished {
                error!("Download session ended without a result");
                yield DownloadProgress::error("download session ended unexpectedly");
            }
        }
    }
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn send(tx: &mpsc::Sender<DownloadProgress>, chunk: DownloadProgress) {
    // A closed channel means the consumer is gone and this task is about to be aborted
    let _ = tx.send(chunk).await;
}

async fn run_session(
    workspaces: WorkspaceManager,
    fetcher: Arc<dyn AudioFetcher>,
    urls: Vec<String>,
    tx: mpsc::Sender<DownloadProgress>,
) {
    let workspace = match workspaces.allocate().await {
        Ok(workspace) => workspace,
        Err(e) => {
            error!("Failed to allocate workspace: {}", e);
            send(&tx, DownloadProgress::error(e.to_string())).await;
            return;
        }
    };

    let mut session = DownloadSession::new(workspace, normalize_references(urls));
    let id = session.id();

    match drive(&mut session, fetcher.as_ref(), &tx).await {
        Ok(archive) => {
            info!(session_id = %id, "Archive ready at {}", archive.display());
            send(
                &tx,
                DownloadProgress::done(id, ArchiveLocation::FilePath(archive)),
            )
            .await;
        }
        Err(e) => {
            error!(session_id = %id, "Download session failed: {}", e);
            session.report(&format!("ERROR: {}", e)).await;
            if let Err(transition) = session.advance(SessionState::Failed) {
                warn!(session_id = %id, "{}", transition);
            }
            workspaces.cleanup(&id).await;
            send(&tx, DownloadProgress::error(e.to_string())).await;
        }
    }
}

/// Walk a session from creation to a packaged archive
async fn drive(
    session: &mut DownloadSession,
    fetcher: &dyn AudioFetcher,
    tx: &mpsc::Sender<DownloadProgress>,
) -> Result<PathBuf, DownloadError> {
    session.advance(SessionState::FetchingMetadata)?;
    session
        .workspace()
        .write_manifest(session.input_urls())
        .await?;

    let started = format!(
        "Initialized download session {} with {} songs at {}",
        session.id(),
        session.input_urls().len(),
        session.created_at().format("%Y-%m-%d %H:%M:%S")
    );
    session.report(&started).await;
    send(tx, DownloadProgress::progress(started, 0.0)).await;

    let mut references = Vec::new();
    for (index, reference) in session.input_urls().to_vec().into_iter().enumerate() {
        match validate_reference(&reference) {
            Ok(()) => references.push(reference),
            Err(e) => {
                let rejected = FetchEvent::ItemFailed {
                    index,
                    reference,
                    reason: e.to_string(),
                };
                let line = rejected.describe(session.input_urls().len());
                session.record(&rejected);
                session.report(&line).await;
                send(tx, DownloadProgress::progress(line, 0.0)).await;
            }
        }
    }
    if references.is_empty() {
        return Err(DownloadError::NoReferences);
    }

    session.advance(SessionState::Downloading)?;
    let total = references.len();
    let running = format!("Running {} for {} songs...", fetcher.name(), total);
    session.report(&running).await;
    send(tx, DownloadProgress::progress(running, 0.0)).await;

    let mut tracker = ProgressTracker::new(fetcher.estimator(total), total);
    let (events_tx, mut events_rx) = mpsc::channel(64);
    let workspace_dir = session.workspace_dir().to_owned();

    let fetch = fetcher.fetch_all(&references, &workspace_dir, events_tx);
    let forward = async {
        while let Some(event) = events_rx.recv().await {
            session.record(&event);
            if let Some(chunk) = tracker.observe(&event) {
                if let DownloadProgress::Log { log, .. } = &chunk {
                    session.report(log).await;
                }
                send(tx, chunk).await;
            }
        }
    };
    let (fetched, ()) = tokio::join!(fetch, forward);
    fetched?;

    let fraction = tracker.finalizing();
    send(tx, DownloadProgress::progress("Finalizing...", fraction)).await;

    session.advance(SessionState::Packaging)?;
    let files = session.workspace().output_files().await?;
    let summary = session.summary(files.len());
    session.report(&summary).await;
    send(tx, DownloadProgress::progress(summary, fraction)).await;

    if files.is_empty() {
        return Err(DownloadError::EmptyResult);
    }

    send(tx, DownloadProgress::progress("Zipping files...", fraction)).await;
    let archive = session.workspace().package(files).await?;

    session.advance(SessionState::Delivered)?;
    Ok(archive)
}
