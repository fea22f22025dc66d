// bases/download_server/src/reaper.rs
use media_downloader::WorkspaceManager;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Periodically remove sessions older than `retention`
///
/// Catches workspaces of abandoned streams and archives nobody downloaded.
pub fn spawn(workspaces: WorkspaceManager, retention: Duration, every: Duration) -> JoinHandle<()> {
    info!(
        "Reaping sessions older than {}s every {}s",
        retention.as_secs(),
        every.as_secs()
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let reaped = workspaces.reap_stale(retention).await;
            debug!("Reaper pass removed {} sessions", reaped);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn removes_expired_sessions() {
        let base = TempDir::new().unwrap();
        let workspaces = WorkspaceManager::new(base.path()).await.unwrap();
        let workspace = workspaces.allocate().await.unwrap();

        let reaper = spawn(workspaces, Duration::ZERO, Duration::from_millis(10));

        for _ in 0..200 {
            if !workspace.dir().exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        reaper.abort();

        assert!(!workspace.dir().exists());
    }
}
