// components/media_downloader/src/workspace.rs
//! Per-session scratch directories and their archives
//!
//! Layout under the base download directory:
//!
//! ```text
//! <base>/temp/<session id>/            workspace, exclusive to the session
//! <base>/temp/<session id>/songs.txt   manifest of requested references
//! <base>/temp/<session id>/downloadreport.txt
//! <base>/spotify_download_<session id>.zip
//! ```

use crate::archive::write_zip;
use crate::DownloadError;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use track_primitives::SessionId;

pub const MANIFEST_FILE: &str = "songs.txt";
pub const REPORT_FILE: &str = "downloadreport.txt";
const ARCHIVE_PREFIX: &str = "spotify_download_";
const ARCHIVE_EXTENSION: &str = "zip";

/// Allocates, packages and removes session workspaces under one base directory
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    base_dir: PathBuf,
    temp_dir: PathBuf,
}

impl WorkspaceManager {
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self, DownloadError> {
        let base_dir = base_dir.as_ref().to_owned();
        let temp_dir = base_dir.join("temp");

        fs::create_dir_all(&temp_dir)
            .await
            .map_err(|e| DownloadError::io(format!("creating {}", temp_dir.display()), e))?;

        Ok(Self { base_dir, temp_dir })
    }

    pub fn workspace_dir(&self, id: &SessionId) -> PathBuf {
        self.temp_dir.join(id.to_string())
    }

    pub fn archive_path(&self, id: &SessionId) -> PathBuf {
        self.base_dir
            .join(format!("{}{}.{}", ARCHIVE_PREFIX, id, ARCHIVE_EXTENSION))
    }

    /// Create a fresh workspace for a new session
    ///
    /// The only place session ids and their paths are minted. The directory
    /// is created with `create_dir`, so an existing one is never reused.
    pub async fn allocate(&self) -> Result<Workspace, DownloadError> {
        let id = SessionId::generate();
        let dir = self.workspace_dir(&id);

        fs::create_dir(&dir)
            .await
            .map_err(|e| DownloadError::io(format!("creating workspace {}", dir.display()), e))?;

        debug!(session_id = %id, "Allocated workspace {}", dir.display());
        Ok(Workspace {
            id,
            archive_path: self.archive_path(&id),
            dir,
        })
    }

    /// Remove the workspace and archive of a session
    ///
    /// Safe to call repeatedly or for sessions that no longer exist. Failures
    /// are logged and swallowed.
    pub async fn cleanup(&self, id: &SessionId) {
        let dir = self.workspace_dir(id);
        let archive = self.archive_path(id);

        match fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(session_id = %id, "Removed workspace {}", dir.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(session_id = %id, "Failed to remove workspace {}: {}", dir.display(), e),
        }

        match fs::remove_file(&archive).await {
            Ok(()) => debug!(session_id = %id, "Removed archive {}", archive.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(session_id = %id, "Failed to remove archive {}: {}", archive.display(), e),
        }

        info!(session_id = %id, "Cleaned up session files");
    }

    /// Clean up every session with no workspace or archive activity within `max_age`
    ///
    /// Covers sessions whose consumer went away and archives nobody fetched.
    /// Returns the number of sessions cleaned.
    pub async fn reap_stale(&self, max_age: Duration) -> usize {
        let now = SystemTime::now();
        let mut last_active: HashMap<SessionId, SystemTime> = HashMap::new();

        for (dir, parse) in [
            (&self.temp_dir, session_from_workspace_name as fn(&str) -> Option<SessionId>),
            (&self.base_dir, session_from_archive_name),
        ] {
            let mut entries = match fs::read_dir(dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Failed to scan {} for stale sessions: {}", dir.display(), e);
                    continue;
                }
            };

            while let Ok(Some(entry)) = entries.next_entry().await {
                let Some(id) = entry.file_name().to_str().and_then(parse) else {
                    continue;
                };
                let Some(modified) = latest_activity(&entry.path()).await else {
                    continue;
                };
                let seen = last_active.entry(id).or_insert(modified);
                *seen = (*seen).max(modified);
            }
        }

        let stale: Vec<SessionId> = last_active
            .into_iter()
            .filter(|(_, modified)| now.duration_since(*modified).unwrap_or_default() >= max_age)
            .map(|(id, _)| id)
            .collect();

        for id in &stale {
            self.cleanup(id).await;
        }

        if !stale.is_empty() {
            info!("Reaped {} stale download sessions", stale.len());
        }
        stale.len()
    }
}

/// Newest mtime of `path` and, for a directory, of its direct entries
///
/// Appending to the report or writing a download does not touch the directory mtime.
async fn latest_activity(path: &Path) -> Option<SystemTime> {
    let metadata = fs::metadata(path).await.ok()?;
    let mut latest = metadata.modified().ok()?;
    if metadata.is_dir() {
        if let Ok(mut entries) = fs::read_dir(path).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                if let Ok(modified) = entry.metadata().await.and_then(|m| m.modified()) {
                    latest = latest.max(modified);
                }
            }
        }
    }
    Some(latest)
}

fn session_from_workspace_name(name: &str) -> Option<SessionId> {
    SessionId::parse(name).ok()
}

fn session_from_archive_name(name: &str) -> Option<SessionId> {
    name.strip_prefix(ARCHIVE_PREFIX)?
        .strip_suffix(ARCHIVE_EXTENSION)?
        .strip_suffix('.')
        .and_then(|id| SessionId::parse(id).ok())
}

/// A session's exclusive directory
#[derive(Debug)]
pub struct Workspace {
    id: SessionId,
    dir: PathBuf,
    archive_path: PathBuf,
}

impl Workspace {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    pub fn report_path(&self) -> PathBuf {
        self.dir.join(REPORT_FILE)
    }

    /// Persist the requested references, one per line
    pub async fn write_manifest(&self, references: &[String]) -> Result<(), DownloadError> {
        let mut contents = references.join("\n");
        contents.push('\n');
        fs::write(self.manifest_path(), contents)
            .await
            .map_err(|e| DownloadError::io("writing manifest", e))
    }

    pub async fn append_report(&self, line: &str) -> Result<(), DownloadError> {
        let mut report = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.report_path())
            .await
            .map_err(|e| DownloadError::io("opening report", e))?;

        report
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .map_err(|e| DownloadError::io("writing report", e))
    }

    /// Files produced by the fetch tool, sorted by name
    pub async fn output_files(&self) -> Result<Vec<PathBuf>, DownloadError> {
        output_files_in(&self.dir).await
    }

    /// Zip `files` into the session archive
    ///
    /// A partially written archive is removed before the error is returned.
    pub async fn package(&self, files: Vec<PathBuf>) -> Result<PathBuf, DownloadError> {
        let archive_path = self.archive_path.clone();
        let target = archive_path.clone();

        let result = tokio::task::spawn_blocking(move || write_zip(&target, &files))
            .await
            .map_err(|e| DownloadError::Packaging {
                path: archive_path.clone(),
                reason: e.to_string(),
            })
            .and_then(|r| r);

        if let Err(e) = result {
            if let Err(remove) = fs::remove_file(&archive_path).await {
                if remove.kind() != ErrorKind::NotFound {
                    warn!("Failed to remove partial archive {}: {}", archive_path.display(), remove);
                }
            }
            return Err(e);
        }

        Ok(archive_path)
    }
}

/// Regular files in `dir` other than the manifest and the report, sorted by name
pub(crate) async fn output_files_in(dir: &Path) -> Result<Vec<PathBuf>, DownloadError> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| DownloadError::io(format!("listing {}", dir.display()), e))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| DownloadError::io(format!("listing {}", dir.display()), e))?
    {
        let name = entry.file_name();
        if name == MANIFEST_FILE || name == REPORT_FILE {
            continue;
        }
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| DownloadError::io("reading file type", e))?;
        if file_type.is_file() {
            files.push(entry.path());
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    async fn manager() -> (TempDir, WorkspaceManager) {
        let base = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(base.path()).await.unwrap();
        (base, manager)
    }

    #[tokio::test]
    async fn allocates_exclusive_directories() {
        let (_base, manager) = manager().await;
        let a = manager.allocate().await.unwrap();
        let b = manager.allocate().await.unwrap();

        assert_ne!(a.id(), b.id());
        assert_ne!(a.dir(), b.dir());
        assert_ne!(a.archive_path(), b.archive_path());
        assert!(a.dir().is_dir());
        assert_eq!(a.dir(), manager.workspace_dir(&a.id()));
        assert!(a
            .archive_path()
            .ends_with(format!("spotify_download_{}.zip", a.id())));
    }

    #[tokio::test]
    async fn manifest_and_report_are_not_outputs() {
        let (_base, manager) = manager().await;
        let ws = manager.allocate().await.unwrap();

        ws.write_manifest(&["https://a".to_string(), "https://b".to_string()])
            .await
            .unwrap();
        ws.append_report("first").await.unwrap();
        ws.append_report("second").await.unwrap();
        std::fs::write(ws.dir().join("b.mp3"), "b").unwrap();
        std::fs::write(ws.dir().join("a.mp3"), "a").unwrap();
        std::fs::create_dir(ws.dir().join("nested")).unwrap();

        let outputs = ws.output_files().await.unwrap();
        assert_eq!(outputs, vec![ws.dir().join("a.mp3"), ws.dir().join("b.mp3")]);

        let manifest = std::fs::read_to_string(ws.manifest_path()).unwrap();
        assert_eq!(manifest, "https://a\nhttps://b\n");
        let report = std::fs::read_to_string(ws.report_path()).unwrap();
        assert_eq!(report, "first\nsecond\n");
    }

    #[tokio::test]
    async fn package_writes_archive_next_to_temp() {
        let (base, manager) = manager().await;
        let ws = manager.allocate().await.unwrap();
        std::fs::write(ws.dir().join("song.mp3"), "x").unwrap();

        let files = ws.output_files().await.unwrap();
        let archive = ws.package(files).await.unwrap();

        assert_eq!(archive.parent().unwrap(), base.path());
        assert!(archive.is_file());
    }

    #[tokio::test]
    async fn failed_packaging_leaves_no_archive() {
        let (_base, manager) = manager().await;
        let ws = manager.allocate().await.unwrap();

        let result = ws.package(vec![ws.dir().join("missing.mp3")]).await;
        assert_matches!(result, Err(DownloadError::Packaging { .. }));
        assert!(!ws.archive_path().exists());
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let (_base, manager) = manager().await;
        let ws = manager.allocate().await.unwrap();
        std::fs::write(ws.dir().join("song.mp3"), "x").unwrap();
        std::fs::write(ws.archive_path(), "zip").unwrap();

        manager.cleanup(&ws.id()).await;
        assert!(!ws.dir().exists());
        assert!(!ws.archive_path().exists());

        manager.cleanup(&ws.id()).await;
        manager.cleanup(&SessionId::generate()).await;
    }

    #[tokio::test]
    async fn reaps_only_stale_sessions() {
        let (base, manager) = manager().await;
        let ws = manager.allocate().await.unwrap();
        std::fs::write(ws.archive_path(), "zip").unwrap();
        std::fs::write(base.path().join("unrelated.txt"), "keep").unwrap();

        assert_eq!(manager.reap_stale(Duration::from_secs(3600)).await, 0);
        assert!(ws.dir().exists());

        assert_eq!(manager.reap_stale(Duration::ZERO).await, 1);
        assert!(!ws.dir().exists());
        assert!(!ws.archive_path().exists());
        assert!(base.path().join("unrelated.txt").exists());
    }

    #[tokio::test]
    async fn sessions_still_reporting_are_not_reaped() {
        let (_base, manager) = manager().await;
        let ws = manager.allocate().await.unwrap();
        ws.append_report("Started").await.unwrap();

        tokio::time::sleep(Duration::from_millis(1200)).await;
        ws.append_report("Still downloading").await.unwrap();

        assert_eq!(manager.reap_stale(Duration::from_secs(1)).await, 0);
        assert!(ws.dir().exists());

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(manager.reap_stale(Duration::from_secs(1)).await, 1);
        assert!(!ws.dir().exists());
    }

    #[test]
    fn parses_archive_names() {
        let id = SessionId::generate();
        assert_eq!(
            session_from_archive_name(&format!("spotify_download_{}.zip", id)),
            Some(id)
        );
        assert_eq!(session_from_archive_name("spotify_download_nope.zip"), None);
        assert_eq!(session_from_archive_name("other.zip"), None);
    }
}
