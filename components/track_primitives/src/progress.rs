// components/track_primitives/src/progress.rs
use crate::{SessionId, TrackRecord};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One page worth of analysis results
///
/// `fetched_count` is cumulative over the stream and never decreases.
/// `total_count` is what the catalog reports and may exceed the number of
/// records eventually emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisProgress {
    #[serde(rename = "progress")]
    pub fetched_count: u64,

    #[serde(rename = "total")]
    pub total_count: u64,

    #[serde(rename = "tracks")]
    pub batch: Vec<TrackRecord>,
}

/// A chunk of the analysis stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AnalysisEvent {
    Progress(AnalysisProgress),
    Error { error: String },
}

impl AnalysisEvent {
    pub fn error(message: impl Into<String>) -> Self {
        AnalysisEvent::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, AnalysisEvent::Error { .. })
    }
}

/// Where the caller picks up the finished archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveLocation {
    /// Absolute path on the local filesystem
    FilePath(PathBuf),
    /// Follow-up retrieval URL served by the download endpoint
    DownloadUrl(String),
}

/// A chunk of the download stream
///
/// Exactly one of `Done` or `Error` ends a stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DownloadProgress {
    Log {
        log: String,
        #[serde(rename = "progress_update", skip_serializing_if = "Option::is_none")]
        fraction_complete: Option<f64>,
    },
    Done {
        done: bool,
        session_id: SessionId,
        #[serde(flatten)]
        archive_location: ArchiveLocation,
        log: String,
    },
    Error {
        error: String,
    },
}

impl DownloadProgress {
    pub fn log(line: impl Into<String>) -> Self {
        DownloadProgress::Log {
            log: line.into(),
            fraction_complete: None,
        }
    }

    pub fn progress(line: impl Into<String>, fraction: f64) -> Self {
        DownloadProgress::Log {
            log: line.into(),
            fraction_complete: Some(fraction),
        }
    }

    pub fn done(session_id: SessionId, archive_location: ArchiveLocation) -> Self {
        DownloadProgress::Done {
            done: true,
            session_id,
            archive_location,
            log: "Download Complete!".to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        DownloadProgress::Error {
            error: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, DownloadProgress::Log { .. })
    }

    pub fn fraction(&self) -> Option<f64> {
        match self {
            DownloadProgress::Log {
                fraction_complete, ..
            } => *fraction_complete,
            DownloadProgress::Done { .. } => Some(1.0),
            DownloadProgress::Error { .. } => None,
        }
    }

    /// Rewrite the archive location of a `Done` chunk, leaving other chunks untouched
    pub fn map_location(
        self,
        f: impl FnOnce(&SessionId, ArchiveLocation) -> ArchiveLocation,
    ) -> Self {
        match self {
            DownloadProgress::Done {
                done,
                session_id,
                archive_location,
                log,
            } => {
                let archive_location = f(&session_id, archive_location);
                DownloadProgress::Done {
                    done,
                    session_id,
                    archive_location,
                    log,
                }
            }
            other => other,
        }
    }
}
