// components/track_primitives/src/lib.rs
//! Shared vocabulary for the playlist downloader
//!
//! Everything that crosses a component boundary or goes over the wire lives
//! here: normalized track records, the chunks emitted by the analysis and
//! download streams, and the session identifier that ties a download request
//! to its workspace and archive.

mod progress;
mod session;
mod track;
mod wire;

pub use progress::{AnalysisEvent, AnalysisProgress, ArchiveLocation, DownloadProgress};
pub use session::{SessionId, SessionIdError};
pub use track::TrackRecord;
pub use wire::{to_ndjson_line, NDJSON_CONTENT_TYPE};
