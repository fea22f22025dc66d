// components/track_primitives/src/track.rs
use serde::{Deserialize, Serialize};

/// A track as surfaced to the user for selection
///
/// Field names on the wire follow what the front-end has always consumed
/// (`duration`, `url`, `cover_url`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackRecord {
    pub title: String,

    /// All credited artists, comma separated
    pub artist: String,

    pub album: String,

    #[serde(rename = "duration")]
    pub duration_seconds: u64,

    /// Identifies the track for deduplication and for the fetch tool
    #[serde(rename = "url")]
    pub canonical_url: String,

    /// Empty when the catalog has no artwork
    #[serde(rename = "cover_url")]
    pub cover_image_url: String,
}
