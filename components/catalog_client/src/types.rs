// components/catalog_client/src/types.rs
//! Raw catalog payloads, as close to the wire as serde allows
//!
//! Every field is optional or defaulted: catalogs return partial objects for
//! local files, removed tracks and podcast episodes, and those must be
//! skippable rather than fatal.

use crate::CollectionKind;
use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawArtist {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawImage {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawAlbum {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub images: Vec<RawImage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExternalUrls {
    #[serde(default)]
    pub spotify: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawTrack {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub artists: Vec<RawArtist>,
    #[serde(default)]
    pub album: Option<RawAlbum>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub external_urls: ExternalUrls,
    #[serde(default)]
    pub is_local: bool,
}

/// One entry of a listing page
///
/// Playlist listings wrap the track (`{"track": {...}, "is_local": false}`);
/// album listings return tracks directly and are wrapped by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawItem {
    #[serde(default)]
    pub track: Option<RawTrack>,
    #[serde(default)]
    pub is_local: bool,
}

impl From<RawTrack> for RawItem {
    fn from(track: RawTrack) -> Self {
        Self {
            is_local: track.is_local,
            track: Some(track),
        }
    }
}

/// One page of a playlist or album listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub kind: CollectionKind,
    pub items: Vec<RawItem>,
    /// Continuation token; `None` on the last page
    pub next: Option<String>,
    /// Album listings omit the album on each track, so it is carried here
    /// and attached to the tracks of every following page
    pub album_context: Option<RawAlbum>,
}

impl Page {
    pub fn new(kind: CollectionKind, items: Vec<RawItem>, next: Option<String>) -> Self {
        Self {
            kind,
            items,
            next,
            album_context: None,
        }
    }

    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}
