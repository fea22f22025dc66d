// components/catalog_client/src/normalize.rs
use crate::{RawItem, RawTrack};
use track_primitives::TrackRecord;

const UNKNOWN_ALBUM: &str = "Unknown";

/// Turn a listing entry into a [`TrackRecord`]
///
/// Returns `None` for entries that must never be surfaced: no track payload,
/// locally-sourced files, or tracks the catalog has no canonical URL for.
pub fn normalize_item(item: &RawItem) -> Option<TrackRecord> {
    if item.is_local {
        return None;
    }
    item.track.as_ref().and_then(normalize_track)
}

pub fn normalize_track(track: &RawTrack) -> Option<TrackRecord> {
    if track.is_local {
        return None;
    }

    let canonical_url = track
        .external_urls
        .spotify
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())?
        .to_string();

    let artist = track
        .artists
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let album = track
        .album
        .as_ref()
        .and_then(|a| a.name.clone())
        .unwrap_or_else(|| UNKNOWN_ALBUM.to_string());

    let cover_image_url = track
        .album
        .as_ref()
        .and_then(|a| a.images.first())
        .map(|img| img.url.clone())
        .unwrap_or_default();

    Some(TrackRecord {
        title: track.name.clone().unwrap_or_default(),
        artist,
        album,
        duration_seconds: track.duration_ms.unwrap_or(0) / 1000,
        canonical_url,
        cover_image_url,
    })
}
