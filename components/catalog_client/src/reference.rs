// components/catalog_client/src/reference.rs
use crate::CatalogError;
use std::fmt;
use url::Url;

/// What a user supplied reference points at
///
/// Classification is a substring heuristic: anything mentioning "playlist"
/// is a playlist, otherwise anything mentioning "album" is an album, and
/// everything else is treated as a single track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Playlist,
    Album,
    Track,
}

impl ReferenceKind {
    pub fn classify(reference: &str) -> Self {
        if reference.contains("playlist") {
            ReferenceKind::Playlist
        } else if reference.contains("album") {
            ReferenceKind::Album
        } else {
            ReferenceKind::Track
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Playlist,
    Album,
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKind::Playlist => write!(f, "playlist"),
            CollectionKind::Album => write!(f, "album"),
        }
    }
}

/// A reference known to point at a paginated listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRef {
    pub kind: CollectionKind,
    pub reference: String,
}

impl CollectionRef {
    /// Returns `None` for single-track references
    pub fn from_reference(reference: &str) -> Option<Self> {
        let kind = match ReferenceKind::classify(reference) {
            ReferenceKind::Playlist => CollectionKind::Playlist,
            ReferenceKind::Album => CollectionKind::Album,
            ReferenceKind::Track => return None,
        };
        Some(Self {
            kind,
            reference: reference.to_string(),
        })
    }

    pub fn catalog_id(&self) -> Result<String, CatalogError> {
        catalog_id(&self.reference)
    }
}

/// Extract the catalog id from a share URL, a `spotify:` URI or a bare id
///
/// `https://open.spotify.com/playlist/37i9dQZF1DX?si=abc` → `37i9dQZF1DX`
pub(crate) fn catalog_id(reference: &str) -> Result<String, CatalogError> {
    let reference = reference.trim();
    let unrecognized = || CatalogError::UnrecognizedReference(reference.to_string());

    let candidate = if reference.starts_with("spotify:") {
        reference.rsplit(':').next().map(str::to_string)
    } else if let Ok(url) = Url::parse(reference) {
        url.path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string)
    } else {
        Some(reference.to_string())
    };

    match candidate {
        Some(id) if !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric()) => Ok(id),
        _ => Err(unrecognized()),
    }
}
