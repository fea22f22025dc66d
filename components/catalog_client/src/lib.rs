// components/catalog_client/src/lib.rs
//! Access to the external music catalog
//!
//! The rest of the system only sees the [`CatalogClient`] trait. The Spotify
//! Web API implementation is constructed explicitly with [`SpotifyCatalog::connect`]
//! and handed to whoever needs catalog access.

mod error;
mod normalize;
mod reference;
mod spotify;
mod types;

use async_trait::async_trait;
use track_primitives::TrackRecord;

pub use error::CatalogError;
pub use normalize::{normalize_item, normalize_track};
pub use reference::{CollectionKind, CollectionRef, ReferenceKind};
pub use spotify::{SpotifyCatalog, SpotifyConfig};
pub use types::{ExternalUrls, Page, RawAlbum, RawArtist, RawImage, RawItem, RawTrack};

#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Resolve a reference that points at a single track
    async fn resolve_single(&self, reference: &str) -> Result<TrackRecord, CatalogError>;

    /// Fetch the first page of a playlist or album listing
    async fn list_first_page(&self, collection: &CollectionRef) -> Result<Page, CatalogError>;

    /// Follow the continuation token of `page`
    ///
    /// Fails with [`CatalogError::NoNextPage`] when `page` is the last one.
    async fn list_next_page(&self, page: &Page) -> Result<Page, CatalogError>;

    /// Number of items the catalog reports for the collection
    async fn total_count(&self, collection: &CollectionRef) -> Result<u64, CatalogError>;
}
