// components/track_analysis/src/lib.rs
//! Incremental playlist ingestion
//!
//! [`analyze`] turns one catalog reference into a lazy stream of
//! [`AnalysisEvent`]s, one per catalog page, so a caller can render partial
//! results while large playlists are still being fetched.

use async_stream::stream;
use catalog_client::{normalize_item, CatalogClient, CollectionRef};
use futures::{Stream, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};
use track_primitives::{AnalysisEvent, AnalysisProgress, TrackRecord};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct AnalysisError(String);

/// Stream the tracks behind `reference`
///
/// Single tracks produce exactly one chunk with both counts at 1. Playlists
/// and albums produce one chunk per page with a cumulative `fetched_count`.
/// Any catalog failure ends the stream with a single error chunk.
pub fn analyze(
    client: Arc<dyn CatalogClient>,
    reference: impl Into<String>,
) -> impl Stream<Item = AnalysisEvent> + Send + 'static {
    let reference = reference.into().trim().to_string();

    stream! {
        info!("Streaming analysis for {}", reference);

        let Some(collection) = CollectionRef::from_reference(&reference) else {
            match client.resolve_single(&reference).await {
                Ok(record) => {
                    yield AnalysisEvent::Progress(AnalysisProgress {
                        fetched_count: 1,
                        total_count: 1,
                        batch: vec![record],
                    });
                }
                Err(e) => {
                    error!("Failed to resolve {}: {}", reference, e);
                    yield AnalysisEvent::error(e.to_string());
                }
            }
            return;
        };

        let mut page = match client.list_first_page(&collection).await {
            Ok(page) => page,
            Err(e) => {
                error!("Failed to list {} {}: {}", collection.kind, reference, e);
                yield AnalysisEvent::error(e.to_string());
                return;
            }
        };

        let total_count = match client.total_count(&collection).await {
            Ok(total) => total,
            Err(e) => {
                error!("Failed to count {} {}: {}", collection.kind, reference, e);
                yield AnalysisEvent::error(e.to_string());
                return;
            }
        };

        let mut seen = HashSet::new();
        let mut fetched_count = 0u64;

        loop {
            let batch: Vec<TrackRecord> = page
                .items
                .iter()
                .filter_map(normalize_item)
                .filter(|record| seen.insert(record.canonical_url.clone()))
                .collect();

            let skipped = page.items.len() - batch.len();
            if skipped > 0 {
                debug!("Skipped {} unresolvable, local or duplicate items", skipped);
            }

            fetched_count += batch.len() as u64;
            yield AnalysisEvent::Progress(AnalysisProgress {
                fetched_count,
                total_count,
                batch,
            });

            if !page.has_next() {
                break;
            }

            page = match client.list_next_page(&page).await {
                Ok(next) => next,
                Err(e) => {
                    error!("Failed to fetch next page of {}: {}", reference, e);
                    yield AnalysisEvent::error(e.to_string());
                    return;
                }
            };
        }

        info!("Analysis of {} finished: {}/{} tracks", reference, fetched_count, total_count);
    }
}

/// Drain [`analyze`] into the full track list
pub async fn analyze_to_end(
    client: Arc<dyn CatalogClient>,
    reference: impl Into<String>,
) -> Result<Vec<TrackRecord>, AnalysisError> {
    let mut events = Box::pin(analyze(client, reference));
    let mut tracks = Vec::new();

    while let Some(event) = events.next().await {
        match event {
            AnalysisEvent::Progress(progress) => tracks.extend(progress.batch),
            AnalysisEvent::Error { error } => return Err(AnalysisError(error)),
        }
    }

    Ok(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use catalog_client::{
        CatalogError, CollectionKind, ExternalUrls, Page, RawItem, RawTrack,
    };

    /// Serves canned pages; tokens are the index of the next page
    struct StubCatalog {
        pages: Vec<Vec<RawItem>>,
        total: u64,
        fail_page: Option<usize>,
    }

    impl StubCatalog {
        fn new(pages: Vec<Vec<RawItem>>) -> Self {
            let total = pages.iter().map(|p| p.len() as u64).sum();
            Self {
                pages,
                total,
                fail_page: None,
            }
        }

        fn page(&self, index: usize) -> Result<Page, CatalogError> {
            if self.fail_page == Some(index) {
                return Err(CatalogError::Api {
                    status: 500,
                    url: format!("page-{}", index),
                    message: "upstream exploded".to_string(),
                });
            }
            let next = (index + 1 < self.pages.len()).then(|| (index + 1).to_string());
            Ok(Page::new(
                CollectionKind::Playlist,
                self.pages[index].clone(),
                next,
            ))
        }
    }

    #[async_trait]
    impl CatalogClient for StubCatalog {
        async fn resolve_single(&self, reference: &str) -> Result<TrackRecord, CatalogError> {
            if reference.ends_with("BAD") {
                return Err(CatalogError::UnrecognizedReference(reference.to_string()));
            }
            Ok(catalog_client::normalize_track(&track(reference)).unwrap())
        }

        async fn list_first_page(&self, _: &CollectionRef) -> Result<Page, CatalogError> {
            self.page(0)
        }

        async fn list_next_page(&self, page: &Page) -> Result<Page, CatalogError> {
            let index: usize = page
                .next
                .as_deref()
                .ok_or(CatalogError::NoNextPage)?
                .parse()
                .unwrap();
            self.page(index)
        }

        async fn total_count(&self, _: &CollectionRef) -> Result<u64, CatalogError> {
            Ok(self.total)
        }
    }

    fn track(url: &str) -> RawTrack {
        RawTrack {
            name: Some(format!("Title of {}", url)),
            external_urls: ExternalUrls {
                spotify: Some(url.to_string()),
            },
            duration_ms: Some(200_000),
            ..RawTrack::default()
        }
    }

    fn items(prefix: &str, count: usize) -> Vec<RawItem> {
        (0..count)
            .map(|i| RawItem::from(track(&format!("https://open.spotify.com/track/{}{}", prefix, i))))
            .collect()
    }

    async fn collect(client: StubCatalog, reference: &str) -> Vec<AnalysisEvent> {
        analyze(Arc::new(client), reference).collect().await
    }

    fn progress(event: &AnalysisEvent) -> &AnalysisProgress {
        match event {
            AnalysisEvent::Progress(p) => p,
            AnalysisEvent::Error { error } => panic!("unexpected error chunk: {}", error),
        }
    }

    #[tokio::test]
    async fn single_track_emits_one_chunk() {
        let events = collect(StubCatalog::new(vec![]), "https://open.spotify.com/track/A").await;

        assert_eq!(events.len(), 1);
        let chunk = progress(&events[0]);
        assert_eq!(chunk.fetched_count, 1);
        assert_eq!(chunk.total_count, 1);
        assert_eq!(chunk.batch[0].canonical_url, "https://open.spotify.com/track/A");
    }

    #[tokio::test]
    async fn unresolvable_single_track_emits_error() {
        let events = collect(StubCatalog::new(vec![]), "https://open.spotify.com/track/BAD").await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_error());
    }

    #[tokio::test]
    async fn two_pages_of_fifty_and_ten() {
        let catalog = StubCatalog::new(vec![items("a", 50), items("b", 10)]);
        let events = collect(catalog, "https://open.spotify.com/playlist/pl").await;

        assert_eq!(events.len(), 2);
        assert_eq!(progress(&events[0]).fetched_count, 50);
        assert_eq!(progress(&events[1]).fetched_count, 60);
        assert!(events.iter().all(|e| progress(e).total_count == 60));
    }

    #[tokio::test]
    async fn fetched_count_is_running_sum_of_batches() {
        let mut first = items("a", 5);
        first.push(RawItem::default());
        first.push(RawItem {
            track: Some(track("https://open.spotify.com/track/local")),
            is_local: true,
        });
        let catalog = StubCatalog::new(vec![first, items("b", 3), items("c", 4)]);
        let events = collect(catalog, "https://open.spotify.com/album/al").await;

        let mut running = 0;
        let mut previous = 0;
        for event in &events {
            let chunk = progress(event);
            running += chunk.batch.len() as u64;
            assert_eq!(chunk.fetched_count, running);
            assert!(chunk.fetched_count >= previous);
            previous = chunk.fetched_count;
        }

        // skipped items still count toward the catalog total
        assert_eq!(progress(&events[0]).total_count, 14);
        assert_eq!(running, 12);
    }

    #[tokio::test]
    async fn local_and_empty_items_never_surface() {
        let page = vec![
            RawItem::default(),
            RawItem {
                track: Some(track("https://open.spotify.com/track/local")),
                is_local: true,
            },
            RawItem::from(track("https://open.spotify.com/track/real")),
        ];
        let events = collect(StubCatalog::new(vec![page]), "https://open.spotify.com/playlist/p").await;

        let urls: Vec<_> = events
            .iter()
            .flat_map(|e| progress(e).batch.iter().map(|r| r.canonical_url.as_str()))
            .collect();
        assert_eq!(urls, vec!["https://open.spotify.com/track/real"]);
    }

    #[tokio::test]
    async fn duplicates_across_pages_are_dropped() {
        let catalog = StubCatalog::new(vec![items("a", 3), items("a", 2)]);
        let events = collect(catalog, "https://open.spotify.com/playlist/dup").await;

        assert_eq!(progress(&events[1]).batch.len(), 0);
        assert_eq!(progress(&events[1]).fetched_count, 3);
    }

    #[tokio::test]
    async fn failing_page_ends_stream_with_single_error() {
        let mut catalog = StubCatalog::new(vec![items("a", 2), items("b", 2), items("c", 2)]);
        catalog.fail_page = Some(1);
        let events = collect(catalog, "https://open.spotify.com/playlist/p").await;

        assert_eq!(events.len(), 2);
        assert_eq!(progress(&events[0]).fetched_count, 2);
        assert_matches!(&events[1], AnalysisEvent::Error { error } if error.contains("upstream exploded"));
    }

    #[tokio::test]
    async fn failing_first_page_yields_only_error() {
        let mut catalog = StubCatalog::new(vec![items("a", 2)]);
        catalog.fail_page = Some(0);
        let events = collect(catalog, "https://open.spotify.com/playlist/p").await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_error());
    }

    #[tokio::test]
    async fn analyze_to_end_collects_every_batch() {
        let catalog = StubCatalog::new(vec![items("a", 4), items("b", 1)]);
        let tracks = analyze_to_end(Arc::new(catalog), "https://open.spotify.com/playlist/p")
            .await
            .unwrap();
        assert_eq!(tracks.len(), 5);

        let mut failing = StubCatalog::new(vec![items("a", 1)]);
        failing.fail_page = Some(0);
        let result = analyze_to_end(Arc::new(failing), "https://open.spotify.com/playlist/p").await;
        assert!(result.is_err());
    }
}
