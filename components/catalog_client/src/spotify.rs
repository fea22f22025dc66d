// components/catalog_client/src/spotify.rs
use crate::normalize::normalize_track;
use crate::reference::catalog_id;
use crate::{CatalogClient, CatalogError, CollectionKind, CollectionRef, Page, RawAlbum, RawItem, RawTrack};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};
use track_primitives::TrackRecord;

const DEFAULT_API_BASE: &str = "https://api.spotify.com/v1";
const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const PLAYLIST_PAGE_SIZE: &str = "100";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Refresh this long before the token actually expires
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub api_base: String,
    pub token_url: String,
}

impl SpotifyConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
        }
    }
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_EXPIRY_MARGIN < self.expires_at
    }
}

/// Spotify Web API client using the client-credentials flow
pub struct SpotifyCatalog {
    http: reqwest::Client,
    config: SpotifyConfig,
    token: Mutex<AccessToken>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Deserialize)]
struct Paging<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Deserialize)]
struct AlbumObject {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    images: Vec<crate::RawImage>,
    #[serde(default)]
    total_tracks: u64,
    tracks: Paging<RawTrack>,
}

impl AlbumObject {
    fn context(&self) -> RawAlbum {
        RawAlbum {
            name: self.name.clone(),
            images: self.images.clone(),
        }
    }
}

#[derive(Deserialize)]
struct PlaylistTotal {
    tracks: PlaylistTracksTotal,
}

#[derive(Deserialize)]
struct PlaylistTracksTotal {
    total: u64,
}

impl SpotifyCatalog {
    /// Build the client and perform the initial token exchange
    pub async fn connect(config: SpotifyConfig) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let token = Self::request_token(&http, &config).await?;
        info!("Connected to catalog at {}", config.api_base);

        Ok(Self {
            http,
            config,
            token: Mutex::new(token),
        })
    }

    async fn request_token(
        http: &reqwest::Client,
        config: &SpotifyConfig,
    ) -> Result<AccessToken, CatalogError> {
        let response = http
            .post(&config.token_url)
            .basic_auth(&config.client_id, Some(&config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Auth(format!("{}: {}", status, body)));
        }

        let token: TokenResponse = response.json().await?;
        Ok(AccessToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }

    async fn bearer(&self) -> Result<String, CatalogError> {
        let mut token = self.token.lock().await;
        if !token.is_fresh() {
            debug!("Access token expired, refreshing");
            *token = Self::request_token(&self.http, &self.config).await?;
        }
        Ok(token.value.clone())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, CatalogError> {
        let bearer = self.bearer().await?;
        debug!("GET {}", url);

        let response = self
            .http
            .get(url)
            .bearer_auth(bearer)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CatalogError::Api {
                status: status.as_u16(),
                url: url.to_string(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn album_page(tracks: Paging<RawTrack>, album: RawAlbum) -> Page {
        let items = tracks
            .items
            .into_iter()
            .map(|mut track| {
                if track.album.is_none() {
                    track.album = Some(album.clone());
                }
                RawItem::from(track)
            })
            .collect();

        Page {
            kind: CollectionKind::Album,
            items,
            next: tracks.next,
            album_context: Some(album),
        }
    }
}

#[async_trait]
impl CatalogClient for SpotifyCatalog {
    async fn resolve_single(&self, reference: &str) -> Result<TrackRecord, CatalogError> {
        let id = catalog_id(reference)?;
        let track: RawTrack = self.get_json(&self.endpoint(&format!("tracks/{}", id)), &[]).await?;
        normalize_track(&track).ok_or_else(|| CatalogError::Unresolvable(reference.to_string()))
    }

    async fn list_first_page(&self, collection: &CollectionRef) -> Result<Page, CatalogError> {
        let id = collection.catalog_id()?;
        match collection.kind {
            CollectionKind::Playlist => {
                let paging: Paging<RawItem> = self
                    .get_json(
                        &self.endpoint(&format!("playlists/{}/tracks", id)),
                        &[("limit", PLAYLIST_PAGE_SIZE)],
                    )
                    .await?;
                Ok(Page::new(CollectionKind::Playlist, paging.items, paging.next))
            }
            CollectionKind::Album => {
                let album: AlbumObject =
                    self.get_json(&self.endpoint(&format!("albums/{}", id)), &[]).await?;
                let context = album.context();
                Ok(Self::album_page(album.tracks, context))
            }
        }
    }

    async fn list_next_page(&self, page: &Page) -> Result<Page, CatalogError> {
        let next = page.next.as_deref().ok_or(CatalogError::NoNextPage)?;
        match page.kind {
            CollectionKind::Playlist => {
                let paging: Paging<RawItem> = self.get_json(next, &[]).await?;
                Ok(Page::new(CollectionKind::Playlist, paging.items, paging.next))
            }
            CollectionKind::Album => {
                let paging: Paging<RawTrack> = self.get_json(next, &[]).await?;
                let context = page.album_context.clone().unwrap_or_default();
                Ok(Self::album_page(paging, context))
            }
        }
    }

    async fn total_count(&self, collection: &CollectionRef) -> Result<u64, CatalogError> {
        let id = collection.catalog_id()?;
        match collection.kind {
            CollectionKind::Playlist => {
                let total: PlaylistTotal = self
                    .get_json(
                        &self.endpoint(&format!("playlists/{}", id)),
                        &[("fields", "tracks.total")],
                    )
                    .await?;
                Ok(total.tracks.total)
            }
            CollectionKind::Album => {
                let album: AlbumObject =
                    self.get_json(&self.endpoint(&format!("albums/{}", id)), &[]).await?;
                Ok(album.total_tracks)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_catalog() -> (MockServer, SpotifyCatalog) {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "test-token",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let config = SpotifyConfig {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            api_base: format!("{}/v1", server.uri()),
            token_url: format!("{}/api/token", server.uri()),
        };
        let catalog = SpotifyCatalog::connect(config).await.unwrap();
        (server, catalog)
    }

    fn track_json(id: &str) -> Value {
        json!({
            "name": format!("Track {}", id),
            "artists": [{"name": "Artist"}],
            "album": {"name": "Album", "images": [{"url": "https://img/cover"}]},
            "duration_ms": 180_000,
            "external_urls": {"spotify": format!("https://open.spotify.com/track/{}", id)},
            "is_local": false
        })
    }

    #[tokio::test]
    async fn resolves_single_track() {
        let (server, catalog) = mock_catalog().await;
        Mock::given(method("GET"))
            .and(path("/v1/tracks/abc"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(track_json("abc")))
            .mount(&server)
            .await;

        let record = catalog
            .resolve_single("https://open.spotify.com/track/abc?si=xyz")
            .await
            .unwrap();
        assert_eq!(record.title, "Track abc");
        assert_eq!(record.duration_seconds, 180);
        assert_eq!(record.canonical_url, "https://open.spotify.com/track/abc");
    }

    #[tokio::test]
    async fn pages_through_playlist() {
        let (server, catalog) = mock_catalog().await;
        let next = format!("{}/v1/playlists/pl1/tracks?offset=100&limit=100", server.uri());

        Mock::given(method("GET"))
            .and(path("/v1/playlists/pl1/tracks"))
            .and(query_param("limit", "100"))
            .and(query_param("offset", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"track": track_json("c"), "is_local": false}],
                "next": null
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/playlists/pl1/tracks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"track": track_json("a"), "is_local": false},
                    {"track": null, "is_local": false}
                ],
                "next": next
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/playlists/pl1"))
            .and(query_param("fields", "tracks.total"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tracks": {"total": 3}})))
            .mount(&server)
            .await;

        let playlist = CollectionRef::from_reference("https://open.spotify.com/playlist/pl1").unwrap();

        let first = catalog.list_first_page(&playlist).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert!(first.has_next());

        let second = catalog.list_next_page(&first).await.unwrap();
        assert_eq!(second.items.len(), 1);
        assert!(!second.has_next());
        assert_matches!(
            catalog.list_next_page(&second).await,
            Err(CatalogError::NoNextPage)
        );

        assert_eq!(catalog.total_count(&playlist).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn album_tracks_inherit_album_context() {
        let (server, catalog) = mock_catalog().await;
        let next = format!("{}/v1/albums/al1/tracks?offset=1", server.uri());

        let mut bare_track = track_json("b");
        bare_track.as_object_mut().unwrap().remove("album");

        Mock::given(method("GET"))
            .and(path("/v1/albums/al1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "The Album",
                "images": [{"url": "https://img/album"}],
                "total_tracks": 2,
                "tracks": {"items": [bare_track.clone()], "next": next}
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/albums/al1/tracks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [bare_track],
                "next": null
            })))
            .mount(&server)
            .await;

        let album = CollectionRef::from_reference("spotify:album:al1").unwrap();
        let first = catalog.list_first_page(&album).await.unwrap();
        let second = catalog.list_next_page(&first).await.unwrap();

        for page in [&first, &second] {
            let record = normalize_track(page.items[0].track.as_ref().unwrap()).unwrap();
            assert_eq!(record.album, "The Album");
            assert_eq!(record.cover_image_url, "https://img/album");
        }
        assert_eq!(catalog.total_count(&album).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn api_errors_carry_status() {
        let (server, catalog) = mock_catalog().await;
        Mock::given(method("GET"))
            .and(path("/v1/tracks/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        assert_matches!(
            catalog.resolve_single("https://open.spotify.com/track/missing").await,
            Err(CatalogError::Api { status: 404, .. })
        );
    }

    #[tokio::test]
    async fn rejected_credentials_fail_connect() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let mut config = SpotifyConfig::new("id", "bad");
        config.token_url = format!("{}/api/token", server.uri());

        assert_matches!(
            SpotifyCatalog::connect(config).await.err(),
            Some(CatalogError::Auth(_))
        );
    }
}
