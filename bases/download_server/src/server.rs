// bases/download_server/src/server.rs
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::reaper;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use catalog_client::{CatalogClient, SpotifyCatalog};
use futures::{Stream, StreamExt};
use media_downloader::{normalize_references, BatchDownloader, WorkspaceManager};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use track_primitives::{
    to_ndjson_line, ArchiveLocation, SessionId, TrackRecord, NDJSON_CONTENT_TYPE,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogClient>,
    pub downloader: BatchDownloader,
}

#[derive(Debug, Deserialize)]
struct AnalyzeQuery {
    url: String,
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    url: String,
}

#[derive(Debug, Serialize)]
struct AnalyzeResponse {
    input_url: String,
    track_count: usize,
    tracks: Vec<TrackRecord>,
}

#[derive(Debug, Deserialize)]
struct DownloadRequest {
    urls: Vec<String>,
}

/// Run the download HTTP server
pub async fn run(config: Config) -> color_eyre::Result<()> {
    let catalog = SpotifyCatalog::connect(config.spotify.clone()).await?;
    info!("Connected to the Spotify catalog");

    let downloader =
        BatchDownloader::new(&config.download_dir, config.spotdl.clone(), config.fetch_mode)
            .await?;
    reaper::spawn(
        downloader.workspaces().clone(),
        config.retention,
        config.reap_interval,
    );

    let state = AppState {
        catalog: Arc::new(catalog),
        downloader,
    };

    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    info!("Download server listening on http://{}", config.listen);

    axum::serve(listener, router(state)).await?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/analyze_stream", get(analyze_stream))
        .route("/analyze", post(analyze))
        .route("/download_batch", post(download_batch))
        .route("/download_file/:session_id", get(download_file))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Newline delimited JSON body, one chunk per line
fn ndjson<S, T>(chunks: S) -> Response
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize + Send + 'static,
{
    let lines = chunks.map(|chunk| to_ndjson_line(&chunk));
    (
        [(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)],
        Body::from_stream(lines),
    )
        .into_response()
}

fn required(value: &str, what: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("No {} provided", what)));
    }
    Ok(value.to_string())
}

async fn analyze_stream(
    State(state): State<AppState>,
    Query(query): Query<AnalyzeQuery>,
) -> Result<Response> {
    let url = required(&query.url, "url")?;
    Ok(ndjson(track_analysis::analyze(state.catalog, url)))
}

async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>> {
    info!("Analyzing URL: {}", request.url);
    let tracks = track_analysis::analyze_to_end(state.catalog, request.url.clone()).await?;

    Ok(Json(AnalyzeResponse {
        input_url: request.url,
        track_count: tracks.len(),
        tracks,
    }))
}

async fn download_batch(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> Result<Response> {
    let urls = normalize_references(&request.urls);
    if urls.is_empty() {
        return Err(AppError::BadRequest("No URLs provided".to_string()));
    }
    info!("Received batch download request for {} urls", urls.len());

    let chunks = state.downloader.download(urls).map(|chunk| {
        chunk.map_location(|id, _| ArchiveLocation::DownloadUrl(download_url(id)))
    });
    Ok(ndjson(chunks))
}

fn download_url(id: &SessionId) -> String {
    format!("/download_file/{}", id)
}

/// Removes a session once its archive body has been sent or abandoned
struct CleanupOnDrop {
    workspaces: WorkspaceManager,
    id: SessionId,
}

impl Drop for CleanupOnDrop {
    fn drop(&mut self) {
        let workspaces = self.workspaces.clone();
        let id = self.id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { workspaces.cleanup(&id).await });
            }
            Err(_) => warn!(session_id = %id, "No runtime to clean up session, leaving it for the reaper"),
        }
    }
}

async fn download_file(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response> {
    let not_found = || AppError::NotFound("File not found".to_string());
    let id = SessionId::parse(&session_id).map_err(|_| not_found())?;

    let workspaces = state.downloader.workspaces().clone();
    let archive_path = workspaces.archive_path(&id);
    let file = match tokio::fs::File::open(&archive_path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(AppError::io(format!("opening {}", archive_path.display()), e)),
    };
    info!(session_id = %id, "Delivering archive {}", archive_path.display());

    let cleanup = CleanupOnDrop { workspaces, id };
    let body = async_stream::stream! {
        let _cleanup = cleanup;
        let mut chunks = ReaderStream::new(file);
        while let Some(chunk) = chunks.next().await {
            yield chunk;
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"spotify_download.zip\"",
            ),
        ],
        Body::from_stream(body),
    )
        .into_response())
}
