// bases/download_cli/src/app.rs
use crate::args::{Args, Command, SpotifyArgs};
use crate::output::OutputHandler;
use catalog_client::{CatalogClient, CollectionRef, SpotifyCatalog, SpotifyConfig};
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use futures::StreamExt;
use media_downloader::{
    normalize_references, BatchDownloader, FetchMode, SpotDlOptions, WorkspaceManager,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use track_primitives::{AnalysisEvent, ArchiveLocation, DownloadProgress, SessionId};

/// Sessions are assembled here before the archive is moved to the output directory
const SESSIONS_DIR: &str = ".sessions";

pub struct App {
    args: Args,
    output: OutputHandler,
}

impl App {
    pub fn new(args: Args) -> Self {
        let output = OutputHandler::new(args.verbose);
        Self { args, output }
    }

    pub async fn run(&self) -> Result<()> {
        match &self.args.command {
            Command::Analyze { url } => self.analyze(url).await,
            Command::Download {
                output_dir,
                mode,
                spotdl,
                format,
                timeout_secs,
                urls,
            } => {
                let options = SpotDlOptions {
                    program: spotdl.clone(),
                    format: format.clone(),
                    timeout: Duration::from_secs(*timeout_secs),
                    ..SpotDlOptions::default()
                };
                self.download(output_dir, *mode, options, urls).await
            }
        }
    }

    pub fn print_error(&self, error: &color_eyre::Report) {
        self.output.print_error(error);
    }

    async fn analyze(&self, url: &str) -> Result<()> {
        let catalog = connect(&self.args.spotify).await?;
        let mut events = Box::pin(track_analysis::analyze(catalog, url));

        while let Some(event) = events.next().await {
            match event {
                AnalysisEvent::Progress(progress) => self.output.print_analysis_progress(&progress),
                AnalysisEvent::Error { error } => {
                    return Err(eyre!("Failed to analyze {}: {}", url, error))
                }
            }
        }
        Ok(())
    }

    async fn download(
        &self,
        output_dir: &Path,
        mode: FetchMode,
        options: SpotDlOptions,
        urls: &[String],
    ) -> Result<()> {
        let references = normalize_references(urls);
        let catalog = if references.iter().any(|r| CollectionRef::from_reference(r).is_some()) {
            Some(connect(&self.args.spotify).await?)
        } else {
            None
        };
        let tracks = expand_references(catalog, &references).await?;

        let downloader = BatchDownloader::new(output_dir.join(SESSIONS_DIR), options, mode)
            .await
            .wrap_err("Failed to set up downloader")?;

        self.output.print_download_start(tracks.len());
        let mut chunks = Box::pin(downloader.download(tracks));

        while let Some(chunk) = chunks.next().await {
            match chunk {
                DownloadProgress::Done {
                    session_id,
                    archive_location: ArchiveLocation::FilePath(archive),
                    ..
                } => {
                    let delivered =
                        hand_off(downloader.workspaces(), &session_id, &archive, output_dir)
                            .await?;
                    self.output.print_archive(&delivered);
                }
                DownloadProgress::Error { error } => return Err(eyre!("Download failed: {}", error)),
                chunk => self.output.print_download_progress(&chunk),
            }
        }
        Ok(())
    }
}

async fn connect(args: &SpotifyArgs) -> Result<Arc<dyn CatalogClient>> {
    let (Some(id), Some(secret)) = (&args.spotify_client_id, &args.spotify_client_secret) else {
        return Err(eyre!(
            "Spotify credentials missing, set SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET"
        ));
    };

    let mut config = SpotifyConfig::new(id, secret);
    if let Some(api_base) = &args.spotify_api_base {
        config.api_base = api_base.clone();
    }
    if let Some(token_url) = &args.spotify_token_url {
        config.token_url = token_url.clone();
    }

    let catalog = SpotifyCatalog::connect(config)
        .await
        .wrap_err("Failed to connect to Spotify")?;
    Ok(Arc::new(catalog))
}

/// Replace album and playlist links with the links of their tracks
async fn expand_references(
    catalog: Option<Arc<dyn CatalogClient>>,
    references: &[String],
) -> Result<Vec<String>> {
    let mut tracks = Vec::new();

    for reference in references {
        if CollectionRef::from_reference(reference).is_none() {
            tracks.push(reference.clone());
            continue;
        }

        let catalog = catalog
            .clone()
            .ok_or_else(|| eyre!("A catalog connection is needed to expand {}", reference))?;
        let records = track_analysis::analyze_to_end(catalog, reference.as_str())
            .await
            .wrap_err_with(|| format!("Failed to analyze {}", reference))?;
        tracing::info!("Expanded {} into {} tracks", reference, records.len());
        tracks.extend(records.into_iter().map(|r| r.canonical_url));
    }

    Ok(normalize_references(tracks))
}

/// Move the archive to `output_dir`, then remove the session
///
/// The session is kept when the move fails, so the archive stays where it is.
async fn hand_off(
    workspaces: &WorkspaceManager,
    id: &SessionId,
    archive: &Path,
    output_dir: &Path,
) -> Result<PathBuf> {
    let delivered = deliver(archive, output_dir)
        .await
        .wrap_err_with(|| format!("Archive left at {}", archive.display()))?;
    workspaces.cleanup(id).await;
    Ok(delivered)
}

/// Move a finished archive out of the session directory
async fn deliver(archive: &Path, output_dir: &Path) -> Result<PathBuf> {
    let file_name = archive
        .file_name()
        .ok_or_else(|| eyre!("Archive path {} has no file name", archive.display()))?;
    let target = output_dir.join(file_name);

    tokio::fs::rename(archive, &target)
        .await
        .wrap_err_with(|| format!("Failed to move archive to {}", target.display()))?;
    Ok(target)
}
