// bases/download_server/src/config.rs
use catalog_client::SpotifyConfig;
use clap::Parser;
use media_downloader::{FetchMode, SpotDlOptions};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: SocketAddr,

    /// Base directory for session workspaces and archives
    pub download_dir: PathBuf,

    pub spotify: SpotifyConfig,

    pub spotdl: SpotDlOptions,
    pub fetch_mode: FetchMode,

    /// Sessions older than this are reaped
    pub retention: Duration,
    pub reap_interval: Duration,
}

/// Playlist download server
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Address to bind to
    #[arg(long, env = "DOWNLOAD_SERVER_HOST", default_value = "0.0.0.0")]
    pub host: std::net::IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "DOWNLOAD_SERVER_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Directory holding session workspaces and finished archives
    #[arg(long, env = "DOWNLOAD_DIR", default_value = "downloads")]
    pub download_dir: PathBuf,

    #[arg(long, env = "SPOTIFY_CLIENT_ID")]
    pub spotify_client_id: String,

    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    pub spotify_client_secret: String,

    #[arg(long, env = "SPOTIFY_API_BASE")]
    pub spotify_api_base: Option<String>,

    #[arg(long, env = "SPOTIFY_TOKEN_URL")]
    pub spotify_token_url: Option<String>,

    /// spotdl executable
    #[arg(long, env = "SPOTDL_BIN", default_value = "spotdl")]
    pub spotdl: String,

    /// `batch` runs one spotdl process per request, `per-item` one per track
    #[arg(long, env = "FETCH_MODE", default_value = "batch")]
    pub fetch_mode: FetchMode,

    /// Audio format passed to spotdl
    #[arg(long, default_value = "mp3")]
    pub format: String,

    /// Download threads hint for batch mode
    #[arg(long, default_value_t = 4)]
    pub threads: usize,

    /// Ceiling for a single spotdl run, in seconds
    #[arg(long, default_value_t = 30 * 60)]
    pub process_timeout_secs: u64,

    /// Remove sessions older than this many seconds
    #[arg(long, default_value_t = 60 * 60)]
    pub retention_secs: u64,

    #[arg(long, default_value_t = 5 * 60)]
    pub reap_interval_secs: u64,
}

impl Config {
    /// Create configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Self {
        let mut spotify = SpotifyConfig::new(args.spotify_client_id, args.spotify_client_secret);
        if let Some(api_base) = args.spotify_api_base {
            spotify.api_base = api_base;
        }
        if let Some(token_url) = args.spotify_token_url {
            spotify.token_url = token_url;
        }

        let spotdl = SpotDlOptions {
            program: args.spotdl,
            format: args.format,
            threads: args.threads,
            timeout: Duration::from_secs(args.process_timeout_secs),
            ..SpotDlOptions::default()
        };

        Self {
            listen: SocketAddr::new(args.host, args.port),
            download_dir: args.download_dir,
            spotify,
            spotdl,
            fetch_mode: args.fetch_mode,
            retention: Duration::from_secs(args.retention_secs),
            reap_interval: Duration::from_secs(args.reap_interval_secs.max(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Config {
        let mut argv = vec![
            "download-server",
            "--spotify-client-id",
            "id",
            "--spotify-client-secret",
            "secret",
        ];
        argv.extend_from_slice(extra);
        Config::from_args(CliArgs::parse_from(argv))
    }

    #[test]
    fn defaults() {
        let config = parse(&[]);
        assert_eq!(config.listen.port(), 8000);
        assert_eq!(config.download_dir, PathBuf::from("downloads"));
        assert_eq!(config.fetch_mode, FetchMode::Batch);
        assert_eq!(config.spotdl.program, "spotdl");
        assert_eq!(config.spotdl.timeout, Duration::from_secs(1800));
        assert_eq!(config.spotify.api_base, "https://api.spotify.com/v1");
        assert_eq!(config.retention, Duration::from_secs(3600));
    }

    #[test]
    fn overrides() {
        let config = parse(&[
            "--port",
            "9000",
            "--fetch-mode",
            "per-item",
            "--spotify-api-base",
            "http://localhost:1234",
            "--process-timeout-secs",
            "60",
            "--reap-interval-secs",
            "0",
        ]);
        assert_eq!(config.listen.port(), 9000);
        assert_eq!(config.fetch_mode, FetchMode::PerItem);
        assert_eq!(config.spotify.api_base, "http://localhost:1234");
        assert_eq!(config.spotdl.timeout, Duration::from_secs(60));
        assert_eq!(config.reap_interval, Duration::from_secs(1));
    }
}
