// bases/download_cli/src/args.rs
use clap::{Args as ClapArgs, Parser, Subcommand};
use media_downloader::FetchMode;
use std::path::PathBuf;

/// Analyze Spotify links and download their tracks into a zip archive
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub spotify: SpotifyArgs,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the tracks behind a track, album or playlist link
    Analyze {
        /// Link to analyze
        url: String,
    },

    /// Download tracks into a zip archive
    ///
    /// Album and playlist links are expanded to their tracks first.
    Download {
        /// Directory to store the archive in
        #[arg(short, long)]
        output_dir: PathBuf,

        /// `batch` runs spotdl once, `per-item` once per track
        #[arg(long, default_value = "batch")]
        mode: FetchMode,

        /// spotdl executable
        #[arg(long, env = "SPOTDL_BIN", default_value = "spotdl")]
        spotdl: String,

        /// Audio format passed to spotdl
        #[arg(long, default_value = "mp3")]
        format: String,

        /// Ceiling for a single spotdl run, in seconds
        #[arg(long, default_value_t = 30 * 60)]
        timeout_secs: u64,

        /// Links to download
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

#[derive(ClapArgs, Debug, Clone)]
pub struct SpotifyArgs {
    #[arg(long, env = "SPOTIFY_CLIENT_ID", global = true)]
    pub spotify_client_id: Option<String>,

    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true, global = true)]
    pub spotify_client_secret: Option<String>,

    #[arg(long, env = "SPOTIFY_API_BASE", global = true)]
    pub spotify_api_base: Option<String>,

    #[arg(long, env = "SPOTIFY_TOKEN_URL", global = true)]
    pub spotify_token_url: Option<String>,
}
