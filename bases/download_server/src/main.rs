// bases/download_server/src/main.rs
use clap::Parser;
use color_eyre::Result;

mod config;
mod error;
mod reaper;
mod server;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "download_server=info,media_downloader=info,track_analysis=info,tower_http=info"
                    .into()
            }),
        )
        .init();

    let args = config::CliArgs::parse();
    let config = config::Config::from_args(args);

    tracing::info!(
        "Starting download server, sessions stored under {}",
        config.download_dir.display()
    );

    server::run(config).await?;

    Ok(())
}
