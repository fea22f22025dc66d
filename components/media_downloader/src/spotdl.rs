// components/media_downloader/src/spotdl.rs
//! Fetchers driving the `spotdl` command line tool

use crate::progress::{ItemCallbackEstimator, LineHeuristicEstimator, ProgressEstimator};
use crate::types::{AudioFetcher, DownloadError, FetchEvent};
use crate::workspace::output_files_in;
use async_trait::async_trait;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SpotDlOptions {
    /// Executable to run
    pub program: String,
    /// Arguments placed before the `download` subcommand
    pub program_args: Vec<String>,
    pub output_template: String,
    pub format: String,
    /// Concurrency hint for batch runs
    pub threads: usize,
    /// Ceiling for one process run
    pub timeout: Duration,
}

impl Default for SpotDlOptions {
    fn default() -> Self {
        Self {
            program: "spotdl".to_string(),
            program_args: Vec::new(),
            output_template: "{artist} - {title}.{output-ext}".to_string(),
            format: "mp3".to_string(),
            threads: 4,
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl SpotDlOptions {
    fn naming_args(&self) -> Vec<String> {
        vec![
            "--overwrite".to_string(),
            "force".to_string(),
            "--simple-tui".to_string(),
            "--output".to_string(),
            self.output_template.clone(),
            "--format".to_string(),
            self.format.clone(),
        ]
    }

    async fn check_available(&self) -> Result<(), DownloadError> {
        which::which(&self.program)
            .map(|_| ())
            .map_err(|_| DownloadError::DependencyNotFound(self.program.clone()))
    }

    /// Run the tool in `cwd`, forwarding stdout and stderr lines as they arrive
    async fn run_streaming(
        &self,
        args: Vec<String>,
        cwd: &Path,
        events: &mpsc::Sender<FetchEvent>,
    ) -> Result<ExitStatus, DownloadError> {
        debug!("Running {} {:?} in {}", self.program, args, cwd.display());

        let mut child = Command::new(&self.program)
            .args(&self.program_args)
            .args(&args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DownloadError::Launch {
                program: self.program.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let run = async {
            tokio::join!(forward_lines(stdout, events), forward_lines(stderr, events));
            child.wait().await
        };
        let outcome = tokio::time::timeout(self.timeout, run).await;

        match outcome {
            Ok(Ok(status)) => Ok(status),
            Ok(Err(e)) => Err(DownloadError::io(format!("waiting for {}", self.program), e)),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill {}: {}", self.program, e);
                }
                Err(DownloadError::Timeout {
                    program: self.program.clone(),
                    limit: self.timeout,
                })
            }
        }
    }
}

/// Stop reading a stream after this many read errors in a row
const MAX_READ_ERRORS: usize = 3;

async fn forward_lines<R>(reader: Option<R>, events: &mpsc::Sender<FetchEvent>)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut errors = 0;

    // Drain to EOF even once the receiver is gone or a line is not UTF-8
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                errors = 0;
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                debug!("spotdl: {}", line);
                let _ = events.send(FetchEvent::Output(line.to_string())).await;
            }
            Err(e) => {
                errors += 1;
                warn!("Failed to read spotdl output: {}", e);
                if errors >= MAX_READ_ERRORS {
                    break;
                }
            }
        }
    }
}

async fn emit(events: &mpsc::Sender<FetchEvent>, event: FetchEvent) {
    let _ = events.send(event).await;
}

/// One process for the whole batch, progress guessed from its output
#[derive(Debug, Clone, Default)]
pub struct SpotDlBatch {
    options: SpotDlOptions,
}

impl SpotDlBatch {
    pub fn new(options: SpotDlOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl AudioFetcher for SpotDlBatch {
    fn name(&self) -> &str {
        "spotdl"
    }

    async fn check_available(&self) -> Result<(), DownloadError> {
        self.options.check_available().await
    }

    fn estimator(&self, total: usize) -> Box<dyn ProgressEstimator> {
        Box::new(LineHeuristicEstimator::new(total))
    }

    async fn fetch_all(
        &self,
        references: &[String],
        workspace: &Path,
        events: mpsc::Sender<FetchEvent>,
    ) -> Result<(), DownloadError> {
        let mut args = vec!["download".to_string()];
        args.extend(references.iter().cloned());
        args.extend(self.options.naming_args());
        args.push("--threads".to_string());
        args.push(self.options.threads.max(1).to_string());

        let status = self.options.run_streaming(args, workspace, &events).await?;
        if !status.success() {
            // Outcome is decided by the files left in the workspace
            warn!("{} exited with {}", self.options.program, status);
            emit(
                &events,
                FetchEvent::Output(format!("{} exited with {}", self.options.program, status)),
            )
            .await;
        }
        Ok(())
    }
}

/// One process per reference, reporting each item as it completes
#[derive(Debug, Clone, Default)]
pub struct SpotDlPerItem {
    options: SpotDlOptions,
}

impl SpotDlPerItem {
    pub fn new(options: SpotDlOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl AudioFetcher for SpotDlPerItem {
    fn name(&self) -> &str {
        "spotdl"
    }

    async fn check_available(&self) -> Result<(), DownloadError> {
        self.options.check_available().await
    }

    fn estimator(&self, total: usize) -> Box<dyn ProgressEstimator> {
        Box::new(ItemCallbackEstimator::new(total))
    }

    async fn fetch_all(
        &self,
        references: &[String],
        workspace: &Path,
        events: mpsc::Sender<FetchEvent>,
    ) -> Result<(), DownloadError> {
        for (index, reference) in references.iter().enumerate() {
            emit(
                &events,
                FetchEvent::ItemStarted {
                    index,
                    reference: reference.clone(),
                },
            )
            .await;

            let before = output_files_in(workspace).await?.len();
            let mut args = vec!["download".to_string(), reference.clone()];
            args.extend(self.options.naming_args());

            let status = self.options.run_streaming(args, workspace, &events).await?;
            let after = output_files_in(workspace).await?.len();

            let event = if !status.success() {
                FetchEvent::ItemFailed {
                    index,
                    reference: reference.clone(),
                    reason: format!("{} exited with {}", self.options.program, status),
                }
            } else if after <= before {
                FetchEvent::ItemFailed {
                    index,
                    reference: reference.clone(),
                    reason: "no file produced".to_string(),
                }
            } else {
                info!("Downloaded {}", reference);
                FetchEvent::ItemFinished {
                    index,
                    reference: reference.clone(),
                }
            };
            emit(&events, event).await;
        }
        Ok(())
    }
}

/// How the tool is driven over a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    #[default]
    Batch,
    PerItem,
}

impl FetchMode {
    pub fn into_fetcher(self, options: SpotDlOptions) -> Arc<dyn AudioFetcher> {
        match self {
            FetchMode::Batch => Arc::new(SpotDlBatch::new(options)),
            FetchMode::PerItem => Arc::new(SpotDlPerItem::new(options)),
        }
    }
}

impl FromStr for FetchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "batch" => Ok(FetchMode::Batch),
            "per-item" | "per_item" | "item" => Ok(FetchMode::PerItem),
            other => Err(format!(
                "unknown fetch mode '{}', expected 'batch' or 'per-item'",
                other
            )),
        }
    }
}
