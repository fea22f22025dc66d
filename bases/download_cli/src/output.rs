// bases/download_cli/src/output.rs
use std::path::Path;
use track_primitives::{AnalysisProgress, DownloadProgress, TrackRecord};

pub struct OutputHandler {
    verbose: bool,
}

impl OutputHandler {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn print_analysis_progress(&self, progress: &AnalysisProgress) {
        for track in &progress.batch {
            println!("{}", format_track(track));
            if self.verbose {
                println!("    {}", track.canonical_url);
            }
        }
        println!(
            "Fetched {}/{} tracks",
            progress.fetched_count, progress.total_count
        );
    }

    pub fn print_download_start(&self, count: usize) {
        println!("Downloading {} tracks", count);
    }

    pub fn print_download_progress(&self, chunk: &DownloadProgress) {
        if let Some(line) = format_progress(chunk) {
            println!("{}", line);
        }
    }

    pub fn print_archive(&self, path: &Path) {
        println!("Archive written to {}", path.display());
    }

    pub fn print_error(&self, error: &color_eyre::Report) {
        eprintln!("Error: {}", error);

        if self.verbose {
            eprintln!("\nError details:");
            error.chain().skip(1).for_each(|cause| {
                eprintln!("  caused by: {}", cause);
            });
        }
    }
}

fn format_track(track: &TrackRecord) -> String {
    format!(
        "{} - {} [{}] {}:{:02}",
        track.artist,
        track.title,
        track.album,
        track.duration_seconds / 60,
        track.duration_seconds % 60
    )
}

fn format_progress(chunk: &DownloadProgress) -> Option<String> {
    match chunk {
        DownloadProgress::Log {
            log,
            fraction_complete: Some(fraction),
        } => Some(format!("[{:>3.0}%] {}", fraction * 100.0, log)),
        DownloadProgress::Log {
            log,
            fraction_complete: None,
        } => Some(format!("       {}", log)),
        DownloadProgress::Done { log, .. } => Some(log.clone()),
        DownloadProgress::Error { .. } => None,
    }
}
