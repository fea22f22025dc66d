// components/media_downloader/src/progress.rs
//! Progress estimation strategies
//!
//! A fetcher that reports items individually gets exact fractions from
//! [`ItemCallbackEstimator`]. A fetcher that only produces free-form output
//! falls back to [`LineHeuristicEstimator`]. Either way the
//! [`ProgressTracker`] keeps what the caller sees monotonic and below 1.0
//! until the session is done.

use crate::FetchEvent;
use track_primitives::DownloadProgress;

/// Highest fraction reported before the terminal chunk
pub const IN_FLIGHT_CEILING: f64 = 0.99;

pub trait ProgressEstimator: Send {
    /// Fraction of the whole batch believed complete after `event`,
    /// or `None` if the event says nothing about progress
    fn observe(&mut self, event: &FetchEvent) -> Option<f64>;
}

/// Exact fractions from per-item start/finish events
#[derive(Debug)]
pub struct ItemCallbackEstimator {
    total: usize,
}

impl ItemCallbackEstimator {
    pub fn new(total: usize) -> Self {
        Self {
            total: total.max(1),
        }
    }
}

impl ProgressEstimator for ItemCallbackEstimator {
    fn observe(&mut self, event: &FetchEvent) -> Option<f64> {
        let total = self.total as f64;
        match event {
            FetchEvent::ItemStarted { index, .. } => Some(*index as f64 / total),
            FetchEvent::ItemFinished { index, .. } | FetchEvent::ItemFailed { index, .. } => {
                Some((*index + 1) as f64 / total)
            }
            FetchEvent::Output(_) => None,
        }
    }
}

/// Markers the tool prints per song, with the share of that song they stand for
const LINE_MARKERS: [(&str, f64); 2] = [(": Downloading", 0.1), (": Embedding metadata", 0.5)];
const DONE_MARKER: &str = ": Done";

/// Guess progress from tool output lines
///
/// Only ever credits a whole item on its completion marker, so the estimate
/// for item *i* stays below `(i + 1) / n` until that item is done.
#[derive(Debug)]
pub struct LineHeuristicEstimator {
    total: usize,
    done: usize,
    current: f64,
}

impl LineHeuristicEstimator {
    pub fn new(total: usize) -> Self {
        Self {
            total: total.max(1),
            done: 0,
            current: 0.0,
        }
    }
}

impl ProgressEstimator for LineHeuristicEstimator {
    fn observe(&mut self, event: &FetchEvent) -> Option<f64> {
        match event {
            FetchEvent::Output(line) => {
                if line.contains(DONE_MARKER) {
                    self.done = (self.done + 1).min(self.total);
                    self.current = 0.0;
                } else if let Some((_, share)) =
                    LINE_MARKERS.iter().find(|(marker, _)| line.contains(marker))
                {
                    self.current = *share;
                }
            }
            FetchEvent::ItemFinished { .. } | FetchEvent::ItemFailed { .. } => {
                self.done = (self.done + 1).min(self.total);
                self.current = 0.0;
            }
            FetchEvent::ItemStarted { .. } => {}
        }
        Some((self.done as f64 + self.current) / self.total as f64)
    }
}

/// Turns fetch events into caller-facing chunks
pub struct ProgressTracker {
    estimator: Box<dyn ProgressEstimator>,
    total: usize,
    last: f64,
}

impl ProgressTracker {
    pub fn new(estimator: Box<dyn ProgressEstimator>, total: usize) -> Self {
        Self {
            estimator,
            total,
            last: 0.0,
        }
    }

    /// Blank output lines produce no chunk
    pub fn observe(&mut self, event: &FetchEvent) -> Option<DownloadProgress> {
        let line = event.describe(self.total);
        let estimate = self.estimator.observe(event);
        if line.is_empty() {
            return None;
        }
        if let Some(estimate) = estimate {
            self.advance(estimate);
        }
        Some(DownloadProgress::progress(line, self.last))
    }

    /// The fraction reported once fetching is over but packaging is not
    pub fn finalizing(&mut self) -> f64 {
        self.advance(IN_FLIGHT_CEILING)
    }

    fn advance(&mut self, estimate: f64) -> f64 {
        let clamped = if estimate.is_nan() {
            self.last
        } else {
            estimate.clamp(0.0, IN_FLIGHT_CEILING)
        };
        self.last = self.last.max(clamped);
        self.last
    }
}
