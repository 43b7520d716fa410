use indicatif::{ProgressBar, ProgressStyle};
use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, PoisonError,
    },
};

use crate::tile::Tile;

const BYTES_PER_MB: f64 = 1024_f64 * 1024_f64;

/// Progress of a fetch run, shared by all workers.
///
/// Every counter is updated atomically, so a `&Progress` may be used from any
/// number of workers at once.
pub struct Progress {
    bar: ProgressBar,
    completed: AtomicU64,
    skipped: AtomicU64,
    bytes: AtomicU64,
    retries: AtomicU64,
    failed: Mutex<Vec<Tile>>,
}

impl Progress {
    /// Tracks progress and renders it as a progress bar on stderr.
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:60.cyan/blue} {pos:>7}/{len:7} ETA: {eta} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");
        bar.set_style(style);

        Self::with_bar(bar)
    }

    /// Tracks progress without drawing anything.
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(bar: ProgressBar) -> Self {
        Self {
            bar,
            completed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            failed: Mutex::new(Vec::new()),
        }
    }

    pub fn set_total(&self, total: u64) {
        self.bar.set_length(total);
    }

    /// Marks `n` tiles as completed.
    pub fn advance(&self, n: u64) {
        self.completed.fetch_add(n, Ordering::Relaxed);
        self.bar.inc(n);
    }

    pub fn add_bytes(&self, n: u64) {
        self.bytes.fetch_add(n, Ordering::Relaxed);
    }

    /// A tile was downloaded and `bytes` were written to disk.
    pub fn record_download(&self, bytes: u64) {
        self.add_bytes(bytes);
        self.advance(1);
    }

    /// A tile was already present on disk.
    pub fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
        self.advance(1);
    }

    /// A failed attempt is about to be retried.
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// A tile was given up on.
    pub fn record_failure(&self, tile: Tile) {
        self.failed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tile);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    pub fn summary(&self) -> FetchSummary {
        let mut failed = self
            .failed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        failed.sort_by_key(|t| (t.z, t.x, t.y));

        FetchSummary {
            completed: self.completed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            failed,
        }
    }
}

/// The result of a fetch run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FetchSummary {
    /// Tiles that are now present on disk, whether downloaded or skipped.
    pub completed: u64,

    /// Tiles that were already present and thus not downloaded.
    pub skipped: u64,

    /// Bytes written for newly downloaded tiles.
    pub bytes: u64,

    /// Retry delays waited across all tiles.
    pub retries: u64,

    /// Tiles that could not be fetched, ordered by zoom, x and y.
    pub failed: Vec<Tile>,
}

impl FetchSummary {
    pub fn downloaded(&self) -> u64 {
        self.completed - self.skipped
    }

    pub fn megabytes(&self) -> f64 {
        self.bytes as f64 / BYTES_PER_MB
    }
}

impl fmt::Display for FetchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Download complete. Total size: {:.2} MB", self.megabytes())?;

        if !self.failed.is_empty() {
            write!(f, ", {} tiles failed", self.failed.len())?;
        }

        Ok(())
    }
}
