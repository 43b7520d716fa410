use anyhow::{ensure, Context, Result};
use clap::crate_version;
use futures::future;
use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tokio::{
    fs,
    io::AsyncWriteExt,
    sync::{mpsc, Mutex},
};
use tokio_util::{io::StreamReader, sync::CancellationToken};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::progress::{FetchSummary, Progress};
use crate::source::{HttpSource, SourceError, TileSource};
use crate::tile::Tile;

const ZERO_DURATION: Duration = Duration::from_secs(0);

/// Why a tile could not be fetched.
#[derive(Debug, Error)]
pub enum TileError {
    #[error("failed creating output directory for tile {tile}")]
    CreateDir {
        tile: Tile,
        #[source]
        source: io::Error,
    },

    #[error("failed creating output file for tile {tile}")]
    CreateFile {
        tile: Tile,
        #[source]
        source: io::Error,
    },

    #[error("failed moving tile {tile} into place")]
    Persist {
        tile: Tile,
        #[source]
        source: io::Error,
    },

    #[error("failed fetching tile {tile} after {attempts} attempts")]
    RetriesExhausted { tile: Tile, attempts: u8 },

    #[error("fetching tile {tile} was cancelled")]
    Cancelled { tile: Tile },
}

impl TileError {
    pub fn tile(&self) -> Tile {
        match self {
            TileError::CreateDir { tile, .. }
            | TileError::CreateFile { tile, .. }
            | TileError::Persist { tile, .. }
            | TileError::RetriesExhausted { tile, .. }
            | TileError::Cancelled { tile } => *tile,
        }
    }
}

/// How a tile ended up on disk.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The tile was downloaded, writing the given amount of bytes.
    Downloaded(u64),

    /// The tile already existed and was left alone.
    Skipped,
}

/// How often and how patiently a tile is requested.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u8,
    pub backoff: Duration,
}

impl From<&Config> for RetryPolicy {
    fn from(cfg: &Config) -> Self {
        Self {
            attempts: cfg.request_attempts,
            backoff: cfg.backoff,
        }
    }
}

#[derive(Debug, Error)]
enum AttemptError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("failed streaming tile to disk")]
    Copy(#[source] io::Error),

    #[error(transparent)]
    Fatal(TileError),
}

/// Fetch the tiles specified in `cfg` from the World Imagery tile server and
/// save them to the file system, rendering a progress bar while doing so.
///
/// Tiles that already exist on disk are skipped.
///
/// # Example
/// ```rust,no_run
/// use world_imagery_downloader::{fetch, Config};
///
/// # #[tokio::main]
/// # async fn main() {
/// let summary = fetch(Config::default()).await.expect("failed fetching tiles");
/// println!("{}", summary);
/// # }
/// ```
pub async fn fetch(cfg: Config) -> Result<FetchSummary> {
    let source = HttpSource::new(http_client(cfg.timeout)?, cfg.url.clone());
    let progress = Arc::new(Progress::new(0));

    fetch_with(&cfg, source, progress, CancellationToken::new()).await
}

/// Builds the HTTP client used to talk to the tile server.
///
/// A zero `timeout` disables the request timeout.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(format!("world-imagery-downloader/{}", crate_version!()));
    if timeout > ZERO_DURATION {
        builder = builder.timeout(timeout);
    }

    builder.build().context("failed creating HTTP client")
}

/// Fetch the tiles specified in `cfg` from `source`.
///
/// Creates the root output directory first; failing to do so is the only
/// error returned. Tiles that can't be fetched are reported in the returned
/// summary instead.
pub async fn fetch_with<S>(
    cfg: &Config,
    source: S,
    progress: Arc<Progress>,
    cancel: CancellationToken,
) -> Result<FetchSummary>
where
    S: TileSource + 'static,
{
    let output_folder = cfg.output_folder.as_path();

    ensure!(
        !output_folder.exists() || output_folder.is_dir(),
        "output {} must be a directory",
        output_folder.display()
    );
    create_dirs(output_folder)
        .await
        .context("failed to create root output directory")?;

    let tiles = cfg.tiles();
    progress.set_total(tiles.len() as u64);
    info!(tiles = tiles.len(), max_zoom = cfg.max_zoom, "fetching tiles");

    run_workers(
        Arc::new(source),
        tiles,
        output_folder,
        cfg.workers,
        RetryPolicy::from(cfg),
        Arc::clone(&progress),
        cancel,
    )
    .await;

    progress.finish();

    Ok(progress.summary())
}

/// Drains `tiles` with a pool of `workers` concurrent workers and returns once
/// every worker has finished.
///
/// A tile that can't be fetched never affects any other tile; it is logged and
/// recorded in `progress`.
pub async fn run_workers<S>(
    source: Arc<S>,
    tiles: Vec<Tile>,
    output_folder: &Path,
    workers: usize,
    policy: RetryPolicy,
    progress: Arc<Progress>,
    cancel: CancellationToken,
) where
    S: TileSource + 'static,
{
    let worker_count = workers.max(1).min(tiles.len());

    // the queue is filled and closed before any worker starts consuming
    let (tx, rx) = mpsc::unbounded_channel();
    for tile in tiles {
        if tx.send(tile).is_err() {
            break;
        }
    }
    drop(tx);

    let queue = Arc::new(Mutex::new(rx));
    let output_folder: Arc<Path> = Arc::from(output_folder);

    let handles = (0..worker_count).map(|worker| {
        let source = Arc::clone(&source);
        let queue = Arc::clone(&queue);
        let output_folder = Arc::clone(&output_folder);
        let progress = Arc::clone(&progress);
        let cancel = cancel.clone();

        tokio::spawn(async move {
            while let Some(tile) = next_tile(&queue, &cancel).await {
                let res =
                    download_tile(&*source, tile, &output_folder, &policy, &progress, &cancel)
                        .await;

                match res {
                    Ok(_) | Err(TileError::Cancelled { .. }) => {}
                    Err(e) => {
                        warn!(worker, %tile, "{:#}", anyhow::Error::from(e));
                        progress.record_failure(tile);
                    }
                }
            }
        })
    });

    for res in future::join_all(handles).await {
        if let Err(e) = res {
            error!("tile worker panicked: {}", e);
        }
    }
}

async fn next_tile(
    queue: &Mutex<mpsc::UnboundedReceiver<Tile>>,
    cancel: &CancellationToken,
) -> Option<Tile> {
    tokio::select! {
        biased;

        _ = cancel.cancelled() => None,
        tile = async { queue.lock().await.recv().await } => tile,
    }
}

/// Fetches a single tile into `{output_folder}/{z}/{x}/{y}.png`, unless that
/// file already exists.
///
/// Failed requests and failed transfers are retried up to `policy.attempts`
/// times in total, waiting `policy.backoff` in between. Failing to create
/// directories or files is not retried.
pub async fn download_tile<S>(
    source: &S,
    tile: Tile,
    output_folder: &Path,
    policy: &RetryPolicy,
    progress: &Progress,
    cancel: &CancellationToken,
) -> Result<Outcome, TileError>
where
    S: TileSource + ?Sized,
{
    let output_file = tile.path_in(output_folder);

    // if the tile's already been downloaded, skip it
    if fs::try_exists(&output_file).await.unwrap_or(false) {
        progress.record_skip();
        return Ok(Outcome::Skipped);
    }

    if let Some(parent) = output_file.parent() {
        create_dirs(parent)
            .await
            .map_err(|source| TileError::CreateDir { tile, source })?;
    }

    for attempt in 1..=policy.attempts {
        match try_download(source, tile, &output_file).await {
            Ok(bytes) => {
                progress.record_download(bytes);
                return Ok(Outcome::Downloaded(bytes));
            }
            Err(AttemptError::Fatal(e)) => return Err(e),
            Err(e) => {
                debug!(%tile, attempt, "attempt failed: {:#}", anyhow::Error::from(e));
            }
        }

        if attempt < policy.attempts {
            progress.record_retry();

            tokio::select! {
                _ = cancel.cancelled() => return Err(TileError::Cancelled { tile }),
                _ = tokio::time::sleep(policy.backoff) => {}
            }
        }
    }

    Err(TileError::RetriesExhausted {
        tile,
        attempts: policy.attempts,
    })
}

/// Streams the tile into a sibling `.part` file and moves it into place once
/// the transfer is complete, so an interrupted transfer never looks like a
/// downloaded tile.
async fn try_download<S>(source: &S, tile: Tile, output_file: &Path) -> Result<u64, AttemptError>
where
    S: TileSource + ?Sized,
{
    let body = source.fetch(tile).await?;

    let partial_file = partial_path(output_file);
    let mut file = fs::File::create(&partial_file)
        .await
        .map_err(|source| AttemptError::Fatal(TileError::CreateFile { tile, source }))?;

    let mut reader = StreamReader::new(body);
    let written = async {
        let bytes = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;
        Ok::<_, io::Error>(bytes)
    }
    .await;
    drop(file);

    let bytes = match written {
        Ok(bytes) => bytes,
        Err(e) => {
            if let Err(rm) = fs::remove_file(&partial_file).await {
                debug!(%tile, "failed removing partial file: {}", rm);
            }
            return Err(AttemptError::Copy(e));
        }
    };

    fs::rename(&partial_file, output_file)
        .await
        .map_err(|source| AttemptError::Fatal(TileError::Persist { tile, source }))?;

    Ok(bytes)
}

fn partial_path(output_file: &Path) -> PathBuf {
    output_file.with_extension("png.part")
}

async fn create_dirs(dir: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o777);

    builder.create(dir).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::TileBody;
    use bytes::Bytes;
    use futures::{stream, StreamExt};
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers with `503` a fixed number of times, then with a body.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
        body: &'static [u8],
        break_body: bool,
    }

    impl Flaky {
        fn new(failures: usize, body: &'static [u8]) -> Self {
            Self {
                failures,
                calls: AtomicUsize::new(0),
                body,
                break_body: false,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TileSource for Flaky {
        async fn fetch(&self, tile: Tile) -> Result<TileBody, SourceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(SourceError::Status {
                    url: tile.to_string(),
                    status: StatusCode::SERVICE_UNAVAILABLE,
                });
            }

            let body: &'static [u8] = self.body;
            let (head, tail) = body.split_at(body.len() / 2);
            let head = Bytes::from_static(head);
            let tail = Bytes::from_static(tail);
            let second = if self.break_body {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            } else {
                Ok(tail)
            };

            Ok(stream::iter(vec![Ok(head), second]).boxed())
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn succeeds_on_third_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let source = Flaky::new(2, b"not really a png");
        let progress = Progress::hidden();
        let tile = Tile::new(1, 2, 3);

        let outcome = download_tile(
            &source,
            tile,
            dir.path(),
            &policy(),
            &progress,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome, Outcome::Downloaded(16));
        assert_eq!(source.calls(), 3);

        let summary = progress.summary();
        assert_eq!(summary.retries, 2);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.bytes, 16);
        assert_eq!(
            std::fs::read(dir.path().join("3/1/2.png")).unwrap(),
            b"not really a png"
        );
        assert!(!dir.path().join("3/1/2.png.part").exists());
    }

    #[tokio::test]
    async fn gives_up_after_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let source = Flaky::new(usize::MAX, b"");
        let progress = Progress::hidden();
        let tile = Tile::new(0, 0, 0);

        let err = download_tile(
            &source,
            tile,
            dir.path(),
            &policy(),
            &progress,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            TileError::RetriesExhausted { attempts: 3, .. }
        ));
        assert_eq!(err.tile(), tile);
        assert_eq!(source.calls(), 3);
        // no delay after the final attempt
        assert_eq!(progress.summary().retries, 2);
        assert_eq!(progress.summary().completed, 0);
        assert!(!dir.path().join("0/0/0.png").exists());
    }

    #[tokio::test]
    async fn broken_transfer_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = Flaky::new(0, b"truncated body");
        source.break_body = true;
        let progress = Progress::hidden();

        let err = download_tile(
            &source,
            Tile::new(4, 5, 6),
            dir.path(),
            &policy(),
            &progress,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, TileError::RetriesExhausted { .. }));
        assert_eq!(source.calls(), 3);
        assert!(!dir.path().join("6/4/5.png").exists());
        assert!(!dir.path().join("6/4/5.png.part").exists());
        assert_eq!(progress.summary().bytes, 0);
    }

    #[tokio::test]
    async fn existing_tile_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("2/1")).unwrap();
        std::fs::write(dir.path().join("2/1/3.png"), b"old").unwrap();

        let source = Flaky::new(0, b"new");
        let progress = Progress::hidden();

        let outcome = download_tile(
            &source,
            Tile::new(1, 3, 2),
            dir.path(),
            &policy(),
            &progress,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(source.calls(), 0);
        assert_eq!(progress.summary().skipped, 1);
        assert_eq!(progress.summary().bytes, 0);
        assert_eq!(std::fs::read(dir.path().join("2/1/3.png")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn cancellation_interrupts_backoff() {
        let dir = tempfile::tempdir().unwrap();
        let source = Flaky::new(usize::MAX, b"");
        let progress = Progress::hidden();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let slow = RetryPolicy {
            attempts: 3,
            backoff: Duration::from_secs(3600),
        };
        let err = download_tile(&source, Tile::new(0, 0, 0), dir.path(), &slow, &progress, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, TileError::Cancelled { .. }));
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn partial_file_sits_next_to_tile() {
        assert_eq!(
            partial_path(Path::new("tiles/3/1/2.png")),
            Path::new("tiles/3/1/2.png.part")
        );
    }
}
