mod args;
mod validators;

use anyhow::Result;
use futures::{stream, Stream, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use args::Args;
use world_imagery_downloader::{
    fetch_with, http_client, Config, HttpSource, Progress, AVERAGE_TILE_BYTES,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let dry_run = args.dry_run;
    let config = Config::from(args);
    let tile_count = config.bounding_box.tile_count(config.max_zoom);

    if dry_run {
        eprintln!(
            "would download {} tiles (approx {}, assuming 50 kB per tile)",
            tile_count,
            pretty_bytes::converter::convert(tile_count as f64 * AVERAGE_TILE_BYTES as f64)
        );
        return Ok(());
    }

    let source = HttpSource::new(http_client(config.timeout)?, config.url.clone());
    let progress = Arc::new(Progress::new(tile_count));

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        let interrupts = stream::unfold((), |_| async {
            tokio::signal::ctrl_c().await.ok().map(|_| ((), ()))
        });
        async move {
            if watch_interrupts(Box::pin(interrupts), cancel).await {
                std::process::exit(130);
            }
        }
    });

    let summary = fetch_with(&config, source, progress, cancel).await?;
    println!("{}", summary);

    Ok(())
}

/// Cancels `cancel` on the first interrupt. Resolves to `true` once a second
/// interrupt asks to quit without waiting for tiles in flight.
async fn watch_interrupts<S>(mut interrupts: S, cancel: CancellationToken) -> bool
where
    S: Stream<Item = ()> + Unpin,
{
    if interrupts.next().await.is_none() {
        return false;
    }
    warn!("interrupted, finishing tiles in flight (interrupt again to quit)");
    cancel.cancel();

    if interrupts.next().await.is_none() {
        return false;
    }
    warn!("interrupted again, quitting");

    true
}
