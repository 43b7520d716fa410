//! Download ArcGIS World Imagery tiles covering a bounding box to your disk.
//!
//! **Use with caution.** Downloading tiles en-masse puts considerable load on
//! the tile server. Check the service's terms of use before fetching deep zoom
//! levels.
//!
//! Every zoom level from 0 up to the requested maximum is fetched. Tiles are
//! stored as `{output}/{z}/{x}/{y}.png`; tiles that already exist are skipped,
//! so an interrupted run can simply be restarted.
//!
//! # CLI Example
//!
//! ```bash
//! world-imagery-downloader \
//!   --minlat 16.5 --maxlat 26.5 \
//!   --minlon 51.8 --maxlon 60.0 \
//!   --zoom 8 \
//!   --output ./tiles
//! ```
//!
//! # Library Example
//! ```rust,no_run
//! use world_imagery_downloader::{fetch, BoundingBox, Config};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = Config {
//!     bounding_box: BoundingBox::new(50.7492, 50.811, 6.031, 6.1649),
//!     max_zoom: 12,
//!     output_folder: "./tiles".into(),
//!     ..Config::default()
//! };
//!
//! let summary = fetch(config).await.expect("failed fetching tiles");
//! println!("{}", summary);
//! # }
//! ```

mod bounding_box;
mod config;
mod fetch;
mod progress;
mod source;
mod tile;
mod url;

pub use bounding_box::{BoundingBox, GridBounds};
pub use config::{
    Config, DEFAULT_ATTEMPTS, DEFAULT_BACKOFF, DEFAULT_MAX_ZOOM, DEFAULT_TIMEOUT, DEFAULT_WORKERS,
};
pub use fetch::{
    download_tile, fetch, fetch_with, http_client, run_workers, Outcome, RetryPolicy, TileError,
};
pub use progress::{FetchSummary, Progress};
pub use source::{HttpSource, SourceError, TileBody, TileSource};
pub use tile::{deg_to_num, Tile, MAX_ZOOM};
pub use url::{UrlFormat, WORLD_IMAGERY_URL};

/// Tile count estimates assume this many bytes per tile.
pub const AVERAGE_TILE_BYTES: u64 = 50 * 1024;
