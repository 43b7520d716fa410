use std::{path::PathBuf, time::Duration};

use crate::bounding_box::BoundingBox;
use crate::tile::Tile;
use crate::url::UrlFormat;

pub const DEFAULT_MAX_ZOOM: u8 = 5;
pub const DEFAULT_WORKERS: usize = 64;
pub const DEFAULT_ATTEMPTS: u8 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Tile fetching configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// The region to fetch tiles for.
    pub bounding_box: BoundingBox,

    /// The highest zoom level to fetch. Every level from 0 up to and
    /// including this one is fetched.
    pub max_zoom: u8,

    /// The folder to output the tiles to.
    pub output_folder: PathBuf,

    /// Number of tiles fetched concurrently.
    pub workers: usize,

    /// How many times a tile is requested before giving up on it.
    pub request_attempts: u8,

    /// Fixed delay between two attempts at the same tile.
    pub backoff: Duration,

    /// Timeout for a single HTTP request.
    ///
    /// Pass the zero duration to disable the timeout.
    pub timeout: Duration,

    /// The URL to download individual tiles from.
    pub url: UrlFormat,
}

impl Config {
    /// All tiles in the contained bounding box.
    pub fn tiles(&self) -> Vec<Tile> {
        self.bounding_box.tiles(self.max_zoom)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bounding_box: BoundingBox::new(16.5, 26.5, 51.8, 60.0),
            max_zoom: DEFAULT_MAX_ZOOM,
            output_folder: PathBuf::from("./tiles"),
            workers: DEFAULT_WORKERS,
            request_attempts: DEFAULT_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
            timeout: DEFAULT_TIMEOUT,
            url: UrlFormat::default(),
        }
    }
}
