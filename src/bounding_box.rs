use crate::tile::{deg_to_num, Tile, MAX_ZOOM};

/// A geographic bounding box given in degrees.
///
/// # Example
/// ```rust
/// # use world_imagery_downloader::BoundingBox;
/// let arabian_sea_coast = BoundingBox::new(16.5, 26.5, 51.8, 60.0);
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// The inclusive range of grid cells a bounding box covers at one zoom level.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct GridBounds {
    pub x_min: u32,
    pub x_max: u32,
    pub y_min: u32,
    pub y_max: u32,
}

impl GridBounds {
    pub fn tile_count(&self) -> u64 {
        (self.x_max - self.x_min + 1) as u64 * (self.y_max - self.y_min + 1) as u64
    }
}

impl BoundingBox {
    /// Create a new bounding box from coordinates in degrees.
    ///
    /// # Panics
    /// Panics if a latitude isn't in the open range (-90, 90) or a longitude
    /// isn't in the closed range [-180, 180].
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        assert!(min_lat > -90f64 && min_lat < 90f64);
        assert!(max_lat > -90f64 && max_lat < 90f64);
        assert!((-180f64..=180f64).contains(&min_lon));
        assert!((-180f64..=180f64).contains(&max_lon));

        BoundingBox {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    /// The grid cells covered at `zoom`, clamped to `[0, 2^zoom - 1]`.
    ///
    /// Returns `None` if nothing is covered, i.e. the region lies entirely
    /// outside the grid or its range is inverted.
    ///
    /// # Panics
    /// Panics if `zoom` is above [`MAX_ZOOM`].
    pub fn grid_bounds(&self, zoom: u8) -> Option<GridBounds> {
        assert!(zoom <= MAX_ZOOM);

        let last = (1i64 << zoom) - 1;

        let (x_min, y_min) = deg_to_num(self.max_lat, self.min_lon, zoom);
        let (x_max, y_max) = deg_to_num(self.min_lat, self.max_lon, zoom);

        // off the grid entirely, clamping would pull it onto the edge
        if x_max < 0 || y_max < 0 || x_min > last || y_min > last {
            return None;
        }

        let clamp = |v: i64| v.clamp(0, last) as u32;
        let bounds = GridBounds {
            x_min: clamp(x_min),
            x_max: clamp(x_max),
            y_min: clamp(y_min),
            y_max: clamp(y_max),
        };

        if bounds.x_min <= bounds.x_max && bounds.y_min <= bounds.y_max {
            Some(bounds)
        } else {
            None
        }
    }

    /// Creates an iterator iterating over all tiles in the bounding box from
    /// zoom level 0 up to and including `max_zoom`.
    ///
    /// Within one zoom level tiles are ordered by x, then y.
    ///
    /// # Panics
    /// Panics if `max_zoom` is above [`MAX_ZOOM`].
    pub fn iter_tiles(&self, max_zoom: u8) -> impl Iterator<Item = Tile> {
        let bbox = *self;

        (0..=max_zoom)
            .filter_map(move |zoom| bbox.grid_bounds(zoom).map(|b| (zoom, b)))
            .flat_map(|(zoom, b)| {
                (b.x_min..=b.x_max)
                    .flat_map(move |x| (b.y_min..=b.y_max).map(move |y| Tile::new(x, y, zoom)))
            })
    }

    /// All tiles in the bounding box from zoom level 0 up to and including
    /// `max_zoom`, in a deterministic order.
    pub fn tiles(&self, max_zoom: u8) -> Vec<Tile> {
        self.iter_tiles(max_zoom).collect()
    }

    /// Number of tiles [`tiles`](Self::tiles) would return.
    pub fn tile_count(&self, max_zoom: u8) -> u64 {
        (0..=max_zoom)
            .filter_map(|zoom| self.grid_bounds(zoom))
            .map(|b| b.tile_count())
            .sum()
    }
}
