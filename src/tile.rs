use std::{
    f64::consts::PI,
    fmt,
    path::{Path, PathBuf},
};

/// Deepest zoom level the World Imagery service serves.
pub const MAX_ZOOM: u8 = 23;

/// Converts a geographic position given in degrees into slippy-map grid
/// coordinates at the given zoom level.
///
/// The results are truncated toward zero rather than floored, and are signed
/// so positions outside the Web Mercator range (beyond ±85.0511° latitude)
/// yield values the caller has to clamp into the grid.
/// ref: https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames
///
/// # Example
/// ```rust
/// # use world_imagery_downloader::deg_to_num;
/// assert_eq!(deg_to_num(0.0, 0.0, 1), (1, 1));
/// ```
pub fn deg_to_num(lat: f64, lon: f64, zoom: u8) -> (i64, i64) {
    // scale factor
    let n = 2_f64.powi(zoom as i32);
    let lat_rad = lat * PI / 180_f64;

    let x = (lon + 180_f64) / 360_f64 * n;
    let y = (1_f64 - (lat_rad.tan() + 1_f64 / lat_rad.cos()).ln() / PI) / 2_f64 * n;

    (x as i64, y as i64)
}

/// A slippy-map tile with x, y and z-coordinate.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl Tile {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// The file this tile is stored in below `output_folder`, laid out as
    /// `{z}/{x}/{y}.png`.
    pub fn path_in(&self, output_folder: &Path) -> PathBuf {
        let mut target = output_folder.join(self.z.to_string());
        target.push(self.x.to_string());
        target.push(format!("{}.png", self.y));

        target
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}
