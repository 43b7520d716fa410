use anyhow::{Context, Result};
use maplit::hashmap;
use std::fmt;
use strfmt::strfmt;

use crate::tile::Tile;

/// The ArcGIS World Imagery tile endpoint. Note the row (`y`) comes before the
/// column (`x`).
pub const WORLD_IMAGERY_URL: &str =
    "https://services.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}.png";

/// A tile URL template containing the replacement specifiers `{x}`, `{y}`
/// and `{z}`.
#[derive(Clone, PartialEq)]
pub struct UrlFormat {
    format_str: String,
}

impl UrlFormat {
    pub fn from_string(format_str: String) -> Self {
        Self { format_str }
    }

    pub fn tile_url(&self, tile: &Tile) -> Result<String> {
        let vars = hashmap! {
            "x".to_owned() => tile.x.to_string(),
            "y".to_owned() => tile.y.to_string(),
            "z".to_owned() => tile.z.to_string(),
        };

        strfmt(&self.format_str, &vars).context("failed formatting URL")
    }
}

impl Default for UrlFormat {
    fn default() -> Self {
        Self::from_string(WORLD_IMAGERY_URL.to_owned())
    }
}

impl fmt::Debug for UrlFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlFormat")
            .field("format_str", &self.format_str)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_before_column() {
        let url = UrlFormat::default().tile_url(&Tile::new(1, 0, 1)).unwrap();
        assert_eq!(
            url,
            "https://services.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/1/0/1.png"
        );
    }

    #[test]
    fn origin_cell_at_zoom_one() {
        let (x, y) = crate::deg_to_num(0.0, 0.0, 1);
        let tile = Tile::new(x as u32, y as u32, 1);
        let url = UrlFormat::default().tile_url(&tile).unwrap();
        assert!(url.ends_with("/tile/1/1/1.png"), "{}", url);
    }

    #[test]
    fn unknown_specifier_fails() {
        let fmt = UrlFormat::from_string("http://localhost/{s}/{z}/{x}/{y}".into());
        assert!(fmt.tile_url(&Tile::new(0, 0, 0)).is_err());
    }
}
