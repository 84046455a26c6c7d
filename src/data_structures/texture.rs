//! Texture atlas metadata.
//!
//! A [`TexMap`] describes a sheet that is cut into equally sized tiles. The
//! grid only needs the sheet's layout (tile size, columns, rows) to build
//! texture coordinates; uploading the pixels is left to the renderer.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use cgmath::Vector2;

/// A texture atlas subdivided into `columns × rows` tiles.
#[derive(Clone, Debug, PartialEq)]
pub struct TexMap {
    pub path: PathBuf,
    /// Tile dimensions in pixels.
    pub tile_width: u32,
    pub tile_height: u32,
    pub columns: u32,
    pub rows: u32,
}

impl TexMap {
    /// Describes an atlas whose image is `image_width × image_height` pixels.
    ///
    /// Partial tiles at the right and bottom edges are not addressable.
    pub fn new(
        path: impl Into<PathBuf>,
        tile_width: u32,
        tile_height: u32,
        image_width: u32,
        image_height: u32,
    ) -> anyhow::Result<Self> {
        if tile_width == 0 || tile_height == 0 {
            bail!("tile dimensions must be non-zero, got {}x{}", tile_width, tile_height);
        }
        Ok(Self::with_layout(
            path,
            tile_width,
            tile_height,
            image_width / tile_width,
            image_height / tile_height,
        ))
    }

    /// Describes an atlas by its tile layout directly.
    pub fn with_layout(
        path: impl Into<PathBuf>,
        tile_width: u32,
        tile_height: u32,
        columns: u32,
        rows: u32,
    ) -> Self {
        Self {
            path: path.into(),
            tile_width,
            tile_height,
            columns,
            rows,
        }
    }

    /// Reads the image header at `path` to find the atlas layout.
    pub fn load(path: impl AsRef<Path>, tile_width: u32, tile_height: u32) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let (width, height) = image::image_dimensions(path)
            .with_context(|| format!("failed to read atlas image {}", path.display()))?;
        Self::new(path, tile_width, tile_height, width, height)
    }

    /// Number of tile IDs this atlas spans.
    pub fn tile_count(&self) -> u32 {
        self.columns * self.rows
    }

    /// Texture-coordinate rectangle of the tile at `index` (row-major from the
    /// top-left of the sheet) as `(min, max)` in `[0, 1]` UV space.
    ///
    /// `None` if the index is outside the sheet.
    pub fn tile_basis(&self, index: u32) -> Option<(Vector2<f32>, Vector2<f32>)> {
        if index >= self.tile_count() {
            return None;
        }
        let column = (index % self.columns) as f32;
        let row = (index / self.columns) as f32;
        let step = Vector2::new(1.0 / self.columns as f32, 1.0 / self.rows as f32);
        let min = Vector2::new(column * step.x, row * step.y);
        Some((min, min + step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_from_image_size() {
        let map = TexMap::new("atlas.png", 16, 16, 64, 40).unwrap();
        assert_eq!((map.columns, map.rows), (4, 2));
        assert_eq!(map.tile_count(), 8);
    }

    #[test]
    fn basis_of_last_tile() {
        let map = TexMap::with_layout("atlas.png", 16, 16, 4, 2);
        let (min, max) = map.tile_basis(7).unwrap();
        assert_eq!(min, Vector2::new(0.75, 0.5));
        assert_eq!(max, Vector2::new(1.0, 1.0));
        assert!(map.tile_basis(8).is_none());
    }

    #[test]
    fn zero_tile_size_is_rejected() {
        assert!(TexMap::new("atlas.png", 0, 16, 64, 64).is_err());
    }
}
