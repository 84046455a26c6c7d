//! Map files.
//!
//! A map is stored as pretty RON text: the atlas registrations, the grid
//! dimensions, a table of chunk headers and one flat tile array. Each header
//! points at its run of tiles (`tile_index .. tile_index + tile_count`) so the
//! headers can be scanned without touching any tile payload.
//!
//! Loading is all-or-nothing: the file is parsed and validated into a fresh
//! grid first, the live grid only changes once everything checked out.

use std::{collections::HashSet, fs, path::Path};

use anyhow::{Context, bail, ensure};
use cgmath::Vector2;
use serde::{Deserialize, Serialize};

use crate::{
    data_structures::texture::TexMap,
    grid::{
        TileGrid,
        chunk::{ChunkCoord, Tile, TileAttribs},
    },
};

/// The only map format version this build reads and writes.
pub const FORMAT_VERSION: u32 = 0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridFile {
    pub version: u32,
    pub textures: Vec<TexMapRecord>,
    pub tile_size: (f32, f32),
    pub chunk_size: (u32, u32),
    pub chunks: Vec<ChunkHeader>,
    pub tiles: Vec<TileRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TexMapRecord {
    pub offset: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub columns: u32,
    pub rows: u32,
    pub path: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkHeader {
    pub x: i32,
    pub y: i32,
    pub tile_count: u32,
    pub tile_index: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRecord {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub attribs: u32,
}

impl GridFile {
    /// Snapshot of every chunk in `grid`, chunks ordered by coordinate.
    pub fn from_grid(grid: &TileGrid) -> Self {
        let textures = grid
            .tex_maps()
            .iter()
            .map(|(&offset, map)| TexMapRecord {
                offset,
                tile_width: map.tile_width,
                tile_height: map.tile_height,
                columns: map.columns,
                rows: map.rows,
                path: map.path.to_string_lossy().into_owned(),
            })
            .collect();

        let mut chunks: Vec<_> = grid.chunks().collect();
        chunks.sort_by_key(|chunk| chunk.pos());

        let mut headers = Vec::with_capacity(chunks.len());
        let mut tiles = Vec::new();
        for chunk in chunks {
            headers.push(ChunkHeader {
                x: chunk.pos().x,
                y: chunk.pos().y,
                tile_count: chunk.len() as u32,
                tile_index: tiles.len() as u32,
            });
            tiles.extend(chunk.tiles().iter().map(|tile| TileRecord {
                id: tile.id,
                x: tile.pos.x,
                y: tile.pos.y,
                attribs: tile.attribs.bits(),
            }));
        }

        let tile_size = grid.tile_size();
        let chunk_size = grid.chunk_size();
        Self {
            version: FORMAT_VERSION,
            textures,
            tile_size: (tile_size.x, tile_size.y),
            chunk_size: (chunk_size.x, chunk_size.y),
            chunks: headers,
            tiles,
        }
    }

    /// Rejects anything that would leave a grid half populated.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.version != FORMAT_VERSION {
            bail!(
                "unsupported map format version {} (expected {})",
                self.version,
                FORMAT_VERSION
            );
        }
        ensure!(
            self.chunk_size.0 > 0 && self.chunk_size.1 > 0,
            "chunk size {:?} has a zero dimension",
            self.chunk_size
        );
        ensure!(
            self.tile_size.0 > 0.0 && self.tile_size.1 > 0.0,
            "tile size {:?} must be positive",
            self.tile_size
        );

        let mut offsets = HashSet::new();
        for texture in &self.textures {
            ensure!(
                offsets.insert(texture.offset),
                "atlas offset {} is registered twice",
                texture.offset
            );
        }

        let mut coords = HashSet::new();
        for header in &self.chunks {
            ensure!(
                coords.insert((header.x, header.y)),
                "chunk ({}, {}) appears twice",
                header.x,
                header.y
            );
            let end = header.tile_index as usize + header.tile_count as usize;
            ensure!(
                end <= self.tiles.len(),
                "chunk ({}, {}) points at tiles {}..{} but the file has {}",
                header.x,
                header.y,
                header.tile_index,
                end,
                self.tiles.len()
            );
            for tile in &self.tiles[header.tile_index as usize..end] {
                ensure!(
                    (0..self.chunk_size.0 as i32).contains(&tile.x)
                        && (0..self.chunk_size.1 as i32).contains(&tile.y),
                    "tile at ({}, {}) lies outside chunk ({}, {})",
                    tile.x,
                    tile.y,
                    header.x,
                    header.y
                );
            }
        }
        Ok(())
    }

    /// Builds a fresh grid from a validated file.
    fn into_grid(self, slot_count: usize) -> anyhow::Result<TileGrid> {
        self.validate()?;
        let mut grid = TileGrid::new(
            Vector2::new(self.tile_size.0, self.tile_size.1),
            Vector2::new(self.chunk_size.0, self.chunk_size.1),
            slot_count,
        );
        for texture in self.textures {
            let map = TexMap::with_layout(
                texture.path,
                texture.tile_width,
                texture.tile_height,
                texture.columns,
                texture.rows,
            );
            grid.add_tex_map_at(map, texture.offset)?;
        }
        for header in &self.chunks {
            let start = header.tile_index as usize;
            let end = start + header.tile_count as usize;
            let tiles = self.tiles[start..end].iter().map(|record| {
                Tile::new(record.id, record.x, record.y).with_attribs(TileAttribs(record.attribs))
            });
            grid.add_chunk(ChunkCoord::new(header.x, header.y), tiles)?;
        }
        Ok(grid)
    }
}

impl TileGrid {
    /// Writes every chunk and atlas registration to `path`.
    pub fn save_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let config = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .indentor("  ".to_string());
        let result = ron::ser::to_string_pretty(&GridFile::from_grid(self), config)
            .context("failed to serialize tile grid")
            .and_then(|text| {
                fs::write(path, text)
                    .with_context(|| format!("failed to write map file {}", path.display()))
            });
        if let Err(e) = &result {
            log::error!("{:#}", e);
        }
        result
    }

    /// Replaces the grid content with the map stored at `path`.
    ///
    /// On any failure the grid is left exactly as it was. Slots keep their
    /// resident coordinates and are rebuilt from the loaded chunks.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let result = fs::read_to_string(path)
            .with_context(|| format!("failed to read map file {}", path.display()))
            .and_then(|text| {
                ron::from_str::<GridFile>(&text)
                    .with_context(|| format!("failed to parse map file {}", path.display()))
            })
            .and_then(|file| {
                file.into_grid(self.slot_count())
                    .with_context(|| format!("invalid map file {}", path.display()))
            });
        match result {
            Ok(loaded) => {
                self.replace_content(loaded);
                Ok(())
            }
            Err(e) => {
                log::error!("{:#}", e);
                Err(e)
            }
        }
    }
}
