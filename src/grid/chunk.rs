//! Chunks: fixed-size blocks of tiles and the unit of streaming.

use std::{collections::BTreeMap, fmt, ops::BitOr};

use cgmath::Vector2;

/// Integer grid coordinate of a chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance to `other`.
    pub fn distance(&self, other: ChunkCoord) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

impl From<(i32, i32)> for ChunkCoord {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Mirror and rotate flags applied to a tile's texture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TileAttribs(pub u32);

impl TileAttribs {
    pub const NONE: TileAttribs = TileAttribs(0);
    pub const ROTATE_90: TileAttribs = TileAttribs(1);
    pub const ROTATE_180: TileAttribs = TileAttribs(1 << 1);
    pub const REFLECT_V: TileAttribs = TileAttribs(1 << 2);
    pub const REFLECT_H: TileAttribs = TileAttribs(1 << 3);

    pub fn contains(&self, other: TileAttribs) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl BitOr for TileAttribs {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        TileAttribs(self.0 | rhs.0)
    }
}

/// One tile placed inside a chunk, `pos` is chunk-local.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tile {
    pub id: u32,
    pub pos: Vector2<i32>,
    pub attribs: TileAttribs,
}

impl Tile {
    pub fn new(id: u32, x: i32, y: i32) -> Self {
        Self {
            id,
            pos: Vector2::new(x, y),
            attribs: TileAttribs::NONE,
        }
    }

    pub fn with_attribs(mut self, attribs: TileAttribs) -> Self {
        self.attribs = attribs;
        self
    }
}

/// Tile storage of a single chunk.
///
/// Tiles are kept ordered by id (ties in insertion order) so tiles of one
/// atlas form a contiguous run. At most one tile sits on each local position.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
    pos: ChunkCoord,
    tiles: Vec<Tile>,
    /// Atlas offset → number of tiles owned by that atlas.
    tiles_per_texmap: BTreeMap<u32, u32>,
}

impl Chunk {
    pub fn new(pos: ChunkCoord) -> Self {
        Self {
            pos,
            tiles: Vec::new(),
            tiles_per_texmap: BTreeMap::new(),
        }
    }

    pub fn pos(&self) -> ChunkCoord {
        self.pos
    }

    /// Tiles in id order.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tile_at(&self, pos: Vector2<i32>) -> Option<&Tile> {
        self.tiles.iter().find(|t| t.pos == pos)
    }

    /// Per-atlas tile counts, keyed by atlas offset in ascending order.
    pub fn tiles_per_texmap(&self) -> &BTreeMap<u32, u32> {
        &self.tiles_per_texmap
    }

    /// Adds `tile`, evicting whatever was on its position before.
    /// Returns the evicted tile.
    pub(crate) fn insert(&mut self, tile: Tile, offsets: &[u32]) -> Option<Tile> {
        let evicted = self.remove(tile.pos, offsets);
        let index = self.tiles.partition_point(|t| t.id <= tile.id);
        self.tiles.insert(index, tile);
        if let Some(offset) = owning_offset(offsets, tile.id) {
            *self.tiles_per_texmap.entry(offset).or_insert(0) += 1;
        }
        evicted
    }

    pub(crate) fn remove(&mut self, pos: Vector2<i32>, offsets: &[u32]) -> Option<Tile> {
        let index = self.tiles.iter().position(|t| t.pos == pos)?;
        let tile = self.tiles.remove(index);
        if let Some(count) =
            owning_offset(offsets, tile.id).and_then(|offset| self.tiles_per_texmap.get_mut(&offset))
        {
            *count = count.saturating_sub(1);
        }
        Some(tile)
    }

    /// Replaces every tile of the chunk.
    pub(crate) fn set_tiles(&mut self, tiles: impl IntoIterator<Item = Tile>, offsets: &[u32]) {
        self.tiles.clear();
        self.recount(offsets);
        for tile in tiles {
            self.insert(tile, offsets);
        }
    }

    /// Rebuilds the per-atlas counters, with a zero entry for every atlas.
    pub(crate) fn recount(&mut self, offsets: &[u32]) {
        self.tiles_per_texmap = offsets.iter().map(|&offset| (offset, 0)).collect();
        for tile in &self.tiles {
            if let Some(offset) = owning_offset(offsets, tile.id) {
                *self.tiles_per_texmap.entry(offset).or_insert(0) += 1;
            }
        }
    }
}

/// The atlas owning `id` is the one with the greatest offset `<= id`.
/// `offsets` must be sorted ascending.
pub(crate) fn owning_offset(offsets: &[u32], id: u32) -> Option<u32> {
    let index = offsets.partition_point(|&offset| offset <= id);
    index.checked_sub(1).map(|i| offsets[i])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owning_offset_picks_greatest_lower_bound() {
        let offsets = [0, 16, 40];
        assert_eq!(owning_offset(&offsets, 0), Some(0));
        assert_eq!(owning_offset(&offsets, 15), Some(0));
        assert_eq!(owning_offset(&offsets, 16), Some(16));
        assert_eq!(owning_offset(&offsets, 100), Some(40));
        assert_eq!(owning_offset(&[5], 4), None);
        assert_eq!(owning_offset(&[], 4), None);
    }

    #[test]
    fn equal_ids_keep_insertion_order() {
        let offsets = [0];
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0));
        chunk.insert(Tile::new(3, 0, 0), &offsets);
        chunk.insert(Tile::new(1, 1, 0), &offsets);
        chunk.insert(Tile::new(3, 2, 0), &offsets);
        let order: Vec<_> = chunk.tiles().iter().map(|t| (t.id, t.pos.x)).collect();
        assert_eq!(order, vec![(1, 1), (3, 0), (3, 2)]);
        assert_eq!(chunk.tiles_per_texmap().get(&0), Some(&3));
    }

    #[test]
    fn attribs_combine() {
        let attribs = TileAttribs::ROTATE_90 | TileAttribs::REFLECT_H;
        assert!(attribs.contains(TileAttribs::ROTATE_90));
        assert!(!attribs.contains(TileAttribs::REFLECT_V));
        assert_eq!(attribs.bits(), 9);
    }
}
