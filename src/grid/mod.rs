//! Chunked tile world.
//!
//! The [`TileGrid`] keeps every chunk it has ever seen in a backing store and
//! a fixed number of buffer slots that each display at most one resident
//! chunk. Chunks exist independently of residency: they are created lazily
//! on first reference and only ever evicted from slots, never destroyed.
//!
//! - `chunk` holds chunk coordinates, tiles and per-chunk storage
//! - `mesh` turns a chunk into quads with per-atlas index ranges
//! - `loader` keeps a square window of chunks resident around a node
//! - `persist` reads and writes map files

pub mod chunk;
pub mod loader;
pub mod mesh;
pub mod persist;

use std::{
    collections::{BTreeMap, HashMap},
    ops::Range,
};

use anyhow::bail;
use cgmath::Vector2;

use crate::{
    config::GridConfig,
    data_structures::texture::TexMap,
    grid::{
        chunk::{Chunk, ChunkCoord, Tile, TileAttribs},
        mesh::ChunkMesh,
    },
};

/// One fixed buffer holder.
#[derive(Clone, Debug, Default)]
struct Slot {
    chunk: Option<ChunkCoord>,
    mesh: ChunkMesh,
    /// Mesh changed since the renderer last uploaded it.
    dirty: bool,
}

/// One indexed draw: the slot's buffer with a single atlas bound.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawCall {
    pub slot: usize,
    pub atlas_offset: u32,
    pub indices: Range<u32>,
}

#[derive(Debug)]
pub struct TileGrid {
    tile_size: Vector2<f32>,
    chunk_size: Vector2<u32>,
    layer: i32,
    atlases: BTreeMap<u32, TexMap>,
    chunks: HashMap<ChunkCoord, Chunk>,
    slots: Vec<Slot>,
    /// Round-robin cursor used by `mark_chunk`.
    next_slot: usize,
}

impl TileGrid {
    /// Creates an empty grid with `slot_count` buffer slots.
    ///
    /// Zero sizes are coerced to 1.
    pub fn new(tile_size: Vector2<f32>, chunk_size: Vector2<u32>, slot_count: usize) -> Self {
        let tile_size = Vector2::new(
            if tile_size.x > 0.0 { tile_size.x } else { 1.0 },
            if tile_size.y > 0.0 { tile_size.y } else { 1.0 },
        );
        if chunk_size.x == 0 || chunk_size.y == 0 {
            log::warn!("chunk size {:?} has a zero dimension, using 1", chunk_size);
        }
        Self {
            tile_size,
            chunk_size: Vector2::new(chunk_size.x.max(1), chunk_size.y.max(1)),
            layer: 0,
            atlases: BTreeMap::new(),
            chunks: HashMap::new(),
            slots: vec![Slot::default(); slot_count],
            next_slot: 0,
        }
    }

    pub fn from_config(config: &GridConfig) -> Self {
        let mut grid = Self::new(
            Vector2::from(config.tile_size),
            Vector2::from(config.chunk_size),
            config.slots,
        );
        grid.layer = config.layer;
        grid
    }

    pub fn tile_size(&self) -> Vector2<f32> {
        self.tile_size
    }

    pub fn chunk_size(&self) -> Vector2<u32> {
        self.chunk_size
    }

    pub fn layer(&self) -> i32 {
        self.layer
    }

    /// Moves the whole grid to another depth. Resident meshes are rebuilt.
    pub fn set_layer(&mut self, layer: i32) {
        self.layer = layer;
        self.refresh_slots();
    }

    /// Registered atlases keyed by their tile-id offset.
    pub fn tex_maps(&self) -> &BTreeMap<u32, TexMap> {
        &self.atlases
    }

    /// Registers `map` right after the highest registered atlas' id range.
    /// Returns the offset it was placed at.
    pub fn add_tex_map(&mut self, map: TexMap) -> u32 {
        let offset = self
            .atlases
            .last_key_value()
            .map(|(offset, last)| offset + last.tile_count())
            .unwrap_or(0);
        self.insert_tex_map(offset, map);
        offset
    }

    /// Registers `map` at an explicit offset.
    pub fn add_tex_map_at(&mut self, map: TexMap, offset: u32) -> anyhow::Result<u32> {
        if let Some(existing) = self.atlases.get(&offset) {
            bail!(
                "tile id offset {} is already taken by {}",
                offset,
                existing.path.display()
            );
        }
        self.insert_tex_map(offset, map);
        Ok(offset)
    }

    fn insert_tex_map(&mut self, offset: u32, map: TexMap) {
        self.atlases.insert(offset, map);
        let offsets = self.offsets();
        for chunk in self.chunks.values_mut() {
            chunk.recount(&offsets);
        }
        self.refresh_slots();
    }

    fn offsets(&self) -> Vec<u32> {
        self.atlases.keys().copied().collect()
    }

    /// Upserts the chunk at `coord` with exactly `tiles`.
    ///
    /// Fails without touching the chunk if any tile lies outside it.
    pub fn add_chunk(
        &mut self,
        coord: ChunkCoord,
        tiles: impl IntoIterator<Item = Tile>,
    ) -> anyhow::Result<&Chunk> {
        let tiles: Vec<Tile> = tiles.into_iter().collect();
        for tile in &tiles {
            self.check_local(coord, tile)?;
        }
        let offsets = self.offsets();
        self.chunks
            .entry(coord)
            .or_insert_with(|| Chunk::new(coord))
            .set_tiles(tiles, &offsets);
        self.update_chunk(coord);
        let chunk: &Chunk = self.chunk_entry(coord);
        Ok(chunk)
    }

    fn check_local(&self, coord: ChunkCoord, tile: &Tile) -> anyhow::Result<()> {
        let inside = (0..self.chunk_size.x as i32).contains(&tile.pos.x)
            && (0..self.chunk_size.y as i32).contains(&tile.pos.y);
        if !inside {
            bail!(
                "tile {} at ({}, {}) lies outside chunk {} of {}x{} tiles",
                tile.id,
                tile.pos.x,
                tile.pos.y,
                coord,
                self.chunk_size.x,
                self.chunk_size.y
            );
        }
        Ok(())
    }

    /// The chunk at `coord`, if it was ever created.
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    /// Every chunk in the backing store, resident or not.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    /// Resolves the chunk under `world`, creating it empty if needed.
    pub fn get_chunk(&mut self, world: Vector2<f32>) -> &Chunk {
        let coord = self.chunk_pos(world);
        self.chunk_entry(coord)
    }

    /// Resolves the chunk at `coord`, creating it empty if needed.
    pub fn get_chunk_from_grid_pos(&mut self, coord: ChunkCoord) -> &Chunk {
        self.chunk_entry(coord)
    }

    fn chunk_entry(&mut self, coord: ChunkCoord) -> &mut Chunk {
        let offsets = self.offsets();
        self.chunks.entry(coord).or_insert_with(|| {
            let mut chunk = Chunk::new(coord);
            chunk.recount(&offsets);
            chunk
        })
    }

    /// Global tile coordinate of a world position, rounding half up.
    pub fn tile_pos(&self, world: Vector2<f32>) -> Vector2<i32> {
        Vector2::new(
            (world.x / self.tile_size.x + 0.5).floor() as i32,
            (world.y / self.tile_size.y + 0.5).floor() as i32,
        )
    }

    /// Coordinate of the chunk containing `world`.
    pub fn chunk_pos(&self, world: Vector2<f32>) -> ChunkCoord {
        let tile = self.tile_pos(world);
        ChunkCoord::new(
            tile.x.div_euclid(self.chunk_size.x as i32),
            tile.y.div_euclid(self.chunk_size.y as i32),
        )
    }

    /// Chunk-local coordinate of a global tile coordinate, wrapped into
    /// `[0, chunk_size)` also for negative inputs.
    pub fn local_pos(&self, tile: Vector2<i32>) -> Vector2<i32> {
        Vector2::new(
            tile.x.rem_euclid(self.chunk_size.x as i32),
            tile.y.rem_euclid(self.chunk_size.y as i32),
        )
    }

    /// Places a tile at `world`, replacing what was there.
    /// Returns the coordinate of the affected chunk.
    pub fn add_tile_to_grid(&mut self, world: Vector2<f32>, id: u32, attribs: TileAttribs) -> ChunkCoord {
        let coord = self.chunk_pos(world);
        let local = self.local_pos(self.tile_pos(world));
        self.insert_tile(coord, Tile::new(id, local.x, local.y).with_attribs(attribs));
        coord
    }

    /// Removes the tile at `world`, if any.
    pub fn remove_tile_from_grid(&mut self, world: Vector2<f32>) -> Option<Tile> {
        let coord = self.chunk_pos(world);
        let local = self.local_pos(self.tile_pos(world));
        self.remove_tile_from_chunk(coord, local)
    }

    /// Inserts `tile` (chunk-local position) into the chunk at `coord`.
    /// Returns the tile it evicted. Positions outside the chunk are rejected.
    pub fn add_tile_to_chunk(&mut self, coord: ChunkCoord, tile: Tile) -> anyhow::Result<Option<Tile>> {
        self.check_local(coord, &tile)?;
        Ok(self.insert_tile(coord, tile))
    }

    fn insert_tile(&mut self, coord: ChunkCoord, tile: Tile) -> Option<Tile> {
        let offsets = self.offsets();
        let evicted = self.chunk_entry(coord).insert(tile, &offsets);
        self.update_chunk(coord);
        evicted
    }

    pub fn remove_tile_from_chunk(&mut self, coord: ChunkCoord, local: Vector2<i32>) -> Option<Tile> {
        let offsets = self.offsets();
        let removed = self.chunks.get_mut(&coord)?.remove(local, &offsets);
        if removed.is_some() {
            self.update_chunk(coord);
        }
        removed
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// The chunk currently displayed by `slot`.
    pub fn slot_chunk(&self, slot: usize) -> Option<ChunkCoord> {
        self.slots.get(slot).and_then(|s| s.chunk)
    }

    /// The slot displaying `coord`, if resident.
    pub fn slot_of(&self, coord: ChunkCoord) -> Option<usize> {
        self.slots.iter().position(|s| s.chunk == Some(coord))
    }

    pub fn slot_mesh(&self, slot: usize) -> Option<&ChunkMesh> {
        self.slots.get(slot).map(|s| &s.mesh)
    }

    /// Coordinates of every resident chunk in slot order.
    pub fn resident(&self) -> Vec<ChunkCoord> {
        self.slots.iter().filter_map(|s| s.chunk).collect()
    }

    /// Puts the chunk at `coord` into `slot`, creating it if needed, and
    /// rebuilds the slot's mesh. A chunk is never resident twice: if it
    /// already sat in another slot that slot is cleared.
    pub fn assign_slot(&mut self, slot: usize, coord: ChunkCoord) -> bool {
        if slot >= self.slots.len() {
            log::debug!("slot {} does not exist ({} slots)", slot, self.slots.len());
            return false;
        }
        if let Some(previous) = self.slot_of(coord) {
            if previous == slot {
                return true;
            }
            self.clear_slot(previous);
        }
        self.chunk_entry(coord);
        self.slots[slot].chunk = Some(coord);
        self.update_vbo(slot);
        true
    }

    /// Evicts whatever chunk `slot` displays.
    pub fn clear_slot(&mut self, slot: usize) {
        if let Some(s) = self.slots.get_mut(slot) {
            s.chunk = None;
            s.mesh.clear();
            s.dirty = true;
        }
    }

    /// Regenerates the geometry of `slot` from its chunk. A slot without a
    /// chunk, or with an empty one, ends up with a zero length mesh.
    pub fn update_vbo(&mut self, slot: usize) {
        let Some(coord) = self.slots.get(slot).map(|s| s.chunk) else {
            return;
        };
        let mesh = match coord.and_then(|coord| self.chunks.get(&coord)) {
            Some(chunk) => ChunkMesh::build(
                chunk,
                &self.atlases,
                self.tile_size,
                self.chunk_size,
                self.layer,
            ),
            None => ChunkMesh::default(),
        };
        let s = &mut self.slots[slot];
        s.mesh = mesh;
        s.dirty = true;
    }

    /// Rebuilds the slot of `coord` if it is resident.
    pub fn update_chunk(&mut self, coord: ChunkCoord) -> bool {
        match self.slot_of(coord) {
            Some(slot) => {
                self.update_vbo(slot);
                true
            }
            None => false,
        }
    }

    /// Makes `coord` resident: refreshes it if it already is, otherwise puts
    /// it into the next slot in round-robin order. Returns the slot used.
    pub fn mark_chunk(&mut self, coord: ChunkCoord) -> Option<usize> {
        if let Some(slot) = self.slot_of(coord) {
            self.update_vbo(slot);
            return Some(slot);
        }
        if self.slots.is_empty() {
            return None;
        }
        let slot = self.next_slot % self.slots.len();
        self.next_slot = (slot + 1) % self.slots.len();
        self.assign_slot(slot, coord);
        Some(slot)
    }

    fn refresh_slots(&mut self) {
        for slot in 0..self.slots.len() {
            if self.slots[slot].chunk.is_some() {
                self.update_vbo(slot);
            }
        }
    }

    /// Slots whose mesh changed since the last call, clearing their flag.
    pub fn take_dirty_slots(&mut self) -> Vec<usize> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter(|(_, s)| s.dirty)
            .map(|(slot, s)| {
                s.dirty = false;
                slot
            })
            .collect()
    }

    /// One draw per atlas per occupied, non-empty slot.
    pub fn draw_calls(&self) -> Vec<DrawCall> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.chunk.is_some())
            .flat_map(|(slot, s)| {
                s.mesh
                    .ranges
                    .iter()
                    .filter(|range| !range.indices.is_empty())
                    .map(move |range| DrawCall {
                        slot,
                        atlas_offset: range.atlas_offset,
                        indices: range.indices.clone(),
                    })
            })
            .collect()
    }

    /// Swaps in the content of `other` while keeping this grid's slots and
    /// their resident coordinates. Used by loading.
    pub(crate) fn replace_content(&mut self, other: TileGrid) {
        self.tile_size = other.tile_size;
        self.chunk_size = other.chunk_size;
        self.atlases = other.atlases;
        self.chunks = other.chunks;
        for coord in self.resident() {
            self.chunk_entry(coord);
        }
        self.refresh_slots();
    }
}

impl Default for TileGrid {
    fn default() -> Self {
        Self::from_config(&GridConfig::default())
    }
}
