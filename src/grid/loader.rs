//! Sliding-window chunk residency.
//!
//! A [`ChunkLoader`] follows one scene node and keeps the square of chunks
//! around it (Chebyshev radius `radius`) resident in the grid's slots. Moving
//! across a chunk border only swaps the chunks that left the window for the
//! ones that entered it; everything still inside keeps its slot.

use std::collections::HashSet;

use crate::{
    data_structures::scene_graph::{NodeId, Scene},
    grid::{TileGrid, chunk::ChunkCoord},
};

/// What one call to [`ChunkLoader::load_chunks_square`] changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Slots that got a new chunk.
    pub replaced: usize,
    /// Slots emptied because their chunk left the window.
    pub evicted: usize,
    /// Wanted chunks that found no free slot.
    pub dropped: Vec<ChunkCoord>,
}

impl LoadReport {
    pub fn is_noop(&self) -> bool {
        self.replaced == 0 && self.evicted == 0 && self.dropped.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct ChunkLoader {
    node: NodeId,
    radius: u32,
    last: Option<ChunkCoord>,
    /// Chunks this loader made resident on its last move.
    last_set: Vec<ChunkCoord>,
}

impl ChunkLoader {
    pub fn new(node: NodeId, radius: u32) -> Self {
        Self {
            node,
            radius,
            last: None,
            last_set: Vec::new(),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Follows another node from the next call on.
    pub fn set_node(&mut self, node: NodeId) {
        self.node = node;
        self.reset();
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn set_radius(&mut self, radius: u32) {
        self.radius = radius;
        self.reset();
    }

    /// Forgets the remembered window so the next call recomputes it.
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Chunk the tracked node was in during the last call.
    pub fn last_chunk(&self) -> Option<ChunkCoord> {
        self.last
    }

    /// Number of chunks a full window needs.
    pub fn window_len(&self) -> usize {
        let side = 2 * self.radius as usize + 1;
        side * side
    }

    /// Updates residency for the tracked node's current position.
    ///
    /// Does nothing while the node stays in the same chunk (or has no world
    /// position).
    pub fn load_chunks_square(&mut self, scene: &Scene, grid: &mut TileGrid) -> LoadReport {
        let Some(world) = scene.world_pos(self.node) else {
            log::debug!("chunk loader node {} has no world position", self.node);
            return LoadReport::default();
        };
        let now = grid.chunk_pos(world);
        if self.last == Some(now) {
            return LoadReport::default();
        }

        let desired = window(now, self.radius);
        let wanted: HashSet<ChunkCoord> = desired.iter().copied().collect();
        let mut report = LoadReport::default();

        // Slots showing chunks outside the window are reused first, then free ones.
        let stale: Vec<usize> = (0..grid.slot_count())
            .filter(|&slot| {
                grid.slot_chunk(slot)
                    .is_some_and(|coord| !wanted.contains(&coord))
            })
            .collect();
        let free: Vec<usize> = (0..grid.slot_count())
            .filter(|&slot| grid.slot_chunk(slot).is_none())
            .collect();
        let mut candidates = stale.iter().chain(&free).copied();

        let mut resident = Vec::with_capacity(desired.len());
        for coord in desired {
            if grid.slot_of(coord).is_some() {
                resident.push(coord);
                continue;
            }
            match candidates.next() {
                Some(slot) => {
                    grid.assign_slot(slot, coord);
                    report.replaced += 1;
                    resident.push(coord);
                }
                None => report.dropped.push(coord),
            }
        }

        // Stale slots nobody took over must not keep drawing their chunk.
        for slot in candidates.filter(|slot| stale.contains(slot)) {
            grid.clear_slot(slot);
            report.evicted += 1;
        }

        if !report.dropped.is_empty() {
            log::warn!(
                "chunk window around {} needs {} slots, grid has {}: {} chunks not loaded",
                now,
                self.window_len(),
                grid.slot_count(),
                report.dropped.len()
            );
        }

        self.last = Some(now);
        self.last_set = resident;
        report
    }

    /// Chunks made resident by the last call that changed anything.
    pub fn resident(&self) -> &[ChunkCoord] {
        &self.last_set
    }
}

/// The `(2r+1)²` coordinates around `center`, nearest rings first and
/// row-major inside a ring.
pub fn window(center: ChunkCoord, radius: u32) -> Vec<ChunkCoord> {
    let r = radius as i32;
    let mut coords: Vec<ChunkCoord> = (-r..=r)
        .flat_map(|dy| (-r..=r).map(move |dx| ChunkCoord::new(center.x + dx, center.y + dy)))
        .collect();
    coords.sort_by_key(|coord| coord.distance(center));
    coords
}
