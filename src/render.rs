//! GPU side of the tile grid and the renderer contract for scene nodes.
//!
//! The engine core never binds shaders itself. It hands the renderer:
//!
//! - a [`Drawable`] per spatial scene node (world matrix and layer)
//! - for the tile grid, one vertex buffer per slot plus the list of
//!   per-atlas index ranges to draw from it ([`TileGrid::draw_calls`])
//!
//! [`TileGridBuffers`] owns those buffers. Every slot buffer is sized for a
//! completely filled chunk, so reassigning a slot only rewrites its content.

use cgmath::Matrix4;
use wgpu::util::DeviceExt;

use crate::{
    data_structures::scene_graph::NodeId,
    grid::{
        TileGrid,
        mesh::{INDICES_PER_TILE, TileVertex, VERTICES_PER_TILE},
    },
};

/// What the renderer needs to draw one scene node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Drawable {
    pub node: NodeId,
    pub transform: Matrix4<f32>,
    /// Depth bucket, lower layers are drawn first.
    pub layer: i32,
}

/// Slot vertex buffers and the index buffer they share.
pub struct TileGridBuffers {
    index_buffer: wgpu::Buffer,
    slot_buffers: Vec<wgpu::Buffer>,
    /// Tiles one slot buffer can hold.
    capacity: usize,
}

impl TileGridBuffers {
    pub fn new(device: &wgpu::Device, grid: &TileGrid) -> Self {
        let chunk_size = grid.chunk_size();
        let capacity = chunk_size.x as usize * chunk_size.y as usize;

        // Quads always use the same index pattern, offset by 4 per tile.
        let indices: Vec<u32> = (0..capacity as u32)
            .flat_map(|tile| {
                let base = tile * VERTICES_PER_TILE;
                [base, base + 1, base + 2, base, base + 2, base + 3]
            })
            .collect();
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Tile Grid Index Buffer"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let slot_size = (capacity * VERTICES_PER_TILE as usize * std::mem::size_of::<TileVertex>())
            as wgpu::BufferAddress;
        let slot_buffers = (0..grid.slot_count())
            .map(|slot| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("Tile Grid Slot {} Vertex Buffer", slot)),
                    size: slot_size.max(1),
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })
            })
            .collect();

        Self {
            index_buffer,
            slot_buffers,
            capacity,
        }
    }

    /// Uploads the meshes of every slot that changed since the last upload.
    pub fn write_to_buffers(&self, grid: &mut TileGrid, queue: &wgpu::Queue) {
        for slot in grid.take_dirty_slots() {
            let (Some(mesh), Some(buffer)) = (grid.slot_mesh(slot), self.slot_buffers.get(slot))
            else {
                continue;
            };
            // The stale vertices stay in the buffer. `draw_calls` never lists
            // an empty mesh, so nothing reads them.
            if mesh.vertices.is_empty() {
                continue;
            }
            let max_vertices = self.capacity * VERTICES_PER_TILE as usize;
            if mesh.vertices.len() > max_vertices {
                log::warn!(
                    "slot {} holds {} tiles, its buffer fits {}",
                    slot,
                    mesh.vertices.len() / VERTICES_PER_TILE as usize,
                    self.capacity
                );
            }
            let vertices = &mesh.vertices[..mesh.vertices.len().min(max_vertices)];
            queue.write_buffer(buffer, 0, bytemuck::cast_slice(vertices));
        }
    }

    /// Issues one indexed draw per atlas per occupied slot. `bind_atlas` is
    /// called before each draw with the atlas' tile-id offset so the caller
    /// can set the matching texture bind group.
    pub fn draw_chunks<'pass>(
        &'pass self,
        grid: &TileGrid,
        render_pass: &mut wgpu::RenderPass<'pass>,
        mut bind_atlas: impl FnMut(u32, &mut wgpu::RenderPass<'pass>),
    ) {
        let max_indices = (self.capacity as u32) * INDICES_PER_TILE;
        render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        let mut bound_slot = None;
        for call in grid.draw_calls() {
            let Some(buffer) = self.slot_buffers.get(call.slot) else {
                continue;
            };
            if bound_slot != Some(call.slot) {
                render_pass.set_vertex_buffer(0, buffer.slice(..));
                bound_slot = Some(call.slot);
            }
            bind_atlas(call.atlas_offset, render_pass);
            let end = call.indices.end.min(max_indices);
            if call.indices.start < end {
                render_pass.draw_indexed(call.indices.start..end, 0, 0..1);
            }
        }
    }
}
