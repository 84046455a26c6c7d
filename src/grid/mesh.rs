//! CPU-side chunk geometry.
//!
//! A chunk turns into one quad per tile. Because chunk tiles are ordered by
//! id, the quads of every atlas end up in one contiguous run of indices, so a
//! chunk needs exactly one indexed draw per atlas it uses.

use std::{collections::BTreeMap, ops::Range};

use cgmath::Vector2;

use crate::{
    data_structures::texture::TexMap,
    grid::chunk::{Chunk, TileAttribs, owning_offset},
};

/// Indices emitted per tile quad.
pub const INDICES_PER_TILE: u32 = 6;
pub const VERTICES_PER_TILE: u32 = 4;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TileVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl TileVertex {
    /**
     * Layout of a tile vertex in the slot buffers:
     *
     * stride: length of a vertex
     * location 0: world position (x, y, layer)
     * location 1: atlas texture coordinates
     */
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<TileVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// The index run drawn with one atlas bound.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AtlasRange {
    pub atlas_offset: u32,
    pub indices: Range<u32>,
}

/// Geometry of one chunk, ready to be uploaded into a slot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkMesh {
    pub vertices: Vec<TileVertex>,
    pub indices: Vec<u32>,
    pub ranges: Vec<AtlasRange>,
}

impl ChunkMesh {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.ranges.clear();
    }

    /// Builds the quads of `chunk`.
    ///
    /// Tiles whose id falls outside every registered atlas are skipped.
    pub fn build(
        chunk: &Chunk,
        atlases: &BTreeMap<u32, TexMap>,
        tile_size: Vector2<f32>,
        chunk_size: Vector2<u32>,
        layer: i32,
    ) -> Self {
        let offsets: Vec<u32> = atlases.keys().copied().collect();
        let origin = Vector2::new(
            chunk.pos().x as f32 * chunk_size.x as f32,
            chunk.pos().y as f32 * chunk_size.y as f32,
        );
        let mut mesh = ChunkMesh::default();

        for tile in chunk.tiles() {
            let Some((offset, atlas)) = owning_offset(&offsets, tile.id)
                .and_then(|offset| atlases.get(&offset).map(|atlas| (offset, atlas)))
            else {
                log::warn!("tile {} in chunk {} has no atlas, skipped", tile.id, chunk.pos());
                continue;
            };
            let Some(basis) = atlas.tile_basis(tile.id - offset) else {
                log::warn!(
                    "tile {} is outside its atlas {} ({} tiles), skipped",
                    tile.id,
                    atlas.path.display(),
                    atlas.tile_count()
                );
                continue;
            };

            let start = mesh.indices.len() as u32;
            match mesh.ranges.last_mut() {
                Some(range) if range.atlas_offset == offset => {}
                _ => mesh.ranges.push(AtlasRange {
                    atlas_offset: offset,
                    indices: start..start,
                }),
            }

            let center = Vector2::new(
                (origin.x + tile.pos.x as f32) * tile_size.x,
                (origin.y + tile.pos.y as f32) * tile_size.y,
            );
            mesh.push_quad(center, tile_size, layer as f32, corner_uvs(basis, tile.attribs));
            if let Some(range) = mesh.ranges.last_mut() {
                range.indices.end = mesh.indices.len() as u32;
            }
        }
        mesh
    }

    fn push_quad(&mut self, center: Vector2<f32>, size: Vector2<f32>, z: f32, uvs: [[f32; 2]; 4]) {
        let half = size / 2.0;
        let base = self.vertices.len() as u32;
        let corners = [
            [center.x - half.x, center.y - half.y],
            [center.x + half.x, center.y - half.y],
            [center.x + half.x, center.y + half.y],
            [center.x - half.x, center.y + half.y],
        ];
        for (corner, uv) in corners.iter().zip(uvs) {
            self.vertices.push(TileVertex {
                position: [corner[0], corner[1], z],
                tex_coords: uv,
            });
        }
        self.indices
            .extend([0, 1, 2, 0, 2, 3].iter().map(|i| base + i));
    }
}

/// Texture coordinates for the corners bottom-left, bottom-right, top-right,
/// top-left with the tile's mirror/rotate flags applied.
///
/// The atlas v axis points down, so the bottom of the quad samples `max.y`.
fn corner_uvs((min, max): (Vector2<f32>, Vector2<f32>), attribs: TileAttribs) -> [[f32; 2]; 4] {
    let mut uvs = [[min.x, max.y], [max.x, max.y], [max.x, min.y], [min.x, min.y]];
    if attribs.contains(TileAttribs::REFLECT_H) {
        uvs.swap(0, 1);
        uvs.swap(2, 3);
    }
    if attribs.contains(TileAttribs::REFLECT_V) {
        uvs.swap(0, 3);
        uvs.swap(1, 2);
    }
    // counter-clockwise quarter turns of the image on the quad
    let mut turns = 0;
    if attribs.contains(TileAttribs::ROTATE_90) {
        turns += 1;
    }
    if attribs.contains(TileAttribs::ROTATE_180) {
        turns += 2;
    }
    uvs.rotate_left(turns);
    uvs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_basis() -> (Vector2<f32>, Vector2<f32>) {
        (Vector2::new(0.0, 0.0), Vector2::new(1.0, 1.0))
    }

    #[test]
    fn plain_tile_keeps_orientation() {
        let uvs = corner_uvs(unit_basis(), TileAttribs::NONE);
        assert_eq!(uvs, [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]]);
    }

    #[test]
    fn rotate_180_equals_both_reflections() {
        let rotated = corner_uvs(unit_basis(), TileAttribs::ROTATE_180);
        let reflected = corner_uvs(unit_basis(), TileAttribs::REFLECT_H | TileAttribs::REFLECT_V);
        assert_eq!(rotated, reflected);
    }

    #[test]
    fn four_quarter_turns_are_identity() {
        let once = corner_uvs(unit_basis(), TileAttribs::ROTATE_90 | TileAttribs::ROTATE_180);
        let mut again = once;
        again.rotate_left(1);
        assert_eq!(again, corner_uvs(unit_basis(), TileAttribs::NONE));
    }
}
