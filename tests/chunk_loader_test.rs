mod common;

use std::collections::BTreeSet;

use cgmath::Vector2;
use tile_ngin::{
    data_structures::scene_graph::{NodeId, Scene},
    grid::{TileGrid, chunk::ChunkCoord, loader::ChunkLoader},
};

use crate::common::test_utils::{init, spatial_root};

const CHUNK: u32 = 8;

fn setup(slots: usize) -> (Scene, TileGrid, NodeId) {
    init();
    let mut scene = Scene::new();
    let player = spatial_root(&mut scene, "player", 0.0, 0.0);
    let grid = TileGrid::new(Vector2::new(1.0, 1.0), Vector2::new(CHUNK, CHUNK), slots);
    (scene, grid, player)
}

fn square(xs: std::ops::RangeInclusive<i32>, ys: std::ops::RangeInclusive<i32>) -> BTreeSet<ChunkCoord> {
    xs.flat_map(|x| ys.clone().map(move |y| ChunkCoord::new(x, y)))
        .collect()
}

fn resident(grid: &TileGrid) -> BTreeSet<ChunkCoord> {
    grid.resident().into_iter().collect()
}

fn move_to(scene: &mut Scene, node: NodeId, x: f32, y: f32) {
    scene.set_world_pos(node, Vector2::new(x, y));
}

#[test]
fn window_follows_the_tracked_node() {
    let (mut scene, mut grid, player) = setup(9);
    let mut loader = ChunkLoader::new(player, 1);

    let report = loader.load_chunks_square(&scene, &mut grid);
    assert_eq!(report.replaced, 9);
    assert_eq!(resident(&grid), square(-1..=1, -1..=1));

    move_to(&mut scene, player, CHUNK as f32 + 1.0, 0.0);
    let report = loader.load_chunks_square(&scene, &mut grid);

    assert_eq!(loader.last_chunk(), Some(ChunkCoord::new(1, 0)));
    assert_eq!(report.replaced, 3);
    assert!(report.dropped.is_empty());
    assert_eq!(resident(&grid), square(0..=2, -1..=1));
}

#[test]
fn kept_chunks_keep_their_slot() {
    let (mut scene, mut grid, player) = setup(9);
    let mut loader = ChunkLoader::new(player, 1);
    loader.load_chunks_square(&scene, &mut grid);
    let slot = grid.slot_of(ChunkCoord::new(1, 1)).unwrap();
    grid.take_dirty_slots();

    move_to(&mut scene, player, CHUNK as f32, 0.0);
    loader.load_chunks_square(&scene, &mut grid);

    assert_eq!(grid.slot_of(ChunkCoord::new(1, 1)), Some(slot));
    assert_eq!(grid.take_dirty_slots().len(), 3);
}

#[test]
fn second_call_without_movement_is_a_noop() {
    let (mut scene, mut grid, player) = setup(9);
    let mut loader = ChunkLoader::new(player, 1);
    loader.load_chunks_square(&scene, &mut grid);
    grid.take_dirty_slots();

    assert!(loader.load_chunks_square(&scene, &mut grid).is_noop());

    // moving inside the same chunk changes nothing either
    move_to(&mut scene, player, 2.0, 3.0);
    assert!(loader.load_chunks_square(&scene, &mut grid).is_noop());
    assert!(grid.take_dirty_slots().is_empty());
}

#[test]
fn half_tile_bias_decides_the_chunk() {
    let (mut scene, mut grid, player) = setup(1);
    let mut loader = ChunkLoader::new(player, 0);

    move_to(&mut scene, player, CHUNK as f32 - 0.6, 0.0);
    loader.load_chunks_square(&scene, &mut grid);
    assert_eq!(grid.resident(), vec![ChunkCoord::new(0, 0)]);

    move_to(&mut scene, player, CHUNK as f32 - 0.4, 0.0);
    loader.load_chunks_square(&scene, &mut grid);
    assert_eq!(grid.resident(), vec![ChunkCoord::new(1, 0)]);
}

#[test]
fn too_few_slots_loads_the_nearest_chunks() {
    let (mut scene, mut grid, player) = setup(4);
    let mut loader = ChunkLoader::new(player, 1);

    let report = loader.load_chunks_square(&scene, &mut grid);

    assert_eq!(report.replaced, 4);
    assert_eq!(report.dropped.len(), 5);
    assert!(grid.slot_of(ChunkCoord::new(0, 0)).is_some());
    assert!(!report.dropped.contains(&ChunkCoord::new(0, 0)));
    assert_eq!(loader.resident().len(), 4);

    // after a move the center chunk still gets a slot
    move_to(&mut scene, player, -(CHUNK as f32) * 3.0, 0.0);
    let report = loader.load_chunks_square(&scene, &mut grid);
    assert!(grid.slot_of(ChunkCoord::new(-3, 0)).is_some());
    assert_eq!(report.replaced, 4);
}

#[test]
fn reset_forces_a_recompute() {
    let (scene, mut grid, player) = setup(9);
    let mut loader = ChunkLoader::new(player, 1);
    loader.load_chunks_square(&scene, &mut grid);
    grid.clear_slot(0);

    loader.reset();
    let report = loader.load_chunks_square(&scene, &mut grid);

    assert_eq!(report.replaced, 1);
    assert_eq!(resident(&grid), square(-1..=1, -1..=1));
}

#[test]
fn non_spatial_node_loads_nothing() {
    let (mut scene, mut grid, _) = setup(9);
    let group = scene.add_node("group", None);
    let mut loader = ChunkLoader::new(group, 1);

    assert!(loader.load_chunks_square(&scene, &mut grid).is_noop());
    assert!(grid.resident().is_empty());
}

#[test]
fn window_size_matches_radius() {
    let (_, _, player) = setup(1);
    assert_eq!(ChunkLoader::new(player, 0).window_len(), 1);
    assert_eq!(ChunkLoader::new(player, 2).window_len(), 25);
}

#[test]
fn chunks_leaving_the_window_are_evicted_even_with_spare_slots() {
    let (mut scene, mut grid, player) = setup(12);
    let mut loader = ChunkLoader::new(player, 1);
    loader.load_chunks_square(&scene, &mut grid);
    assert_eq!(resident(&grid), square(-1..=1, -1..=1));

    move_to(&mut scene, player, CHUNK as f32 + 1.0, 0.0);
    let report = loader.load_chunks_square(&scene, &mut grid);

    assert_eq!(report.replaced, 3);
    assert_eq!(report.evicted, 0);
    assert_eq!(resident(&grid), square(0..=2, -1..=1));
    assert_eq!(grid.resident().len(), 9);
}

#[test]
fn shrinking_the_window_empties_leftover_slots() {
    let (scene, mut grid, player) = setup(9);
    let mut loader = ChunkLoader::new(player, 1);
    loader.load_chunks_square(&scene, &mut grid);
    grid.take_dirty_slots();

    loader.set_radius(0);
    let report = loader.load_chunks_square(&scene, &mut grid);

    assert_eq!(report.replaced, 0);
    assert_eq!(report.evicted, 8);
    assert_eq!(grid.resident(), vec![ChunkCoord::new(0, 0)]);
    assert_eq!(grid.take_dirty_slots().len(), 8);
    assert!(grid.draw_calls().is_empty());
}
