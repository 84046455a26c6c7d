#![allow(dead_code)]

use cgmath::{Matrix4, Vector2};
use tile_ngin::{
    data_structures::scene_graph::{NodeId, Scene, Transform2d},
    flow,
};

pub(crate) const TOLERANCE: f32 = 1e-4;

pub(crate) fn init() {
    flow::init_logger();
}

pub(crate) fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() <= TOLERANCE,
        "expected {expected}, got {actual}"
    );
}

pub(crate) fn assert_vec_close(actual: Vector2<f32>, expected: Vector2<f32>) {
    assert!(
        (actual.x - expected.x).abs() <= TOLERANCE && (actual.y - expected.y).abs() <= TOLERANCE,
        "expected {expected:?}, got {actual:?}"
    );
}

/// Rotations compared on the circle, 359.99 and 0.0 are close.
pub(crate) fn assert_degrees_close(actual: f32, expected: f32) {
    let diff = (actual - expected).rem_euclid(360.0);
    assert!(
        diff <= TOLERANCE * 10.0 || 360.0 - diff <= TOLERANCE * 10.0,
        "expected {expected} degrees, got {actual}"
    );
}

pub(crate) fn assert_matrix_close(actual: Matrix4<f32>, expected: Matrix4<f32>) {
    let a: &[f32; 16] = actual.as_ref();
    let e: &[f32; 16] = expected.as_ref();
    for (i, (x, y)) in a.iter().zip(e.iter()).enumerate() {
        assert!(
            (x - y).abs() <= TOLERANCE,
            "element {i} differs: expected {expected:?}, got {actual:?}"
        );
    }
}

/// A parentless spatial node at `(x, y)`.
pub(crate) fn spatial_root(scene: &mut Scene, name: &str, x: f32, y: f32) -> NodeId {
    scene.add_node(name, Some(Transform2d::from(Vector2::new(x, y))))
}
