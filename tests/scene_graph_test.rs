mod common;

use cgmath::{Matrix4, Vector2, Vector3, Vector4};
use tile_ngin::data_structures::{
    pose::Pose2d,
    scene_graph::{Scene, Transform2d},
};

use crate::common::test_utils::{
    assert_close, assert_degrees_close, assert_matrix_close, assert_vec_close, init, spatial_root,
};

fn pose(x: f32, y: f32, rot: f32, scl: f32) -> Transform2d {
    Transform2d::new(Vector2::new(x, y), rot, Vector2::new(scl, scl))
}

#[test]
fn transform_round_trip_keeps_pose() {
    let original = Transform2d::new(Vector2::new(3.0, -2.0), 123.0, Vector2::new(2.0, 0.5)).with_layer(4);
    let mut rebuilt = Transform2d::default();
    rebuilt.set_transform(&original.get_transform());

    assert_vec_close(rebuilt.get_pos(), original.get_pos());
    assert_vec_close(rebuilt.get_scl(), original.get_scl());
    assert_degrees_close(rebuilt.get_rot(), 123.0);
    assert_eq!(rebuilt.get_layer(), 4);
}

#[test]
fn rotations_beyond_half_turn_survive_decomposition() {
    for degrees in [0.0, 90.0, 181.0, 270.0, 359.0] {
        let mut t = Transform2d::default();
        t.set_transform(&pose(0.0, 0.0, degrees, 1.0).get_transform());
        assert_degrees_close(t.get_rot(), degrees);
    }
}

#[test]
fn rotation_is_normalized() {
    let mut t = Transform2d::default();
    assert_close(t.set_rot(400.0).get_rot(), 40.0);
    assert_close(t.set_rot(-30.0).get_rot(), 330.0);
    assert_close(t.rotate(60.0).get_rot(), 30.0);
}

#[test]
fn zero_scale_becomes_one() {
    let mut t = Transform2d::default();
    t.set_scl(Vector2::new(0.0, 3.0));
    assert_eq!(t.get_scl(), Vector2::new(1.0, 3.0));
}

#[test]
fn world_transform_is_matrix_composition_of_ancestors() {
    init();
    let mut scene = Scene::new();
    let root = scene.add_node("root", Some(pose(1.0, 2.0, 30.0, 2.0)));
    let mid = scene.add_child(root, "mid", Some(pose(3.0, 0.0, 45.0, 0.5))).unwrap();
    let child = scene.add_child(mid, "child", Some(pose(1.0, 1.0, 10.0, 1.0))).unwrap();

    let expected = scene.transform(root).unwrap().get_transform()
        * scene.transform(mid).unwrap().get_transform()
        * scene.transform(child).unwrap().get_transform();
    assert_matrix_close(scene.world_transform(child).unwrap(), expected);

    let expected_pos = expected * Vector3::new(0.0, 0.0, 0.0).extend(1.0);
    assert_vec_close(scene.world_pos(child).unwrap(), Vector2::new(expected_pos.x, expected_pos.y));
    assert_degrees_close(scene.world_rot(child).unwrap(), 85.0);
    assert_vec_close(scene.world_scl(child).unwrap(), Vector2::new(1.0, 1.0));
}

#[test]
fn non_uniform_parent_scale_shears_rotated_children() {
    let mut scene = Scene::new();
    let parent = scene.add_node(
        "parent",
        Some(Transform2d::new(Vector2::new(0.0, 0.0), 0.0, Vector2::new(2.0, 1.0))),
    );
    let child = scene.add_child(parent, "child", Some(pose(0.0, 0.0, 90.0, 1.0))).unwrap();
    let grandchild = scene
        .add_child(child, "grandchild", Some(Transform2d::from(Vector2::new(1.0, 0.0))))
        .unwrap();

    let world = scene.world_transform(child).unwrap();
    let expected = scene.transform(parent).unwrap().get_transform()
        * scene.transform(child).unwrap().get_transform();
    assert_matrix_close(world, expected);

    // local +x of the child turns to +y, which the parent does not stretch
    let mapped = world * Vector4::new(1.0, 0.0, 0.0, 1.0);
    assert_vec_close(Vector2::new(mapped.x, mapped.y), Vector2::new(0.0, 1.0));
    assert_vec_close(scene.world_pos(grandchild).unwrap(), Vector2::new(0.0, 1.0));

    let drawn = scene.drawables().into_iter().find(|d| d.node == child).unwrap();
    assert_matrix_close(drawn.transform, expected);
}

#[test]
fn world_pos_setter_inverts_a_sheared_parent() {
    let mut scene = Scene::new();
    let root = scene.add_node(
        "root",
        Some(Transform2d::new(Vector2::new(1.0, 1.0), 0.0, Vector2::new(3.0, 1.0))),
    );
    let mid = scene.add_child(root, "mid", Some(pose(0.0, 0.0, 45.0, 1.0))).unwrap();
    let leaf = scene.add_child(mid, "leaf", Some(Transform2d::default())).unwrap();

    scene.set_world_pos(leaf, Vector2::new(-2.0, 5.0));

    assert_vec_close(scene.world_pos(leaf).unwrap(), Vector2::new(-2.0, 5.0));
}

#[test]
fn prevent_inherit_pos_drops_only_the_ancestry_position() {
    let mut scene = Scene::new();
    let root = scene.add_node("root", Some(pose(1.0, 2.0, 30.0, 2.0)));
    let mid = scene.add_child(root, "mid", Some(pose(3.0, 0.0, 45.0, 0.5))).unwrap();
    let child = scene.add_child(mid, "child", Some(pose(1.0, 1.0, 10.0, 1.0))).unwrap();
    let before_rot = scene.world_rot(child).unwrap();

    scene.transform_mut(mid).unwrap().prevent_inherit_pos = true;

    assert_vec_close(scene.world_pos(mid).unwrap(), Vector2::new(3.0, 0.0));
    let mid_world = Pose2d {
        position: Vector2::new(3.0, 0.0),
        rotation: 75.0,
        scale: Vector2::new(1.0, 1.0),
        z: 0.0,
    };
    assert_vec_close(scene.world_pos(child).unwrap(), mid_world.apply(Vector2::new(1.0, 1.0)));
    assert_degrees_close(scene.world_rot(child).unwrap(), before_rot);
}

#[test]
fn prevent_inherit_rot_and_scl_on_middle_node() {
    let mut scene = Scene::new();
    let root = scene.add_node("root", Some(pose(0.0, 0.0, 30.0, 2.0)));
    let mid = scene.add_child(root, "mid", Some(pose(0.0, 0.0, 45.0, 0.5))).unwrap();
    let child = scene.add_child(mid, "child", Some(pose(0.0, 0.0, 10.0, 3.0))).unwrap();

    {
        let t = scene.transform_mut(mid).unwrap();
        t.prevent_inherit_rot = true;
        t.prevent_inherit_scl = true;
    }

    assert_degrees_close(scene.world_rot(child).unwrap(), 55.0);
    assert_vec_close(scene.world_scl(child).unwrap(), Vector2::new(1.5, 1.5));
}

#[test]
fn non_spatial_ancestors_are_skipped() {
    let mut scene = Scene::new();
    let root = spatial_root(&mut scene, "root", 5.0, 0.0);
    let group = scene.add_child(root, "group", None).unwrap();
    let child = scene.add_child(group, "child", Some(Transform2d::from(Vector2::new(1.0, 0.0)))).unwrap();

    assert!(scene.world_pos(group).is_none());
    assert_vec_close(scene.world_pos(child).unwrap(), Vector2::new(6.0, 0.0));
}

#[test]
fn world_setters_solve_local_values() {
    let mut scene = Scene::new();
    let root = scene.add_node("root", Some(pose(4.0, -1.0, 90.0, 2.0)));
    let child = scene.add_child(root, "child", Some(Transform2d::default())).unwrap();

    scene.set_world_pos(child, Vector2::new(10.0, 10.0));
    scene.set_world_rot(child, 10.0);
    scene.set_world_scl(child, Vector2::new(1.0, 4.0));

    assert_vec_close(scene.world_pos(child).unwrap(), Vector2::new(10.0, 10.0));
    assert_degrees_close(scene.world_rot(child).unwrap(), 10.0);
    assert_vec_close(scene.world_scl(child).unwrap(), Vector2::new(1.0, 4.0));
    assert_degrees_close(scene.transform(child).unwrap().get_rot(), 280.0);
}

#[test]
fn world_setter_with_prevent_inherit_writes_verbatim() {
    let mut scene = Scene::new();
    let root = spatial_root(&mut scene, "root", 5.0, 5.0);
    let child = scene.add_child(root, "child", Some(Transform2d::default())).unwrap();
    scene.transform_mut(child).unwrap().prevent_inherit_pos = true;

    scene.set_world_pos(child, Vector2::new(1.0, 2.0));
    assert_eq!(scene.transform(child).unwrap().get_pos(), Vector2::new(1.0, 2.0));
    assert_vec_close(scene.world_pos(child).unwrap(), Vector2::new(1.0, 2.0));
}

#[test]
fn set_world_transform_reproduces_target() {
    let mut scene = Scene::new();
    let root = scene.add_node("root", Some(pose(2.0, 3.0, 60.0, 0.5).with_layer(1)));
    let child = scene.add_child(root, "child", Some(Transform2d::default())).unwrap();
    let target = pose(-4.0, 7.0, 200.0, 3.0).with_layer(3).get_transform();

    let result = scene.set_world_transform(child, &target).unwrap();

    assert_matrix_close(result, target);
    assert_eq!(scene.transform(child).unwrap().get_layer(), 2);
}

#[test]
fn transform_by_applies_on_top_of_local() {
    let mut scene = Scene::new();
    let node = scene.add_node("node", Some(pose(1.0, 0.0, 90.0, 1.0)));
    scene.transform_by(node, &Matrix4::from_translation(Vector3::new(0.0, 2.0, 0.0)));

    let t = scene.transform(node).unwrap();
    assert_vec_close(t.get_pos(), Vector2::new(1.0, 2.0));
    assert_degrees_close(t.get_rot(), 90.0);
}

#[test]
fn sibling_names_are_unique_per_parent() {
    let mut scene = Scene::new();
    let a = scene.add_node("a", None);
    let b = scene.add_node("b", None);

    let first = scene.add_child(a, "item", None).unwrap();
    assert!(scene.add_child(a, "item", None).is_err());
    assert!(scene.add_child(b, "item", None).is_ok());

    assert_eq!(scene.child(a, "item"), Some(first));
    assert_eq!(scene.child(a, "missing"), None);
    assert_eq!(scene.node(a).unwrap().children(), &[first]);
}

#[test]
fn removing_a_node_orphans_its_children() {
    let mut scene = Scene::new();
    let root = scene.add_node("root", None);
    let mid = scene.add_child(root, "mid", None).unwrap();
    let leaf = scene.add_child(mid, "leaf", None).unwrap();

    let removed = scene.remove_node(mid).unwrap();

    assert_eq!(removed.name(), "mid");
    assert!(scene.node(root).unwrap().children().is_empty());
    assert_eq!(scene.node(leaf).unwrap().parent(), None);
    assert!(scene.roots().contains(&leaf));
    assert!(scene.remove_node(mid).is_none());
}

#[test]
fn removing_a_subtree_destroys_descendants() {
    let mut scene = Scene::new();
    let root = scene.add_node("root", None);
    let mid = scene.add_child(root, "mid", None).unwrap();
    let leaf = scene.add_child(mid, "leaf", None).unwrap();

    let removed = scene.remove_subtree(mid);

    assert_eq!(removed.len(), 2);
    assert!(!scene.contains(mid) && !scene.contains(leaf));
    assert_eq!(scene.len(), 1);
    assert!(scene.node(root).unwrap().children().is_empty());
}

#[test]
fn attach_moves_nodes_and_rejects_cycles() {
    let mut scene = Scene::new();
    let a = scene.add_node("a", None);
    let b = scene.add_child(a, "b", None).unwrap();
    let c = scene.add_node("c", None);

    scene.attach(c, b).unwrap();
    assert_eq!(scene.node(b).unwrap().parent(), Some(c));
    assert!(scene.node(a).unwrap().children().is_empty());

    assert!(scene.attach(b, c).is_err());
    assert!(scene.attach(b, b).is_err());
}

#[test]
fn drawables_are_sorted_by_layer() {
    let mut scene = Scene::new();
    let top = scene.add_node("top", Some(Transform2d::default().with_layer(5)));
    let bottom = scene.add_node("bottom", Some(Transform2d::default().with_layer(-1)));
    scene.add_node("group", None);

    let drawables = scene.drawables();

    let order: Vec<_> = drawables.iter().map(|d| d.node).collect();
    assert_eq!(order, vec![bottom, top]);
    assert_close(drawables[1].transform.w.z, 5.0);
}
