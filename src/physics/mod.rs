//! Collision detection and rigid body simulation.
//!
//! [`Physics`] owns every live collider and rigid body and hands out stable
//! handles for them. Once per step [`Physics::update_all`] integrates the
//! bodies and [`Physics::check_all`] tests every collider pair, pushes
//! overlapping pairs apart and exchanges impulses.
//!
//! - `shape` holds collider shapes, support functions and bounding boxes
//! - `gjk` holds the GJK intersection test and EPA penetration depth
//! - `rigidbody` holds the body integrator and contact response helpers

pub mod gjk;
pub mod rigidbody;
pub mod shape;

use std::{collections::BTreeMap, fmt};

use anyhow::Context;
use cgmath::Vector2;

use crate::{
    config::PhysicsConfig,
    data_structures::scene_graph::{NodeId, Scene, Transform2d},
    physics::{
        rigidbody::{RigidBody2d, bounce, collision_impulse},
        shape::{BoundingBox, Shape, WorldShape},
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColliderId(u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(u32);

impl fmt::Display for ColliderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "collider #{}", self.0)
    }
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "body #{}", self.0)
    }
}

/// A shape attached to a scene node.
#[derive(Clone, Debug)]
pub struct Collider {
    node: NodeId,
    shape: Shape,
    elasticity: f32,
    body: Option<BodyId>,
    world: Option<WorldShape>,
    bounding_box: Option<BoundingBox>,
}

impl Collider {
    pub fn new(node: NodeId, shape: Shape) -> Self {
        Self {
            node,
            shape,
            elasticity: 1.0,
            body: None,
            world: None,
            bounding_box: None,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn body(&self) -> Option<BodyId> {
        self.body
    }

    pub fn elasticity(&self) -> f32 {
        self.elasticity
    }

    /// Clamped into `[0, 1]`.
    pub fn set_elasticity(&mut self, elasticity: f32) -> &mut Self {
        self.elasticity = elasticity.clamp(0.0, 1.0);
        self
    }

    /// World-space box from the last refresh.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.bounding_box
    }

    /// The shape placed with the node's current world pose.
    pub fn world_shape(&self, scene: &Scene) -> Option<WorldShape> {
        scene
            .world_pose(self.node)
            .map(|pose| self.shape.to_world(&pose))
    }

    fn refresh(&mut self, scene: &Scene) {
        self.world = self.world_shape(scene);
        self.bounding_box = self.world.as_ref().map(WorldShape::bounding_box);
    }

    fn translate(&mut self, delta: Vector2<f32>) {
        if let Some(world) = &mut self.world {
            world.translate(delta);
            self.bounding_box = Some(world.bounding_box());
        }
    }
}

/// One resolved overlap.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    pub a: ColliderId,
    pub b: ColliderId,
    /// Moving `b` by this vector (or `a` by its negation) separates the pair.
    pub resolution: Vector2<f32>,
}

/// Registry of live colliders and rigid bodies.
#[derive(Debug, Default)]
pub struct Physics {
    colliders: BTreeMap<ColliderId, Collider>,
    bodies: BTreeMap<BodyId, RigidBody2d>,
    next_id: u32,
    config: PhysicsConfig,
}

impl Physics {
    pub fn new(config: PhysicsConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Registers a static collider on `node`.
    pub fn add_collider(&mut self, node: NodeId, shape: Shape) -> ColliderId {
        let id = ColliderId(self.alloc());
        self.colliders.insert(id, Collider::new(node, shape));
        id
    }

    /// Attaches a rigid body to `node`.
    ///
    /// The body lives in a non-spatial `rigidbody` child of `node`; with a
    /// shape, a spatial `collider` node is added below it. Since non-spatial
    /// nodes are skipped during composition, the collider follows `node`.
    pub fn add_body(
        &mut self,
        scene: &mut Scene,
        node: NodeId,
        mass: f32,
        shape: Option<Shape>,
    ) -> anyhow::Result<BodyId> {
        let body_node = scene
            .add_child(node, "rigidbody", None)
            .with_context(|| format!("failed to attach a rigid body to {}", node))?;
        let mut body = RigidBody2d::new(node, mass);
        body.set_body_node(body_node);
        let id = BodyId(self.alloc());

        if let Some(shape) = shape {
            let collider_node = scene.add_child(body_node, "collider", Some(Transform2d::default()))?;
            body.set_mass(body.mass(), Some(&shape));
            let collider = ColliderId(self.alloc());
            let mut c = Collider::new(collider_node, shape);
            c.body = Some(id);
            self.colliders.insert(collider, c);
            body.set_collider(Some(collider));
        }
        self.bodies.insert(id, body);
        Ok(id)
    }

    /// Removes a collider. A body using it keeps moving without collisions.
    pub fn remove_collider(&mut self, id: ColliderId) -> Option<Collider> {
        let collider = self.colliders.remove(&id)?;
        if let Some(body) = collider.body.and_then(|b| self.bodies.get_mut(&b)) {
            body.set_collider(None);
        }
        Some(collider)
    }

    /// Removes a body, its collider and its component nodes.
    pub fn remove_body(&mut self, scene: &mut Scene, id: BodyId) -> Option<RigidBody2d> {
        let body = self.bodies.remove(&id)?;
        if let Some(collider) = body.collider() {
            self.colliders.remove(&collider);
        }
        if let Some(body_node) = body.body_node() {
            scene.remove_subtree(body_node);
        }
        Some(body)
    }

    pub fn collider(&self, id: ColliderId) -> Option<&Collider> {
        self.colliders.get(&id)
    }

    pub fn collider_mut(&mut self, id: ColliderId) -> Option<&mut Collider> {
        self.colliders.get_mut(&id)
    }

    pub fn colliders(&self) -> impl Iterator<Item = (ColliderId, &Collider)> {
        self.colliders.iter().map(|(&id, c)| (id, c))
    }

    pub fn body(&self, id: BodyId) -> Option<&RigidBody2d> {
        self.bodies.get(&id)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut RigidBody2d> {
        self.bodies.get_mut(&id)
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyId, &RigidBody2d)> {
        self.bodies.iter().map(|(&id, b)| (id, b))
    }

    /// Total momentum of every body.
    pub fn momentum(&self) -> Vector2<f32> {
        self.bodies
            .values()
            .fold(Vector2::new(0.0, 0.0), |acc, b| acc + b.momentum())
    }

    /// Integrates every body by `dt` seconds.
    pub fn update_all(&mut self, scene: &mut Scene, dt: f32) {
        for body in self.bodies.values_mut() {
            body.update(dt, scene, &self.config);
        }
    }

    /// Tests the pair with GJK and returns EPA's resolution vector on overlap.
    pub fn collides(&self, scene: &Scene, a: ColliderId, b: ColliderId) -> Option<Vector2<f32>> {
        let shape_a = self.colliders.get(&a)?.world_shape(scene)?;
        let shape_b = self.colliders.get(&b)?.world_shape(scene)?;
        self.resolve(&shape_a, &shape_b)
    }

    fn resolve(&self, a: &WorldShape, b: &WorldShape) -> Option<Vector2<f32>> {
        let simplex = gjk::intersect(a, b, self.config.max_iterations)?;
        gjk::penetration(a, b, &simplex, self.config.epsilon, self.config.max_iterations)
    }

    /// Tests every collider pair once, separates overlapping pairs and
    /// exchanges impulses between their bodies.
    ///
    /// Both bodies dynamic: each moves by half the resolution vector. One
    /// dynamic: it moves by the whole vector and bounces. Static pairs only
    /// report the contact.
    pub fn check_all(&mut self, scene: &mut Scene) -> Vec<Contact> {
        for collider in self.colliders.values_mut() {
            collider.refresh(scene);
        }

        let ids: Vec<ColliderId> = self.colliders.keys().copied().collect();
        let mut contacts = Vec::new();
        for (i, &a) in ids.iter().enumerate() {
            for &b in &ids[i + 1..] {
                let Some(resolution) = self.test_pair(a, b) else {
                    continue;
                };
                self.separate(scene, a, b, resolution);
                contacts.push(Contact { a, b, resolution });
            }
        }
        contacts
    }

    fn test_pair(&self, a: ColliderId, b: ColliderId) -> Option<Vector2<f32>> {
        let ca = self.colliders.get(&a)?;
        let cb = self.colliders.get(&b)?;
        if !ca.bounding_box?.intersects(&cb.bounding_box?) {
            return None;
        }
        self.resolve(ca.world.as_ref()?, cb.world.as_ref()?)
    }

    fn separate(&mut self, scene: &mut Scene, a: ColliderId, b: ColliderId, resolution: Vector2<f32>) {
        let (Some(ca), Some(cb)) = (self.colliders.get(&a), self.colliders.get(&b)) else {
            return;
        };
        let elasticity = ca.elasticity.max(cb.elasticity);
        let body_a = ca.body.filter(|id| self.bodies.contains_key(id));
        let body_b = cb.body.filter(|id| self.bodies.contains_key(id));

        let (shift_a, shift_b) = match (body_a, body_b) {
            (Some(ba), Some(bb)) => {
                self.collide(ba, bb, resolution, elasticity);
                (-resolution / 2.0, resolution / 2.0)
            }
            (Some(ba), None) => {
                if let Some(body) = self.bodies.get_mut(&ba) {
                    bounce(body, -resolution, elasticity);
                }
                (-resolution, Vector2::new(0.0, 0.0))
            }
            (None, Some(bb)) => {
                if let Some(body) = self.bodies.get_mut(&bb) {
                    bounce(body, resolution, elasticity);
                }
                (Vector2::new(0.0, 0.0), resolution)
            }
            (None, None) => return,
        };

        for (collider, body, shift) in [(a, body_a, shift_a), (b, body_b, shift_b)] {
            let Some(body) = body.and_then(|id| self.bodies.get(&id)) else {
                continue;
            };
            body.displace_world(shift, scene);
            if let Some(c) = self.colliders.get_mut(&collider) {
                c.translate(shift);
            }
        }
    }

    /// Exchanges the contact impulse between two bodies. `resolution` points
    /// from `a` towards `b`. Returns whether an impulse was applied.
    pub fn collide(&mut self, a: BodyId, b: BodyId, resolution: Vector2<f32>, elasticity: f32) -> bool {
        let (Some(body_a), Some(body_b)) = (self.bodies.get(&a), self.bodies.get(&b)) else {
            log::debug!("collide called with a stale body handle");
            return false;
        };
        let Some(impulse) = collision_impulse(body_a, body_b, resolution, elasticity) else {
            return false;
        };
        if let Some(body) = self.bodies.get_mut(&a) {
            body.apply_impulse(-impulse);
        }
        if let Some(body) = self.bodies.get_mut(&b) {
            body.apply_impulse(impulse);
        }
        true
    }

    fn alloc(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}
