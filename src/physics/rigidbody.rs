//! Rigid body integration.
//!
//! A [`RigidBody2d`] moves one scene node. Forces and torques accumulate
//! between steps and are consumed by [`RigidBody2d::update`], which resets
//! them afterwards: a force that should keep acting has to be applied again
//! every step.

use cgmath::{InnerSpace, Vector2, Zero};

use crate::{
    config::PhysicsConfig,
    data_structures::scene_graph::{NodeId, Scene},
    physics::{ColliderId, shape::Shape},
};

#[derive(Clone, Debug, PartialEq)]
pub struct RigidBody2d {
    node: NodeId,
    /// Container node holding the body's components below `node`.
    body_node: Option<NodeId>,
    mass: f32,
    moment_of_inertia: f32,
    pub velocity: Vector2<f32>,
    /// Degrees per second, counter-clockwise.
    pub angular_velocity: f32,
    net_force: Vector2<f32>,
    net_torque: f32,
    collider: Option<ColliderId>,
}

impl RigidBody2d {
    /// A body of `mass` driving `node`. Non-positive masses become 1.
    pub fn new(node: NodeId, mass: f32) -> Self {
        let mass = if mass > 0.0 { mass } else { 1.0 };
        Self {
            node,
            body_node: None,
            mass,
            moment_of_inertia: mass,
            velocity: Vector2::zero(),
            angular_velocity: 0.0,
            net_force: Vector2::zero(),
            net_torque: 0.0,
            collider: None,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn body_node(&self) -> Option<NodeId> {
        self.body_node
    }

    pub(crate) fn set_body_node(&mut self, node: NodeId) {
        self.body_node = Some(node);
    }

    pub fn collider(&self) -> Option<ColliderId> {
        self.collider
    }

    pub(crate) fn set_collider(&mut self, collider: Option<ColliderId>) {
        self.collider = collider;
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn moment_of_inertia(&self) -> f32 {
        self.moment_of_inertia
    }

    /// Changes the mass and recomputes the moment of inertia from `shape`.
    /// Non-positive masses are ignored.
    pub fn set_mass(&mut self, mass: f32, shape: Option<&Shape>) {
        if mass <= 0.0 {
            log::warn!("ignoring non-positive mass {} for body on {}", mass, self.node);
            return;
        }
        self.mass = mass;
        self.moment_of_inertia = match shape {
            Some(shape) => shape.moment_of_inertia(mass),
            None => mass,
        };
    }

    pub fn net_force(&self) -> Vector2<f32> {
        self.net_force
    }

    pub fn net_torque(&self) -> f32 {
        self.net_torque
    }

    /// Momentum `m·v`.
    pub fn momentum(&self) -> Vector2<f32> {
        self.velocity * self.mass
    }

    /// Applies `force` at `offset` from the centre of mass, `θ` being the
    /// angle between the two.
    ///
    /// The body is pushed by `force·cos θ`, keeping the force's direction, and
    /// turned by the signed `|F|·|r|·sin θ`. A zero offset is purely linear.
    pub fn apply_force(&mut self, force: Vector2<f32>, offset: Vector2<f32>) {
        let lengths = force.magnitude() * offset.magnitude();
        if lengths == 0.0 {
            self.net_force += force;
            return;
        }
        let cos = force.dot(offset) / lengths;
        self.net_force += force * cos;
        self.net_torque += offset.x * force.y - offset.y * force.x;
    }

    pub fn apply_torque(&mut self, torque: f32) {
        self.net_torque += torque;
    }

    /// Instant velocity change `impulse / mass`.
    pub fn apply_impulse(&mut self, impulse: Vector2<f32>) {
        self.velocity += impulse / self.mass;
    }

    /// Integrates one step of `dt` seconds and moves the node.
    pub fn update(&mut self, dt: f32, scene: &mut Scene, config: &PhysicsConfig) {
        self.velocity += self.net_force / self.mass * dt;
        let angular_acceleration = (self.net_torque / self.moment_of_inertia).to_degrees();
        self.angular_velocity += angular_acceleration * dt;

        if self.velocity.x.abs() < config.linear_deadzone {
            self.velocity.x = 0.0;
        }
        if self.velocity.y.abs() < config.linear_deadzone {
            self.velocity.y = 0.0;
        }
        if self.angular_velocity.abs() < config.angular_deadzone {
            self.angular_velocity = 0.0;
        }

        match scene.transform_mut(self.node) {
            Some(transform) => {
                let position = transform.get_pos() + self.velocity * dt;
                transform
                    .set_pos(position)
                    .rotate(self.angular_velocity * dt);
            }
            None => log::debug!("rigid body node {} is gone or not spatial", self.node),
        }

        self.net_force = Vector2::zero();
        self.net_torque = 0.0;
    }

    /// Moves the node by `delta` in its local space.
    pub fn displace(&self, delta: Vector2<f32>, scene: &mut Scene) {
        if let Some(transform) = scene.transform_mut(self.node) {
            let position = transform.get_pos() + delta;
            transform.set_pos(position);
        }
    }

    /// Moves the node by `delta` in world space.
    pub fn displace_world(&self, delta: Vector2<f32>, scene: &mut Scene) {
        if let Some(world) = scene.world_pos(self.node) {
            scene.set_world_pos(self.node, world + delta);
        }
    }

    /// Puts the node at `dest` in world space.
    pub fn teleport_world(&self, dest: Vector2<f32>, scene: &mut Scene) {
        scene.set_world_pos(self.node, dest);
    }
}

/// Impulse for body `b` (apply the negation to `a`) after a contact whose
/// resolution vector points from `a` towards `b`.
///
/// `(1 + e)·m1·m2/(m1 + m2)` times the approaching normal speed. Separating
/// pairs get none.
pub fn collision_impulse(
    a: &RigidBody2d,
    b: &RigidBody2d,
    resolution: Vector2<f32>,
    elasticity: f32,
) -> Option<Vector2<f32>> {
    if resolution.magnitude2() == 0.0 {
        return None;
    }
    let normal = resolution.normalize();
    let approach = (b.velocity - a.velocity).dot(normal);
    if approach >= 0.0 {
        return None;
    }
    let reduced_mass = a.mass * b.mass / (a.mass + b.mass);
    Some(normal * (-(1.0 + elasticity) * reduced_mass * approach))
}

/// Velocity response of a body hitting something immovable. `normal` points
/// from the obstacle towards the body.
pub fn bounce(body: &mut RigidBody2d, normal: Vector2<f32>, elasticity: f32) {
    if normal.magnitude2() == 0.0 {
        return;
    }
    let normal = normal.normalize();
    let approach = body.velocity.dot(normal);
    if approach < 0.0 {
        body.velocity -= normal * ((1.0 + elasticity) * approach);
    }
}
