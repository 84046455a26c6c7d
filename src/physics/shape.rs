//! Collision shapes and their support functions.

use cgmath::{InnerSpace, Vector2, Zero};

use crate::data_structures::pose::Pose2d;

/// Anything GJK can query: the point of a convex set furthest along `direction`.
pub trait Support {
    fn furthest_point(&self, direction: Vector2<f32>) -> Vector2<f32>;
}

/// A collider's shape in its node's local space.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    /// Circle around the node origin.
    Circle { radius: f32 },
    /// Convex polygon, vertices in counter-clockwise order.
    Polygon { vertices: Vec<Vector2<f32>> },
}

impl Shape {
    /// Axis aligned rectangle centred on the node origin.
    pub fn rectangle(width: f32, height: f32) -> Self {
        let (hw, hh) = (width / 2.0, height / 2.0);
        Shape::Polygon {
            vertices: vec![
                Vector2::new(-hw, -hh),
                Vector2::new(hw, -hh),
                Vector2::new(hw, hh),
                Vector2::new(-hw, hh),
            ],
        }
    }

    pub fn square(side: f32) -> Self {
        Self::rectangle(side, side)
    }

    /// Places the shape with `pose` (the collider node's world pose).
    pub fn to_world(&self, pose: &Pose2d) -> WorldShape {
        match self {
            Shape::Circle { radius } => WorldShape::Circle {
                center: pose.position,
                radius: radius * pose.scale.x.abs().max(pose.scale.y.abs()),
            },
            Shape::Polygon { vertices } => WorldShape::Polygon {
                vertices: vertices.iter().map(|&v| pose.apply(v)).collect(),
            },
        }
    }

    /// Moment of inertia about the shape's centroid for a uniform body of `mass`.
    ///
    /// Degenerate shapes (no area) fall back to `mass`.
    pub fn moment_of_inertia(&self, mass: f32) -> f32 {
        match self {
            Shape::Circle { radius } if *radius > 0.0 => 0.5 * mass * radius * radius,
            Shape::Polygon { vertices } if vertices.len() >= 3 => {
                let centroid = centroid(vertices);
                let mut numerator = 0.0;
                let mut denominator = 0.0;
                for (i, &p) in vertices.iter().enumerate() {
                    let p = p - centroid;
                    let q = vertices[(i + 1) % vertices.len()] - centroid;
                    let cross = (p.x * q.y - p.y * q.x).abs();
                    numerator += cross * (p.dot(p) + p.dot(q) + q.dot(q));
                    denominator += cross;
                }
                if denominator > f32::EPSILON {
                    mass * numerator / (6.0 * denominator)
                } else {
                    mass
                }
            }
            _ => mass,
        }
    }
}

/// Area centroid of a polygon, vertex average if it has no area.
fn centroid(vertices: &[Vector2<f32>]) -> Vector2<f32> {
    let mut area = 0.0;
    let mut sum = Vector2::zero();
    for (i, &p) in vertices.iter().enumerate() {
        let q = vertices[(i + 1) % vertices.len()];
        let cross = p.x * q.y - q.x * p.y;
        area += cross;
        sum += (p + q) * cross;
    }
    if area.abs() > f32::EPSILON {
        sum / (3.0 * area)
    } else {
        vertices.iter().fold(Vector2::zero(), |acc, &v| acc + v) / vertices.len() as f32
    }
}

/// A shape placed in world space.
#[derive(Clone, Debug, PartialEq)]
pub enum WorldShape {
    Circle { center: Vector2<f32>, radius: f32 },
    Polygon { vertices: Vec<Vector2<f32>> },
}

impl WorldShape {
    pub fn bounding_box(&self) -> BoundingBox {
        match self {
            WorldShape::Circle { center, radius } => BoundingBox {
                lower_left: *center - Vector2::new(*radius, *radius),
                upper_right: *center + Vector2::new(*radius, *radius),
            },
            WorldShape::Polygon { vertices } => BoundingBox::from_points(vertices),
        }
    }

    /// Moves the shape by `delta`.
    pub fn translate(&mut self, delta: Vector2<f32>) {
        match self {
            WorldShape::Circle { center, .. } => *center += delta,
            WorldShape::Polygon { vertices } => vertices.iter_mut().for_each(|v| *v += delta),
        }
    }
}

impl Support for WorldShape {
    fn furthest_point(&self, direction: Vector2<f32>) -> Vector2<f32> {
        match self {
            WorldShape::Circle { center, radius } => {
                if direction.magnitude2() > 0.0 {
                    *center + direction.normalize() * *radius
                } else {
                    *center
                }
            }
            WorldShape::Polygon { vertices } => {
                let mut best = vertices.first().copied().unwrap_or_else(Vector2::zero);
                let mut best_dot = f32::NEG_INFINITY;
                for &v in vertices {
                    let d = v.dot(direction);
                    if d > best_dot {
                        best_dot = d;
                        best = v;
                    }
                }
                best
            }
        }
    }
}

/// Axis aligned world-space box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub lower_left: Vector2<f32>,
    pub upper_right: Vector2<f32>,
}

impl BoundingBox {
    pub fn from_points(points: &[Vector2<f32>]) -> Self {
        let mut lower_left = Vector2::new(f32::INFINITY, f32::INFINITY);
        let mut upper_right = Vector2::new(f32::NEG_INFINITY, f32::NEG_INFINITY);
        for p in points {
            lower_left.x = lower_left.x.min(p.x);
            lower_left.y = lower_left.y.min(p.y);
            upper_right.x = upper_right.x.max(p.x);
            upper_right.y = upper_right.y.max(p.y);
        }
        if points.is_empty() {
            lower_left = Vector2::zero();
            upper_right = Vector2::zero();
        }
        Self {
            lower_left,
            upper_right,
        }
    }

    /// Touching boxes count as intersecting.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.upper_right.x >= other.lower_left.x
            && other.upper_right.x >= self.lower_left.x
            && self.upper_right.y >= other.lower_left.y
            && other.upper_right.y >= self.lower_left.y
    }

    pub fn contains(&self, point: Vector2<f32>) -> bool {
        point.x >= self.lower_left.x
            && point.x <= self.upper_right.x
            && point.y >= self.lower_left.y
            && point.y <= self.upper_right.y
    }
}
