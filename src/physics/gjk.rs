//! GJK intersection test and EPA penetration depth in 2D.
//!
//! Both work on the Minkowski difference `A - B`, sampled through the
//! shapes' support functions: the shapes overlap iff the difference
//! contains the origin.

use cgmath::{InnerSpace, Vector2, Vector3, Zero};

use crate::physics::shape::Support;

/// Up to three support points, most recent first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Simplex {
    points: [Vector2<f32>; 3],
    len: usize,
}

impl Simplex {
    pub fn new() -> Self {
        Self {
            points: [Vector2::zero(); 3],
            len: 0,
        }
    }

    /// Inserts `point` at the front, dropping the oldest point when full.
    pub fn push_front(&mut self, point: Vector2<f32>) {
        self.points = [point, self.points[0], self.points[1]];
        self.len = (self.len + 1).min(3);
    }

    pub fn points(&self) -> &[Vector2<f32>] {
        &self.points[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn set(&mut self, points: &[Vector2<f32>]) {
        for (slot, &p) in self.points.iter_mut().zip(points) {
            *slot = p;
        }
        self.len = points.len();
    }
}

impl Default for Simplex {
    fn default() -> Self {
        Self::new()
    }
}

/// Support point of `A - B` along `direction`.
pub fn support<A, B>(a: &A, b: &B, direction: Vector2<f32>) -> Vector2<f32>
where
    A: Support + ?Sized,
    B: Support + ?Sized,
{
    a.furthest_point(direction) - b.furthest_point(-direction)
}

/// Runs GJK. Returns the triangle enclosing the origin if the shapes overlap.
///
/// Touching shapes do not count as overlapping.
pub fn intersect<A, B>(a: &A, b: &B, max_iterations: usize) -> Option<Simplex>
where
    A: Support + ?Sized,
    B: Support + ?Sized,
{
    let first = support(a, b, Vector2::unit_x());
    let mut simplex = Simplex::new();
    simplex.push_front(first);
    let mut direction = -first;

    for _ in 0..max_iterations {
        if direction.magnitude2() == 0.0 {
            // the origin sits on the simplex boundary
            return None;
        }
        let point = support(a, b, direction);
        if point.dot(direction) <= 0.0 {
            return None;
        }
        simplex.push_front(point);
        if next_simplex(&mut simplex, &mut direction) {
            return Some(simplex);
        }
    }
    log::warn!("GJK gave up after {} iterations", max_iterations);
    None
}

fn next_simplex(simplex: &mut Simplex, direction: &mut Vector2<f32>) -> bool {
    match simplex.len() {
        2 => line(simplex, direction),
        3 => triangle(simplex, direction),
        _ => false,
    }
}

fn line(simplex: &mut Simplex, direction: &mut Vector2<f32>) -> bool {
    let a = simplex.points[0];
    let b = simplex.points[1];
    let ab = b - a;
    let ao = -a;

    if ab.dot(ao) > 0.0 {
        *direction = triple_product(ab, ao, ab);
        if direction.magnitude2() == 0.0 {
            // origin on the line through a and b, either normal will do
            *direction = Vector2::new(-ab.y, ab.x);
        }
    } else {
        simplex.set(&[a]);
        *direction = ao;
    }
    false
}

fn triangle(simplex: &mut Simplex, direction: &mut Vector2<f32>) -> bool {
    let [a, b, c] = simplex.points;
    let ab = b - a;
    let ac = c - a;
    let ao = -a;
    let abc = ab.extend(0.0).cross(ac.extend(0.0));

    if abc.cross(ac.extend(0.0)).truncate().dot(ao) > 0.0 {
        if ac.dot(ao) > 0.0 {
            simplex.set(&[a, c]);
            *direction = triple_product(ac, ao, ac);
            false
        } else {
            simplex.set(&[a, b]);
            line(simplex, direction)
        }
    } else if ab.extend(0.0).cross(abc).truncate().dot(ao) > 0.0 {
        simplex.set(&[a, b]);
        line(simplex, direction)
    } else {
        true
    }
}

/// `(a × b) × c` with the 2D vectors embedded at z = 0.
fn triple_product(a: Vector2<f32>, b: Vector2<f32>, c: Vector2<f32>) -> Vector2<f32> {
    a.extend(0.0).cross(b.extend(0.0)).cross(c.extend(0.0)).truncate()
}

/// Runs EPA on the simplex GJK returned and gives the smallest vector that,
/// added to B's position, separates the shapes (`epsilon` included as padding).
pub fn penetration<A, B>(
    a: &A,
    b: &B,
    simplex: &Simplex,
    epsilon: f32,
    max_iterations: usize,
) -> Option<Vector2<f32>>
where
    A: Support + ?Sized,
    B: Support + ?Sized,
{
    let mut polytope: Vec<Vector2<f32>> = simplex.points().to_vec();
    if polytope.len() < 3 {
        return None;
    }

    let mut best = None;
    for _ in 0..max_iterations {
        let (index, normal, distance) = closest_edge(&polytope)?;
        best = Some(normal * (distance + epsilon));

        let point = support(a, b, normal);
        if normal.dot(point) - distance <= epsilon {
            return best;
        }
        polytope.insert(index, point);
    }
    log::warn!("EPA gave up after {} iterations", max_iterations);
    best
}

/// Edge of the polytope closest to the origin as (insert index, outward
/// normal, distance).
fn closest_edge(polytope: &[Vector2<f32>]) -> Option<(usize, Vector2<f32>, f32)> {
    let mut closest: Option<(usize, Vector2<f32>, f32)> = None;
    for i in 0..polytope.len() {
        let j = (i + 1) % polytope.len();
        let edge = polytope[j] - polytope[i];
        if edge.magnitude2() <= f32::EPSILON * f32::EPSILON {
            continue;
        }
        let mut normal = Vector2::new(edge.y, -edge.x).normalize();
        let mut distance = normal.dot(polytope[i]);
        if distance < 0.0 {
            distance = -distance;
            normal = -normal;
        }
        if closest.is_none_or(|(_, _, d)| distance < d) {
            closest = Some((j, normal, distance));
        }
    }
    closest
}
