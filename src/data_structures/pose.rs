//! 2D pose data for scene nodes.
//!
//! A pose is a position, a rotation (degrees, counter-clockwise) and a
//! per-axis scale, plus the node's depth which is carried as the z component
//! of the translation when the pose is turned into a matrix.

use cgmath::{Deg, ElementWise, InnerSpace, Matrix2, Matrix4, Vector2, Vector3};

/// Position, rotation and scale of a 2D node.
///
/// Poses are not composed directly: a non-uniform parent scale under a
/// rotated child shears, which a pose cannot hold. Compose the matrices from
/// [`to_matrix`](Self::to_matrix) and decompose the result instead.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose2d {
    pub position: Vector2<f32>,
    /// Degrees, kept in `[0, 360)`.
    pub rotation: f32,
    pub scale: Vector2<f32>,
    /// Depth (the layer) used as z translation.
    pub z: f32,
}

impl Pose2d {
    /// Identity pose (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: Vector2::new(0.0, 0.0),
            rotation: 0.0,
            scale: Vector2::new(1.0, 1.0),
            z: 0.0,
        }
    }

    /// `translate(position, z) * rotate_z(rotation) * scale(scale.x, scale.y, 1)`
    pub fn to_matrix(&self) -> Matrix4<f32> {
        let scale = coerce_scale(self.scale);
        Matrix4::from_translation(Vector3::new(self.position.x, self.position.y, self.z))
            * Matrix4::from_angle_z(Deg(self.rotation))
            * Matrix4::from_nonuniform_scale(scale.x, scale.y, 1.0)
    }

    /// Decomposes an affine matrix back into translation, rotation and
    /// per-axis scale.
    ///
    /// Scale signs are not recoverable (lengths of the basis columns are
    /// used), rotation is read from the first basis column.
    pub fn from_matrix(m: &Matrix4<f32>) -> Self {
        let x_axis = Vector2::new(m.x.x, m.x.y);
        let y_axis = Vector2::new(m.y.x, m.y.y);
        let rotation = if x_axis.magnitude2() > 0.0 {
            normalize_degrees(x_axis.y.atan2(x_axis.x).to_degrees())
        } else {
            0.0
        };

        Self {
            position: Vector2::new(m.w.x, m.w.y),
            rotation,
            scale: coerce_scale(Vector2::new(x_axis.magnitude(), y_axis.magnitude())),
            z: m.w.z,
        }
    }

    /// Maps a point from this pose's local space into the space the pose lives in.
    pub fn apply(&self, local: Vector2<f32>) -> Vector2<f32> {
        self.position + rotate_vector(self.rotation, coerce_scale(self.scale).mul_element_wise(local))
    }

    /// Inverse of [`apply`](Self::apply).
    pub fn unapply(&self, point: Vector2<f32>) -> Vector2<f32> {
        rotate_vector(-self.rotation, point - self.position).div_element_wise(coerce_scale(self.scale))
    }
}

impl Default for Pose2d {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vector2<f32>> for Pose2d {
    fn from(position: Vector2<f32>) -> Self {
        Pose2d {
            position,
            ..Default::default()
        }
    }
}

/// Wraps an angle in degrees into `[0, 360)`.
pub fn normalize_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid rounds up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Zero scale components would make the transform non-invertible, they become 1.
pub fn coerce_scale(scale: Vector2<f32>) -> Vector2<f32> {
    Vector2::new(
        if scale.x == 0.0 { 1.0 } else { scale.x },
        if scale.y == 0.0 { 1.0 } else { scale.y },
    )
}

pub(crate) fn rotate_vector(degrees: f32, v: Vector2<f32>) -> Vector2<f32> {
    Matrix2::from_angle(Deg(degrees)) * v
}
