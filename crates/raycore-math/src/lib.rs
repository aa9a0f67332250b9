#![warn(missing_docs)]

//! Math types for the raycore intersection kernel.
//!
//! Thin wrappers around nalgebra providing single-precision types for
//! ray traversal: points, vectors, quaternions, affine transforms and
//! time-varying (motion blur) transforms.

mod motion;

pub use motion::{DecomposedTransform, MotionTransform};

use nalgebra::{Matrix4, UnitQuaternion, Vector3, Vector4};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f32>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f32>;

/// A 4-component vector, used for packed table rows.
pub type Vec4 = Vector4<f32>;

/// A unit quaternion rotation.
pub type Quat = UnitQuaternion<f32>;

/// Affine transform stored as a homogeneous 4x4 `f32` matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Homogeneous matrix; the last row is `[0, 0, 0, 1]`.
    pub matrix: Matrix4<f32>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f32, dy: f32, dz: f32) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = dx;
        m[(1, 3)] = dy;
        m[(2, 3)] = dz;
        Self { matrix: m }
    }

    /// Per-axis scale.
    pub fn scale(sx: f32, sy: f32, sz: f32) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 0)] = sx;
        m[(1, 1)] = sy;
        m[(2, 2)] = sz;
        Self { matrix: m }
    }

    /// Rotation by a unit quaternion.
    pub fn rotation(q: &Quat) -> Self {
        Self {
            matrix: q.to_homogeneous(),
        }
    }

    /// Rotation by `angle` radians about `axis` (need not be unit length).
    pub fn rotation_about_axis(axis: &Vec3, angle: f32) -> Self {
        let axis = nalgebra::Unit::new_normalize(*axis);
        Self::rotation(&Quat::from_axis_angle(&axis, angle))
    }

    /// Build a transform from its three basis columns and a translation.
    pub fn from_columns(x: &Vec3, y: &Vec3, z: &Vec3, origin: &Point3) -> Self {
        let mut m = Matrix4::identity();
        for row in 0..3 {
            m[(row, 0)] = x[row];
            m[(row, 1)] = y[row];
            m[(row, 2)] = z[row];
            m[(row, 3)] = origin[row];
        }
        Self { matrix: m }
    }

    /// Matrix product `self * other`.
    ///
    /// Applying the result is equivalent to applying `other` first and
    /// `self` second.
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point.
    #[inline]
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let m = &self.matrix;
        Point3::new(
            m[(0, 0)] * p.x + m[(0, 1)] * p.y + m[(0, 2)] * p.z + m[(0, 3)],
            m[(1, 0)] * p.x + m[(1, 1)] * p.y + m[(1, 2)] * p.z + m[(1, 3)],
            m[(2, 0)] * p.x + m[(2, 1)] * p.y + m[(2, 2)] * p.z + m[(2, 3)],
        )
    }

    /// Transform a direction vector (ignores translation).
    #[inline]
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        let m = &self.matrix;
        Vec3::new(
            m[(0, 0)] * v.x + m[(0, 1)] * v.y + m[(0, 2)] * v.z,
            m[(1, 0)] * v.x + m[(1, 1)] * v.y + m[(1, 2)] * v.z,
            m[(2, 0)] * v.x + m[(2, 1)] * v.y + m[(2, 2)] * v.z,
        )
    }

    /// Row `i` of the matrix as a 4-vector.
    pub fn row(&self, i: usize) -> Vec4 {
        Vec4::new(
            self.matrix[(i, 0)],
            self.matrix[(i, 1)],
            self.matrix[(i, 2)],
            self.matrix[(i, 3)],
        )
    }

    /// Inverse, or `None` when the matrix is singular.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Normalize `v`, also returning its original length.
///
/// A zero vector is returned unchanged with length zero.
#[inline]
pub fn normalize_len(v: &Vec3) -> (Vec3, f32) {
    let len = v.norm();
    if len > 0.0 {
        (v / len, len)
    } else {
        (*v, 0.0)
    }
}
