//! Decomposed and time-varying transforms for motion blur.

use nalgebra::{Matrix3, Rotation3, UnitQuaternion};

use crate::{Quat, Transform, Vec3};

/// An affine transform split into scale, rotation and translation.
///
/// Composes as `translation * rotation * scale`. Shear is not represented.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecomposedTransform {
    /// Translation applied last.
    pub translation: Vec3,
    /// Rotation applied after scaling.
    pub rotation: Quat,
    /// Per-axis scale applied first.
    pub scale: Vec3,
}

impl DecomposedTransform {
    /// The identity decomposition.
    pub fn identity() -> Self {
        Self {
            translation: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }

    /// Split a rotation/scale/translation transform into its parts.
    ///
    /// Returns `None` when the linear part is singular.
    pub fn from_transform(t: &Transform) -> Option<Self> {
        let m = &t.matrix;
        let translation = Vec3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);
        let linear: Matrix3<f32> = m.fixed_view::<3, 3>(0, 0).into_owned();

        let mut scale = Vec3::new(
            linear.column(0).norm(),
            linear.column(1).norm(),
            linear.column(2).norm(),
        );
        if scale.iter().any(|s| *s == 0.0) {
            return None;
        }
        // Mirror transforms carry the reflection in the scale.
        if linear.determinant() < 0.0 {
            scale.x = -scale.x;
        }

        let mut rot = linear;
        for c in 0..3 {
            let s = scale[c];
            rot.column_mut(c).scale_mut(1.0 / s);
        }
        let rotation =
            UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rot));

        Some(Self {
            translation,
            rotation,
            scale,
        })
    }

    /// Recompose into a 4x4 transform.
    pub fn compose(&self) -> Transform {
        Transform::translation(self.translation.x, self.translation.y, self.translation.z)
            .then(&Transform::rotation(&self.rotation))
            .then(&Transform::scale(self.scale.x, self.scale.y, self.scale.z))
    }

    /// Interpolate towards `other`: lerp for translation and scale, slerp
    /// along the shortest arc for rotation.
    pub fn interpolate(&self, other: &Self, t: f32) -> Self {
        let a = self.rotation;
        let b = if a.coords.dot(&other.rotation.coords) < 0.0 {
            Quat::new_unchecked(-other.rotation.into_inner())
        } else {
            other.rotation
        };
        let rotation = a.try_slerp(&b, t, 1e-6).unwrap_or_else(|| a.nlerp(&b, t));

        Self {
            translation: self.translation.lerp(&other.translation, t),
            rotation,
            scale: self.scale.lerp(&other.scale, t),
        }
    }
}

impl Default for DecomposedTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// A transform sampled at shutter open, mid-shutter and shutter close.
///
/// Evaluated piecewise: `[0, 0.5]` blends `pre` to `mid`, `[0.5, 1]` blends
/// `mid` to `post`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionTransform {
    /// Shutter open.
    pub pre: DecomposedTransform,
    /// Mid-shutter.
    pub mid: DecomposedTransform,
    /// Shutter close.
    pub post: DecomposedTransform,
}

impl MotionTransform {
    /// Decompose three sampled transforms. Returns `None` if any is singular.
    pub fn from_transforms(pre: &Transform, mid: &Transform, post: &Transform) -> Option<Self> {
        Some(Self {
            pre: DecomposedTransform::from_transform(pre)?,
            mid: DecomposedTransform::from_transform(mid)?,
            post: DecomposedTransform::from_transform(post)?,
        })
    }

    /// Interpolated decomposition at `time`, clamped to `[0, 1]`.
    pub fn decomposed_at(&self, time: f32) -> DecomposedTransform {
        let time = time.clamp(0.0, 1.0);
        if time < 0.5 {
            self.pre.interpolate(&self.mid, time * 2.0)
        } else {
            self.mid.interpolate(&self.post, (time - 0.5) * 2.0)
        }
    }

    /// Forward transform at `time`.
    pub fn at(&self, time: f32) -> Transform {
        self.decomposed_at(time).compose()
    }
}
