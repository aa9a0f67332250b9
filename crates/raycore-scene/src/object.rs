//! Per-object transforms and instance roots.

use raycore_math::{MotionTransform, Transform};

use crate::NodeRef;

/// An object in the object table.
///
/// World-space objects have their primitives baked into the top-level BVH and
/// no `root`. Instanced objects are reached through an instance leaf and carry
/// the root of their own BVH.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectRecord {
    /// Object to world.
    pub transform: Transform,
    /// World to object.
    pub inverse: Transform,
    /// Time-varying placement over the shutter interval.
    pub motion: Option<MotionTransform>,
    /// Root of the object's own BVH when instanced.
    pub root: Option<NodeRef>,
}

impl ObjectRecord {
    /// A world-space object with an identity transform.
    pub fn world() -> Self {
        Self {
            transform: Transform::identity(),
            inverse: Transform::identity(),
            motion: None,
            root: None,
        }
    }

    /// An instanced object placed by `transform`. Returns `None` if the
    /// transform is singular.
    pub fn instance(transform: Transform, root: NodeRef) -> Option<Self> {
        Some(Self {
            transform,
            inverse: transform.inverse()?,
            motion: None,
            root: Some(root),
        })
    }

    /// An instanced object following `motion` over the shutter.
    pub fn moving(motion: MotionTransform, root: NodeRef) -> Option<Self> {
        let transform = motion.at(0.5);
        Some(Self {
            transform,
            inverse: transform.inverse()?,
            motion: Some(motion),
            root: Some(root),
        })
    }

    /// Forward and inverse transform at `time`.
    ///
    /// Static objects ignore `time`. When the interpolated transform of a
    /// moving object is singular, the static inverse is used.
    #[inline]
    pub fn transforms_at(&self, time: f32) -> (Transform, Transform) {
        match &self.motion {
            None => (self.transform, self.inverse),
            Some(motion) => {
                let forward = motion.at(time);
                match forward.inverse() {
                    Some(inverse) => (forward, inverse),
                    None => (self.transform, self.inverse),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use raycore_math::{DecomposedTransform, Point3};

    #[test]
    fn test_static_transforms_ignore_time() {
        let obj = ObjectRecord::instance(Transform::translation(1.0, 2.0, 3.0), NodeRef::inner(0))
            .unwrap();
        let (fwd, inv) = obj.transforms_at(0.9);
        assert_eq!(fwd, obj.transform);
        let p = inv.apply_point(&Point3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(p, Point3::origin());
    }

    #[test]
    fn test_moving_transforms_interpolate() {
        let motion = MotionTransform::from_transforms(
            &Transform::identity(),
            &Transform::translation(1.0, 0.0, 0.0),
            &Transform::translation(2.0, 0.0, 0.0),
        )
        .unwrap();
        let obj = ObjectRecord::moving(motion, NodeRef::inner(0)).unwrap();
        let (fwd, inv) = obj.transforms_at(1.0);
        let p = fwd.apply_point(&Point3::origin());
        assert_relative_eq!(p.x, 2.0, epsilon = 1e-6);
        let back = inv.apply_point(&p);
        assert_relative_eq!(back, Point3::origin(), epsilon = 1e-6);
    }

    #[test]
    fn test_singular_motion_falls_back_to_static_inverse() {
        let mut collapsed = DecomposedTransform::identity();
        collapsed.scale = raycore_math::Vec3::zeros();
        let motion = MotionTransform {
            pre: DecomposedTransform::identity(),
            mid: DecomposedTransform::identity(),
            post: collapsed,
        };
        let obj = ObjectRecord::moving(motion, NodeRef::inner(0)).unwrap();
        let (fwd, inv) = obj.transforms_at(1.0);
        assert_eq!(fwd, obj.transform);
        assert_eq!(inv, obj.inverse);
    }
}
