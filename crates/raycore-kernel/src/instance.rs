//! Moving the traversal ray into and out of an instance's local space.

use raycore_math::{normalize_len, Transform};
use raycore_scene::ObjectRecord;

use crate::ray::TraversalRay;
use crate::Ray;

/// Transform captured when entering an instance, reused when leaving it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct InstanceFrame {
    inverse: Transform,
}

/// Enter `object`: move the traversal ray into its local space and rescale
/// the current hit distance `t` to match.
///
/// With `motion`, moving objects use their transform at the ray's time.
#[inline]
pub(crate) fn push(
    object: &ObjectRecord,
    ray: &Ray,
    tray: &mut TraversalRay,
    t: f32,
    motion: bool,
) -> (InstanceFrame, f32) {
    let inverse = if motion {
        object.transforms_at(ray.time).1
    } else {
        object.inverse
    };
    let (dir, len) = normalize_len(&inverse.apply_vec(&ray.direction));
    *tray = TraversalRay::new(inverse.apply_point(&ray.origin), &dir);
    let t = if t.is_finite() { t * len } else { t };
    (InstanceFrame { inverse }, t)
}

/// Leave the instance entered with `frame`: restore the world-space ray and
/// rescale `t` back.
#[inline]
pub(crate) fn pop(frame: &InstanceFrame, ray: &Ray, tray: &mut TraversalRay, t: f32) -> f32 {
    *tray = TraversalRay::new(ray.origin, &ray.direction);
    frame.world_t(ray, t)
}

impl InstanceFrame {
    /// Convert a distance along the local ray back to world space.
    #[inline]
    pub fn world_t(&self, ray: &Ray, t: f32) -> f32 {
        if t.is_finite() {
            t / self.inverse.apply_vec(&ray.direction).norm()
        } else {
            t
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use raycore_math::{MotionTransform, Point3, Vec3};
    use raycore_scene::NodeRef;

    fn placed(transform: Transform) -> ObjectRecord {
        ObjectRecord::instance(transform, NodeRef::inner(0)).unwrap()
    }

    #[test]
    fn test_push_pop_round_trip() {
        let transform = Transform::translation(3.0, -1.0, 2.0)
            .then(&Transform::rotation_about_axis(&Vec3::new(1.0, 2.0, 0.5), 0.8))
            .then(&Transform::scale(2.0, 0.5, 3.0));
        let object = placed(transform);
        let ray = Ray::new(Point3::new(0.5, 1.5, -4.0), Vec3::new(0.2, -0.1, 1.0));
        let mut tray = TraversalRay::new(ray.origin, &ray.direction);
        let before = tray;

        let (frame, local_t) = push(&object, &ray, &mut tray, 7.25, false);
        assert_relative_eq!(tray.dir.norm(), 1.0, epsilon = 1e-6);
        let t = pop(&frame, &ray, &mut tray, local_t);

        assert_relative_eq!(t, 7.25, epsilon = 1e-5);
        assert_relative_eq!(tray.p, before.p, epsilon = 1e-5);
        assert_relative_eq!(tray.dir, before.dir, epsilon = 1e-5);
    }

    #[test]
    fn test_push_scales_t_to_local_distance() {
        let object = placed(Transform::scale(2.0, 2.0, 2.0));
        let ray = Ray::new(Point3::new(0.0, 0.0, -10.0), Vec3::new(0.0, 0.0, 1.0));
        let mut tray = TraversalRay::new(ray.origin, &ray.direction);

        let (_, t) = push(&object, &ray, &mut tray, 8.0, false);
        // Local space is half the size, so distances halve.
        assert_relative_eq!(t, 4.0, epsilon = 1e-6);
        assert_relative_eq!(tray.p, Point3::new(0.0, 0.0, -5.0), epsilon = 1e-6);

        let (_, t) = push(&object, &ray, &mut tray, f32::INFINITY, false);
        assert_eq!(t, f32::INFINITY);
    }

    #[test]
    fn test_motion_push_uses_ray_time() {
        let motion = MotionTransform::from_transforms(
            &Transform::identity(),
            &Transform::translation(1.0, 0.0, 0.0),
            &Transform::translation(2.0, 0.0, 0.0),
        )
        .unwrap();
        let object = ObjectRecord::moving(motion, NodeRef::inner(0)).unwrap();
        let ray = Ray::new(Point3::new(2.0, 0.0, -1.0), Vec3::new(0.0, 0.0, 1.0)).with_time(1.0);
        let mut tray = TraversalRay::new(ray.origin, &ray.direction);

        push(&object, &ray, &mut tray, 1.0, true);
        assert_relative_eq!(tray.p, Point3::new(0.0, 0.0, -1.0), epsilon = 1e-5);

        // Without motion the mid-shutter placement is used.
        push(&object, &ray, &mut tray, 1.0, false);
        assert_relative_eq!(tray.p, Point3::new(1.0, 0.0, -1.0), epsilon = 1e-5);
    }
}
