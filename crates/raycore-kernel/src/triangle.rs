//! Ray/triangle intersection against the precomputed Woop form.

use raycore_math::{Point3, Vec3};
use raycore_scene::{ObjectId, PrimId, Scene, TriangleWoop, Visibility};

use crate::Intersection;

/// Distance to the triangle plane along `dir`, from the Woop plane row.
#[inline]
pub(crate) fn plane_distance(woop: &TriangleWoop, p: &Point3, dir: &Vec3) -> f32 {
    let w0 = woop.row(0);
    let n = w0.xyz();
    let oz = w0.w - p.coords.dot(&n);
    let inv_dz = 1.0 / dir.dot(&n);
    oz * inv_dz
}

/// Solve the Woop test for `0 < t < t_max`, returning `(t, u, v)`.
#[inline]
pub(crate) fn woop_hit(
    woop: &TriangleWoop,
    p: &Point3,
    dir: &Vec3,
    t_max: f32,
) -> Option<(f32, f32, f32)> {
    let t = plane_distance(woop, p, dir);
    // NaN from degenerate rows or parallel rays fails every comparison.
    if t > 0.0 && t < t_max {
        let w1 = woop.row(1);
        let u = w1.w + p.coords.dot(&w1.xyz()) + t * dir.dot(&w1.xyz());
        if u >= 0.0 {
            let w2 = woop.row(2);
            let v = w2.w + p.coords.dot(&w2.xyz()) + t * dir.dot(&w2.xyz());
            if v >= 0.0 && u + v <= 1.0 {
                return Some((t, u, v));
            }
        }
    }
    None
}

/// Test triangle slot `prim` and record a strictly closer, visible hit.
#[inline]
pub(crate) fn triangle_intersect(
    scene: &Scene,
    isect: &mut Intersection,
    p: &Point3,
    dir: &Vec3,
    visibility: Visibility,
    object: Option<ObjectId>,
    prim: PrimId,
) -> bool {
    let record = scene.prim(prim);
    let Some((t, u, v)) = woop_hit(scene.triangle(record.index), p, dir, isect.t) else {
        return false;
    };
    // Visibility is checked last; most triangles are culled by node masks.
    if !record.visibility.intersects(visibility) {
        return false;
    }

    isect.t = t;
    isect.u = u;
    isect.v = v;
    isect.prim = Some(prim);
    isect.object = object;
    isect.segment = None;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_triangle() -> TriangleWoop {
        TriangleWoop::from_vertices(
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0),
        )
    }

    #[test]
    fn test_unit_triangle_hit() {
        let (t, u, v) = woop_hit(
            &unit_triangle(),
            &Point3::new(0.25, 0.25, -1.0),
            &Vec3::new(0.0, 0.0, 1.0),
            f32::INFINITY,
        )
        .unwrap();
        assert_relative_eq!(t, 1.0, epsilon = 1e-6);
        assert_relative_eq!(u, 0.25, epsilon = 1e-6);
        assert_relative_eq!(v, 0.25, epsilon = 1e-6);
    }

    #[test]
    fn test_hit_from_behind() {
        let hit = woop_hit(
            &unit_triangle(),
            &Point3::new(0.25, 0.25, 1.0),
            &Vec3::new(0.0, 0.0, -1.0),
            f32::INFINITY,
        );
        assert!(hit.is_some());
    }

    #[test]
    fn test_misses() {
        let tri = unit_triangle();
        let down = Vec3::new(0.0, 0.0, 1.0);
        // Outside the u + v <= 1 edge.
        assert!(woop_hit(&tri, &Point3::new(0.75, 0.75, -1.0), &down, f32::INFINITY).is_none());
        // Negative u.
        assert!(woop_hit(&tri, &Point3::new(-0.1, 0.5, -1.0), &down, f32::INFINITY).is_none());
        // Behind the origin.
        assert!(woop_hit(&tri, &Point3::new(0.25, 0.25, 1.0), &down, f32::INFINITY).is_none());
        // Beyond t_max.
        assert!(woop_hit(&tri, &Point3::new(0.25, 0.25, -1.0), &down, 0.5).is_none());
        // Parallel to the plane.
        assert!(woop_hit(&tri, &Point3::new(0.25, 0.25, 0.0), &Vec3::x(), f32::INFINITY).is_none());
    }

    #[test]
    fn test_degenerate_never_hits() {
        let hit = woop_hit(
            &TriangleWoop::DEGENERATE,
            &Point3::new(0.0, 0.0, -1.0),
            &Vec3::new(0.0, 0.0, 1.0),
            f32::INFINITY,
        );
        assert!(hit.is_none());
    }

    #[test]
    fn test_hit_reconstructs_point() {
        let a = Point3::new(1.0, 2.0, 0.5);
        let b = Point3::new(3.0, 2.5, 1.0);
        let c = Point3::new(1.5, 4.0, -0.5);
        let tri = TriangleWoop::from_vertices(&a, &b, &c);
        let target = a + (b - a) * 0.2 + (c - a) * 0.3;
        let origin = Point3::new(0.0, 0.0, 10.0);
        let dir = (target - origin).normalize();
        let (t, u, v) = woop_hit(&tri, &origin, &dir, f32::INFINITY).unwrap();
        assert_relative_eq!(u, 0.2, epsilon = 1e-4);
        assert_relative_eq!(v, 0.3, epsilon = 1e-4);
        let p = origin + dir * t;
        let q = a + (b - a) * u + (c - a) * v;
        assert_relative_eq!(p, q, epsilon = 1e-4);
    }
}
