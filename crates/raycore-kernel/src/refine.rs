//! Post-hit refinement and ray offsetting.
//!
//! A hit distance found during traversal carries the error of the whole ray
//! length. Refinement restarts from a point near the hit and re-solves the
//! primitive locally, which recovers a position accurate to the surface.

use raycore_math::{normalize_len, Point3, Transform, Vec3};
use raycore_scene::{CurvePrimitive, CurveShape, PrimitiveKind, Scene};

use crate::curve::cardinal::CardinalSegment;
use crate::triangle::plane_distance;
use crate::{Intersection, Ray};

/// Local geometry at a curve hit, in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    /// Hit position.
    pub position: Point3,
    /// Unit geometric normal, facing the ray for ribbons.
    pub normal: Vec3,
    /// Unit tangent along the curve.
    pub dpdu: Vec3,
    /// `dpdu × normal`.
    pub dpdv: Vec3,
    /// Curve parameter within the segment, in `[0, 1]`.
    pub u: f32,
}

/// Object-space frame of a hit: the ray re-expressed in the space of the
/// primitive's tables, with `t` rescaled to match.
struct HitFrame {
    forward: Option<Transform>,
    inverse: Option<Transform>,
    origin: Point3,
    dir: Vec3,
    t: f32,
}

impl HitFrame {
    fn new(scene: &Scene, isect: &Intersection, ray: &Ray) -> Self {
        match isect.object {
            None => Self {
                forward: None,
                inverse: None,
                origin: ray.origin,
                dir: ray.direction,
                t: isect.t,
            },
            Some(object) => {
                let (forward, inverse) = scene.object(object).transforms_at(ray.time);
                let (dir, t) = normalize_len(&inverse.apply_vec(&(ray.direction * isect.t)));
                Self {
                    forward: Some(forward),
                    inverse: Some(inverse),
                    origin: inverse.apply_point(&ray.origin),
                    dir,
                    t,
                }
            }
        }
    }

    fn to_world_point(&self, p: &Point3) -> Point3 {
        self.forward.map_or(*p, |f| f.apply_point(p))
    }

    fn to_world_vec(&self, v: &Vec3) -> Vec3 {
        self.forward.map_or(*v, |f| f.apply_vec(v))
    }

    /// Normals transform by the inverse transpose.
    fn to_world_normal(&self, n: &Vec3) -> Vec3 {
        match &self.inverse {
            None => *n,
            Some(inv) => inv.matrix.fixed_view::<3, 3>(0, 0).transpose() * n,
        }
    }
}

/// Recompute the position of a triangle hit by re-intersecting the plane from
/// the approximate hit point.
///
/// Misses and curve hits fall back to `ray.at(isect.t)`.
pub(crate) fn refine_triangle(scene: &Scene, isect: &Intersection, ray: &Ray) -> Point3 {
    let Some(prim) = isect.prim else {
        return ray.at(isect.t);
    };
    let record = scene.prim(prim);
    if record.kind != PrimitiveKind::Triangle {
        return ray.at(isect.t);
    }

    let frame = HitFrame::new(scene, isect, ray);
    let mut p = frame.origin + frame.dir * frame.t;
    let rt = plane_distance(scene.triangle(record.index), &p, &frame.dir);
    if rt.is_finite() {
        p += frame.dir * rt;
    }
    frame.to_world_point(&p)
}

/// Recover position and local frame of a curve hit.
pub(crate) fn refine_curve(scene: &Scene, isect: &Intersection, ray: &Ray) -> Option<CurvePoint> {
    let prim = isect.prim?;
    let record = scene.prim(prim);
    let PrimitiveKind::CurveSegment { segment } = record.kind else {
        return None;
    };

    let frame = HitFrame::new(scene, isect, ray);
    let p = frame.origin + frame.dir * frame.t;
    let keys = scene.curve_segment_keys(record.index, segment);
    let settings = &scene.settings().curves;

    let (u, tangent, normal) = match settings.primitive {
        CurvePrimitive::CardinalCurves => {
            let curve = CardinalSegment::new(&keys.map(|k| k.point().coords));
            let u = isect.u.clamp(0.0, 1.0);
            let tangent = curve.derivative(u).normalize();
            let normal = match settings.shape {
                CurveShape::Ribbon => -(frame.dir - tangent * tangent.dot(&frame.dir)),
                CurveShape::Thick => {
                    let axis = Point3::from(curve.point(u));
                    (p - axis) - tangent * isect.v
                }
            };
            (u, tangent, normal)
        }
        CurvePrimitive::LineSegments => {
            let (k0, k1) = (keys[1], keys[2]);
            let (tangent, len) = normalize_len(&(k1.point() - k0.point()));
            let gd = if len > 0.0 {
                (k1.radius - k0.radius) / len
            } else {
                0.0
            };
            let dif = p - k0.point();
            let u = if len > 0.0 {
                dif.dot(&tangent) / len
            } else {
                0.0
            };
            let radius = k0.radius + u * len * gd;
            let normal = (dif - tangent * (u * len)) / radius - tangent * gd;
            (u, tangent, normal)
        }
    };

    let normal = frame.to_world_normal(&normal).normalize();
    let dpdu = frame.to_world_vec(&tangent).normalize();
    Some(CurvePoint {
        position: frame.to_world_point(&p),
        normal,
        dpdu,
        dpdv: dpdu.cross(&normal),
        u,
    })
}

/// Nudge `p` off a surface along `ng`.
///
/// Coordinates of magnitude at least one step 32 ULPs toward the side `ng`
/// points to; smaller ones move by `1e-5 * ng`.
pub fn offset_point(p: &Point3, ng: &Vec3) -> Point3 {
    const EPSILON_F: f32 = 1e-5;
    const EPSILON_I: i32 = 32;

    let offset = |x: f32, n: f32| {
        if x.abs() < 1.0 {
            x + n * EPSILON_F
        } else {
            let bits = x.to_bits();
            let step = if (bits ^ n.to_bits()) >> 31 != 0 {
                -EPSILON_I
            } else {
                EPSILON_I
            };
            f32::from_bits(bits.wrapping_add_signed(step))
        }
    };
    Point3::new(offset(p.x, ng.x), offset(p.y, ng.y), offset(p.z, ng.z))
}
