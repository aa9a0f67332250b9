//! Ray/curve-segment intersection.
//!
//! Two algorithms are available, selected by [`CurvePrimitive`]: an analytic
//! tapered cylinder between the segment's end keys, and recursive
//! subdivision of the cardinal spline through the four surrounding keys.
//! Both support minimum-width widening with a stochastic fade.

pub(crate) mod cardinal;
pub(crate) mod segment;

use rand::{Rng, RngCore};
use raycore_math::{Point3, Vec3};
use raycore_scene::{CurvePrimitive, ObjectId, PrimId, Scene, Visibility};

use crate::Intersection;

/// Minimum-width parameters for one ray.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MinimumWidth {
    /// Widening relative to distance along the ray.
    pub difl: f32,
    /// Upper bound on the widening, in world units.
    pub extmax: f32,
}

impl MinimumWidth {
    /// No widening.
    pub const NONE: MinimumWidth = MinimumWidth {
        difl: 0.0,
        extmax: 0.0,
    };

    /// Whether widening is enabled.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.difl != 0.0
    }
}

/// A hit on a curve segment in the space of the traversal ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CurveHit {
    pub t: f32,
    pub u: f32,
    pub v: f32,
}

/// Stochastic minimum-width fade: reject with probability `1 - coverage`.
///
/// Without a generator nothing is rejected.
#[inline]
pub(crate) fn fade_rejects(rng: Option<&mut dyn RngCore>, coverage: f32) -> bool {
    match rng {
        Some(rng) if coverage != 1.0 => rng.gen::<f32>() > coverage,
        _ => false,
    }
}

/// Reborrow an optional generator for one call inside a loop.
#[inline]
pub(crate) fn reborrow_rng<'r>(
    rng: &'r mut Option<&mut dyn RngCore>,
) -> Option<&'r mut dyn RngCore> {
    match rng {
        Some(rng) => Some(&mut **rng),
        None => None,
    }
}

/// Test curve slot `prim` and record a strictly closer, visible hit.
#[allow(clippy::too_many_arguments)]
pub(crate) fn curve_intersect(
    scene: &Scene,
    isect: &mut Intersection,
    p: &Point3,
    dir: &Vec3,
    visibility: Visibility,
    object: Option<ObjectId>,
    prim: PrimId,
    width: MinimumWidth,
    rng: Option<&mut dyn RngCore>,
) -> bool {
    let record = scene.prim(prim);
    let Some(segment) = record.segment() else {
        return false;
    };
    if !record.visibility.intersects(visibility) {
        return false;
    }

    let settings = &scene.settings().curves;
    let keys = scene.curve_segment_keys(record.index, segment);
    let hit = match settings.primitive {
        CurvePrimitive::LineSegments => {
            segment::intersect(&keys[1], &keys[2], p, dir, isect.t, settings, width, rng)
        }
        CurvePrimitive::CardinalCurves => {
            cardinal::intersect(&keys, p, dir, isect.t, settings, width, rng)
        }
    };
    let Some(hit) = hit else {
        return false;
    };

    isect.t = hit.t;
    isect.u = hit.u;
    isect.v = hit.v;
    isect.prim = Some(prim);
    isect.object = object;
    isect.segment = Some(segment);
    true
}
