//! Query results.

use raycore_scene::{ObjectId, PrimId};
use smallvec::SmallVec;

/// The closest (or any) hit found along a ray.
///
/// Starts as a miss with `t` equal to the ray's `t_max` and is updated in
/// place as closer hits are found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    /// Hit distance along the ray.
    pub t: f32,
    /// Barycentric weight of the second triangle vertex, or the curve
    /// parameter within the segment.
    pub u: f32,
    /// Barycentric weight of the third triangle vertex, or the curve radius
    /// gradient.
    pub v: f32,
    /// Primitive slot hit.
    pub prim: Option<PrimId>,
    /// Instanced object hit; `None` for world-space primitives.
    pub object: Option<ObjectId>,
    /// Curve segment hit.
    pub segment: Option<u32>,
}

impl Intersection {
    /// A miss bounded by `t_max`.
    pub fn miss(t_max: f32) -> Self {
        Self {
            t: t_max,
            u: 0.0,
            v: 0.0,
            prim: None,
            object: None,
            segment: None,
        }
    }

    /// Whether anything was hit.
    #[inline]
    pub fn is_hit(&self) -> bool {
        self.prim.is_some()
    }
}

/// Result of a subsurface query.
#[derive(Debug, Clone, Default)]
pub struct SubsurfaceHits {
    /// Total number of qualifying hits along the ray.
    pub num_hits: u32,
    /// Uniform sample of at most `max_hits` of them.
    pub hits: SmallVec<[Intersection; 4]>,
}
