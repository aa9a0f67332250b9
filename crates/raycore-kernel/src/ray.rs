//! Rays and the per-traversal ray state.

use raycore_math::{Point3, Vec3};

/// Smallest direction component magnitude used for slab tests (`2^-80`).
///
/// Components closer to zero are replaced by this value with their sign, so
/// the reciprocal direction stays finite.
pub const OOEPS: f32 = 8.271_806e-25;

/// A ray with a parametric bound and a shutter time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Origin.
    pub origin: Point3,
    /// Unit direction.
    pub direction: Vec3,
    /// Hits are accepted for `0 < t < t_max`.
    pub t_max: f32,
    /// Shutter time in `[0, 1]`.
    pub time: f32,
    /// Growth of the ray footprint per unit distance, used for minimum
    /// curve width.
    pub spread: f32,
}

impl Ray {
    /// Create an unbounded ray at mid-shutter.
    ///
    /// The direction is normalized.
    pub fn new(origin: Point3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
            t_max: f32::INFINITY,
            time: 0.5,
            spread: 0.0,
        }
    }

    /// Bound the ray to `t < t_max`.
    pub fn with_t_max(mut self, t_max: f32) -> Self {
        self.t_max = t_max;
        self
    }

    /// Set the shutter time.
    pub fn with_time(mut self, time: f32) -> Self {
        self.time = time;
        self
    }

    /// Set the footprint spread.
    pub fn with_spread(mut self, spread: f32) -> Self {
        self.spread = spread;
        self
    }

    /// Point at parameter `t`.
    #[inline]
    pub fn at(&self, t: f32) -> Point3 {
        self.origin + self.direction * t
    }
}

/// Replace near-zero components of `dir` by `±OOEPS`.
#[inline]
pub fn clamp_direction(dir: &Vec3) -> Vec3 {
    dir.map(|x| if x.abs() > OOEPS { x } else { OOEPS.copysign(x) })
}

/// Ray origin and direction in the space currently being traversed.
///
/// The direction is clamped away from zero and `idir` holds its reciprocal.
#[derive(Debug, Clone, Copy)]
pub struct TraversalRay {
    /// Origin.
    pub p: Point3,
    /// Clamped direction.
    pub dir: Vec3,
    /// Reciprocal of `dir`.
    pub idir: Vec3,
}

impl TraversalRay {
    /// Set up a traversal ray from `p` along `dir`.
    pub fn new(p: Point3, dir: &Vec3) -> Self {
        let dir = clamp_direction(dir);
        Self {
            p,
            dir,
            idir: dir.map(|x| 1.0 / x),
        }
    }
}
