//! Intersection with cardinal spline segments by recursive subdivision.
//!
//! The spline through the four keys around a segment is expressed in a frame
//! whose origin is the ray origin and whose z axis is the ray direction, so
//! the ray is the positive z axis. A bit-counter walk over `2^subdivisions`
//! leaf intervals rejects sub-ranges whose boxes miss a neighbourhood of the
//! axis, and leaves solve a ribbon or tapered-cylinder test.

use rand::RngCore;
use raycore_math::{Point3, Vec3};
use raycore_scene::{CurveKey, CurveSettings, CurveShape, CARDINAL_TENSION};

use super::{fade_rejects, reborrow_rng, CurveHit, MinimumWidth};

/// A cardinal segment in polynomial form: `((c3 u + c2) u + c1) u + c0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CardinalSegment {
    pub c: [Vec3; 4],
}

impl CardinalSegment {
    /// The segment from `p[1]` to `p[2]`, shaped by neighbours `p[0]` and
    /// `p[3]`.
    pub fn new(p: &[Vec3; 4]) -> Self {
        let fc = CARDINAL_TENSION;
        Self {
            c: [
                p[1],
                (p[2] - p[0]) * fc,
                p[0] * (2.0 * fc) + p[1] * (fc - 3.0) + p[2] * (3.0 - 2.0 * fc) - p[3] * fc,
                -p[0] * fc + p[1] * (2.0 - fc) + p[2] * (fc - 2.0) + p[3] * fc,
            ],
        }
    }

    /// Position at `u`.
    #[inline]
    pub fn point(&self, u: f32) -> Vec3 {
        ((self.c[3] * u + self.c[2]) * u + self.c[1]) * u + self.c[0]
    }

    /// Derivative at `u`.
    #[inline]
    pub fn derivative(&self, u: f32) -> Vec3 {
        (self.c[3] * (3.0 * u) + self.c[2] * 2.0) * u + self.c[1]
    }
}

/// Orthonormal frame with the ray direction as its z axis.
struct RayFrame {
    origin: Point3,
    x: Vec3,
    y: Vec3,
    z: Vec3,
}

impl RayFrame {
    fn new(origin: &Point3, dir: &Vec3) -> Self {
        // Branchless basis (Duff et al. 2017); valid for every unit `dir`.
        let sign = 1.0f32.copysign(dir.z);
        let a = -1.0 / (sign + dir.z);
        let b = dir.x * dir.y * a;
        Self {
            origin: *origin,
            x: Vec3::new(1.0 + sign * dir.x * dir.x * a, sign * b, -sign * dir.x),
            y: Vec3::new(b, sign + dir.y * dir.y * a, -dir.y),
            z: *dir,
        }
    }

    #[inline]
    fn to_local(&self, p: &Point3) -> Vec3 {
        let d = p - self.origin;
        Vec3::new(self.x.dot(&d), self.y.dot(&d), self.z.dot(&d))
    }
}

/// Range of the cubic `p3 t³ + p2 t² + p1 t + p0` over `[0, 1]`, with up to
/// two interior extrema as `(parameter, value)`; absent extrema have a
/// parameter of `-1`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CubicBounds {
    lower: f32,
    upper: f32,
    extrema: [(f32, f32); 2],
}

impl CubicBounds {
    fn new(p0: f32, p1: f32, p2: f32, p3: f32) -> Self {
        let end = (p0 + p1) + (p2 + p3);
        let mut out = Self {
            lower: p0.min(end),
            upper: p0.max(end),
            extrema: [(-1.0, 0.0); 2],
        };

        let roots = if p3 != 0.0 {
            let disc = p2 * p2 - 3.0 * p3 * p1;
            if disc < 0.0 {
                return out;
            }
            let root = disc.sqrt();
            let inv3p3 = (1.0 / 3.0) / p3;
            [(-p2 - root) * inv3p3, (-p2 + root) * inv3p3]
        } else if p2 != 0.0 {
            [-p1 / (2.0 * p2), -1.0]
        } else {
            return out;
        };

        for (slot, &t) in roots.iter().enumerate() {
            if t > 0.0 && t < 1.0 {
                let value = ((p3 * t + p2) * t + p1) * t + p0;
                out.extrema[slot] = (t, value);
                out.lower = out.lower.min(value);
                out.upper = out.upper.max(value);
            }
        }
        out
    }

    /// Bounds of the cubic over `[i_st, i_en]` given its values there.
    #[inline]
    fn interval(&self, v_st: f32, v_en: f32, i_st: f32, i_en: f32) -> (f32, f32) {
        let mut lo = v_st.min(v_en);
        let mut hi = v_st.max(v_en);
        for &(t, value) in &self.extrema {
            if t >= i_st && t <= i_en {
                lo = lo.min(value);
                hi = hi.max(value);
            }
        }
        (lo, hi)
    }
}

/// Intersect the ray with the cardinal segment between `keys[1]` and
/// `keys[2]`. Returns the closest accepted hit below `t_max`.
pub(crate) fn intersect(
    keys: &[CurveKey; 4],
    p: &Point3,
    dir: &Vec3,
    t_max: f32,
    settings: &CurveSettings,
    width: MinimumWidth,
    mut rng: Option<&mut dyn RngCore>,
) -> Option<CurveHit> {
    let frame = RayFrame::new(p, dir);
    let local = keys.map(|k| frame.to_local(&k.point()));
    let curve = CardinalSegment::new(&local);
    let [c0, c1, c2, c3] = curve.c;
    let (r_st, r_en) = (keys[1].radius, keys[2].radius);
    let difl = width.difl;
    let extmax = width.extmax;

    let ribbon = settings.shape == CurveShape::Ribbon;
    let mut r_curr = r_st.max(r_en);
    let epsilon = if ribbon || !settings.backface {
        2.0 * r_curr
    } else {
        0.0
    };

    let zb = CubicBounds::new(c0.z, c1.z, c2.z, c3.z);
    if zb.lower - r_curr > t_max || zb.upper + r_curr < epsilon {
        return None;
    }
    let r_ext = (difl * zb.upper.abs()).min(extmax) + r_curr;
    let xb = CubicBounds::new(c0.x, c1.x, c2.x, c3.x);
    if xb.lower > r_ext || xb.upper < -r_ext {
        return None;
    }
    let yb = CubicBounds::new(c0.y, c1.y, c2.y, c3.y);
    if yb.lower > r_ext || yb.upper < -r_ext {
        return None;
    }

    let depth = settings.subdivisions;
    let mut level: u32 = 1 << depth;
    let mut tree: u32 = 0;
    let resol = 1.0 / level as f32;
    let mut best_t = t_max;
    let mut best: Option<CurveHit> = None;

    // Each step either rejects the interval `[tree, tree + level)` and skips
    // to the next sibling, halves `level` to descend, or tests a leaf.
    while tree >> depth == 0 {
        let i_st = tree as f32 * resol;
        let i_en = i_st + level as f32 * resol;
        let p_st = curve.point(i_st);
        let p_en = curve.point(i_en);

        let (bminx, bmaxx) = xb.interval(p_st.x, p_en.x, i_st, i_en);
        let (bminy, bmaxy) = yb.interval(p_st.y, p_en.y, i_st, i_en);
        let (bminz, bmaxz) = zb.interval(p_st.z, p_en.z, i_st, i_en);

        let r1 = r_st + (r_en - r_st) * i_st;
        let r2 = r_st + (r_en - r_st) * i_en;
        r_curr = r1.max(r2);
        let mw_extension = (difl * bmaxz.abs()).min(extmax);
        let r_ext = mw_extension + r_curr;

        if bminz - r_curr > best_t
            || bmaxz + r_curr < epsilon
            || bminx > r_ext
            || bmaxx < -r_ext
            || bminy > r_ext
            || bmaxy < -r_ext
        {
            tree += level;
            level = tree & tree.wrapping_neg();
            continue;
        }
        if level > 1 {
            level >>= 1;
            continue;
        }

        let leaf = if ribbon {
            ribbon_leaf(
                &curve, p_st, p_en, i_st, i_en, r_st, r_en, width, epsilon, best_t, bmaxz,
            )
        } else {
            thick_leaf(
                &curve,
                p_st,
                p_en,
                i_st,
                i_en,
                r1,
                r2,
                width,
                settings.backface,
                best_t,
            )
        };
        if let Some(leaf) = leaf {
            if fade_rejects(reborrow_rng(&mut rng), leaf.coverage) {
                return best;
            }
            best_t = leaf.hit.t;
            best = Some(leaf.hit);
        }

        tree += 1;
        level = tree & tree.wrapping_neg();
    }

    best
}

/// A leaf hit with the fraction of the widened curve covered by the true
/// curve.
struct LeafHit {
    hit: CurveHit,
    coverage: f32,
}

/// Derivatives at the interval ends, flipped to point along the chord.
#[inline]
fn end_tangents(curve: &CardinalSegment, tg: &Vec3, i_st: f32, i_en: f32) -> (Vec3, Vec3) {
    let mut dp_st = curve.derivative(i_st);
    if tg.dot(&dp_st) < 0.0 {
        dp_st = -dp_st;
    }
    let mut dp_en = curve.derivative(i_en);
    if tg.dot(&dp_en) < 0.0 {
        dp_en = -dp_en;
    }
    (dp_st, dp_en)
}

/// Whether the ray point at distance `t` lies between the end-cap planes.
#[inline]
fn within_caps(p_st: &Vec3, p_en: &Vec3, dp_st: &Vec3, dp_en: &Vec3, t: f32) -> bool {
    dp_st.dot(&-p_st) + t * dp_st.z >= 0.0 && dp_en.dot(p_en) - t * dp_en.z >= 0.0
}

#[allow(clippy::too_many_arguments)]
fn ribbon_leaf(
    curve: &CardinalSegment,
    p_st: Vec3,
    p_en: Vec3,
    i_st: f32,
    i_en: f32,
    r_st: f32,
    r_en: f32,
    width: MinimumWidth,
    epsilon: f32,
    t_max: f32,
    bmaxz: f32,
) -> Option<LeafHit> {
    let tg = p_en - p_st;
    let len_xy = tg.x * tg.x + tg.y * tg.y;
    if len_xy == 0.0 {
        return None;
    }
    // Closest point of the chord to the ray in the xy plane.
    let w = (-(p_st.x * tg.x + p_st.y * tg.y) / len_xy).clamp(0.0, 1.0);
    let u = i_st * (1.0 - w) + i_en * w;
    let r_curr = r_st + (r_en - r_st) * u;
    let p_curr = curve.point(u);

    let (dp_st, dp_en) = end_tangents(curve, &tg, i_st, i_en);
    if !within_caps(&p_st, &p_en, &dp_st, &dp_en, p_curr.z) {
        return None;
    }

    let mut r_ext = r_curr;
    let mut coverage = 1.0;
    if width.is_active() {
        let mw_extension = (width.difl * bmaxz.abs()).min(width.extmax);
        r_ext = mw_extension + r_curr;
        let d = (p_curr.x * p_curr.x + p_curr.y * p_curr.y).sqrt();
        let d0 = d - r_curr;
        let d1 = d + r_curr;
        let inv = 1.0 / mw_extension;
        coverage = if d0 >= 0.0 {
            ((d1 * inv).min(1.0) - (d0 * inv).min(1.0)) * 0.5
        } else {
            ((d1 * inv).min(1.0) + (-d0 * inv).min(1.0)) * 0.5
        };
    }

    let inside = p_curr.x * p_curr.x + p_curr.y * p_curr.y < r_ext * r_ext;
    if !inside || p_curr.z <= epsilon || p_curr.z > t_max {
        return None;
    }

    Some(LeafHit {
        hit: CurveHit {
            t: p_curr.z,
            u,
            v: 0.0,
        },
        coverage,
    })
}

#[allow(clippy::too_many_arguments)]
fn thick_leaf(
    curve: &CardinalSegment,
    p_st: Vec3,
    p_en: Vec3,
    i_st: f32,
    i_en: f32,
    r1: f32,
    r2: f32,
    width: MinimumWidth,
    backface: bool,
    t_max: f32,
) -> Option<LeafHit> {
    let chord = p_en - p_st;
    let l = chord.norm();
    if l == 0.0 {
        return None;
    }
    let (mut or1, mut or2) = (r1, r2);
    if width.is_active() {
        or1 = or1.max((p_st.norm() * width.difl).min(width.extmax));
        or2 = or2.max((p_en.norm() * width.difl).min(width.extmax));
    }

    let invl = 1.0 / l;
    let tg = chord * invl;
    let gd = (or2 - or1) * invl;
    let difz = -p_st.dot(&tg);
    let cyla = 1.0 - tg.z * tg.z * (1.0 + gd * gd);
    let halfb = -p_st.z - tg.z * (difz + gd * (difz * gd + or1));
    let tcentre = -halfb / cyla;
    let zcentre = difz + tg.z * tcentre;

    let tdif = Vec3::new(-p_st.x, -p_st.y, tcentre - p_st.z);
    let tdifz = tdif.dot(&tg);
    let tb = 2.0 * (tdif.z - tg.z * (tdifz + gd * (tdifz * gd + or1)));
    let tc = tdif.norm_squared() - tdifz * tdifz * (1.0 + gd * gd) - or1 * or1
        - 2.0 * or1 * tdifz * gd;
    let td = tb * tb - 4.0 * cyla * tc;
    if td < 0.0 {
        return None;
    }

    let rootd = td.sqrt();
    let mut correction = (-tb - rootd) * 0.5 / cyla;
    let mut t = tcentre + correction;

    let (dp_st, dp_en) = end_tangents(curve, &tg, i_st, i_en);
    let valid =
        |t: f32| within_caps(&p_st, &p_en, &dp_st, &dp_en, t) && t <= t_max && t > 0.0;
    if backface && !valid(t) {
        correction = (-tb + rootd) * 0.5 / cyla;
        t = tcentre + correction;
    }
    if !valid(t) {
        return None;
    }

    let w = ((zcentre + tg.z * correction) * invl).clamp(0.0, 1.0);
    let u = i_st * (1.0 - w) + i_en * w;
    let coverage = if width.is_active() {
        (r1 + (r2 - r1) * w) / (or1 + (or2 - or1) * w)
    } else {
        1.0
    };

    Some(LeafHit {
        hit: CurveHit { t, u, v: gd },
        coverage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn settings(shape: CurveShape) -> CurveSettings {
        CurveSettings {
            shape,
            ..CurveSettings::default()
        }
    }

    fn key(x: f32, y: f32, z: f32, r: f32) -> CurveKey {
        CurveKey::new(Point3::new(x, y, z), r)
    }

    #[test]
    fn test_segment_interpolates_end_keys() {
        let p = [
            Vec3::new(-1.0, 0.5, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(2.0, 0.0, 1.0),
        ];
        let seg = CardinalSegment::new(&p);
        assert_relative_eq!(seg.point(0.0), p[1], epsilon = 1e-6);
        assert_relative_eq!(seg.point(1.0), p[2], epsilon = 1e-6);
        assert_relative_eq!(seg.derivative(0.0), (p[2] - p[0]) * CARDINAL_TENSION, epsilon = 1e-6);
        assert_relative_eq!(seg.derivative(1.0), (p[3] - p[1]) * CARDINAL_TENSION, epsilon = 1e-5);
    }

    #[test]
    fn test_ray_frame_maps_ray_to_z_axis() {
        for dir in [
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.3, -0.4, 0.2).normalize(),
        ] {
            let origin = Point3::new(1.0, 2.0, 3.0);
            let frame = RayFrame::new(&origin, &dir);
            let local = frame.to_local(&(origin + dir * 5.0));
            assert_relative_eq!(local, Vec3::new(0.0, 0.0, 5.0), epsilon = 1e-5);
            assert_relative_eq!(frame.x.dot(&frame.y), 0.0, epsilon = 1e-6);
            assert_relative_eq!(frame.x.norm(), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_cubic_bounds_extrema() {
        // 3t² - 2t³ rises monotonically from 0 to 1.
        let b = CubicBounds::new(0.0, 0.0, 3.0, -2.0);
        assert_relative_eq!(b.lower, 0.0);
        assert_relative_eq!(b.upper, 1.0);

        // t - t² peaks at t = 0.5 with 0.25.
        let q = CubicBounds::new(0.0, 1.0, -1.0, 0.0);
        assert_relative_eq!(q.upper, 0.25);
        assert_relative_eq!(q.extrema[0].0, 0.5);
        assert_eq!(q.interval(0.0, 0.1875, 0.0, 0.25), (0.0, 0.1875));
        assert_eq!(q.interval(0.1875, 0.1875, 0.25, 0.75), (0.1875, 0.25));

        // (t - 0.5)³ flattens at t = 0.5 without an extremum.
        let flat = CubicBounds::new(-0.125, 0.75, -1.5, 1.0);
        assert_relative_eq!(flat.lower, -0.125);
        assert_relative_eq!(flat.upper, 0.125);
    }

    #[test]
    fn test_ribbon_hit_on_axis() {
        let k0 = key(-1.0, 0.0, 0.0, 0.1);
        let k1 = key(1.0, 0.0, 0.0, 0.1);
        let hit = intersect(
            &[k0, k0, k1, k1],
            &Point3::new(0.1, 0.05, -4.0),
            &Vec3::new(0.0, 0.0, 1.0),
            f32::INFINITY,
            &settings(CurveShape::Ribbon),
            MinimumWidth::NONE,
            None,
        )
        .unwrap();
        // Ribbons face the ray, so the hit sits on the curve axis.
        assert_relative_eq!(hit.t, 4.0, epsilon = 1e-4);
        assert!(hit.u > 0.3 && hit.u < 0.7);
    }

    #[test]
    fn test_bent_curve_hit() {
        // An arc through the keys; the ray passes close to its apex.
        let keys = [
            key(-2.0, -1.0, 0.0, 0.05),
            key(-1.0, 0.0, 0.0, 0.05),
            key(1.0, 0.0, 0.0, 0.05),
            key(2.0, -1.0, 0.0, 0.05),
        ];
        let seg = CardinalSegment::new(&keys.map(|k| k.point().coords));
        let apex = seg.point(0.53);
        let origin = Point3::new(apex.x, apex.y, -3.0);
        for shape in [CurveShape::Ribbon, CurveShape::Thick] {
            let hit = intersect(
                &keys,
                &origin,
                &Vec3::new(0.0, 0.0, 1.0),
                f32::INFINITY,
                &settings(shape),
                MinimumWidth::NONE,
                None,
            )
            .unwrap();
            assert!(hit.t > 2.9 && hit.t <= 3.0 + 1e-4, "{shape:?} t = {}", hit.t);
            assert!((hit.u - 0.5).abs() < 0.1);
        }
    }

    #[test]
    fn test_misses_beside_and_behind() {
        let k0 = key(-1.0, 0.0, 0.0, 0.1);
        let k1 = key(1.0, 0.0, 0.0, 0.1);
        let keys = [k0, k0, k1, k1];
        for shape in [CurveShape::Ribbon, CurveShape::Thick] {
            let s = settings(shape);
            let beside = intersect(
                &keys,
                &Point3::new(0.0, 0.5, -4.0),
                &Vec3::new(0.0, 0.0, 1.0),
                f32::INFINITY,
                &s,
                MinimumWidth::NONE,
                None,
            );
            assert!(beside.is_none());
            let behind = intersect(
                &keys,
                &Point3::new(0.0, 0.0, -4.0),
                &Vec3::new(0.0, 0.0, -1.0),
                f32::INFINITY,
                &s,
                MinimumWidth::NONE,
                None,
            );
            assert!(behind.is_none());
            let too_far = intersect(
                &keys,
                &Point3::new(0.0, 0.0, -4.0),
                &Vec3::new(0.0, 0.0, 1.0),
                3.0,
                &s,
                MinimumWidth::NONE,
                None,
            );
            assert!(too_far.is_none());
        }
    }

    #[test]
    fn test_ray_along_curve_ribbon_skips() {
        let k0 = key(0.0, 0.0, 0.0, 0.1);
        let k1 = key(0.0, 0.0, 2.0, 0.1);
        let hit = intersect(
            &[k0, k0, k1, k1],
            &Point3::new(0.0, 0.0, -4.0),
            &Vec3::new(0.0, 0.0, 1.0),
            f32::INFINITY,
            &settings(CurveShape::Ribbon),
            MinimumWidth::NONE,
            None,
        );
        assert!(hit.is_none());
    }
}
