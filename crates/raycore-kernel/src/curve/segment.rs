//! Analytic intersection with a tapered cylinder between two curve keys.

use rand::RngCore;
use raycore_math::{Point3, Vec3};
use raycore_scene::{CurveKey, CurveSettings};

use super::{fade_rejects, CurveHit, MinimumWidth};

/// Radius ratio of the encasing filter.
const ENCASING_RATIO: f32 = 1.01;

/// Intersect the ray `p + t * dir` with the cylinder from `k0` to `k1`,
/// whose radius varies linearly between the keys' radii.
///
/// The hit's `u` is the normalized position along the segment (negated for
/// back-facing hits) and `v` the radius gradient.
#[allow(clippy::too_many_arguments)]
pub(crate) fn intersect(
    k0: &CurveKey,
    k1: &CurveKey,
    p: &Point3,
    dir: &Vec3,
    t_max: f32,
    settings: &CurveSettings,
    width: MinimumWidth,
    rng: Option<&mut dyn RngCore>,
) -> Option<CurveHit> {
    let p1 = k0.point();
    let p2 = k1.point();
    let (or1, or2) = (k0.radius, k1.radius);

    let dif = p - p1;
    let dif_second = p - p2;
    let (mut r1, mut r2) = (or1, or2);
    if width.is_active() {
        r1 = r1.max((dif.norm() * width.difl).min(width.extmax));
        r2 = r2.max((dif_second.norm() * width.difl).min(width.extmax));
    }

    let p21 = p2 - p1;
    let l = p21.norm();
    if l == 0.0 {
        return None;
    }
    let invl = 1.0 / l;
    let mr = r1.max(r2);

    // Bounding sphere around the segment midpoint.
    let sphere_dif1 = (dif + dif_second) * 0.5;
    let sphere_dif2 = sphere_dif1 - dir * dir.dot(&sphere_dif1);
    let sphere_r = mr + 0.5 * l;
    if sphere_r * sphere_r - sphere_dif2.norm_squared() < 0.0 {
        return None;
    }

    let tg = p21 * invl;
    let gd = (r2 - r1) * invl;
    let dirz = dir.dot(&tg);
    let difz = dif.dot(&tg);

    let a = 1.0 - dirz * dirz * (1.0 + gd * gd);
    let halfb = dir.dot(&dif) - dirz * (difz + gd * (difz * gd + r1));
    let tcentre = -halfb / a;
    let zcentre = difz + dirz * tcentre;

    // Closest approach of the ray to the segment axis.
    let cprod = tg.cross(dir);
    let cprod_sq = cprod.norm_squared();
    let dist_sq = if cprod_sq == 0.0 {
        tg.cross(&dif).norm_squared()
    } else {
        let d = cprod.dot(&dif);
        d * d / cprod_sq
    };
    if dist_sq > mr * mr {
        return None;
    }

    let tdif = dif + dir * tcentre;
    let tdifz = tdif.dot(&tg);
    let tdifma = tdifz * gd + r1;
    let tb = 2.0 * (dir.dot(&tdif) - dirz * (tdifz + gd * tdifma));
    let tc = tdif.norm_squared() - tdifz * tdifz - tdifma * tdifma;
    let td = tb * tb - 4.0 * a * tc;
    if td < 0.0 {
        return None;
    }

    let rootd = td.sqrt();
    let mut correction = (-tb - rootd) / (2.0 * a);
    let mut t = tcentre + correction;
    if t.is_nan() || t >= t_max {
        return None;
    }
    let mut z = zcentre + dirz * correction;

    let mut backface = false;
    if settings.backface && (t < 0.0 || z < 0.0 || z > l) {
        backface = true;
        correction = (-tb + rootd) / (2.0 * a);
        t = tcentre + correction;
        z = zcentre + dirz * correction;
    }

    let on_segment = t > 0.0 && t < t_max && z >= 0.0 && z <= l;
    if !on_segment {
        return None;
    }

    if settings.encasing
        && difz > -r1 * ENCASING_RATIO
        && dif_second.dot(&tg) < r2 * ENCASING_RATIO
    {
        let enc_gd = gd * ENCASING_RATIO;
        let enc_r1 = r1 * ENCASING_RATIO;
        let a2 = 1.0 - dirz * dirz * (1.0 + enc_gd * enc_gd);
        let c2 = dif.norm_squared()
            - difz * difz * (1.0 + enc_gd * enc_gd)
            - enc_r1 * enc_r1
            - 2.0 * r1 * difz * gd * ENCASING_RATIO;
        if a2 * c2 < 0.0 {
            return None;
        }
    }

    if width.is_active() {
        let coverage = (or1 + z * (or2 - or1) * invl) / (r1 + z * gd);
        if fade_rejects(rng, coverage) {
            return None;
        }
    }

    let u = z * invl;
    Some(CurveHit {
        t,
        u: if backface { -u } else { u },
        v: gd,
    })
}
