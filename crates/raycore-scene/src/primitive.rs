//! Primitive tables: Woop-form triangles, curve keys and primitive records.

use bytemuck::{Pod, Zeroable};
use raycore_math::{Point3, Transform, Vec3, Vec4};

use crate::{ObjectId, Visibility};

/// Tension of the cardinal spline through curve keys.
pub const CARDINAL_TENSION: f32 = 0.71;

/// A triangle stored as the inverse of its edge basis.
///
/// For vertices `v0, v1, v2`, the basis `[v1 - v0, v2 - v0, n | v0]` maps the
/// unit triangle onto the real one. Its inverse rows give, for any point, the
/// signed distance to the triangle plane (`rows[0]`, negated) and the
/// barycentric weights of `v1` (`rows[1]`) and `v2` (`rows[2]`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TriangleWoop {
    /// Plane row, then the two barycentric rows.
    pub rows: [[f32; 4]; 3],
}

impl TriangleWoop {
    /// Woop rows of a degenerate triangle; never intersected.
    pub const DEGENERATE: TriangleWoop = TriangleWoop { rows: [[0.0; 4]; 3] };

    /// Precompute the Woop form of triangle `v0, v1, v2`.
    pub fn from_vertices(v0: &Point3, v1: &Point3, v2: &Point3) -> Self {
        let e1 = v1 - v0;
        let e2 = v2 - v0;
        let n = e1.cross(&e2);
        if e1 == Vec3::zeros() || e2 == Vec3::zeros() || n == Vec3::zeros() {
            return Self::DEGENERATE;
        }

        let Some(inv) = Transform::from_columns(&e1, &e2, &n, v0).inverse() else {
            return Self::DEGENERATE;
        };
        let x = inv.row(0);
        let y = inv.row(1);
        let z = inv.row(2);
        Self {
            rows: [
                [z.x, z.y, z.z, -z.w],
                [x.x, x.y, x.z, x.w],
                [y.x, y.y, y.z, y.w],
            ],
        }
    }

    /// Whether these rows came from a degenerate triangle.
    pub fn is_degenerate(&self) -> bool {
        *self == Self::DEGENERATE
    }

    /// Row `i` as a vector.
    #[inline]
    pub fn row(&self, i: usize) -> Vec4 {
        Vec4::from(self.rows[i])
    }
}

/// A curve control point with its radius.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CurveKey {
    /// Control point position.
    pub position: [f32; 3],
    /// Curve radius at this key.
    pub radius: f32,
}

impl CurveKey {
    /// Create a key at `position` with `radius`.
    pub fn new(position: Point3, radius: f32) -> Self {
        Self {
            position: [position.x, position.y, position.z],
            radius,
        }
    }

    /// Position as a point.
    #[inline]
    pub fn point(&self) -> Point3 {
        Point3::new(self.position[0], self.position[1], self.position[2])
    }
}

/// A curve: a run of consecutive keys in the key table.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct CurveRecord {
    /// Index of the first key.
    pub first_key: u32,
    /// Number of keys; a curve with `n` keys has `n - 1` segments.
    pub num_keys: u32,
}

impl CurveRecord {
    /// Number of segments.
    pub fn num_segments(&self) -> u32 {
        self.num_keys.saturating_sub(1)
    }

    /// Key indices `[ka, k0, k1, kb]` around `segment`, clamped at the curve
    /// ends so the first and last segments repeat their end key.
    pub fn segment_key_indices(&self, segment: u32) -> [usize; 4] {
        let first = self.first_key as usize;
        let last = first + self.num_keys as usize - 1;
        let k0 = first + segment as usize;
        let k1 = k0 + 1;
        let ka = if k0 > first { k0 - 1 } else { first };
        let kb = (k1 + 1).min(last);
        [ka, k0, k1, kb]
    }
}

/// What kind of primitive a slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    /// A triangle; `index` addresses the Woop table.
    Triangle,
    /// One segment of a curve; `index` addresses the curve table.
    CurveSegment {
        /// Segment within the curve.
        segment: u32,
    },
}

/// Per-slot primitive record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveRecord {
    /// Triangle or curve.
    pub kind: PrimitiveKind,
    /// Index into the triangle or curve table.
    pub index: u32,
    /// Object owning this primitive.
    pub object: ObjectId,
    /// Ray types the primitive is visible to.
    pub visibility: Visibility,
}

impl PrimitiveRecord {
    /// Curve segment index, if this is a curve primitive.
    pub fn segment(&self) -> Option<u32> {
        match self.kind {
            PrimitiveKind::Triangle => None,
            PrimitiveKind::CurveSegment { segment } => Some(segment),
        }
    }
}

/// Control points of the cubic Bézier equal to the cardinal segment through
/// `p0..p3` (the curve runs from `p1` to `p2`).
pub fn cardinal_bezier_hull(p: &[Point3; 4]) -> [Point3; 4] {
    let fc = CARDINAL_TENSION / 3.0;
    [
        p[1],
        p[1] + (p[2] - p[0]) * fc,
        p[2] - (p[3] - p[1]) * fc,
        p[2],
    ]
}
