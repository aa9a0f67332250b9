//! BVH node and leaf records.
//!
//! Nodes are binary and store the boxes of both children so a single fetch
//! decides which children to visit. Leaves live in their own table.

use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use raycore_math::{Point3, Transform};

use crate::{NodeRef, ObjectId, Visibility};

/// Axis-aligned bounding box in 3D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Aabb {
    /// Create an AABB from min and max corners.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Create an empty (inverted) AABB suitable for expansion.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    /// Whether no point has been included yet.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand this AABB to include a point.
    pub fn include_point(&mut self, p: &Point3) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Expand this AABB to include another.
    pub fn include(&mut self, other: &Aabb) {
        if !other.is_empty() {
            self.include_point(&other.min);
            self.include_point(&other.max);
        }
    }

    /// Expand the AABB by `amount` in all directions.
    pub fn expand(&mut self, amount: f32) {
        self.min.x -= amount;
        self.min.y -= amount;
        self.min.z -= amount;
        self.max.x += amount;
        self.max.y += amount;
        self.max.z += amount;
    }

    /// Box centre.
    pub fn center(&self) -> Point3 {
        Point3::from((self.min.coords + self.max.coords) * 0.5)
    }

    /// Bounds of this box after transforming its eight corners.
    pub fn transformed(&self, t: &Transform) -> Aabb {
        let mut out = Aabb::empty();
        if self.is_empty() {
            return out;
        }
        for i in 0..8 {
            let corner = Point3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.include_point(&t.apply_point(&corner));
        }
        out
    }
}

/// An inner BVH node: the boxes and references of two children.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BvhNode {
    /// One row per axis: `[child0.min, child1.min, child0.max, child1.max]`.
    pub bounds: [[f32; 4]; 3],
    /// Child references.
    pub children: [NodeRef; 2],
    /// Union of the visibility of everything below each child.
    pub visibility: [Visibility; 2],
}

impl BvhNode {
    /// Pack two child boxes with their references and visibility.
    pub fn new(boxes: [Aabb; 2], children: [NodeRef; 2], visibility: [Visibility; 2]) -> Self {
        let [a, b] = boxes;
        Self {
            bounds: [
                [a.min.x, b.min.x, a.max.x, b.max.x],
                [a.min.y, b.min.y, a.max.y, b.max.y],
                [a.min.z, b.min.z, a.max.z, b.max.z],
            ],
            children,
            visibility,
        }
    }

    /// Unpack the box of child `i` (0 or 1).
    pub fn child_bounds(&self, i: usize) -> Aabb {
        let [x, y, z] = &self.bounds;
        Aabb::new(
            Point3::new(x[i], y[i], z[i]),
            Point3::new(x[i + 2], y[i + 2], z[i + 2]),
        )
    }
}

/// What a leaf resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafContent {
    /// A contiguous range of primitive slots.
    Primitives(Range<usize>),
    /// An instanced object whose own BVH is entered.
    Instance(ObjectId),
}

/// A BVH leaf: a primitive range, or an instance when `start` is negative.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct LeafNode {
    /// First primitive slot, or `-(object + 1)` for an instance leaf.
    pub start: i32,
    /// One past the last primitive slot (unused for instance leaves).
    pub end: i32,
    /// Union of the visibility of the leaf's content.
    pub visibility: Visibility,
    /// Keeps the record 16 bytes wide for upload.
    pub _pad: u32,
}

impl LeafNode {
    /// A leaf covering primitive slots `range`.
    pub fn primitives(range: Range<u32>, visibility: Visibility) -> Self {
        Self {
            start: range.start as i32,
            end: range.end as i32,
            visibility,
            _pad: 0,
        }
    }

    /// A leaf entering `object`'s BVH.
    pub fn instance(object: ObjectId, visibility: Visibility) -> Self {
        Self {
            start: -(object.0 as i32) - 1,
            end: 0,
            visibility,
            _pad: 0,
        }
    }

    /// Decode the leaf.
    #[inline]
    pub fn content(&self) -> LeafContent {
        if self.start >= 0 {
            LeafContent::Primitives(self.start as usize..self.end.max(self.start) as usize)
        } else {
            LeafContent::Instance(ObjectId((-(self.start + 1)) as u32))
        }
    }
}
