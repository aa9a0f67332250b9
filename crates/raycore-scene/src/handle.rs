//! Strongly-typed indices into the flat scene tables.

use bytemuck::{Pod, Zeroable};

/// Index of a primitive slot in the primitive table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimId(pub u32);

impl PrimId {
    /// Slot as a table index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of an object in the object table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// Object as a table index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where a [`NodeRef`] points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeTarget {
    /// An inner node with two children.
    Inner(usize),
    /// A leaf record.
    Leaf(usize),
    /// The end-of-traversal / instance-boundary marker.
    Sentinel,
}

/// A packed child reference as stored in BVH nodes.
///
/// Non-negative values index the inner-node table, negative values encode
/// leaf `-(value + 1)`. One reserved positive value is the traversal
/// sentinel.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct NodeRef(i32);

impl NodeRef {
    /// Marks the stack base and instance boundaries during traversal.
    pub const SENTINEL: NodeRef = NodeRef(0x7654_3210);

    /// Reference to inner node `index`.
    #[inline]
    pub fn inner(index: u32) -> Self {
        debug_assert!((index as i32) < Self::SENTINEL.0);
        Self(index as i32)
    }

    /// Reference to leaf `index`.
    #[inline]
    pub fn leaf(index: u32) -> Self {
        Self(-(index as i32) - 1)
    }

    /// The raw packed value.
    #[inline]
    pub fn raw(self) -> i32 {
        self.0
    }

    /// Whether this is the sentinel.
    #[inline]
    pub fn is_sentinel(self) -> bool {
        self == Self::SENTINEL
    }

    /// Whether this references an inner node.
    #[inline]
    pub fn is_inner(self) -> bool {
        self.0 >= 0 && !self.is_sentinel()
    }

    /// Decode the reference.
    #[inline]
    pub fn target(self) -> NodeTarget {
        if self.is_sentinel() {
            NodeTarget::Sentinel
        } else if self.0 >= 0 {
            NodeTarget::Inner(self.0 as usize)
        } else {
            NodeTarget::Leaf((-(self.0 + 1)) as usize)
        }
    }
}
