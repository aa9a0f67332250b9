//! Ray visibility masks.

use std::ops::{BitAnd, BitOr, BitOrAssign};

use bytemuck::{Pod, Zeroable};

/// Bitmask of ray types a primitive (or BVH subtree) is visible to.
///
/// A query passes its own mask; a primitive is considered only when the
/// masks intersect.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct Visibility(pub u32);

impl Visibility {
    /// Visible to nothing.
    pub const NONE: Visibility = Visibility(0);
    /// Camera rays.
    pub const CAMERA: Visibility = Visibility(1 << 0);
    /// Reflection rays.
    pub const REFLECT: Visibility = Visibility(1 << 1);
    /// Transmission rays.
    pub const TRANSMIT: Visibility = Visibility(1 << 2);
    /// Diffuse bounce rays.
    pub const DIFFUSE: Visibility = Visibility(1 << 3);
    /// Glossy bounce rays.
    pub const GLOSSY: Visibility = Visibility(1 << 4);
    /// Singular (mirror/glass) bounce rays.
    pub const SINGULAR: Visibility = Visibility(1 << 5);
    /// Transparent continuation rays.
    pub const TRANSPARENT: Visibility = Visibility(1 << 6);
    /// Opaque shadow rays.
    pub const SHADOW_OPAQUE: Visibility = Visibility(1 << 7);
    /// Transparent shadow rays.
    pub const SHADOW_TRANSPARENT: Visibility = Visibility(1 << 8);
    /// Set on subtrees that contain curve primitives.
    pub const CURVE: Visibility = Visibility(1 << 9);

    /// Both shadow ray kinds.
    pub const SHADOW: Visibility = Visibility(Self::SHADOW_OPAQUE.0 | Self::SHADOW_TRANSPARENT.0);
    /// Every ray kind. Does not include [`Visibility::CURVE`].
    pub const ALL: Visibility = Visibility((1 << 9) - 1);

    /// Whether any bit is shared with `other`.
    #[inline]
    pub fn intersects(self, other: Visibility) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether every bit of `other` is set in `self`.
    #[inline]
    pub fn contains(self, other: Visibility) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Visibility {
    type Output = Visibility;

    fn bitor(self, rhs: Self) -> Self {
        Visibility(self.0 | rhs.0)
    }
}

impl BitOrAssign for Visibility {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Visibility {
    type Output = Visibility;

    fn bitand(self, rhs: Self) -> Self {
        Visibility(self.0 & rhs.0)
    }
}
