//! The BVH traversal state machine.
//!
//! [`traverse`] is monomorphized over a [`Features`] set and a [`Query`]
//! kind, so disabled features compile out of the inner loop.

use rand::RngCore;
use raycore_scene::{
    LeafContent, NodeRef, NodeTarget, ObjectId, PrimId, PrimitiveKind, Scene, Visibility,
};

use crate::curve::{curve_intersect, reborrow_rng, MinimumWidth};
use crate::instance::{self, InstanceFrame};
use crate::node_test::NodeIntersector;
use crate::ray::TraversalRay;
use crate::triangle::triangle_intersect;
use crate::{Intersection, Ray};

/// Capacity of the traversal stack.
pub const BVH_STACK_SIZE: usize = 192;

/// Compile-time feature set of a traversal.
pub trait Features {
    /// Enter instanced objects' own BVHs.
    const INSTANCING: bool;
    /// Interpolate moving objects' transforms at the ray time.
    const MOTION: bool;
    /// Intersect curve segments.
    const HAIR: bool;
    /// Widen curves to a minimum width.
    const HAIR_MINIMUM_WIDTH: bool;
}

macro_rules! feature_set {
    ($(#[$doc:meta])* $name:ident, $instancing:expr, $motion:expr, $hair:expr, $min_width:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl Features for $name {
            const INSTANCING: bool = $instancing;
            const MOTION: bool = $motion;
            const HAIR: bool = $hair;
            const HAIR_MINIMUM_WIDTH: bool = $min_width;
        }
    };
}

feature_set!(
    /// Triangles in a single world-space BVH.
    Basic, false, false, false, false
);
feature_set!(
    /// Triangles with instancing.
    Instancing, true, false, false, false
);
feature_set!(
    /// Triangles and curves with instancing.
    Hair, true, false, true, false
);
feature_set!(
    /// Triangles and minimum-width curves with instancing.
    HairMinimumWidth, true, false, true, true
);
feature_set!(
    /// Triangles with moving instances.
    Motion, true, true, false, false
);
feature_set!(
    /// Everything.
    HairMotion, true, true, true, true
);

/// What a traversal is looking for.
pub trait Query {
    /// Stop at the first accepted hit instead of the closest.
    const ANY_HIT: bool;
}

/// Find the closest hit.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClosestHit;

impl Query for ClosestHit {
    const ANY_HIT: bool = false;
}

/// Find whether anything is hit.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyHit;

impl Query for AnyHit {
    const ANY_HIT: bool = true;
}

/// Fixed-capacity stack of node references with a sentinel at its base.
pub(crate) struct TraversalStack {
    entries: [NodeRef; BVH_STACK_SIZE],
    len: usize,
}

impl TraversalStack {
    pub fn new() -> Self {
        Self {
            entries: [NodeRef::SENTINEL; BVH_STACK_SIZE],
            len: 1,
        }
    }

    #[inline]
    pub fn push(&mut self, node: NodeRef) {
        debug_assert!(self.len < BVH_STACK_SIZE, "BVH traversal stack overflow");
        self.entries[self.len] = node;
        self.len += 1;
    }

    /// Pop the top entry. Popping the base sentinel empties the stack; later
    /// pops keep returning the sentinel.
    #[inline]
    pub fn pop(&mut self) -> NodeRef {
        if self.len == 0 {
            return NodeRef::SENTINEL;
        }
        self.len -= 1;
        self.entries[self.len]
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Descend through inner nodes from `node` until reaching a leaf or a
/// sentinel, pushing far children.
#[inline]
pub(crate) fn descend<N: NodeIntersector>(
    scene: &Scene,
    node_test: &N,
    tray: &TraversalRay,
    t: f32,
    visibility: Visibility,
    stack: &mut TraversalStack,
    mut node: NodeRef,
) -> NodeRef {
    while let NodeTarget::Inner(index) = node.target() {
        let inner = scene.node(index);
        let hits = node_test.intersect(inner, tray, t, visibility);
        node = match hits.traverse {
            [true, true] => {
                let (near, far) = if hits.closest_child1 {
                    (inner.children[1], inner.children[0])
                } else {
                    (inner.children[0], inner.children[1])
                };
                stack.push(far);
                near
            }
            [true, false] => inner.children[0],
            [false, true] => inner.children[1],
            [false, false] => stack.pop(),
        };
    }
    node
}

/// Walk the scene BVH for `ray`.
///
/// `width` applies to curve tests when `F::HAIR_MINIMUM_WIDTH` is set; `rng`
/// drives the minimum-width fade.
pub(crate) fn traverse<F: Features, Q: Query, N: NodeIntersector>(
    scene: &Scene,
    ray: &Ray,
    visibility: Visibility,
    node_test: &N,
    width: MinimumWidth,
    mut rng: Option<&mut dyn RngCore>,
) -> Intersection {
    let mut isect = Intersection::miss(ray.t_max);
    let Some(root) = scene.root() else {
        return isect;
    };
    let width = if F::HAIR_MINIMUM_WIDTH {
        width
    } else {
        MinimumWidth::NONE
    };

    let mut stack = TraversalStack::new();
    let mut tray = TraversalRay::new(ray.origin, &ray.direction);
    let mut instance: Option<(ObjectId, InstanceFrame)> = None;
    let mut node = root;

    loop {
        loop {
            node = descend(scene, node_test, &tray, isect.t, visibility, &mut stack, node);
            let NodeTarget::Leaf(index) = node.target() else {
                break;
            };

            let leaf = scene.leaf(index);
            match leaf.content() {
                // A leaf root has no parent node mask.
                _ if !leaf.visibility.intersects(visibility) => node = stack.pop(),
                LeafContent::Primitives(range) => {
                    node = stack.pop();
                    let object = instance.map(|(object, _)| object);
                    for slot in range {
                        let prim = PrimId(slot as u32);
                        let hit = match scene.prim(prim).kind {
                            PrimitiveKind::Triangle => triangle_intersect(
                                scene, &mut isect, &tray.p, &tray.dir, visibility, object, prim,
                            ),
                            PrimitiveKind::CurveSegment { .. } if F::HAIR => curve_intersect(
                                scene,
                                &mut isect,
                                &tray.p,
                                &tray.dir,
                                visibility,
                                object,
                                prim,
                                width,
                                reborrow_rng(&mut rng),
                            ),
                            PrimitiveKind::CurveSegment { .. } => false,
                        };
                        if hit && Q::ANY_HIT {
                            if let Some((_, frame)) = instance {
                                isect.t = instance::pop(&frame, ray, &mut tray, isect.t);
                            }
                            return isect;
                        }
                    }
                }
                LeafContent::Instance(object) if F::INSTANCING => {
                    let record = scene.object(object);
                    match record.root {
                        Some(root) => {
                            let (frame, t) =
                                instance::push(record, ray, &mut tray, isect.t, F::MOTION);
                            isect.t = t;
                            instance = Some((object, frame));
                            stack.push(NodeRef::SENTINEL);
                            node = root;
                        }
                        None => node = stack.pop(),
                    }
                }
                LeafContent::Instance(_) => node = stack.pop(),
            }

            if node.is_sentinel() {
                break;
            }
        }

        if stack.is_empty() {
            break;
        }
        if let Some((_, frame)) = instance.take() {
            isect.t = instance::pop(&frame, ray, &mut tray, isect.t);
        }
        node = stack.pop();
        if node.is_sentinel() {
            break;
        }
    }

    isect
}
