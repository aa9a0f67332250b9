#![warn(missing_docs)]

//! Ray/scene intersection kernel for the raycore renderer.
//!
//! The kernel walks the flattened BVH of a [`raycore_scene::Scene`] with an
//! explicit fixed-capacity stack. Each query kind runs a traversal
//! specialized at compile time for the features the scene uses (instancing,
//! object motion, curves, minimum-width curves), selected by [`Kernel`].
//!
//! Supported queries:
//! - closest hit, optionally fading minimum-width curves stochastically
//! - any hit, for shadow rays
//! - subsurface multi-hit sampling within one object
//! - hit refinement for triangles and curves, and surface offsetting

mod curve;
mod instance;
mod intersection;
mod kernel;
mod ray;
mod refine;
mod subsurface;
mod traversal;
mod triangle;

pub use curve::MinimumWidth;
pub use intersection::{Intersection, SubsurfaceHits};
pub use kernel::Kernel;
pub use node_test::{ChildHits, MinimumWidthNodeTest, NodeIntersector, ScalarNodeTest};
pub use ray::{clamp_direction, Ray, TraversalRay, OOEPS};
pub use refine::{offset_point, CurvePoint};
pub use traversal::{
    AnyHit, Basic, ClosestHit, Features, Hair, HairMinimumWidth, HairMotion, Instancing, Motion,
    Query, BVH_STACK_SIZE,
};
