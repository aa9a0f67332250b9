#![warn(missing_docs)]

//! Frozen scene tables for the raycore intersection kernel.
//!
//! A [`Scene`] owns flat, read-only tables: BVH nodes and leaves, triangles
//! in Woop form, curve keys, primitive records and objects. Tables are
//! validated once on construction and then shared by reference across every
//! query. [`SceneBuilder`] packs meshes, curves and placements into these
//! tables.

pub mod builder;
pub mod error;
mod handle;
mod node;
mod object;
mod primitive;
mod scene;
pub mod settings;
mod visibility;

pub use builder::{GeometryId, Placement, SceneBuilder};
pub use error::{Result, SceneError, SettingsError};
pub use handle::{NodeRef, NodeTarget, ObjectId, PrimId};
pub use node::{Aabb, BvhNode, LeafContent, LeafNode};
pub use object::ObjectRecord;
pub use primitive::{
    cardinal_bezier_hull, CurveKey, CurveRecord, PrimitiveKind, PrimitiveRecord, TriangleWoop,
    CARDINAL_TENSION,
};
pub use scene::{Scene, SceneFeatures, SceneTables};
pub use settings::{CurvePrimitive, CurveSettings, CurveShape, KernelSettings};
pub use visibility::Visibility;
