//! Error types for scene tables and settings.

use thiserror::Error;

/// Errors raised while parsing or validating kernel settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The TOML document could not be parsed.
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is outside its accepted range.
    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Errors raised while validating or packing scene tables.
#[derive(Error, Debug)]
pub enum SceneError {
    /// An inner node points at a child that does not exist.
    #[error("node {node} references missing child {child}")]
    DanglingChild {
        /// Index of the offending node.
        node: usize,
        /// Raw child reference.
        child: i32,
    },

    /// The scene or object root does not reference a node or leaf.
    #[error("root reference {0} is not a valid node")]
    InvalidRoot(i32),

    /// A leaf's primitive range falls outside the primitive table.
    #[error("leaf {leaf} primitive range {start}..{end} exceeds {count} primitives")]
    LeafRange {
        /// Index of the offending leaf.
        leaf: usize,
        /// Range start.
        start: i32,
        /// Range end (exclusive).
        end: i32,
        /// Number of primitives in the table.
        count: usize,
    },

    /// A leaf instances an object that does not exist or has no BVH.
    #[error("leaf {leaf} instances object {object} which has no BVH root")]
    LeafObject {
        /// Index of the offending leaf.
        leaf: usize,
        /// Object index encoded in the leaf.
        object: u32,
    },

    /// An object's BVH reaches another instance; instancing is one level deep.
    #[error("object {object} reaches instance leaf {leaf} below its root")]
    NestedInstance {
        /// Object whose hierarchy holds the instance.
        object: usize,
        /// Index of the instance leaf.
        leaf: usize,
    },

    /// A primitive record indexes past one of the tables.
    #[error("primitive {prim} references missing {table} entry {index}")]
    PrimitiveIndex {
        /// Primitive slot.
        prim: usize,
        /// Name of the table being indexed.
        table: &'static str,
        /// Index that was out of range.
        index: u32,
    },

    /// A curve's key range is invalid.
    #[error("curve {curve} key range {first}..{end} is invalid for {count} keys")]
    CurveKeys {
        /// Curve index.
        curve: usize,
        /// First key.
        first: u32,
        /// One past the last key.
        end: u64,
        /// Number of keys in the table.
        count: usize,
    },

    /// An object's transform cannot be inverted.
    #[error("object {0} has a non-invertible transform")]
    SingularTransform(usize),

    /// A geometry passed to the builder has no primitives.
    #[error("geometry {0} has no primitives")]
    EmptyGeometry(usize),

    /// A geometry passed to the builder indexes past its vertex list.
    #[error("geometry {geometry} triangle {triangle} references missing vertex {vertex}")]
    MissingVertex {
        /// Geometry index.
        geometry: usize,
        /// Triangle index within the geometry.
        triangle: usize,
        /// Vertex index that was out of range.
        vertex: u32,
    },

    /// An object references a geometry id the builder never issued.
    #[error("unknown geometry {0}")]
    UnknownGeometry(usize),

    /// The settings attached to the scene are invalid.
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Result type for scene operations.
pub type Result<T> = std::result::Result<T, SceneError>;
