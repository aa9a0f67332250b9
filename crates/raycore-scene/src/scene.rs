//! The frozen scene: flat tables validated once and shared read-only by all
//! queries.

use crate::{
    BvhNode, CurveKey, CurveRecord, KernelSettings, LeafContent, LeafNode, NodeRef, NodeTarget,
    ObjectId, ObjectRecord, PrimId, PrimitiveKind, PrimitiveRecord, Result, SceneError,
    TriangleWoop,
};

/// Raw tables making up a scene.
///
/// The top-level BVH and every instanced object's BVH share `nodes` and
/// `leaves`; they differ only in their root.
#[derive(Debug, Clone, Default)]
pub struct SceneTables {
    /// Inner BVH nodes.
    pub nodes: Vec<BvhNode>,
    /// BVH leaves.
    pub leaves: Vec<LeafNode>,
    /// One record per primitive slot.
    pub prims: Vec<PrimitiveRecord>,
    /// Triangles in Woop form.
    pub triangles: Vec<TriangleWoop>,
    /// Curve key ranges.
    pub curves: Vec<CurveRecord>,
    /// Curve control points.
    pub keys: Vec<CurveKey>,
    /// Objects.
    pub objects: Vec<ObjectRecord>,
    /// Root of the top-level BVH; `None` for an empty scene.
    pub root: Option<NodeRef>,
}

/// Features present in a scene, used to pick a traversal specialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SceneFeatures {
    /// Some leaf enters an object's own BVH.
    pub instancing: bool,
    /// Some object moves over the shutter.
    pub motion: bool,
    /// Some primitive is a curve segment.
    pub curves: bool,
}

/// A validated, immutable scene.
#[derive(Debug, Clone)]
pub struct Scene {
    tables: SceneTables,
    settings: KernelSettings,
    features: SceneFeatures,
}

impl Scene {
    /// Validate `tables` and `settings` and freeze them into a scene.
    #[tracing::instrument(skip_all, fields(nodes = tables.nodes.len(), prims = tables.prims.len()))]
    pub fn new(tables: SceneTables, settings: KernelSettings) -> Result<Self> {
        settings.validate()?;
        validate_objects(&tables)?;
        validate_curves(&tables)?;
        validate_prims(&tables)?;
        validate_nodes(&tables)?;
        validate_leaves(&tables)?;
        validate_object_roots(&tables)?;
        if let Some(root) = tables.root {
            if !ref_in_range(&tables, root) {
                return Err(SceneError::InvalidRoot(root.raw()));
            }
        }

        let features = SceneFeatures {
            instancing: tables
                .leaves
                .iter()
                .any(|l| matches!(l.content(), LeafContent::Instance(_))),
            motion: tables.objects.iter().any(|o| o.motion.is_some()),
            curves: tables
                .prims
                .iter()
                .any(|p| matches!(p.kind, PrimitiveKind::CurveSegment { .. })),
        };
        tracing::debug!(
            leaves = tables.leaves.len(),
            triangles = tables.triangles.len(),
            curves = tables.curves.len(),
            objects = tables.objects.len(),
            ?features,
            "scene validated"
        );

        Ok(Self {
            tables,
            settings,
            features,
        })
    }

    /// A scene with no geometry.
    pub fn empty() -> Self {
        Self {
            tables: SceneTables::default(),
            settings: KernelSettings::default(),
            features: SceneFeatures::default(),
        }
    }

    /// Root of the top-level BVH.
    #[inline]
    pub fn root(&self) -> Option<NodeRef> {
        self.tables.root
    }

    /// Kernel settings.
    #[inline]
    pub fn settings(&self) -> &KernelSettings {
        &self.settings
    }

    /// Features present in the scene.
    #[inline]
    pub fn features(&self) -> SceneFeatures {
        self.features
    }

    /// Inner node `index`.
    #[inline]
    pub fn node(&self, index: usize) -> &BvhNode {
        &self.tables.nodes[index]
    }

    /// Leaf `index`.
    #[inline]
    pub fn leaf(&self, index: usize) -> &LeafNode {
        &self.tables.leaves[index]
    }

    /// Primitive record of slot `prim`.
    #[inline]
    pub fn prim(&self, prim: PrimId) -> &PrimitiveRecord {
        &self.tables.prims[prim.index()]
    }

    /// Triangle `index` in Woop form.
    #[inline]
    pub fn triangle(&self, index: u32) -> &TriangleWoop {
        &self.tables.triangles[index as usize]
    }

    /// Curve `index`.
    #[inline]
    pub fn curve(&self, index: u32) -> &CurveRecord {
        &self.tables.curves[index as usize]
    }

    /// Curve key `index`.
    #[inline]
    pub fn key(&self, index: usize) -> &CurveKey {
        &self.tables.keys[index]
    }

    /// Object `object`.
    #[inline]
    pub fn object(&self, object: ObjectId) -> &ObjectRecord {
        &self.tables.objects[object.index()]
    }

    /// Number of primitive slots.
    pub fn num_prims(&self) -> usize {
        self.tables.prims.len()
    }

    /// The four keys `[ka, k0, k1, kb]` around segment `segment` of curve
    /// `curve`; the segment runs from `k0` to `k1`.
    #[inline]
    pub fn curve_segment_keys(&self, curve: u32, segment: u32) -> [CurveKey; 4] {
        self.curve(curve)
            .segment_key_indices(segment)
            .map(|k| self.tables.keys[k])
    }

    /// Borrow the raw tables.
    pub fn tables(&self) -> &SceneTables {
        &self.tables
    }
}

fn ref_in_range(tables: &SceneTables, r: NodeRef) -> bool {
    match r.target() {
        NodeTarget::Inner(i) => i < tables.nodes.len(),
        NodeTarget::Leaf(i) => i < tables.leaves.len(),
        NodeTarget::Sentinel => false,
    }
}

fn validate_nodes(tables: &SceneTables) -> Result<()> {
    for (i, node) in tables.nodes.iter().enumerate() {
        for child in node.children {
            if !ref_in_range(tables, child) {
                return Err(SceneError::DanglingChild {
                    node: i,
                    child: child.raw(),
                });
            }
        }
    }
    Ok(())
}

fn validate_leaves(tables: &SceneTables) -> Result<()> {
    for (i, leaf) in tables.leaves.iter().enumerate() {
        match leaf.content() {
            LeafContent::Primitives(_) => {
                if leaf.end < leaf.start || leaf.end as usize > tables.prims.len() {
                    return Err(SceneError::LeafRange {
                        leaf: i,
                        start: leaf.start,
                        end: leaf.end,
                        count: tables.prims.len(),
                    });
                }
            }
            LeafContent::Instance(object) => {
                let rooted = tables
                    .objects
                    .get(object.index())
                    .is_some_and(|o| o.root.is_some());
                if !rooted {
                    return Err(SceneError::LeafObject {
                        leaf: i,
                        object: object.0,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Object hierarchies may only hold primitive leaves.
fn validate_object_roots(tables: &SceneTables) -> Result<()> {
    // Subtrees already walked for another object are known to be clean.
    let mut visited = vec![false; tables.nodes.len()];
    let mut stack = Vec::new();
    for (object, record) in tables.objects.iter().enumerate() {
        stack.extend(record.root);
        while let Some(node) = stack.pop() {
            match node.target() {
                NodeTarget::Inner(i) => {
                    if !std::mem::replace(&mut visited[i], true) {
                        stack.extend(tables.nodes[i].children);
                    }
                }
                NodeTarget::Leaf(i) => {
                    if let LeafContent::Instance(_) = tables.leaves[i].content() {
                        return Err(SceneError::NestedInstance { object, leaf: i });
                    }
                }
                NodeTarget::Sentinel => {}
            }
        }
    }
    Ok(())
}

fn validate_prims(tables: &SceneTables) -> Result<()> {
    for (i, prim) in tables.prims.iter().enumerate() {
        let (table, in_range) = match prim.kind {
            PrimitiveKind::Triangle => ("triangle", (prim.index as usize) < tables.triangles.len()),
            PrimitiveKind::CurveSegment { segment } => (
                "curve",
                tables
                    .curves
                    .get(prim.index as usize)
                    .is_some_and(|c| segment < c.num_segments()),
            ),
        };
        if !in_range {
            return Err(SceneError::PrimitiveIndex {
                prim: i,
                table,
                index: prim.index,
            });
        }
        if prim.object.index() >= tables.objects.len() {
            return Err(SceneError::PrimitiveIndex {
                prim: i,
                table: "object",
                index: prim.object.0,
            });
        }
    }
    Ok(())
}

fn validate_curves(tables: &SceneTables) -> Result<()> {
    for (i, curve) in tables.curves.iter().enumerate() {
        let end = curve.first_key as u64 + curve.num_keys as u64;
        if curve.num_keys < 2 || end > tables.keys.len() as u64 {
            return Err(SceneError::CurveKeys {
                curve: i,
                first: curve.first_key,
                end,
                count: tables.keys.len(),
            });
        }
    }
    Ok(())
}

fn validate_objects(tables: &SceneTables) -> Result<()> {
    for (i, object) in tables.objects.iter().enumerate() {
        if object.transform.inverse().is_none() || object.inverse.inverse().is_none() {
            return Err(SceneError::SingularTransform(i));
        }
        if let Some(root) = object.root {
            if !ref_in_range(tables, root) {
                return Err(SceneError::InvalidRoot(root.raw()));
            }
        }
    }
    Ok(())
}
