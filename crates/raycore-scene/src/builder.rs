//! Reference scene packer.
//!
//! Turns meshes, curves and object placements into the flat tables consumed
//! by the kernel. The hierarchy is built with a median split on the longest
//! centroid axis; it is meant for tests and benchmarks, not production
//! renders.

use std::collections::HashMap;

use raycore_math::{MotionTransform, Point3, Transform};

use crate::primitive::cardinal_bezier_hull;
use crate::{
    Aabb, BvhNode, CurveKey, CurveRecord, KernelSettings, LeafNode, NodeRef, ObjectId,
    ObjectRecord, PrimitiveKind, PrimitiveRecord, Result, Scene, SceneError, SceneTables,
    TriangleWoop, Visibility,
};

/// Maximum number of primitives in a leaf.
const MAX_LEAF_PRIMS: usize = 4;

/// Root, bounds and visibility of a packed hierarchy.
type Subtree = (NodeRef, Aabb, Visibility);

/// Number of shutter samples used to bound a moving instance.
const MOTION_BOUND_STEPS: usize = 16;

/// Identifies a geometry registered with a [`SceneBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryId(pub usize);

/// How an object places its geometry in the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    /// Bake the transform into world-space primitives in the top-level BVH.
    World(Transform),
    /// Reference the geometry's own BVH through an instance leaf.
    Instance(Transform),
    /// Instance following a transform that changes over the shutter.
    Motion(MotionTransform),
}

#[derive(Debug, Clone)]
enum Geometry {
    Mesh {
        positions: Vec<Point3>,
        triangles: Vec<[u32; 3]>,
    },
    Curves {
        curves: Vec<Vec<CurveKey>>,
    },
}

#[derive(Debug, Clone, Copy)]
struct ObjectInput {
    geometry: GeometryId,
    placement: Placement,
    visibility: Visibility,
}

/// What a build item turns into when it lands in a leaf.
#[derive(Debug, Clone, Copy)]
enum ItemKind {
    Prim(PrimitiveRecord),
    Instance(ObjectId),
}

#[derive(Debug, Clone, Copy)]
struct BuildItem {
    bounds: Aabb,
    centroid: Point3,
    visibility: Visibility,
    kind: ItemKind,
}

impl BuildItem {
    fn new(bounds: Aabb, visibility: Visibility, kind: ItemKind) -> Self {
        Self {
            bounds,
            centroid: bounds.center(),
            visibility,
            kind,
        }
    }
}

/// Collects geometry and objects, then packs them into a [`Scene`].
///
/// ```
/// use raycore_math::{Point3, Transform};
/// use raycore_scene::{KernelSettings, Placement, SceneBuilder, Visibility};
///
/// let mut builder = SceneBuilder::new();
/// let quad = builder
///     .add_mesh(
///         &[
///             Point3::new(0.0, 0.0, 0.0),
///             Point3::new(1.0, 0.0, 0.0),
///             Point3::new(1.0, 1.0, 0.0),
///             Point3::new(0.0, 1.0, 0.0),
///         ],
///         &[[0, 1, 2], [0, 2, 3]],
///     )
///     .unwrap();
/// builder
///     .add_object(quad, Placement::World(Transform::identity()), Visibility::ALL)
///     .unwrap();
/// let scene = builder.build(KernelSettings::default()).unwrap();
/// assert_eq!(scene.num_prims(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SceneBuilder {
    geometry: Vec<Geometry>,
    objects: Vec<ObjectInput>,
}

/// Tables under construction.
#[derive(Default)]
struct Packer {
    tables: SceneTables,
    degenerate_triangles: usize,
}

impl SceneBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a triangle mesh.
    pub fn add_mesh(&mut self, positions: &[Point3], triangles: &[[u32; 3]]) -> Result<GeometryId> {
        let id = self.geometry.len();
        if triangles.is_empty() {
            return Err(SceneError::EmptyGeometry(id));
        }
        for (t, tri) in triangles.iter().enumerate() {
            if let Some(&vertex) = tri.iter().find(|&&v| v as usize >= positions.len()) {
                return Err(SceneError::MissingVertex {
                    geometry: id,
                    triangle: t,
                    vertex,
                });
            }
        }
        self.geometry.push(Geometry::Mesh {
            positions: positions.to_vec(),
            triangles: triangles.to_vec(),
        });
        Ok(GeometryId(id))
    }

    /// Register a set of curves, each a run of at least two keys.
    ///
    /// Curves with fewer keys are dropped with a warning.
    pub fn add_curves(&mut self, curves: &[Vec<CurveKey>]) -> Result<GeometryId> {
        let id = self.geometry.len();
        let kept: Vec<Vec<CurveKey>> = curves.iter().filter(|c| c.len() >= 2).cloned().collect();
        if kept.len() < curves.len() {
            tracing::warn!(
                geometry = id,
                dropped = curves.len() - kept.len(),
                "dropping curves with fewer than two keys"
            );
        }
        if kept.is_empty() {
            return Err(SceneError::EmptyGeometry(id));
        }
        self.geometry.push(Geometry::Curves { curves: kept });
        Ok(GeometryId(id))
    }

    /// Place `geometry` in the scene.
    pub fn add_object(
        &mut self,
        geometry: GeometryId,
        placement: Placement,
        visibility: Visibility,
    ) -> Result<ObjectId> {
        if geometry.0 >= self.geometry.len() {
            return Err(SceneError::UnknownGeometry(geometry.0));
        }
        self.objects.push(ObjectInput {
            geometry,
            placement,
            visibility,
        });
        Ok(ObjectId(self.objects.len() as u32 - 1))
    }

    /// Pack everything into a validated scene.
    #[tracing::instrument(skip_all, fields(geometry = self.geometry.len(), objects = self.objects.len()))]
    pub fn build(self, settings: KernelSettings) -> Result<Scene> {
        let mut packer = Packer::default();
        // Keyed on the instancer's mask too, since prim records carry it.
        let mut instanced_roots: HashMap<(GeometryId, Visibility), Option<Subtree>> = HashMap::new();
        let mut top_items = Vec::new();

        for (index, input) in self.objects.iter().enumerate() {
            let object = ObjectId(index as u32);
            let geometry = &self.geometry[input.geometry.0];
            match input.placement {
                Placement::World(transform) => {
                    let inverse = transform
                        .inverse()
                        .ok_or(SceneError::SingularTransform(index))?;
                    packer.tables.objects.push(ObjectRecord {
                        transform,
                        inverse,
                        motion: None,
                        root: None,
                    });
                    packer.push_geometry(geometry, &transform, object, input.visibility, &mut top_items);
                }
                Placement::Instance(_) | Placement::Motion(_) => {
                    let key = (input.geometry, input.visibility);
                    let entry = match instanced_roots.get(&key) {
                        Some(entry) => *entry,
                        None => {
                            let mut items = Vec::new();
                            packer.push_geometry(
                                geometry,
                                &Transform::identity(),
                                object,
                                input.visibility,
                                &mut items,
                            );
                            let entry = (!items.is_empty()).then(|| packer.build_hierarchy(&mut items));
                            instanced_roots.insert(key, entry);
                            entry
                        }
                    };
                    let Some((root, local_bounds, visibility)) = entry else {
                        tracing::warn!(object = index, "instanced geometry has no primitives, skipping");
                        packer.tables.objects.push(ObjectRecord::world());
                        continue;
                    };
                    let record = match input.placement {
                        Placement::Motion(motion) => ObjectRecord::moving(motion, root),
                        Placement::Instance(transform) | Placement::World(transform) => {
                            ObjectRecord::instance(transform, root)
                        }
                    }
                    .ok_or(SceneError::SingularTransform(index))?;

                    let bounds = match &record.motion {
                        None => local_bounds.transformed(&record.transform),
                        Some(motion) => motion_bounds(&local_bounds, motion),
                    };
                    packer.tables.objects.push(record);
                    let curve_bit = visibility & Visibility::CURVE;
                    top_items.push(BuildItem::new(
                        bounds,
                        input.visibility | curve_bit,
                        ItemKind::Instance(object),
                    ));
                }
            }
        }

        if !top_items.is_empty() {
            let (root, _, _) = packer.build_hierarchy(&mut top_items);
            packer.tables.root = Some(root);
        }
        if packer.degenerate_triangles > 0 {
            tracing::warn!(
                count = packer.degenerate_triangles,
                "skipped degenerate triangles"
            );
        }

        Scene::new(packer.tables, settings)
    }
}

impl Packer {
    /// Append `geometry` placed by `transform` to the primitive tables and
    /// emit one build item per primitive.
    fn push_geometry(
        &mut self,
        geometry: &Geometry,
        transform: &Transform,
        object: ObjectId,
        visibility: Visibility,
        items: &mut Vec<BuildItem>,
    ) {
        match geometry {
            Geometry::Mesh {
                positions,
                triangles,
            } => {
                let placed: Vec<Point3> = positions.iter().map(|p| transform.apply_point(p)).collect();
                for tri in triangles {
                    let [a, b, c] = tri.map(|v| placed[v as usize]);
                    let woop = TriangleWoop::from_vertices(&a, &b, &c);
                    if woop.is_degenerate() {
                        self.degenerate_triangles += 1;
                        continue;
                    }
                    let index = self.tables.triangles.len() as u32;
                    self.tables.triangles.push(woop);

                    let mut bounds = Aabb::empty();
                    for p in [a, b, c] {
                        bounds.include_point(&p);
                    }
                    let record = PrimitiveRecord {
                        kind: PrimitiveKind::Triangle,
                        index,
                        object,
                        visibility,
                    };
                    items.push(BuildItem::new(bounds, visibility, ItemKind::Prim(record)));
                }
            }
            Geometry::Curves { curves } => {
                let det = transform.matrix.fixed_view::<3, 3>(0, 0).into_owned().determinant();
                let radius_scale = det.abs().cbrt();
                for keys in curves {
                    let curve = CurveRecord {
                        first_key: self.tables.keys.len() as u32,
                        num_keys: keys.len() as u32,
                    };
                    self.tables.keys.extend(keys.iter().map(|k| {
                        CurveKey::new(transform.apply_point(&k.point()), k.radius * radius_scale)
                    }));
                    let index = self.tables.curves.len() as u32;
                    self.tables.curves.push(curve);

                    let visibility = visibility | Visibility::CURVE;
                    for segment in 0..curve.num_segments() {
                        let bounds = self.curve_segment_bounds(&curve, segment);
                        let record = PrimitiveRecord {
                            kind: PrimitiveKind::CurveSegment { segment },
                            index,
                            object,
                            visibility,
                        };
                        items.push(BuildItem::new(bounds, visibility, ItemKind::Prim(record)));
                    }
                }
            }
        }
    }

    fn curve_segment_bounds(&self, curve: &CurveRecord, segment: u32) -> Aabb {
        let keys = curve
            .segment_key_indices(segment)
            .map(|k| self.tables.keys[k]);
        let hull = cardinal_bezier_hull(&keys.map(|k| k.point()));
        let mut bounds = Aabb::empty();
        for p in &hull {
            bounds.include_point(p);
        }
        bounds.expand(keys[1].radius.max(keys[2].radius));
        bounds
    }

    /// Build a hierarchy over `items`, returning its root, bounds and
    /// visibility. `items` must not be empty.
    fn build_hierarchy(&mut self, items: &mut [BuildItem]) -> Subtree {
        let mut bounds = Aabb::empty();
        let mut visibility = Visibility::NONE;
        for item in items.iter() {
            bounds.include(&item.bounds);
            visibility |= item.visibility;
        }

        let all_prims = items.iter().all(|i| matches!(i.kind, ItemKind::Prim(_)));
        if items.len() == 1 || (all_prims && items.len() <= MAX_LEAF_PRIMS) {
            let leaf = match items[0].kind {
                ItemKind::Instance(object) if items.len() == 1 => LeafNode::instance(object, visibility),
                _ => {
                    let start = self.tables.prims.len() as u32;
                    self.tables.prims.extend(items.iter().filter_map(|i| match i.kind {
                        ItemKind::Prim(record) => Some(record),
                        ItemKind::Instance(_) => None,
                    }));
                    LeafNode::primitives(start..self.tables.prims.len() as u32, visibility)
                }
            };
            self.tables.leaves.push(leaf);
            let leaf_ref = NodeRef::leaf(self.tables.leaves.len() as u32 - 1);
            return (leaf_ref, bounds, visibility);
        }

        let mut centroids = Aabb::empty();
        for item in items.iter() {
            centroids.include_point(&item.centroid);
        }
        let extent = centroids.max - centroids.min;
        let axis = extent.imax();
        let mid = items.len() / 2;
        items.select_nth_unstable_by(mid, |a, b| a.centroid[axis].total_cmp(&b.centroid[axis]));

        // Reserve this node, then fill in the children once they exist.
        let index = self.tables.nodes.len();
        self.tables.nodes.push(BvhNode::new(
            [Aabb::empty(), Aabb::empty()],
            [NodeRef::SENTINEL; 2],
            [Visibility::NONE; 2],
        ));
        let (left, right) = items.split_at_mut(mid);
        let (left_ref, left_bounds, left_vis) = self.build_hierarchy(left);
        let (right_ref, right_bounds, right_vis) = self.build_hierarchy(right);
        self.tables.nodes[index] = BvhNode::new(
            [left_bounds, right_bounds],
            [left_ref, right_ref],
            [left_vis, right_vis],
        );

        (NodeRef::inner(index as u32), bounds, visibility)
    }
}

/// Bounds of `local` swept by `motion` over the shutter.
fn motion_bounds(local: &Aabb, motion: &MotionTransform) -> Aabb {
    let mut bounds = Aabb::empty();
    for step in 0..=MOTION_BOUND_STEPS {
        let time = step as f32 / MOTION_BOUND_STEPS as f32;
        bounds.include(&local.transformed(&motion.at(time)));
    }
    // Rotation between samples can bulge past the sampled boxes.
    let margin = (bounds.max - bounds.min).norm() / MOTION_BOUND_STEPS as f32;
    bounds.expand(margin);
    bounds
}
