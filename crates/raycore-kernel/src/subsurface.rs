//! Multi-hit traversal restricted to one object, for subsurface scattering.

use rand::{Rng, RngCore};
use raycore_scene::{
    LeafContent, NodeRef, NodeTarget, ObjectId, PrimId, PrimitiveKind, Scene, Visibility,
};

use crate::instance::{self, InstanceFrame};
use crate::node_test::ScalarNodeTest;
use crate::ray::TraversalRay;
use crate::traversal::{descend, Features, TraversalStack};
use crate::triangle::woop_hit;
use crate::{Intersection, Ray, SubsurfaceHits};

/// Reservoir of at most `capacity` hits, uniform over every hit offered.
struct Reservoir<'r> {
    capacity: usize,
    hits: SubsurfaceHits,
    rng: &'r mut dyn RngCore,
}

impl Reservoir<'_> {
    fn offer(&mut self, hit: Intersection) {
        self.hits.num_hits += 1;
        let n = self.hits.num_hits;
        if n as usize <= self.capacity {
            self.hits.hits.push(hit);
        } else {
            let slot = self.rng.gen_range(0..n as usize);
            if slot < self.capacity {
                self.hits.hits[slot] = hit;
            }
        }
    }
}

/// Collect every triangle hit of `target` along `ray` within `ray.t_max`,
/// keeping a uniform sample of at most `max_hits`.
pub(crate) fn traverse_subsurface<F: Features>(
    scene: &Scene,
    ray: &Ray,
    target: ObjectId,
    max_hits: usize,
    rng: &mut dyn RngCore,
) -> SubsurfaceHits {
    let mut reservoir = Reservoir {
        capacity: max_hits,
        hits: SubsurfaceHits::default(),
        rng,
    };
    let Some(root) = scene.root() else {
        return reservoir.hits;
    };

    let mut stack = TraversalStack::new();
    let mut tray = TraversalRay::new(ray.origin, &ray.direction);
    let mut t_max = ray.t_max;
    let mut frame: Option<InstanceFrame> = None;
    let mut node = root;

    loop {
        loop {
            node = descend(
                scene,
                &ScalarNodeTest,
                &tray,
                t_max,
                Visibility::ALL,
                &mut stack,
                node,
            );
            let NodeTarget::Leaf(index) = node.target() else {
                break;
            };

            match scene.leaf(index).content() {
                LeafContent::Primitives(range) => {
                    node = stack.pop();
                    for slot in range {
                        let prim = PrimId(slot as u32);
                        let record = scene.prim(prim);
                        if record.kind != PrimitiveKind::Triangle {
                            continue;
                        }
                        // Shared instanced geometry may name another instancer.
                        if frame.is_none() && record.object != target {
                            continue;
                        }
                        let woop = scene.triangle(record.index);
                        let Some((t, u, v)) = woop_hit(woop, &tray.p, &tray.dir, t_max) else {
                            continue;
                        };
                        reservoir.offer(Intersection {
                            t: frame.map_or(t, |frame| frame.world_t(ray, t)),
                            u,
                            v,
                            prim: Some(prim),
                            object: frame.map(|_| target),
                            segment: None,
                        });
                    }
                }
                LeafContent::Instance(object) if F::INSTANCING && object == target => {
                    let record = scene.object(object);
                    match record.root {
                        Some(root) => {
                            let (entered, t) =
                                instance::push(record, ray, &mut tray, t_max, F::MOTION);
                            t_max = t;
                            frame = Some(entered);
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
        if let Some(entered) = frame.take() {
            instance::pop(&entered, ray, &mut tray, t_max);
            t_max = ray.t_max;
        }
        node = stack.pop();
        if node.is_sentinel() {
            break;
        }
    }

    reservoir.hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traversal::{Instancing, Motion};
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;
    use raycore_math::{MotionTransform, Point3, Transform, Vec3};
    use raycore_scene::{KernelSettings, Placement, SceneBuilder};

    fn slab(z: f32) -> (Vec<Point3>, Vec<[u32; 3]>) {
        (
            vec![
                Point3::new(-1.0, -1.0, z),
                Point3::new(1.0, -1.0, z),
                Point3::new(0.0, 1.0, z),
            ],
            vec![[0, 1, 2]],
        )
    }

    #[test]
    fn test_only_target_hits_are_counted() {
        let mut builder = SceneBuilder::new();
        let (p, t) = slab(0.0);
        let mesh = builder.add_mesh(&p, &t).unwrap();
        let target = builder
            .add_object(
                mesh,
                Placement::World(Transform::translation(0.0, 0.0, 1.0)),
                Visibility::ALL,
            )
            .unwrap();
        builder
            .add_object(
                mesh,
                Placement::World(Transform::translation(0.0, 0.0, 1.5)),
                Visibility::ALL,
            )
            .unwrap();
        let scene = builder.build(KernelSettings::default()).unwrap();
        let ray = Ray::new(Point3::new(0.0, 0.0, 0.0), Vec3::z());
        let mut rng = Xoshiro256Plus::seed_from_u64(3);
        let hits = traverse_subsurface::<Instancing>(&scene, &ray, target, 4, &mut rng);
        assert_eq!(hits.num_hits, 1);
        assert_eq!(hits.hits.len(), 1);
        assert_relative_eq!(hits.hits[0].t, 1.0, epsilon = 1e-5);
        assert!(hits.hits[0].object.is_none());
    }

    #[test]
    fn test_t_max_bounds_hits() {
        let mut builder = SceneBuilder::new();
        let mut positions = Vec::new();
        let mut triangles = Vec::new();
        for i in 0..6u32 {
            let (p, _) = slab(1.0 + i as f32);
            positions.extend(p);
            triangles.push([3 * i, 3 * i + 1, 3 * i + 2]);
        }
        let mesh = builder.add_mesh(&positions, &triangles).unwrap();
        let target = builder
            .add_object(mesh, Placement::World(Transform::identity()), Visibility::ALL)
            .unwrap();
        let scene = builder.build(KernelSettings::default()).unwrap();

        let ray = Ray::new(Point3::origin(), Vec3::z()).with_t_max(4.5);
        let mut rng = Xoshiro256Plus::seed_from_u64(5);
        let hits = traverse_subsurface::<Instancing>(&scene, &ray, target, 8, &mut rng);
        assert_eq!(hits.num_hits, 4);
        let mut ts: Vec<f32> = hits.hits.iter().map(|h| h.t).collect();
        ts.sort_by(f32::total_cmp);
        for (t, expected) in ts.iter().zip([1.0, 2.0, 3.0, 4.0]) {
            assert_relative_eq!(*t, expected, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_instanced_target_reports_world_t() {
        let mut builder = SceneBuilder::new();
        let (p, t) = slab(0.0);
        let mesh = builder.add_mesh(&p, &t).unwrap();
        let other = builder
            .add_object(
                mesh,
                Placement::Instance(Transform::translation(0.0, 0.0, 1.0)),
                Visibility::ALL,
            )
            .unwrap();
        let target = builder
            .add_object(
                mesh,
                Placement::Instance(
                    Transform::translation(0.0, 0.0, 3.0).then(&Transform::scale(2.0, 2.0, 2.0)),
                ),
                Visibility::ALL,
            )
            .unwrap();
        let scene = builder.build(KernelSettings::default()).unwrap();

        let ray = Ray::new(Point3::origin(), Vec3::z());
        let mut rng = Xoshiro256Plus::seed_from_u64(9);
        let hits = traverse_subsurface::<Instancing>(&scene, &ray, target, 2, &mut rng);
        assert_eq!(hits.num_hits, 1);
        assert_eq!(hits.hits[0].object, Some(target));
        assert_relative_eq!(hits.hits[0].t, 3.0, epsilon = 1e-5);

        let hits = traverse_subsurface::<Instancing>(&scene, &ray, other, 2, &mut rng);
        assert_eq!(hits.num_hits, 1);
        assert_relative_eq!(hits.hits[0].t, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_second_instancer_of_shared_mesh() {
        let mut builder = SceneBuilder::new();
        let (p, t) = slab(0.0);
        let mesh = builder.add_mesh(&p, &t).unwrap();
        let mut objects = Vec::new();
        for (z, mask) in [(1.0, Visibility::CAMERA), (2.0, Visibility::SHADOW), (3.0, Visibility::CAMERA)] {
            let object = builder
                .add_object(mesh, Placement::Instance(Transform::translation(0.0, 0.0, z)), mask)
                .unwrap();
            objects.push(object);
        }
        let scene = builder.build(KernelSettings::default()).unwrap();
        let ray = Ray::new(Point3::origin(), Vec3::z());
        let mut rng = Xoshiro256Plus::seed_from_u64(11);

        for (object, z) in [(objects[1], 2.0), (objects[2], 3.0)] {
            let hits = traverse_subsurface::<Instancing>(&scene, &ray, object, 4, &mut rng);
            assert_eq!(hits.num_hits, 1);
            assert_eq!(hits.hits[0].object, Some(object));
            assert_relative_eq!(hits.hits[0].t, z, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_moving_target_follows_ray_time() {
        let mut builder = SceneBuilder::new();
        let (p, t) = slab(0.0);
        let mesh = builder.add_mesh(&p, &t).unwrap();
        let motion = MotionTransform::from_transforms(
            &Transform::identity(),
            &Transform::translation(5.0, 0.0, 0.0),
            &Transform::translation(10.0, 0.0, 0.0),
        )
        .unwrap();
        let target = builder
            .add_object(mesh, Placement::Motion(motion), Visibility::ALL)
            .unwrap();
        let scene = builder.build(KernelSettings::default()).unwrap();
        let mut rng = Xoshiro256Plus::seed_from_u64(13);

        let ray = Ray::new(Point3::new(10.0, 0.0, -2.0), Vec3::z());
        let end = traverse_subsurface::<Motion>(&scene, &ray.with_time(1.0), target, 2, &mut rng);
        assert_eq!(end.num_hits, 1);
        assert_eq!(end.hits[0].object, Some(target));
        assert_relative_eq!(end.hits[0].t, 2.0, epsilon = 1e-4);

        let start = traverse_subsurface::<Motion>(&scene, &ray.with_time(0.0), target, 2, &mut rng);
        assert_eq!(start.num_hits, 0);
        assert!(start.hits.is_empty());
    }

    #[test]
    fn test_reservoir_is_uniform() {
        const LAYERS: usize = 8;
        const K: usize = 2;
        const TRIALS: usize = 20_000;

        let mut builder = SceneBuilder::new();
        let mut positions = Vec::new();
        let mut triangles = Vec::new();
        for i in 0..LAYERS as u32 {
            let (p, _) = slab(1.0 + i as f32);
            positions.extend(p);
            triangles.push([3 * i, 3 * i + 1, 3 * i + 2]);
        }
        let mesh = builder.add_mesh(&positions, &triangles).unwrap();
        let target = builder
            .add_object(mesh, Placement::World(Transform::identity()), Visibility::ALL)
            .unwrap();
        let scene = builder.build(KernelSettings::default()).unwrap();

        let ray = Ray::new(Point3::origin(), Vec3::z());
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let mut counts = [0usize; LAYERS];
        for _ in 0..TRIALS {
            let hits = traverse_subsurface::<Instancing>(&scene, &ray, target, K, &mut rng);
            assert_eq!(hits.num_hits as usize, LAYERS);
            assert_eq!(hits.hits.len(), K);
            for hit in &hits.hits {
                counts[(hit.t.round() as usize) - 1] += 1;
            }
        }

        let expected = (TRIALS * K) as f64 / LAYERS as f64;
        for count in counts {
            let ratio = count as f64 / expected;
            assert!((ratio - 1.0).abs() < 0.05, "ratio {ratio}");
        }
    }
}
