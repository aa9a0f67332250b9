//! Query entry points and feature dispatch.

use rand::RngCore;
use raycore_math::Point3;
use raycore_scene::{ObjectId, Scene, Visibility};
use rayon::prelude::*;

use crate::curve::MinimumWidth;
use crate::node_test::{MinimumWidthNodeTest, ScalarNodeTest};
use crate::refine::{self, CurvePoint};
use crate::subsurface::traverse_subsurface;
use crate::traversal::{
    traverse, AnyHit, Basic, ClosestHit, Hair, HairMinimumWidth, HairMotion, Instancing, Motion,
    Query,
};
use crate::{Intersection, Ray, SubsurfaceHits};

/// Ray queries against one scene.
///
/// Each query picks the traversal specialized for the features the scene
/// actually uses. The kernel only borrows the scene, so it is cheap to create
/// and can be shared across threads.
///
/// ```
/// use raycore_kernel::{Kernel, Ray};
/// use raycore_math::{Point3, Transform, Vec3};
/// use raycore_scene::{KernelSettings, Placement, SceneBuilder, Visibility};
///
/// let mut builder = SceneBuilder::new();
/// let tri = builder
///     .add_mesh(
///         &[
///             Point3::new(0.0, 0.0, 0.0),
///             Point3::new(1.0, 0.0, 0.0),
///             Point3::new(0.0, 1.0, 0.0),
///         ],
///         &[[0, 1, 2]],
///     )
///     .unwrap();
/// builder
///     .add_object(tri, Placement::World(Transform::identity()), Visibility::ALL)
///     .unwrap();
/// let scene = builder.build(KernelSettings::default()).unwrap();
///
/// let kernel = Kernel::new(&scene);
/// let ray = Ray::new(Point3::new(0.25, 0.25, -1.0), Vec3::z());
/// let hit = kernel.intersect_closest(&ray, Visibility::CAMERA);
/// assert!(hit.is_hit());
/// assert!((hit.t - 1.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Kernel<'s> {
    scene: &'s Scene,
}

impl<'s> Kernel<'s> {
    /// Create a kernel over `scene`.
    pub fn new(scene: &'s Scene) -> Self {
        Self { scene }
    }

    /// The scene being queried.
    pub fn scene(&self) -> &'s Scene {
        self.scene
    }

    /// Closest hit along `ray` among primitives visible to `visibility`.
    ///
    /// Minimum-width curves are widened but never faded.
    pub fn intersect_closest(&self, ray: &Ray, visibility: Visibility) -> Intersection {
        self.dispatch::<ClosestHit>(ray, visibility, None)
    }

    /// Closest hit, fading widened curves stochastically with `rng`.
    pub fn intersect_closest_stochastic(
        &self,
        ray: &Ray,
        visibility: Visibility,
        rng: &mut dyn RngCore,
    ) -> Intersection {
        self.dispatch::<ClosestHit>(ray, visibility, Some(rng))
    }

    /// Whether anything visible to `visibility` lies along `ray`.
    ///
    /// Curves are tested at their true width whatever the ray spread.
    pub fn intersect_any(&self, ray: &Ray, visibility: Visibility) -> bool {
        self.dispatch::<AnyHit>(ray, visibility, None).is_hit()
    }

    /// Triangle hits of `target` along `ray`, sampled down to `max_hits`.
    pub fn intersect_subsurface(
        &self,
        ray: &Ray,
        target: ObjectId,
        max_hits: usize,
        rng: &mut dyn RngCore,
    ) -> SubsurfaceHits {
        if self.scene.features().motion {
            traverse_subsurface::<Motion>(self.scene, ray, target, max_hits, rng)
        } else {
            traverse_subsurface::<Instancing>(self.scene, ray, target, max_hits, rng)
        }
    }

    /// Accurate world-space position of a triangle hit.
    pub fn refine_hit(&self, isect: &Intersection, ray: &Ray) -> Point3 {
        refine::refine_triangle(self.scene, isect, ray)
    }

    /// Position and local frame of a curve hit; `None` unless `isect` hit a
    /// curve.
    pub fn refine_curve(&self, isect: &Intersection, ray: &Ray) -> Option<CurvePoint> {
        refine::refine_curve(self.scene, isect, ray)
    }

    /// [`Kernel::intersect_closest`] for each ray, in parallel.
    #[tracing::instrument(skip_all, fields(rays = rays.len()))]
    pub fn intersect_closest_batch(&self, rays: &[Ray], visibility: Visibility) -> Vec<Intersection> {
        rays.par_iter()
            .map(|ray| self.intersect_closest(ray, visibility))
            .collect()
    }

    fn dispatch<Q: Query>(
        &self,
        ray: &Ray,
        visibility: Visibility,
        rng: Option<&mut dyn RngCore>,
    ) -> Intersection {
        let scene = self.scene;
        let features = scene.features();
        let curves = &scene.settings().curves;
        // Any-hit queries have no rng to fade with, so curves keep their true width.
        let width = if Q::ANY_HIT {
            MinimumWidth::NONE
        } else {
            MinimumWidth {
                difl: curves.difl(ray.spread),
                extmax: curves.maximum_width,
            }
        };
        let widened = MinimumWidthNodeTest {
            difl: width.difl,
            extmax: width.extmax,
        };

        match (features.motion, features.curves) {
            (true, true) if width.is_active() => {
                traverse::<HairMotion, Q, _>(scene, ray, visibility, &widened, width, rng)
            }
            (true, true) => {
                traverse::<HairMotion, Q, _>(scene, ray, visibility, &ScalarNodeTest, width, rng)
            }
            (true, false) => traverse::<Motion, Q, _>(
                scene,
                ray,
                visibility,
                &ScalarNodeTest,
                MinimumWidth::NONE,
                None,
            ),
            (false, true) if width.is_active() => {
                traverse::<HairMinimumWidth, Q, _>(scene, ray, visibility, &widened, width, rng)
            }
            (false, true) => traverse::<Hair, Q, _>(
                scene,
                ray,
                visibility,
                &ScalarNodeTest,
                MinimumWidth::NONE,
                None,
            ),
            (false, false) if features.instancing => traverse::<Instancing, Q, _>(
                scene,
                ray,
                visibility,
                &ScalarNodeTest,
                MinimumWidth::NONE,
                None,
            ),
            (false, false) => traverse::<Basic, Q, _>(
                scene,
                ray,
                visibility,
                &ScalarNodeTest,
                MinimumWidth::NONE,
                None,
            ),
        }
    }
}
