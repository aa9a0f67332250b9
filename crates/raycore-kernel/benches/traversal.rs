use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use raycore_kernel::{Kernel, Ray};
use raycore_math::{Point3, Transform, Vec3};
use raycore_scene::{KernelSettings, Placement, Scene, SceneBuilder, Visibility};

/// A grid of `n * n` quads, either baked or instanced.
fn quad_grid(n: usize, instanced: bool) -> Scene {
    let mut builder = SceneBuilder::new();
    let quad = builder
        .add_mesh(
            &[
                Point3::new(-0.4, -0.4, 0.0),
                Point3::new(0.4, -0.4, 0.0),
                Point3::new(0.4, 0.4, 0.0),
                Point3::new(-0.4, 0.4, 0.0),
            ],
            &[[0, 1, 2], [0, 2, 3]],
        )
        .unwrap();
    for i in 0..n {
        for j in 0..n {
            let t = Transform::translation(i as f32, j as f32, ((i * 7 + j * 3) % 5) as f32);
            let placement = if instanced {
                Placement::Instance(t)
            } else {
                Placement::World(t)
            };
            builder.add_object(quad, placement, Visibility::ALL).unwrap();
        }
    }
    builder.build(KernelSettings::default()).unwrap()
}

fn random_rays(n: usize, count: usize) -> Vec<Ray> {
    let mut rng = Xoshiro256Plus::seed_from_u64(0x5eed);
    let extent = n as f32;
    (0..count)
        .map(|_| {
            let origin = Point3::new(
                rng.gen_range(0.0..extent),
                rng.gen_range(0.0..extent),
                -10.0,
            );
            let dir = Vec3::new(rng.gen_range(-0.2..0.2), rng.gen_range(-0.2..0.2), 1.0);
            Ray::new(origin, dir)
        })
        .collect()
}

fn bench_traversal(c: &mut Criterion) {
    let mut group = c.benchmark_group("traversal");
    let rays = random_rays(32, 1024);

    for instanced in [false, true] {
        let scene = quad_grid(32, instanced);
        let kernel = Kernel::new(&scene);
        let label = if instanced { "instanced" } else { "world" };

        group.bench_with_input(BenchmarkId::new("closest", label), &rays, |b, rays| {
            b.iter(|| {
                for ray in rays {
                    black_box(kernel.intersect_closest(ray, Visibility::CAMERA));
                }
            })
        });
        group.bench_with_input(BenchmarkId::new("any", label), &rays, |b, rays| {
            b.iter(|| {
                for ray in rays {
                    black_box(kernel.intersect_any(ray, Visibility::SHADOW_OPAQUE));
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_traversal);
criterion_main!(benches);
