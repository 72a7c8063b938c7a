//! Renders a field of random spheres above a large ground sphere, polling
//! progress the way a presentation layer would, then writes the resolved
//! image to disk.
//!
//! Run with: cargo run --release --example sphere_field

use anyhow::{Context, Result};
use ember_tracer::{
    gen_f32, gen_range_f32, random_vec3, random_vec3_range, Bvh, Camera, HittableList, Material,
    RenderConfig, Renderer, Sphere, Vec3, Xoshiro128,
};
use std::time::Duration;

fn build_scene() -> Result<Bvh> {
    let mut rng = Xoshiro128::seed_from_u64(20_240_229);
    let mut list = HittableList::new();

    // Ground
    list.add(Sphere::new(
        Vec3::new(0.0, -1000.0, 0.0),
        1000.0,
        Material::lambertian(Vec3::splat(0.5)),
    ));

    for a in -11..11 {
        for b in -11..11 {
            let center = Vec3::new(
                a as f32 + 0.9 * gen_f32(&mut rng),
                0.2,
                b as f32 + 0.9 * gen_f32(&mut rng),
            );
            if (center - Vec3::new(4.0, 0.2, 0.0)).length() < 0.9 {
                continue;
            }

            let choose = gen_f32(&mut rng);
            let material = if choose < 0.8 {
                let albedo = random_vec3(&mut rng) * random_vec3(&mut rng);
                Material::lambertian(albedo)
            } else if choose < 0.95 {
                let albedo = random_vec3_range(&mut rng, 0.5, 1.0);
                let fuzz = gen_range_f32(&mut rng, 0.0, 0.5);
                Material::metal(albedo, fuzz)
            } else {
                Material::dielectric(1.5)
            };

            list.add(Sphere::new(center, 0.2, material));
        }
    }

    list.add(Sphere::new(
        Vec3::new(0.0, 1.0, 0.0),
        1.0,
        Material::dielectric(1.5),
    ));
    list.add(Sphere::new(
        Vec3::new(-4.0, 1.0, 0.0),
        1.0,
        Material::lambertian(Vec3::new(0.4, 0.2, 0.1)),
    ));
    list.add(Sphere::new(
        Vec3::new(4.0, 1.0, 0.0),
        1.0,
        Material::metal(Vec3::new(0.7, 0.6, 0.5), 0.0),
    ));

    Bvh::build(list.into_primitives()).context("building scene BVH")
}

fn main() -> Result<()> {
    env_logger::init();

    let config = RenderConfig {
        width: 640,
        height: 360,
        samples: 64,
        max_depth: 8,
        tile_size: 32,
    };

    let camera = Camera::new()
        .with_position(Vec3::new(13.0, 2.0, 3.0), Vec3::ZERO, Vec3::Y)
        .with_lens(20.0, 0.6, 10.0);

    let scene = build_scene()?;
    let mut renderer = Renderer::new(scene, camera, config);

    renderer.start();
    while renderer.progress() < 1.0 {
        std::thread::sleep(Duration::from_millis(500));
        let completed = renderer.completed_tiles().len();
        log::info!(
            "progress {:5.1}% | +{} tiles | {:.1}M rays | {:.1}s",
            renderer.progress() * 100.0,
            completed,
            renderer.total_rays() as f64 / 1e6,
            renderer.elapsed().as_secs_f64()
        );
    }
    renderer.stop();

    log::info!(
        "done: {} rays in {:.1}s",
        renderer.total_rays(),
        renderer.elapsed().as_secs_f64()
    );

    let rgba = renderer.accumulation().resolve_rgba();
    let image = image::RgbaImage::from_raw(config.width, config.height, rgba)
        .context("resolved buffer has the wrong size")?;
    image
        .save("sphere_field.png")
        .context("writing sphere_field.png")?;

    Ok(())
}
