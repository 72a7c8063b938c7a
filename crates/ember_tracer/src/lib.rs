//! Ember - tile-parallel CPU path tracing
//!
//! A progressive Monte Carlo path tracer. The image is partitioned into
//! tiles; worker threads claim (tile, sample pass) units from a lock-light
//! scheduler, trace paths through a flattened BVH and accumulate radiance
//! into a shared buffer that a presentation layer polls.

mod accum;
mod bvh;
mod camera;
mod hittable;
mod material;
mod queue;
mod renderer;
mod rng;
mod sphere;
mod tile;

pub use accum::{color_to_rgba, linear_to_gamma, AccumulationBuffer};
pub use bvh::{Bvh, BvhStats, BuildError, LinearNode, MAX_TRAVERSAL_DEPTH};
pub use camera::Camera;
pub use hittable::{HitRecord, HittableList, Primitive};
pub use material::{Color, Material, Scatter};
pub use queue::RenderQueue;
pub use renderer::{sky, trace_ray, RenderConfig, Renderer};
pub use rng::{
    gen_f32, gen_range_f32, random_in_unit_disk, random_in_unit_sphere, random_unit_vector,
    random_vec3, random_vec3_range, Xoshiro128,
};
pub use sphere::Sphere;
pub use tile::{RenderTask, Tile, TileScheduler, DEFAULT_TILE_SIZE};

/// Re-export common math types from ember_math
pub use ember_math::{Aabb, Interval, Ray, Vec3};
