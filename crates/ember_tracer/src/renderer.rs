//! Render orchestration: worker pool, path-tracing integrator and the
//! control surface the surrounding application drives.
//!
//! A render is a fixed pool of OS threads pulling (tile, sample pass) tasks
//! from the scheduler until it runs dry or the stop flag is raised. Tasks
//! always run to completion; the flag is only observed between tasks.

use crate::accum::AccumulationBuffer;
use crate::bvh::Bvh;
use crate::camera::Camera;
use crate::queue::RenderQueue;
use crate::rng::Xoshiro128;
use crate::tile::{RenderTask, Tile, TileScheduler, DEFAULT_TILE_SIZE};
use ember_math::{Interval, Ray, Vec3};
use rand::RngCore;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Minimum parametric distance for secondary hits, guarding against a
/// scattered ray re-intersecting the surface it left.
const T_MIN: f32 = 1e-4;

/// Render configuration.
#[derive(Debug, Clone, Copy)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    /// Sample passes per pixel
    pub samples: u32,
    /// Maximum ray bounce depth
    pub max_depth: u32,
    /// Tile edge in pixels
    pub tile_size: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            samples: 128,
            max_depth: 8,
            tile_size: DEFAULT_TILE_SIZE,
        }
    }
}

/// Sky gradient for rays that escape the scene: white at the horizon
/// blending to blue overhead, by the direction's vertical component.
pub fn sky(direction: Vec3) -> Vec3 {
    let unit = direction.normalize();
    let t = 0.5 * (unit.y + 1.0);
    Vec3::ONE.lerp(Vec3::new(0.5, 0.7, 1.0), t)
}

/// Trace one path through the scene, iteratively, up to `max_depth` bounces.
///
/// Each bounce multiplies the running throughput by the material's
/// attenuation. A miss terminates the path with the sky's contribution; an
/// absorbing material terminates it with none; exhausting the depth budget
/// simply stops accumulating. Every cast ray bumps `rays_cast`.
pub fn trace_ray(
    scene: &Bvh,
    mut ray: Ray,
    max_depth: u32,
    rng: &mut dyn RngCore,
    rays_cast: &mut u64,
) -> Vec3 {
    let mut throughput = Vec3::ONE;
    let mut accumulated = Vec3::ZERO;

    for _ in 0..max_depth {
        *rays_cast += 1;

        match scene.hit(&ray, Interval::new(T_MIN, f32::INFINITY)) {
            Some(hit) => match hit.material.scatter(&ray, &hit, rng) {
                Some(scatter) => {
                    throughput *= scatter.attenuation;
                    ray = scatter.scattered;
                }
                None => break,
            },
            None => {
                accumulated += throughput * sky(ray.direction);
                break;
            }
        }
    }

    accumulated
}

/// Everything a worker thread needs, shared by Arc.
#[derive(Clone)]
struct WorkerContext {
    scene: Arc<Bvh>,
    camera: Arc<Camera>,
    scheduler: Arc<TileScheduler>,
    queue: Arc<RenderQueue>,
    accum: Arc<AccumulationBuffer>,
    running: Arc<AtomicBool>,
    ray_count: Arc<AtomicU64>,
    max_depth: u32,
}

fn worker_loop(ctx: WorkerContext) {
    let mut rng = Xoshiro128::from_entropy();

    while ctx.running.load(Ordering::Relaxed) {
        let Some(task) = ctx.scheduler.next_task() else {
            break;
        };
        execute_task(&ctx, &task, &mut rng);
        ctx.queue.push(task.tile);
    }
}

fn execute_task(ctx: &WorkerContext, task: &RenderTask, rng: &mut Xoshiro128) {
    let mut rays_cast = 0u64;

    for y in task.tile.y..task.tile.y + task.tile.h {
        for x in task.tile.x..task.tile.x + task.tile.w {
            let ray = ctx.camera.get_ray(x, y, rng);
            let color = trace_ray(&ctx.scene, ray, ctx.max_depth, rng, &mut rays_cast);
            ctx.accum.add_sample(x, y, color, task.sample);
        }
    }

    ctx.ray_count.fetch_add(rays_cast, Ordering::Relaxed);
}

/// Tile-parallel progressive renderer.
///
/// Owns the scene, camera and all shared render state. The presentation
/// side polls [`accumulation`](Self::accumulation), drains
/// [`completed_tiles`](Self::completed_tiles) and reads
/// [`progress`](Self::progress); the application drives
/// [`start`](Self::start) / [`stop`](Self::stop) / [`reset`](Self::reset).
pub struct Renderer {
    config: RenderConfig,
    scene: Arc<Bvh>,
    camera: Arc<Camera>,
    scheduler: Arc<TileScheduler>,
    queue: Arc<RenderQueue>,
    accum: Arc<AccumulationBuffer>,
    running: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
    ray_count: Arc<AtomicU64>,
    started_at: Option<Instant>,
    accumulated_time: Duration,
}

impl Renderer {
    pub fn new(scene: Bvh, mut camera: Camera, config: RenderConfig) -> Self {
        camera.resize(config.width, config.height);

        Self {
            scene: Arc::new(scene),
            camera: Arc::new(camera),
            scheduler: Arc::new(TileScheduler::new(
                config.width,
                config.height,
                config.tile_size,
                config.samples,
            )),
            queue: Arc::new(RenderQueue::new()),
            accum: Arc::new(AccumulationBuffer::new(config.width, config.height)),
            running: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
            ray_count: Arc::new(AtomicU64::new(0)),
            started_at: None,
            accumulated_time: Duration::ZERO,
            config,
        }
    }

    /// Begin a fresh render: rewind the scheduler, clear the buffer and
    /// spawn the worker pool. Any previous render is stopped first.
    pub fn start(&mut self) {
        self.stop();

        self.scheduler = Arc::new(TileScheduler::new(
            self.config.width,
            self.config.height,
            self.config.tile_size,
            self.config.samples,
        ));
        self.queue.flush();
        self.accum.clear();
        self.ray_count.store(0, Ordering::Relaxed);
        self.accumulated_time = Duration::ZERO;

        self.running.store(true, Ordering::Relaxed);
        self.started_at = Some(Instant::now());

        // Two cores stay reserved for the presentation side
        let worker_count = std::thread::available_parallelism()
            .map_or(1, |n| n.get().saturating_sub(2).max(1));

        log::info!(
            "render started: {}x{}, {} samples, depth {}, {} workers",
            self.config.width,
            self.config.height,
            self.config.samples,
            self.config.max_depth,
            worker_count
        );

        for i in 0..worker_count {
            let ctx = WorkerContext {
                scene: Arc::clone(&self.scene),
                camera: Arc::clone(&self.camera),
                scheduler: Arc::clone(&self.scheduler),
                queue: Arc::clone(&self.queue),
                accum: Arc::clone(&self.accum),
                running: Arc::clone(&self.running),
                ray_count: Arc::clone(&self.ray_count),
                max_depth: self.config.max_depth,
            };

            let builder = std::thread::Builder::new().name(format!("ember-worker-{i}"));
            match builder.spawn(move || worker_loop(ctx)) {
                Ok(handle) => self.workers.push(handle),
                Err(err) => log::error!("failed to spawn worker thread: {err}"),
            }
        }
    }

    /// Raise the stop flag and join every worker. In-flight tasks finish;
    /// the render is fully stopped when this returns.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("worker thread panicked");
            }
        }

        if let Some(started) = self.started_at.take() {
            self.accumulated_time += started.elapsed();
        }
    }

    /// Stop, apply a new configuration, and clear all render state.
    ///
    /// Workers are joined before any structure is rebuilt, so the buffer
    /// and scheduler are never mutated under an active render.
    pub fn reset(&mut self, config: RenderConfig) {
        self.stop();

        self.config = config;

        let mut camera = (*self.camera).clone();
        camera.resize(config.width, config.height);
        self.camera = Arc::new(camera);

        self.scheduler = Arc::new(TileScheduler::new(
            config.width,
            config.height,
            config.tile_size,
            config.samples,
        ));
        self.accum = Arc::new(AccumulationBuffer::new(config.width, config.height));
        self.queue.flush();
        self.ray_count.store(0, Ordering::Relaxed);
        self.accumulated_time = Duration::ZERO;
    }

    /// True between `start()` and `stop()`, even once the scheduler has
    /// been drained and the workers have exited on their own.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed) && !self.workers.is_empty()
    }

    /// Fraction of work units claimed, in [0, 1].
    pub fn progress(&self) -> f32 {
        self.scheduler.progress()
    }

    /// Total rays cast since the render started. Monotonic.
    pub fn total_rays(&self) -> u64 {
        self.ray_count.load(Ordering::Relaxed)
    }

    /// Wall-clock time spent rendering so far.
    pub fn elapsed(&self) -> Duration {
        let current = self.started_at.map_or(Duration::ZERO, |t| t.elapsed());
        self.accumulated_time + current
    }

    /// The shared per-pixel radiance sums.
    pub fn accumulation(&self) -> &AccumulationBuffer {
        &self.accum
    }

    /// Drain the tiles completed since the last call.
    pub fn completed_tiles(&self) -> Vec<Tile> {
        self.queue.flush()
    }

    pub fn config(&self) -> RenderConfig {
        self.config
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn scene(&self) -> &Bvh {
        &self.scene
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.stop();
    }
}
