//! Bounding Volume Hierarchy (BVH) acceleration structure.
//!
//! Built as a median-split binary tree over primitive bounding boxes, then
//! flattened into a linear array traversed iteratively with a small explicit
//! stack. Nearest-hit queries run in O(log n) expected time.

use crate::hittable::{HitRecord, Primitive};
use ember_math::{Aabb, Interval, Ray};
use thiserror::Error;

/// Capacity of the traversal stack, and therefore the maximum tree depth
/// accepted at build time. A median split over n primitives needs about
/// log2(n) levels, so this is far beyond any realistic scene.
pub const MAX_TRAVERSAL_DEPTH: usize = 64;

/// Construction failure. No partial BVH is ever returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("cannot build a BVH over an empty primitive set")]
    EmptyScene,
    #[error("BVH depth {0} exceeds the traversal stack capacity")]
    TooDeep(u32),
}

/// Build metrics, logged at construction and kept for diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct BvhStats {
    pub primitives: u32,
    pub total_nodes: u32,
    pub leaf_nodes: u32,
    pub max_depth: u32,
}

/// Node of the flattened tree.
///
/// For an interior node the first child is always the next array slot, so
/// only the second child's offset is stored; `prim_count == 0` marks a node
/// as interior and gives `offset` its second-child meaning.
#[derive(Debug, Clone, Copy)]
pub struct LinearNode {
    pub bounds: Aabb,
    /// First-primitive offset for leaves, second-child offset for interiors.
    pub offset: u32,
    /// Number of primitives in a leaf; 0 for interior nodes.
    pub prim_count: u16,
    /// Split axis (0=X, 1=Y, 2=Z), used to order child traversal.
    pub axis: u8,
}

/// Transient build node. The whole arena is dropped once flattening is done.
struct BuildNode {
    bounds: Aabb,
    children: [u32; 2],
    split_axis: u8,
    first_prim: u32,
    prim_count: u32,
}

struct BuildCtx<'a> {
    primitives: &'a mut [Primitive],
    arena: Vec<BuildNode>,
    stats: BvhStats,
}

impl BuildCtx<'_> {
    /// Recursively partition `[start, end)` and return the arena index of
    /// the subtree root.
    fn build_range(&mut self, start: usize, end: usize, depth: u32) -> u32 {
        self.stats.max_depth = self.stats.max_depth.max(depth);

        let mut bounds = Aabb::EMPTY;
        let mut centroid_bounds = Aabb::EMPTY;
        for primitive in &self.primitives[start..end] {
            let pb = primitive.bounding_box();
            bounds = Aabb::surrounding(&bounds, &pb);
            let c = pb.centroid();
            centroid_bounds = Aabb::surrounding(&centroid_bounds, &Aabb::from_points(c, c));
        }

        if end - start == 1 {
            self.stats.leaf_nodes += 1;
            return self.push(BuildNode {
                bounds,
                children: [0, 0],
                split_axis: 0,
                first_prim: start as u32,
                prim_count: 1,
            });
        }

        // Split at the median element along the widest centroid axis. A
        // partial reorder keeps each level O(n); no full sort is needed.
        let axis = centroid_bounds.longest_axis();
        let mid = (start + end) / 2;
        self.primitives[start..end].select_nth_unstable_by(mid - start, |a, b| {
            let ca = a.bounding_box().centroid()[axis];
            let cb = b.bounding_box().centroid()[axis];
            ca.partial_cmp(&cb).unwrap_or(std::cmp::Ordering::Equal)
        });

        let left = self.build_range(start, mid, depth + 1);
        let right = self.build_range(mid, end, depth + 1);

        self.push(BuildNode {
            bounds,
            children: [left, right],
            split_axis: axis as u8,
            first_prim: 0,
            prim_count: 0,
        })
    }

    fn push(&mut self, node: BuildNode) -> u32 {
        let index = self.arena.len() as u32;
        self.arena.push(node);
        self.stats.total_nodes += 1;
        index
    }
}

/// Depth-first pre-order walk assigning each node its slot in the output
/// array. Returns the slot of `node`, which for a second child becomes the
/// parent's stored offset.
fn flatten(arena: &[BuildNode], node: u32, out: &mut Vec<LinearNode>) -> u32 {
    let offset = out.len() as u32;
    let build = &arena[node as usize];

    out.push(LinearNode {
        bounds: build.bounds,
        offset: 0,
        prim_count: build.prim_count as u16,
        axis: 0,
    });

    if build.prim_count > 0 {
        out[offset as usize].offset = build.first_prim;
    } else {
        out[offset as usize].axis = build.split_axis;
        flatten(arena, build.children[0], out);
        let second = flatten(arena, build.children[1], out);
        out[offset as usize].offset = second;
    }

    offset
}

/// A flattened BVH owning its primitives. Immutable after construction.
pub struct Bvh {
    primitives: Vec<Primitive>,
    nodes: Vec<LinearNode>,
    stats: BvhStats,
}

impl Bvh {
    /// Build a BVH, consuming ownership of the primitives.
    ///
    /// Fails on an empty set, and on a tree deeper than the traversal stack
    /// (which would corrupt traversal, so it is refused up front).
    pub fn build(mut primitives: Vec<Primitive>) -> Result<Self, BuildError> {
        if primitives.is_empty() {
            return Err(BuildError::EmptyScene);
        }

        let count = primitives.len();
        let mut ctx = BuildCtx {
            primitives: &mut primitives,
            arena: Vec::with_capacity(2 * count),
            stats: BvhStats {
                primitives: count as u32,
                ..BvhStats::default()
            },
        };

        let root = ctx.build_range(0, count, 0);
        let BuildCtx { arena, stats, .. } = ctx;

        if stats.max_depth as usize >= MAX_TRAVERSAL_DEPTH {
            return Err(BuildError::TooDeep(stats.max_depth));
        }

        let mut nodes = Vec::with_capacity(arena.len());
        flatten(&arena, root, &mut nodes);

        log::info!(
            "BVH built: {} primitives, {} nodes ({} leaves), depth {}",
            stats.primitives,
            stats.total_nodes,
            stats.leaf_nodes,
            stats.max_depth
        );

        Ok(Self {
            primitives,
            nodes,
            stats,
        })
    }

    /// Find the nearest hit within the interval, or `None`.
    ///
    /// Iterative traversal over the flattened array: interior nodes descend
    /// into the near child first (by the ray's sign on the split axis) and
    /// defer the far child on the stack, and every found hit shrinks the
    /// clip interval so farther subtrees prune early.
    pub fn hit(&self, ray: &Ray, mut clip: Interval) -> Option<HitRecord<'_>> {
        let dir_is_neg = [
            ray.direction.x < 0.0,
            ray.direction.y < 0.0,
            ray.direction.z < 0.0,
        ];

        let mut stack = [0u32; MAX_TRAVERSAL_DEPTH];
        let mut stack_len = 0usize;
        let mut current = 0usize;
        let mut record = None;

        loop {
            let node = &self.nodes[current];

            if node.bounds.hit(ray, clip) {
                if node.prim_count > 0 {
                    let first = node.offset as usize;
                    for primitive in &self.primitives[first..first + node.prim_count as usize] {
                        if let Some(hit) = primitive.hit(ray, clip) {
                            clip.max = hit.t;
                            record = Some(hit);
                        }
                    }

                    if stack_len == 0 {
                        break;
                    }
                    stack_len -= 1;
                    current = stack[stack_len] as usize;
                } else if dir_is_neg[node.axis as usize] {
                    stack[stack_len] = current as u32 + 1;
                    stack_len += 1;
                    current = node.offset as usize;
                } else {
                    stack[stack_len] = node.offset;
                    stack_len += 1;
                    current += 1;
                }
            } else {
                if stack_len == 0 {
                    break;
                }
                stack_len -= 1;
                current = stack[stack_len] as usize;
            }
        }

        record
    }

    /// Bounds of the whole scene: the root node's box.
    pub fn bounding_box(&self) -> Aabb {
        self.nodes[0].bounds
    }

    pub fn stats(&self) -> BvhStats {
        self.stats
    }

    pub fn nodes(&self) -> &[LinearNode] {
        &self.nodes
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hittable::HittableList;
    use crate::material::{Color, Material};
    use crate::rng::{gen_range_f32, Xoshiro128};
    use crate::sphere::Sphere;
    use ember_math::Vec3;

    fn gray() -> Material {
        Material::lambertian(Color::new(0.5, 0.5, 0.5))
    }

    fn random_spheres(count: usize, seed: u64) -> Vec<Primitive> {
        let mut rng = Xoshiro128::seed_from_u64(seed);
        (0..count)
            .map(|_| {
                let center = Vec3::new(
                    gen_range_f32(&mut rng, -10.0, 10.0),
                    gen_range_f32(&mut rng, -10.0, 10.0),
                    gen_range_f32(&mut rng, -10.0, 10.0),
                );
                let radius = gen_range_f32(&mut rng, 0.1, 1.5);
                Primitive::from(Sphere::new(center, radius, gray()))
            })
            .collect()
    }

    #[test]
    fn test_empty_scene_is_an_error() {
        assert!(matches!(
            Bvh::build(Vec::new()),
            Err(BuildError::EmptyScene)
        ));
    }

    #[test]
    fn test_single_primitive_is_one_leaf() {
        let sphere = Sphere::new(Vec3::new(0.0, 0.0, -1.0), 0.5, gray());
        let bvh = Bvh::build(vec![sphere.into()]).unwrap();

        assert_eq!(bvh.nodes().len(), 1);
        let stats = bvh.stats();
        assert_eq!(stats.total_nodes, 1);
        assert_eq!(stats.leaf_nodes, 1);
        assert_eq!(stats.max_depth, 0);

        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
        let hit = bvh.hit(&ray, Interval::new(0.001, f32::INFINITY)).unwrap();
        assert!((hit.t - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_node_and_leaf_counts() {
        // Median split with one primitive per leaf: n leaves, 2n-1 nodes
        let bvh = Bvh::build(random_spheres(33, 1)).unwrap();
        let stats = bvh.stats();

        assert_eq!(stats.leaf_nodes, 33);
        assert_eq!(stats.total_nodes, 2 * 33 - 1);
        assert_eq!(bvh.nodes().len(), stats.total_nodes as usize);
    }

    #[test]
    fn test_bbox_is_union_of_primitive_boxes() {
        let primitives = random_spheres(50, 2);
        let expected = primitives
            .iter()
            .fold(Aabb::EMPTY, |acc, p| Aabb::surrounding(&acc, &p.bounding_box()));

        let bvh = Bvh::build(primitives).unwrap();
        assert_eq!(bvh.bounding_box(), expected);
    }

    #[test]
    fn test_first_child_follows_interior_node() {
        let bvh = Bvh::build(random_spheres(64, 3)).unwrap();

        for (index, node) in bvh.nodes().iter().enumerate() {
            if node.prim_count == 0 {
                // Second child lies past the first child's subtree
                assert!(node.offset as usize > index + 1);
                assert!((node.offset as usize) < bvh.nodes().len());
            }
        }
    }

    #[test]
    fn test_traversal_matches_linear_scan() {
        let primitives = random_spheres(100, 4);
        let mut list = HittableList::new();
        for p in primitives.iter().cloned() {
            list.add(p);
        }
        let bvh = Bvh::build(primitives).unwrap();

        let mut rng = Xoshiro128::seed_from_u64(5);
        for _ in 0..2_000 {
            let origin = Vec3::new(
                gen_range_f32(&mut rng, -15.0, 15.0),
                gen_range_f32(&mut rng, -15.0, 15.0),
                gen_range_f32(&mut rng, -15.0, 15.0),
            );
            let direction = crate::rng::random_unit_vector(&mut rng);
            let ray = Ray::new(origin, direction);
            let clip = Interval::new(0.001, f32::INFINITY);

            let brute = list.hit(&ray, clip);
            let fast = bvh.hit(&ray, clip);

            match (brute, fast) {
                (None, None) => {}
                (Some(a), Some(b)) => {
                    assert!((a.t - b.t).abs() < 1e-4, "t mismatch: {} vs {}", a.t, b.t);
                }
                (a, b) => panic!(
                    "hit/miss disagreement: brute={:?} bvh={:?}",
                    a.map(|h| h.t),
                    b.map(|h| h.t)
                ),
            }
        }
    }

    #[test]
    fn test_nearest_of_two_spheres_on_ray() {
        let near = Sphere::new(Vec3::new(0.0, 0.0, -2.0), 0.5, gray());
        let far = Sphere::new(Vec3::new(0.0, 0.0, -5.0), 0.5, gray());
        let bvh = Bvh::build(vec![far.into(), near.into()]).unwrap();

        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
        let hit = bvh.hit(&ray, Interval::new(0.001, f32::INFINITY)).unwrap();
        assert!((hit.t - 1.5).abs() < 1e-4);
    }
}
