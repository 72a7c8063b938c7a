//! Primitives and hit records for ray-object intersection.

use crate::material::Material;
use crate::sphere::Sphere;
use ember_math::{Aabb, Interval, Ray, Vec3};

/// Record of a ray-object intersection.
///
/// Stack-local: produced by an intersection test and consumed immediately
/// by the caller. Borrows the material from the primitive that was hit.
#[derive(Clone, Copy)]
pub struct HitRecord<'a> {
    /// Point of intersection
    pub p: Vec3,
    /// Surface normal at intersection (always points against the ray)
    pub normal: Vec3,
    /// Parameter t where the intersection occurs
    pub t: f32,
    /// Whether the ray hit the front face (outside) of the surface
    pub front_face: bool,
    /// Material at the intersection point
    pub material: &'a Material,
}

impl<'a> HitRecord<'a> {
    /// Build a record from an outward normal, orienting it against the ray.
    pub fn new(ray: &Ray, outward_normal: Vec3, t: f32, material: &'a Material) -> Self {
        let front_face = ray.direction.dot(outward_normal) < 0.0;
        Self {
            p: ray.at(t),
            normal: if front_face {
                outward_normal
            } else {
                -outward_normal
            },
            t,
            front_face,
            material,
        }
    }
}

/// A scene primitive.
///
/// The shape set is closed, so this is an enum rather than a trait object;
/// intersection dispatch is a match instead of a virtual call.
#[derive(Clone)]
pub enum Primitive {
    Sphere(Sphere),
}

impl Primitive {
    /// Test if a ray hits this primitive within the given interval.
    pub fn hit(&self, ray: &Ray, clip: Interval) -> Option<HitRecord<'_>> {
        match self {
            Self::Sphere(sphere) => sphere.hit(ray, clip),
        }
    }

    /// Get the axis-aligned bounding box of this primitive.
    pub fn bounding_box(&self) -> Aabb {
        match self {
            Self::Sphere(sphere) => sphere.bounding_box(),
        }
    }
}

impl From<Sphere> for Primitive {
    fn from(sphere: Sphere) -> Self {
        Self::Sphere(sphere)
    }
}

/// A list of primitives answering nearest-hit queries by linear scan.
///
/// This is the brute-force fallback aggregate; renders go through [`Bvh`]
/// instead, which must agree with this list on every query.
///
/// [`Bvh`]: crate::Bvh
#[derive(Default)]
pub struct HittableList {
    objects: Vec<Primitive>,
    bbox: Aabb,
}

impl HittableList {
    /// Create a new empty list.
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            bbox: Aabb::EMPTY,
        }
    }

    /// Add a primitive to the list.
    pub fn add(&mut self, primitive: impl Into<Primitive>) {
        let primitive = primitive.into();
        self.bbox = Aabb::surrounding(&self.bbox, &primitive.bounding_box());
        self.objects.push(primitive);
    }

    /// Get the number of primitives.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Find the nearest hit within the interval, shrinking it as hits are
    /// found so later primitives only beat the current closest.
    pub fn hit(&self, ray: &Ray, clip: Interval) -> Option<HitRecord<'_>> {
        let mut record = None;
        let mut closest = clip.max;

        for object in &self.objects {
            if let Some(hit) = object.hit(ray, Interval::new(clip.min, closest)) {
                closest = hit.t;
                record = Some(hit);
            }
        }

        record
    }

    pub fn bounding_box(&self) -> Aabb {
        self.bbox
    }

    /// Consume the list, transferring ownership of the primitives to the
    /// acceleration structure that will traverse them.
    pub fn into_primitives(self) -> Vec<Primitive> {
        self.objects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{Color, Material};

    #[test]
    fn test_hit_record_face_normal() {
        static MAT: Material = Material::Lambertian { albedo: Vec3::ONE };

        // Ray travelling -Z against a +Z outward normal: front face
        let ray = Ray::new(Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, -1.0));
        let rec = HitRecord::new(&ray, Vec3::Z, 1.0, &MAT);
        assert!(rec.front_face);
        assert_eq!(rec.normal, Vec3::Z);

        // Same normal hit from behind: flipped
        let ray = Ray::new(Vec3::new(0.0, 0.0, -1.0), Vec3::new(0.0, 0.0, 1.0));
        let rec = HitRecord::new(&ray, Vec3::Z, 1.0, &MAT);
        assert!(!rec.front_face);
        assert_eq!(rec.normal, -Vec3::Z);
    }

    #[test]
    fn test_list_nearest_hit() {
        let mut list = HittableList::new();
        let material = Material::lambertian(Color::new(0.5, 0.5, 0.5));
        list.add(Sphere::new(Vec3::new(0.0, 0.0, -5.0), 0.5, material));
        list.add(Sphere::new(Vec3::new(0.0, 0.0, -2.0), 0.5, material));

        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
        let hit = list.hit(&ray, Interval::new(0.001, f32::INFINITY)).unwrap();

        // Must report the closer sphere
        assert!((hit.t - 1.5).abs() < 1e-4);
    }

    #[test]
    fn test_list_bbox_union() {
        let mut list = HittableList::new();
        let material = Material::lambertian(Color::ONE);
        list.add(Sphere::new(Vec3::new(-2.0, 0.0, 0.0), 1.0, material));
        list.add(Sphere::new(Vec3::new(3.0, 0.0, 0.0), 1.0, material));

        let bbox = list.bounding_box();
        assert_eq!(bbox.x.min, -3.0);
        assert_eq!(bbox.x.max, 4.0);
    }

    #[test]
    fn test_empty_list_never_hits() {
        let list = HittableList::new();
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
        assert!(list.hit(&ray, Interval::new(0.001, f32::INFINITY)).is_none());
    }
}
