//! Sphere primitive for ray tracing.

use crate::hittable::HitRecord;
use crate::material::Material;
use ember_math::{Aabb, Interval, Ray, Vec3};

/// A sphere primitive.
#[derive(Clone)]
pub struct Sphere {
    center: Vec3,
    radius: f32,
    material: Material,
    bbox: Aabb,
}

impl Sphere {
    /// Create a new sphere. Negative radii are clamped to zero.
    pub fn new(center: Vec3, radius: f32, material: Material) -> Self {
        let radius = radius.max(0.0);
        let rvec = Vec3::splat(radius);
        let bbox = Aabb::from_points(center - rvec, center + rvec);

        Self {
            center,
            radius,
            material,
            bbox,
        }
    }

    /// Solve the ray-sphere quadratic, preferring the smaller root.
    ///
    /// Roots are accepted with the exclusive `surrounds` test so a ray
    /// starting on the surface does not immediately re-hit it.
    pub fn hit(&self, ray: &Ray, clip: Interval) -> Option<HitRecord<'_>> {
        let oc = self.center - ray.origin;
        let a = ray.direction.length_squared();
        let h = ray.direction.dot(oc);
        let c = oc.length_squared() - self.radius * self.radius;

        let discriminant = h * h - a * c;
        if discriminant < 0.0 {
            return None;
        }

        let sqrtd = discriminant.sqrt();

        let mut root = (h - sqrtd) / a;
        if !clip.surrounds(root) {
            root = (h + sqrtd) / a;
            if !clip.surrounds(root) {
                return None;
            }
        }

        let outward_normal = (ray.at(root) - self.center) / self.radius;
        Some(HitRecord::new(ray, outward_normal, root, &self.material))
    }

    pub fn bounding_box(&self) -> Aabb {
        self.bbox
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }
}
