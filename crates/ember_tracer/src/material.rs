//! Surface scattering models.
//!
//! The material set is closed, so materials are a plain enum rather than a
//! trait object; the integrator dispatches with a match on the hottest loop
//! in the system.

use crate::hittable::HitRecord;
use crate::rng::{gen_f32, random_in_unit_sphere, random_unit_vector};
use ember_math::{Ray, Vec3};
use rand::RngCore;

/// Color type alias (RGB values typically 0-1)
pub type Color = Vec3;

/// Result of a successful scatter: the bounced ray and its attenuation.
#[derive(Debug, Clone, Copy)]
pub struct Scatter {
    pub attenuation: Color,
    pub scattered: Ray,
}

/// A surface scattering model.
#[derive(Debug, Clone, Copy)]
pub enum Material {
    /// Diffuse surface scattering into the hemisphere around the normal.
    Lambertian { albedo: Color },
    /// Specular surface with optional roughness perturbation.
    Metal { albedo: Color, fuzz: f32 },
    /// Clear refractive surface (glass, water).
    Dielectric { ior: f32 },
}

impl Material {
    pub fn lambertian(albedo: Color) -> Self {
        Self::Lambertian { albedo }
    }

    /// `fuzz` is clamped to [0, 1]: 0 is a perfect mirror, 1 is very rough.
    pub fn metal(albedo: Color, fuzz: f32) -> Self {
        Self::Metal {
            albedo,
            fuzz: fuzz.clamp(0.0, 1.0),
        }
    }

    /// `ior` is the index of refraction (1.5 for glass, 2.4 for diamond).
    pub fn dielectric(ior: f32) -> Self {
        Self::Dielectric { ior }
    }

    /// Scatter an incoming ray at a hit point.
    ///
    /// Returns `None` when the ray is absorbed, which terminates the path.
    pub fn scatter(
        &self,
        ray_in: &Ray,
        hit: &HitRecord,
        rng: &mut dyn RngCore,
    ) -> Option<Scatter> {
        match *self {
            Self::Lambertian { albedo } => {
                let mut direction = hit.normal + random_unit_vector(rng);

                // Catch degenerate scatter direction
                if direction.length_squared() < 1e-8 {
                    direction = hit.normal;
                }

                Some(Scatter {
                    attenuation: albedo,
                    scattered: Ray::new(hit.p, direction),
                })
            }

            Self::Metal { albedo, fuzz } => {
                let reflected = reflect(ray_in.direction.normalize(), hit.normal);
                let direction = reflected.normalize() + fuzz * random_in_unit_sphere(rng);

                // A perturbed reflection pointing into the surface is absorbed
                if direction.dot(hit.normal) < 0.0 {
                    return None;
                }

                Some(Scatter {
                    attenuation: albedo,
                    scattered: Ray::new(hit.p, direction),
                })
            }

            Self::Dielectric { ior } => {
                let ratio = if hit.front_face { 1.0 / ior } else { ior };

                let unit_direction = ray_in.direction.normalize();
                let cos_theta = (-unit_direction).dot(hit.normal).min(1.0);
                let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();

                // Total internal reflection forces the mirror branch
                let cannot_refract = ratio * sin_theta > 1.0;

                let direction = if cannot_refract || reflectance(cos_theta, ratio) > gen_f32(rng)
                {
                    reflect(unit_direction, hit.normal)
                } else {
                    refract(unit_direction, hit.normal, ratio)
                };

                Some(Scatter {
                    attenuation: Color::ONE,
                    scattered: Ray::new(hit.p, direction),
                })
            }
        }
    }
}

/// Reflect a vector about a normal.
#[inline]
fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Refract a unit vector through a surface with the given index ratio.
#[inline]
fn refract(uv: Vec3, n: Vec3, etai_over_etat: f32) -> Vec3 {
    let cos_theta = (-uv).dot(n).min(1.0);
    let r_out_perp = etai_over_etat * (uv + cos_theta * n);
    let r_out_parallel = -(1.0 - r_out_perp.length_squared()).abs().sqrt() * n;
    r_out_perp + r_out_parallel
}

/// Schlick's approximation for Fresnel reflectance.
#[inline]
fn reflectance(cosine: f32, ior: f32) -> f32 {
    let r0 = ((1.0 - ior) / (1.0 + ior)).powi(2);
    r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit_facing_z(p: Vec3) -> HitRecord<'static> {
        static MAT: Material = Material::Lambertian { albedo: Vec3::ONE };
        HitRecord {
            p,
            normal: Vec3::Z,
            t: 1.0,
            front_face: true,
            material: &MAT,
        }
    }

    #[test]
    fn test_lambertian_always_scatters() {
        let mut rng = crate::rng::Xoshiro128::seed_from_u64(7);
        let material = Material::lambertian(Color::new(0.5, 0.5, 0.5));
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
        let hit = hit_facing_z(Vec3::ZERO);

        for _ in 0..100 {
            let scatter = material.scatter(&ray, &hit, &mut rng).unwrap();
            assert_eq!(scatter.attenuation, Color::new(0.5, 0.5, 0.5));
            // Scattered direction stays in the normal's hemisphere
            assert!(scatter.scattered.direction.dot(hit.normal) > 0.0);
        }
    }

    #[test]
    fn test_metal_mirror_reflection() {
        let mut rng = crate::rng::Xoshiro128::seed_from_u64(8);
        let material = Material::metal(Color::ONE, 0.0);

        // 45 degree incidence onto a +Z facing surface
        let ray = Ray::new(Vec3::new(-1.0, 0.0, 1.0), Vec3::new(1.0, 0.0, -1.0));
        let hit = hit_facing_z(Vec3::ZERO);

        let scatter = material.scatter(&ray, &hit, &mut rng).unwrap();
        let expected = Vec3::new(1.0, 0.0, 1.0).normalize();
        assert!((scatter.scattered.direction.normalize() - expected).length() < 1e-5);
    }

    #[test]
    fn test_metal_absorbs_below_surface() {
        let mut rng = crate::rng::Xoshiro128::seed_from_u64(9);
        // fuzz 1.0 occasionally pushes the reflection under the surface
        let material = Material::metal(Color::ONE, 1.0);
        let ray = Ray::new(Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.9, 0.0, -0.1));
        let hit = hit_facing_z(Vec3::ZERO);

        let mut absorbed = 0;
        for _ in 0..1_000 {
            if material.scatter(&ray, &hit, &mut rng).is_none() {
                absorbed += 1;
            }
        }
        assert!(absorbed > 0, "grazing fuzzy metal never absorbed");
    }

    #[test]
    fn test_metal_fuzz_clamped() {
        match Material::metal(Color::ONE, 7.0) {
            Material::Metal { fuzz, .. } => assert_eq!(fuzz, 1.0),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_dielectric_matched_index_refracts_straight() {
        // With ratio 1.0 and normal incidence, reflectance is 0 and the ray
        // passes straight through unchanged.
        let mut rng = crate::rng::Xoshiro128::seed_from_u64(10);
        let material = Material::dielectric(1.0);
        let ray = Ray::new(Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, -1.0));
        let hit = hit_facing_z(Vec3::ZERO);

        for _ in 0..100 {
            let scatter = material.scatter(&ray, &hit, &mut rng).unwrap();
            assert_eq!(scatter.attenuation, Color::ONE);
            let dir = scatter.scattered.direction.normalize();
            assert!((dir - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);
        }
    }

    #[test]
    fn test_dielectric_total_internal_reflection() {
        let mut rng = crate::rng::Xoshiro128::seed_from_u64(11);
        let material = Material::dielectric(1.5);

        // Exiting glass at a grazing angle: sin(theta) * 1.5 > 1 forces
        // reflection regardless of the Fresnel draw.
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.9, 0.0, -0.2).normalize());
        let mut hit = hit_facing_z(Vec3::new(1.0, 0.0, 0.0));
        hit.front_face = false;

        let scatter = material.scatter(&ray, &hit, &mut rng).unwrap();
        let incoming = ray.direction.normalize();
        let expected = reflect(incoming, hit.normal);
        assert!((scatter.scattered.direction - expected).length() < 1e-5);
    }
}
