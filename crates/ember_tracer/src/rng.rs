//! Fast non-cryptographic random number generation for sampling.
//!
//! Every worker owns its own generator; all stochastic code takes
//! `&mut dyn RngCore` so tests can inject a seeded `StdRng` instead.

use ember_math::Vec3;
use rand::RngCore;
use std::f32::consts::TAU;

/// xoshiro128++ generator.
///
/// Small, fast and statistically solid for Monte Carlo sampling. Not
/// suitable for anything security related.
pub struct Xoshiro128 {
    s: [u32; 4],
}

impl Xoshiro128 {
    /// Seed the generator state from a single u64 via splitmix64.
    pub fn seed_from_u64(seed: u64) -> Self {
        let mut state = seed;
        let mut splitmix = || {
            state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
            let mut z = state;
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
            (z ^ (z >> 31)) as u32
        };

        Self {
            s: [splitmix(), splitmix(), splitmix(), splitmix()],
        }
    }

    /// Seed from the system entropy source.
    pub fn from_entropy() -> Self {
        Self::seed_from_u64(rand::random::<u64>())
    }

    #[inline]
    fn next(&mut self) -> u32 {
        let s = &mut self.s;

        let result = s[0].wrapping_add(s[3]).rotate_left(7).wrapping_add(s[0]);
        let t = s[1] << 9;

        s[2] ^= s[0];
        s[3] ^= s[1];
        s[1] ^= s[2];
        s[0] ^= s[3];

        s[2] ^= t;
        s[3] = s[3].rotate_left(11);

        result
    }
}

impl RngCore for Xoshiro128 {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        self.next()
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        (u64::from(self.next()) << 32) | u64::from(self.next())
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Uniform f32 in [0, 1).
///
/// Builds a float in [1, 2) directly from the top 23 random bits of the
/// mantissa, then subtracts 1. One draw, no division.
#[inline]
pub fn gen_f32(rng: &mut dyn RngCore) -> f32 {
    f32::from_bits(0x3f80_0000 | (rng.next_u32() >> 9)) - 1.0
}

/// Uniform f32 in [min, max).
#[inline]
pub fn gen_range_f32(rng: &mut dyn RngCore, min: f32, max: f32) -> f32 {
    min + (max - min) * gen_f32(rng)
}

/// Vector with each component uniform in [0, 1).
pub fn random_vec3(rng: &mut dyn RngCore) -> Vec3 {
    Vec3::new(gen_f32(rng), gen_f32(rng), gen_f32(rng))
}

/// Vector with each component uniform in [min, max).
pub fn random_vec3_range(rng: &mut dyn RngCore, min: f32, max: f32) -> Vec3 {
    Vec3::new(
        gen_range_f32(rng, min, max),
        gen_range_f32(rng, min, max),
        gen_range_f32(rng, min, max),
    )
}

/// Uniformly distributed unit vector.
///
/// Polar construction: pick z uniformly on [-1, 1] and an azimuth angle,
/// which is uniform on the sphere without rejection.
pub fn random_unit_vector(rng: &mut dyn RngCore) -> Vec3 {
    let z = gen_f32(rng) * 2.0 - 1.0;
    let a = gen_f32(rng) * TAU;
    let r = (1.0 - z * z).sqrt();

    Vec3::new(r * a.cos(), r * a.sin(), z)
}

/// Uniform point inside the unit sphere (rejection sampling).
pub fn random_in_unit_sphere(rng: &mut dyn RngCore) -> Vec3 {
    loop {
        let p = random_vec3_range(rng, -1.0, 1.0);
        if p.length_squared() <= 1.0 {
            return p;
        }
    }
}

/// Uniform point inside the unit disk in the XY plane (rejection sampling).
pub fn random_in_unit_disk(rng: &mut dyn RngCore) -> Vec3 {
    loop {
        let p = Vec3::new(
            gen_range_f32(rng, -1.0, 1.0),
            gen_range_f32(rng, -1.0, 1.0),
            0.0,
        );
        if p.length_squared() <= 1.0 {
            return p;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gen_f32_range() {
        let mut rng = Xoshiro128::seed_from_u64(1);
        for _ in 0..10_000 {
            let x = gen_f32(&mut rng);
            assert!((0.0..1.0).contains(&x), "out of range: {x}");
        }
    }

    #[test]
    fn test_gen_range_f32() {
        let mut rng = Xoshiro128::seed_from_u64(2);
        for _ in 0..1_000 {
            let x = gen_range_f32(&mut rng, -3.0, 5.0);
            assert!((-3.0..5.0).contains(&x));
        }
    }

    #[test]
    fn test_seeded_determinism() {
        let mut a = Xoshiro128::seed_from_u64(42);
        let mut b = Xoshiro128::seed_from_u64(42);

        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn test_random_unit_vector_length() {
        let mut rng = Xoshiro128::seed_from_u64(3);
        for _ in 0..1_000 {
            let v = random_unit_vector(&mut rng);
            assert!((v.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_random_in_unit_sphere() {
        let mut rng = Xoshiro128::seed_from_u64(4);
        for _ in 0..1_000 {
            assert!(random_in_unit_sphere(&mut rng).length_squared() <= 1.0);
        }
    }

    #[test]
    fn test_random_in_unit_disk() {
        let mut rng = Xoshiro128::seed_from_u64(5);
        for _ in 0..1_000 {
            let p = random_in_unit_disk(&mut rng);
            assert!(p.length_squared() <= 1.0);
            assert_eq!(p.z, 0.0);
        }
    }
}
