//! Shared accumulation buffer.
//!
//! One slot per pixel holding (radiance sum, sample count). Tasks partition
//! pixels by tile, so during any sample pass each slot has exactly one
//! writer; the channels are relaxed atomics only so that the presentation
//! side can read a consistent-enough snapshot concurrently without locks.

use crate::tile::Tile;
use ember_math::Vec3;
use std::sync::atomic::{AtomicU32, Ordering};

/// Per-pixel slot: summed radiance (rgb) and the latest sample count,
/// each stored as a u32 bit pattern.
#[derive(Default)]
struct Slot {
    r: AtomicU32,
    g: AtomicU32,
    b: AtomicU32,
    samples: AtomicU32,
}

impl Slot {
    fn add(&self, color: Vec3, sample: u32) {
        let r = f32::from_bits(self.r.load(Ordering::Relaxed)) + color.x;
        let g = f32::from_bits(self.g.load(Ordering::Relaxed)) + color.y;
        let b = f32::from_bits(self.b.load(Ordering::Relaxed)) + color.z;

        self.r.store(r.to_bits(), Ordering::Relaxed);
        self.g.store(g.to_bits(), Ordering::Relaxed);
        self.b.store(b.to_bits(), Ordering::Relaxed);
        self.samples.store(sample, Ordering::Relaxed);
    }

    fn read(&self) -> (Vec3, u32) {
        let sum = Vec3::new(
            f32::from_bits(self.r.load(Ordering::Relaxed)),
            f32::from_bits(self.g.load(Ordering::Relaxed)),
            f32::from_bits(self.b.load(Ordering::Relaxed)),
        );
        (sum, self.samples.load(Ordering::Relaxed))
    }

    fn clear(&self) {
        self.r.store(0, Ordering::Relaxed);
        self.g.store(0, Ordering::Relaxed);
        self.b.store(0, Ordering::Relaxed);
        self.samples.store(0, Ordering::Relaxed);
    }
}

/// Per-pixel radiance sums for a render in progress.
pub struct AccumulationBuffer {
    width: u32,
    height: u32,
    slots: Vec<Slot>,
}

impl AccumulationBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let mut slots = Vec::new();
        slots.resize_with((width as usize) * (height as usize), Slot::default);
        Self {
            width,
            height,
            slots,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Add one traced sample to a pixel and record its pass number.
    ///
    /// Each (pixel, task) pair writes exactly once; tiles never overlap, so
    /// no two in-flight tasks touch the same slot.
    pub fn add_sample(&self, x: u32, y: u32, color: Vec3, sample: u32) {
        self.slots[self.index(x, y)].add(color, sample);
    }

    /// Read a pixel's (radiance sum, sample count).
    pub fn pixel(&self, x: u32, y: u32) -> (Vec3, u32) {
        self.slots[self.index(x, y)].read()
    }

    /// Read the slots covered by a tile, row-major within the tile.
    pub fn read_tile(&self, tile: &Tile) -> Vec<(Vec3, u32)> {
        let mut out = Vec::with_capacity(tile.pixel_count() as usize);
        for y in tile.y..tile.y + tile.h {
            for x in tile.x..tile.x + tile.w {
                out.push(self.pixel(x, y));
            }
        }
        out
    }

    /// Zero every slot.
    pub fn clear(&self) {
        for slot in &self.slots {
            slot.clear();
        }
    }

    /// Average every pixel, gamma-correct, and pack to 8-bit RGBA.
    /// Unsampled pixels resolve to opaque black.
    pub fn resolve_rgba(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.slots.len() * 4);
        for slot in &self.slots {
            let (sum, samples) = slot.read();
            let color = if samples > 0 {
                sum / samples as f32
            } else {
                Vec3::ZERO
            };
            bytes.extend_from_slice(&color_to_rgba(color));
        }
        bytes
    }

    fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        (y as usize) * (self.width as usize) + (x as usize)
    }
}

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Convert a linear color to 8-bit RGBA.
pub fn color_to_rgba(color: Vec3) -> [u8; 4] {
    let r = (255.0 * linear_to_gamma(color.x).clamp(0.0, 1.0)) as u8;
    let g = (255.0 * linear_to_gamma(color.y).clamp(0.0, 1.0)) as u8;
    let b = (255.0 * linear_to_gamma(color.z).clamp(0.0, 1.0)) as u8;
    [r, g, b, 255]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_read() {
        let buffer = AccumulationBuffer::new(4, 4);

        buffer.add_sample(1, 2, Vec3::new(0.5, 0.25, 1.0), 1);
        buffer.add_sample(1, 2, Vec3::new(0.5, 0.25, 1.0), 2);

        let (sum, samples) = buffer.pixel(1, 2);
        assert_eq!(sum, Vec3::new(1.0, 0.5, 2.0));
        assert_eq!(samples, 2);

        // Untouched pixel stays zero
        assert_eq!(buffer.pixel(0, 0), (Vec3::ZERO, 0));
    }

    #[test]
    fn test_clear_zeroes_everything() {
        let buffer = AccumulationBuffer::new(2, 2);
        buffer.add_sample(0, 0, Vec3::ONE, 1);
        buffer.add_sample(1, 1, Vec3::ONE, 1);

        buffer.clear();

        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(buffer.pixel(x, y), (Vec3::ZERO, 0));
            }
        }
    }

    #[test]
    fn test_resolve_averages_samples() {
        let buffer = AccumulationBuffer::new(1, 1);
        // Two samples summing to 0.5: average 0.25, gamma -> 0.5
        buffer.add_sample(0, 0, Vec3::splat(0.1), 1);
        buffer.add_sample(0, 0, Vec3::splat(0.4), 2);

        let rgba = buffer.resolve_rgba();
        assert_eq!(rgba.len(), 4);
        assert_eq!(rgba[3], 255);
        assert!((i32::from(rgba[0]) - 127).abs() <= 1);
    }

    #[test]
    fn test_read_tile_row_major() {
        let buffer = AccumulationBuffer::new(4, 4);
        let tile = Tile { x: 2, y: 1, w: 2, h: 2 };
        buffer.add_sample(2, 1, Vec3::X, 1);
        buffer.add_sample(3, 2, Vec3::Y, 1);

        let slots = buffer.read_tile(&tile);
        assert_eq!(slots.len(), 4);
        assert_eq!(slots[0].0, Vec3::X);
        assert_eq!(slots[3].0, Vec3::Y);
    }

    #[test]
    fn test_color_to_rgba_clamps() {
        assert_eq!(color_to_rgba(Vec3::splat(4.0)), [255, 255, 255, 255]);
        assert_eq!(color_to_rgba(Vec3::splat(-1.0)), [0, 0, 0, 255]);
    }
}
