//! Tile partitioning and lock-light work distribution.
//!
//! The image is cut into rectangular tiles; a (tile, sample pass) pair is
//! the unit of scheduling. Workers claim units through a single atomic
//! counter, so the hot path has exactly one contended word.

use std::sync::atomic::{AtomicU64, Ordering};

/// Default tile edge in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 32;

/// A rectangular pixel region of the target image.
///
/// Tiles cover the image exactly, with no overlap and no gaps; tiles on the
/// right and bottom edges may be smaller than the nominal size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Tile {
    /// Number of pixels covered by this tile.
    pub fn pixel_count(&self) -> u32 {
        self.w * self.h
    }
}

/// One unit of work: a tile and the 1-based sample pass to trace over it.
#[derive(Debug, Clone, Copy)]
pub struct RenderTask {
    pub tile: Tile,
    pub sample: u32,
}

/// Hands out (tile, sample pass) work units to any number of threads.
///
/// Claim order is strictly increasing: every tile receives pass k before
/// any tile receives pass k+1, so the whole image converges evenly instead
/// of finishing tile by tile.
pub struct TileScheduler {
    tiles: Vec<Tile>,
    cursor: AtomicU64,
    total_samples: u32,
}

impl TileScheduler {
    pub fn new(width: u32, height: u32, tile_size: u32, total_samples: u32) -> Self {
        let mut scheduler = Self {
            tiles: Vec::new(),
            cursor: AtomicU64::new(0),
            total_samples: 0,
        };
        scheduler.reset(width, height, tile_size, total_samples);
        scheduler
    }

    /// Partition the image into row-major tiles, clipped at the edges, and
    /// rewind the cursor.
    pub fn reset(&mut self, width: u32, height: u32, tile_size: u32, total_samples: u32) {
        self.tiles.clear();

        let mut y = 0;
        while y < height {
            let mut x = 0;
            while x < width {
                let w = tile_size.min(width - x);
                let h = tile_size.min(height - y);
                self.tiles.push(Tile { x, y, w, h });
                x += tile_size;
            }
            y += tile_size;
        }

        self.total_samples = total_samples;
        self.cursor.store(0, Ordering::Relaxed);
    }

    /// Claim the next work unit, or `None` once all units are taken.
    ///
    /// A single relaxed fetch-and-add; nothing downstream depends on
    /// ordering with other threads' claims.
    pub fn next_task(&self) -> Option<RenderTask> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        if index >= self.total_tasks() {
            return None;
        }

        let tile_count = self.tiles.len() as u64;
        let tile_index = (index % tile_count) as usize;
        let sample = (index / tile_count) as u32 + 1;

        Some(RenderTask {
            tile: self.tiles[tile_index],
            sample,
        })
    }

    /// Fraction of work units claimed so far, in [0, 1]. Monotone within a
    /// render; exactly 1.0 once the scheduler is exhausted.
    pub fn progress(&self) -> f32 {
        let total = self.total_tasks();
        if total == 0 {
            return 1.0;
        }
        let claimed = self.cursor.load(Ordering::Relaxed).min(total);
        claimed as f32 / total as f32
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn total_samples(&self) -> u32 {
        self.total_samples
    }

    pub fn total_tasks(&self) -> u64 {
        self.tiles.len() as u64 * u64::from(self.total_samples)
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }
}
