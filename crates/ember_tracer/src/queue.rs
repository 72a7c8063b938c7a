//! Completed-tile queue.

use crate::tile::Tile;
use std::sync::Mutex;

/// Thread-safe FIFO of tiles whose latest sample pass has finished.
///
/// Decouples "pixels are converged" from "pixels are presented": workers
/// push once per completed task, the presentation side drains the queue
/// each frame to learn which regions changed.
#[derive(Default)]
pub struct RenderQueue {
    tiles: Mutex<Vec<Tile>>,
}

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, tile: Tile) {
        self.lock().push(tile);
    }

    /// Take every queued tile, leaving the queue empty.
    pub fn flush(&self) -> Vec<Tile> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Tile>> {
        // A worker can't corrupt a Vec<Tile> by panicking mid-push, so a
        // poisoned lock is still usable.
        self.tiles.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_flush_drains() {
        let queue = RenderQueue::new();
        queue.push(Tile { x: 0, y: 0, w: 8, h: 8 });
        queue.push(Tile { x: 8, y: 0, w: 8, h: 8 });

        let tiles = queue.flush();
        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[0], Tile { x: 0, y: 0, w: 8, h: 8 });

        assert!(queue.flush().is_empty());
    }

    #[test]
    fn test_concurrent_pushes_all_arrive() {
        use std::sync::Arc;

        let queue = Arc::new(RenderQueue::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for j in 0..100 {
                        queue.push(Tile { x: i, y: j, w: 1, h: 1 });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.flush().len(), 400);
    }
}
