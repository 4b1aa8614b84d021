//! Recycle temporary offscreen surfaces.
//!
//! Compositing effects need scratch surfaces for a single frame. Creating a
//! canvas per effect per frame churns memory, so finished surfaces go back
//! into a bounded freelist and are handed out again on the next request.

use crate::surface::{Surface, SurfaceFactory, SurfaceResult};

/// Default number of idle surfaces kept.
pub const DEFAULT_MAX_POOL_SIZE: usize = 5;

/// A surface on loan from a [`CanvasPool`].
///
/// Owned by exactly one borrower until handed back with
/// [`CanvasPool::return_temp_canvas`].
#[derive(Debug)]
pub struct PoolEntry<S> {
    surface: S,
}

impl<S: Surface> PoolEntry<S> {
    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn size(&self) -> (u32, u32) {
        self.surface.size()
    }

    /// Keep the surface instead of returning it.
    pub fn into_surface(self) -> S {
        self.surface
    }
}

/// Pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Surfaces created because the pool was empty.
    pub created: usize,
    /// Requests served from the pool.
    pub reused: usize,
    /// Returned surfaces dropped because the pool was full.
    pub discarded: usize,
}

/// Freelist of idle surfaces.
pub struct CanvasPool<F: SurfaceFactory> {
    factory: F,
    idle: Vec<F::Surface>,
    max_size: usize,
    stats: PoolStats,
}

impl<F: SurfaceFactory> std::fmt::Debug for CanvasPool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasPool")
            .field("idle", &self.idle.len())
            .field("max_size", &self.max_size)
            .field("stats", &self.stats)
            .finish()
    }
}

impl<F: SurfaceFactory> CanvasPool<F> {
    pub fn new(factory: F) -> Self {
        Self::with_max_size(factory, DEFAULT_MAX_POOL_SIZE)
    }

    pub fn with_max_size(factory: F, max_size: usize) -> Self {
        Self {
            factory,
            idle: Vec::with_capacity(max_size),
            max_size,
            stats: PoolStats::default(),
        }
    }

    /// Hand out a cleared surface of the requested size.
    ///
    /// Reuses an idle surface when one exists, otherwise creates one.
    pub fn get_temp_canvas(&mut self, width: u32, height: u32) -> SurfaceResult<PoolEntry<F::Surface>> {
        let surface = match self.idle.pop() {
            Some(mut surface) => {
                surface.resize(width, height)?;
                self.stats.reused += 1;
                surface
            }
            None => {
                let surface = self.factory.create(width, height)?;
                self.stats.created += 1;
                surface
            }
        };
        Ok(PoolEntry { surface })
    }

    /// Give a surface back. Dropped if the pool is full.
    pub fn return_temp_canvas(&mut self, entry: PoolEntry<F::Surface>) {
        let PoolEntry { surface } = entry;
        if self.idle.len() < self.max_size {
            self.idle.push(surface);
        } else {
            self.stats.discarded += 1;
            log::trace!("Canvas pool full, discarding surface");
        }
    }

    /// Drop every idle surface.
    pub fn destroy(&mut self) {
        self.idle.clear();
    }

    /// Idle surfaces currently held.
    pub fn len(&self) -> usize {
        self.idle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idle.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{RasterFactory, SurfaceError};

    struct BrokenFactory;

    impl SurfaceFactory for BrokenFactory {
        type Surface = crate::surface::RasterSurface;

        fn create(&self, _width: u32, _height: u32) -> SurfaceResult<Self::Surface> {
            Err(SurfaceError::Unavailable("no canvas support".to_string()))
        }
    }

    #[test]
    fn test_return_then_get_reuses() {
        let mut pool = CanvasPool::new(RasterFactory);
        let entry = pool.get_temp_canvas(64, 32).unwrap();
        assert_eq!(entry.size(), (64, 32));
        pool.return_temp_canvas(entry);
        assert_eq!(pool.len(), 1);

        let again = pool.get_temp_canvas(64, 32).unwrap();
        assert_eq!(pool.len(), 0);
        assert_eq!(
            pool.stats(),
            PoolStats {
                created: 1,
                reused: 1,
                discarded: 0
            }
        );
        pool.return_temp_canvas(again);
    }

    #[test]
    fn test_reused_surface_is_resized() {
        let mut pool = CanvasPool::new(RasterFactory);
        let entry = pool.get_temp_canvas(10, 10).unwrap();
        pool.return_temp_canvas(entry);
        let entry = pool.get_temp_canvas(20, 5).unwrap();
        assert_eq!(entry.size(), (20, 5));
        assert_eq!(pool.stats().created, 1);
    }

    #[test]
    fn test_full_pool_discards() {
        let mut pool = CanvasPool::with_max_size(RasterFactory, 2);
        let entries: Vec<_> = (0..3).map(|_| pool.get_temp_canvas(4, 4).unwrap()).collect();
        assert_eq!(pool.stats().created, 3);
        for entry in entries {
            pool.return_temp_canvas(entry);
        }
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.stats().discarded, 1);
    }

    #[test]
    fn test_destroy_empties_pool() {
        let mut pool = CanvasPool::new(RasterFactory);
        let a = pool.get_temp_canvas(4, 4).unwrap();
        let b = pool.get_temp_canvas(4, 4).unwrap();
        pool.return_temp_canvas(a);
        pool.return_temp_canvas(b);
        pool.destroy();
        assert!(pool.is_empty());
        // Still usable afterwards.
        assert!(pool.get_temp_canvas(1, 1).is_ok());
    }

    #[test]
    fn test_factory_errors_propagate() {
        let mut pool = CanvasPool::new(BrokenFactory);
        assert!(matches!(
            pool.get_temp_canvas(4, 4),
            Err(SurfaceError::Unavailable(_))
        ));
        assert_eq!(pool.stats().created, 0);
    }
}
