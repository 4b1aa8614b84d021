//! Layers Render Library
//!
//! Offscreen surfaces, the temporary surface pool and the compositing
//! effects built on it. Raster surfaces work everywhere; `<canvas>` surfaces
//! are available on wasm.

pub mod effects;
mod pool;
mod surface;

#[cfg(target_arch = "wasm32")]
mod web;

pub use effects::{Composited, MAX_SHADOW_EXTENT, ShadowStyle, blur_region, box_blur, drop_shadow, parse_css_color};
pub use pool::{CanvasPool, DEFAULT_MAX_POOL_SIZE, PoolEntry, PoolStats};
pub use surface::{RasterFactory, RasterSurface, Surface, SurfaceError, SurfaceFactory, SurfaceResult};

#[cfg(target_arch = "wasm32")]
pub use web::{CanvasFactory, CanvasSurface};
