//! Offscreen drawing surfaces.

use kurbo::Rect;
use peniko::Color;
use thiserror::Error;

/// Surface errors.
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Surface unavailable: {0}")]
    Unavailable(String),
    #[error("Surface backend error: {0}")]
    Backend(String),
}

/// Result type for surface operations.
pub type SurfaceResult<T> = Result<T, SurfaceError>;

/// An offscreen surface together with its drawing context.
pub trait Surface {
    /// Width and height in pixels.
    fn size(&self) -> (u32, u32);

    /// Change the dimensions. Contents are cleared either way.
    fn resize(&mut self, width: u32, height: u32) -> SurfaceResult<()>;

    /// Make every pixel transparent.
    fn clear(&mut self);
}

/// Creates surfaces of one backend.
pub trait SurfaceFactory {
    type Surface: Surface;

    fn create(&self, width: u32, height: u32) -> SurfaceResult<Self::Surface>;
}

/// In-memory RGBA surface with straight (non-premultiplied) alpha.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    pixels: image::RgbaImage,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: image::RgbaImage::new(width.max(1), height.max(1)),
        }
    }

    pub fn pixels(&self) -> &image::RgbaImage {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut image::RgbaImage {
        &mut self.pixels
    }

    /// RGBA at `(x, y)`, or `None` outside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.pixels.get_pixel_checked(x, y).map(|p| p.0)
    }

    /// Alpha at signed coordinates, transparent outside the surface.
    pub fn alpha_at(&self, x: i64, y: i64) -> u8 {
        if x < 0 || y < 0 {
            return 0;
        }
        self.pixel(x as u32, y as u32).map_or(0, |p| p[3])
    }

    /// Overwrite the pixels covered by `rect` with `color`.
    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        let rgba = color.to_rgba8();
        let (width, height) = self.pixels.dimensions();
        let x0 = rect.x0.max(0.0).floor() as u32;
        let y0 = rect.y0.max(0.0).floor() as u32;
        let x1 = (rect.x1.max(0.0).ceil() as u32).min(width);
        let y1 = (rect.y1.max(0.0).ceil() as u32).min(height);
        for y in y0..y1 {
            for x in x0..x1 {
                self.pixels
                    .put_pixel(x, y, image::Rgba([rgba.r, rgba.g, rgba.b, rgba.a]));
            }
        }
    }

    /// Composite `source` over this surface with its top-left at `(dx, dy)`.
    pub fn draw_surface(&mut self, source: &RasterSurface, dx: i64, dy: i64) {
        let (width, height) = self.pixels.dimensions();
        for (sx, sy, src) in source.pixels.enumerate_pixels() {
            let x = sx as i64 + dx;
            let y = sy as i64 + dy;
            if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                continue;
            }
            let dst = self.pixels.get_pixel_mut(x as u32, y as u32);
            dst.0 = source_over(src.0, dst.0);
        }
    }
}

/// Porter-Duff source-over on straight-alpha pixels.
fn source_over(src: [u8; 4], dst: [u8; 4]) -> [u8; 4] {
    let sa = f32::from(src[3]) / 255.0;
    if sa >= 1.0 {
        return src;
    }
    let da = f32::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return [0, 0, 0, 0];
    }
    let mut out = [0u8; 4];
    for c in 0..3 {
        let value = (f32::from(src[c]) * sa + f32::from(dst[c]) * da * (1.0 - sa)) / out_a;
        out[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round() as u8;
    out
}

impl Surface for RasterSurface {
    fn size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    fn resize(&mut self, width: u32, height: u32) -> SurfaceResult<()> {
        let (width, height) = (width.max(1), height.max(1));
        if self.pixels.dimensions() == (width, height) {
            self.clear();
        } else {
            self.pixels = image::RgbaImage::new(width, height);
        }
        Ok(())
    }

    fn clear(&mut self) {
        for pixel in self.pixels.pixels_mut() {
            pixel.0 = [0, 0, 0, 0];
        }
    }
}

/// Factory for [`RasterSurface`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterFactory;

impl SurfaceFactory for RasterFactory {
    type Surface = RasterSurface;

    fn create(&self, width: u32, height: u32) -> SurfaceResult<RasterSurface> {
        Ok(RasterSurface::new(width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_rect_clips_to_surface() {
        let mut surface = RasterSurface::new(4, 4);
        surface.fill_rect(Rect::new(-2.0, 2.0, 10.0, 10.0), Color::from_rgba8(255, 0, 0, 255));
        assert_eq!(surface.pixel(0, 1), Some([0, 0, 0, 0]));
        assert_eq!(surface.pixel(3, 3), Some([255, 0, 0, 255]));
        assert_eq!(surface.pixel(4, 4), None);
    }

    #[test]
    fn test_resize_same_size_clears() {
        let mut surface = RasterSurface::new(2, 2);
        surface.fill_rect(Rect::new(0.0, 0.0, 2.0, 2.0), Color::from_rgba8(1, 2, 3, 255));
        surface.resize(2, 2).unwrap();
        assert_eq!(surface.pixel(1, 1), Some([0, 0, 0, 0]));
        surface.resize(5, 3).unwrap();
        assert_eq!(surface.size(), (5, 3));
    }

    #[test]
    fn test_draw_surface_blends_over() {
        let mut base = RasterSurface::new(2, 1);
        base.fill_rect(Rect::new(0.0, 0.0, 2.0, 1.0), Color::from_rgba8(0, 0, 255, 255));
        let mut top = RasterSurface::new(1, 1);
        top.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0), Color::from_rgba8(255, 0, 0, 128));

        base.draw_surface(&top, 1, 0);
        assert_eq!(base.pixel(0, 0), Some([0, 0, 255, 255]));
        let blended = base.pixel(1, 0).unwrap();
        assert_eq!(blended[3], 255);
        assert!(blended[0] > 120 && blended[2] > 120);

        // Fully outside: nothing happens.
        base.draw_surface(&top, 5, 5);
    }
}
