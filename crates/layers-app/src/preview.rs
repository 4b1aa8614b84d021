//! Flat raster previews of a layer set.
//!
//! Each visible layer is drawn as its filled (rotated) bounding box, with
//! shadows and blur regions applied. Good enough to tell drafts apart, not a
//! faithful renderer.

use kurbo::{Affine, Rect};
use layers_core::layer::union_bounds;
use layers_core::{Layer, LayerType};
use layers_render::{
    CanvasPool, MAX_SHADOW_EXTENT, RasterFactory, RasterSurface, ShadowStyle, SurfaceResult, blur_region, drop_shadow,
    parse_css_color,
};
use peniko::Color;

/// Longest side of a preview, in pixels.
pub const DEFAULT_PREVIEW_SIZE: u32 = 256;

const FALLBACK_FILL: Color = Color::from_rgba8(120, 120, 120, 160);

fn layer_color(layer: &Layer) -> Color {
    let paint = [layer.fill.as_deref(), layer.stroke.as_deref()]
        .into_iter()
        .find(|p| Layer::paints(*p))
        .flatten();
    let color = paint.and_then(parse_css_color).unwrap_or(FALLBACK_FILL);
    match layer.opacity {
        Some(opacity) => color.multiply_alpha(opacity.clamp(0.0, 1.0) as f32),
        None => color,
    }
}

fn pixel_box(rect: Rect) -> (i64, i64, u32, u32) {
    let x = rect.x0.floor();
    let y = rect.y0.floor();
    let width = (rect.x1.ceil() - x).max(1.0) as u32;
    let height = (rect.y1.ceil() - y).max(1.0) as u32;
    (x as i64, y as i64, width, height)
}

/// Render `layers` scaled to fit `max_size`. `None` when nothing is visible.
pub fn render_preview(
    layers: &[Layer],
    max_size: u32,
    pool: &mut CanvasPool<RasterFactory>,
) -> SurfaceResult<Option<RasterSurface>> {
    let visible: Vec<&Layer> = layers.iter().filter(|l| l.visible).collect();
    let Some(bounds) = union_bounds(visible.iter().copied()) else {
        return Ok(None);
    };
    if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
        return Ok(None);
    }

    let scale = f64::from(max_size.max(1)) / bounds.width().max(bounds.height());
    let width = (bounds.width() * scale).ceil() as u32;
    let height = (bounds.height() * scale).ceil() as u32;
    let to_preview = Affine::scale(scale) * Affine::translate(-bounds.origin().to_vec2());

    let mut canvas = RasterSurface::new(width, height);
    for layer in visible {
        let rect = to_preview.transform_rect_bbox(layer.rotated_bounds());

        if layer.kind == LayerType::Blur {
            let radius = (layer.blur_radius.unwrap_or(10.0) * scale)
                .round()
                .clamp(1.0, MAX_SHADOW_EXTENT) as u32;
            blur_region(&mut canvas, rect, radius, pool)?;
            continue;
        }

        let (x, y, w, h) = pixel_box(rect);
        let mut shape = pool.get_temp_canvas(w, h)?;
        shape
            .surface_mut()
            .fill_rect(Rect::new(0.0, 0.0, f64::from(w), f64::from(h)), layer_color(layer));

        let style = match layer.kind {
            LayerType::Text => ShadowStyle::text_from_layer(layer),
            _ => ShadowStyle::from_layer(layer),
        }
        .map(|style| style.scaled(scale));
        match style {
            Some(style) => {
                let composited = drop_shadow(shape.surface(), &style, pool)?;
                canvas.draw_surface(
                    composited.entry.surface(),
                    x + composited.origin.x as i64,
                    y + composited.origin.y as i64,
                );
                pool.return_temp_canvas(composited.entry);
            }
            None => canvas.draw_surface(shape.surface(), x, y),
        }
        pool.return_temp_canvas(shape);
    }
    Ok(Some(canvas))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(id: &str, x: f64, y: f64, w: f64, h: f64, fill: &str) -> Layer {
        let mut layer = Layer::rectangle(x, y, w, h);
        layer.id = id.to_string();
        layer.fill = Some(fill.to_string());
        layer
    }

    #[test]
    fn test_empty_set_has_no_preview() {
        let mut pool = CanvasPool::new(RasterFactory);
        assert!(render_preview(&[], 64, &mut pool).unwrap().is_none());

        let mut hidden = rect("a", 0.0, 0.0, 10.0, 10.0, "#ff0000");
        hidden.visible = false;
        assert!(render_preview(&[hidden], 64, &mut pool).unwrap().is_none());
    }

    #[test]
    fn test_preview_scales_to_fit() {
        let mut pool = CanvasPool::new(RasterFactory);
        let layers = vec![
            rect("a", 0.0, 0.0, 100.0, 50.0, "#ff0000"),
            rect("b", 100.0, 50.0, 100.0, 50.0, "#0000ff"),
        ];
        let preview = render_preview(&layers, 64, &mut pool).unwrap().unwrap();
        assert_eq!(preview.pixels().dimensions(), (64, 32));
        assert_eq!(preview.pixel(5, 5), Some([255, 0, 0, 255]));
        assert_eq!(preview.pixel(60, 28), Some([0, 0, 255, 255]));
        assert_eq!(preview.pixel(60, 5), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_shadow_offset_follows_preview_scale() {
        let mut pool = CanvasPool::new(RasterFactory);
        let mut shadowed = rect("a", 0.0, 0.0, 100.0, 100.0, "#ff0000");
        shadowed.shadow = Some(true);
        shadowed.shadow_color = Some("#000000".to_string());
        shadowed.shadow_blur = Some(0.0);
        shadowed.shadow_offset_x = Some(50.0);
        shadowed.shadow_offset_y = Some(0.0);
        let far = rect("b", 300.0, 0.0, 100.0, 100.0, "#0000ff");

        let preview = render_preview(&[shadowed, far], 40, &mut pool).unwrap().unwrap();
        assert_eq!(preview.pixels().dimensions(), (40, 10));
        assert_eq!(preview.pixel(5, 5), Some([255, 0, 0, 255]));
        assert_eq!(preview.pixel(12, 5), Some([0, 0, 0, 255]));
        assert_eq!(preview.pixel(17, 5), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_shadowed_layers_use_the_pool() {
        let mut pool = CanvasPool::new(RasterFactory);
        let mut layer = rect("a", 0.0, 0.0, 40.0, 40.0, "#00ff00");
        layer.shadow = Some(true);
        let other = rect("b", 100.0, 100.0, 20.0, 20.0, "#000000");
        let preview = render_preview(&[layer, other], 120, &mut pool).unwrap();
        assert!(preview.is_some());
        assert!(pool.len() >= 1);
    }
}
