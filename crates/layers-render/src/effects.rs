//! Compositing effects on raster surfaces.
//!
//! Every effect borrows its scratch surfaces from a [`CanvasPool`] and hands
//! them back before returning.

use crate::pool::{CanvasPool, PoolEntry};
use crate::surface::{RasterSurface, Surface, SurfaceError, SurfaceFactory, SurfaceResult};
use kurbo::{Rect, Vec2};
use std::collections::VecDeque;
use layers_core::Layer;
use peniko::Color;

/// Shadow color when a layer does not set one.
pub const DEFAULT_SHADOW_COLOR: Color = Color::from_rgba8(0, 0, 0, 128);
/// Shadow blur when a layer does not set one, in pixels.
pub const DEFAULT_SHADOW_BLUR: f64 = 8.0;
/// Shadow offset on both axes when a layer does not set one, in pixels.
pub const DEFAULT_SHADOW_OFFSET: f64 = 2.0;

/// Upper bound on shadow blur, spread and offsets, in pixels. Larger values
/// from layer data are clamped to it.
pub const MAX_SHADOW_EXTENT: f64 = 256.0;

fn clamp_extent(value: f64, min: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, MAX_SHADOW_EXTENT)
    } else {
        0.0
    }
}

/// Parse a CSS color: `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `rgb()`,
/// `rgba()` or a few keywords.
pub fn parse_css_color(value: &str) -> Option<Color> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex);
    }
    let lower = value.to_ascii_lowercase();
    if let Some(args) = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return parse_rgb_args(args);
    }
    match lower.as_str() {
        "transparent" => Some(Color::from_rgba8(0, 0, 0, 0)),
        "black" => Some(Color::from_rgba8(0, 0, 0, 255)),
        "white" => Some(Color::from_rgba8(255, 255, 255, 255)),
        "red" => Some(Color::from_rgba8(255, 0, 0, 255)),
        "green" => Some(Color::from_rgba8(0, 128, 0, 255)),
        "blue" => Some(Color::from_rgba8(0, 0, 255, 255)),
        "yellow" => Some(Color::from_rgba8(255, 255, 0, 255)),
        _ => None,
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.is_ascii() {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => Some(Color::from_rgba8(nibble(0)?, nibble(1)?, nibble(2)?, 255)),
        4 => Some(Color::from_rgba8(nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?)),
        6 => Some(Color::from_rgba8(byte(0)?, byte(2)?, byte(4)?, 255)),
        8 => Some(Color::from_rgba8(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

fn parse_rgb_args(args: &str) -> Option<Color> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    let channel = |s: &str| -> Option<u8> {
        let v: f64 = s.parse().ok()?;
        Some(v.round().clamp(0.0, 255.0) as u8)
    };
    let (r, g, b) = match parts.as_slice() {
        [r, g, b] | [r, g, b, _] => (channel(*r)?, channel(*g)?, channel(*b)?),
        _ => return None,
    };
    let a = match parts.get(3) {
        Some(a) => {
            let v: f64 = a.parse().ok()?;
            (v.clamp(0.0, 1.0) * 255.0).round() as u8
        }
        None => 255,
    };
    Some(Color::from_rgba8(r, g, b, a))
}

/// Drop shadow parameters.
#[derive(Debug, Clone, Copy)]
pub struct ShadowStyle {
    pub color: Color,
    /// Blur amount, with canvas `shadowBlur` semantics.
    pub blur: f64,
    pub offset: Vec2,
    /// Grow the shadow mask by this many pixels before blurring.
    pub spread: f64,
}

impl ShadowStyle {
    /// Shape shadow of a layer, if enabled.
    pub fn from_layer(layer: &Layer) -> Option<Self> {
        if layer.shadow != Some(true) {
            return None;
        }
        Some(Self {
            color: layer
                .shadow_color
                .as_deref()
                .and_then(parse_css_color)
                .unwrap_or(DEFAULT_SHADOW_COLOR),
            blur: layer.shadow_blur.unwrap_or(DEFAULT_SHADOW_BLUR),
            offset: Vec2::new(
                layer.shadow_offset_x.unwrap_or(DEFAULT_SHADOW_OFFSET),
                layer.shadow_offset_y.unwrap_or(DEFAULT_SHADOW_OFFSET),
            ),
            spread: layer.shadow_spread.unwrap_or(0.0),
        }
        .limited())
    }

    /// Text shadow of a layer, if enabled.
    pub fn text_from_layer(layer: &Layer) -> Option<Self> {
        if layer.text_shadow != Some(true) {
            return None;
        }
        Some(Self {
            color: layer
                .text_shadow_color
                .as_deref()
                .and_then(parse_css_color)
                .unwrap_or(DEFAULT_SHADOW_COLOR),
            blur: layer.text_shadow_blur.unwrap_or(DEFAULT_SHADOW_BLUR),
            offset: Vec2::new(
                layer.text_shadow_offset_x.unwrap_or(DEFAULT_SHADOW_OFFSET),
                layer.text_shadow_offset_y.unwrap_or(DEFAULT_SHADOW_OFFSET),
            ),
            spread: 0.0,
        }
        .limited())
    }

    /// Blur and spread in `[0, MAX_SHADOW_EXTENT]`, offsets within
    /// `MAX_SHADOW_EXTENT` of zero. Non-finite values become zero.
    pub fn limited(self) -> Self {
        Self {
            blur: clamp_extent(self.blur, 0.0),
            offset: Vec2::new(
                clamp_extent(self.offset.x, -MAX_SHADOW_EXTENT),
                clamp_extent(self.offset.y, -MAX_SHADOW_EXTENT),
            ),
            spread: clamp_extent(self.spread, 0.0),
            ..self
        }
    }

    /// Copy with blur, spread and offsets multiplied by `factor`.
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            blur: self.blur * factor,
            offset: self.offset * factor,
            spread: self.spread * factor,
            ..self
        }
        .limited()
    }

    /// Box radius approximating the blur.
    fn blur_radius(&self) -> u32 {
        (self.blur / 2.0).round() as u32
    }

    /// Extra pixels needed on every side to hold the shadow.
    fn margin(&self) -> u32 {
        let reach = self.blur + self.spread + self.offset.x.abs().max(self.offset.y.abs());
        reach.ceil().max(0.0) as u32
    }
}

/// Alpha-weighted box average along one line of pixels, clamping to the
/// edge pixels. Running sums keep the cost independent of `radius`.
fn blur_line(line: &[[u8; 4]], out: &mut Vec<[u8; 4]>, radius: usize) {
    out.clear();
    let Some(last) = line.len().checked_sub(1) else {
        return;
    };
    let weigh = |p: [u8; 4]| {
        let a = u64::from(p[3]);
        [u64::from(p[0]) * a, u64::from(p[1]) * a, u64::from(p[2]) * a, a]
    };
    let window = (2 * radius + 1) as f64;

    let mut sum = [0u64; 4];
    for k in 0..=2 * radius {
        let w = weigh(line[k.saturating_sub(radius).min(last)]);
        (0..4).for_each(|c| sum[c] += w[c]);
    }
    for i in 0..line.len() {
        out.push(if sum[3] == 0 {
            [0, 0, 0, 0]
        } else {
            let a = sum[3] as f64;
            [
                (sum[0] as f64 / a).round() as u8,
                (sum[1] as f64 / a).round() as u8,
                (sum[2] as f64 / a).round() as u8,
                (a / window).round() as u8,
            ]
        });
        let leaving = weigh(line[i.saturating_sub(radius)]);
        let entering = weigh(line[(i + radius + 1).min(last)]);
        (0..4).for_each(|c| sum[c] = sum[c] - leaving[c] + entering[c]);
    }
}

/// One separable pass of the box blur.
fn blur_pass(src: &image::RgbaImage, dst: &mut image::RgbaImage, radius: u32, horizontal: bool) {
    let (width, height) = src.dimensions();
    let radius = radius as usize;
    let (lines, length) = if horizontal { (height, width) } else { (width, height) };
    let at = |line: u32, i: u32| if horizontal { (i, line) } else { (line, i) };

    let mut pixels = Vec::with_capacity(length as usize);
    let mut blurred = Vec::with_capacity(length as usize);
    for line in 0..lines {
        pixels.clear();
        pixels.extend((0..length).map(|i| {
            let (x, y) = at(line, i);
            src.get_pixel(x, y).0
        }));
        blur_line(&pixels, &mut blurred, radius);
        for (i, p) in (0..length).zip(&blurred) {
            let (x, y) = at(line, i);
            dst.put_pixel(x, y, image::Rgba(*p));
        }
    }
}

/// Blur the whole surface with a box of the given radius.
pub fn box_blur<F>(surface: &mut RasterSurface, radius: u32, pool: &mut CanvasPool<F>) -> SurfaceResult<()>
where
    F: SurfaceFactory<Surface = RasterSurface>,
{
    if radius == 0 {
        return Ok(());
    }
    let (width, height) = surface.size();
    let mut scratch = pool.get_temp_canvas(width, height)?;
    blur_pass(surface.pixels(), scratch.surface_mut().pixels_mut(), radius, true);
    blur_pass(scratch.surface().pixels(), surface.pixels_mut(), radius, false);
    pool.return_temp_canvas(scratch);
    Ok(())
}

/// Blur only the pixels inside `region`.
pub fn blur_region<F>(
    surface: &mut RasterSurface,
    region: Rect,
    radius: u32,
    pool: &mut CanvasPool<F>,
) -> SurfaceResult<()>
where
    F: SurfaceFactory<Surface = RasterSurface>,
{
    let (width, height) = surface.size();
    let x0 = region.x0.min(region.x1).max(0.0).floor() as u32;
    let y0 = region.y0.min(region.y1).max(0.0).floor() as u32;
    let x1 = (region.x0.max(region.x1).max(0.0).ceil() as u32).min(width);
    let y1 = (region.y0.max(region.y1).max(0.0).ceil() as u32).min(height);
    if radius == 0 || x1 <= x0 || y1 <= y0 {
        return Ok(());
    }

    let mut patch = pool.get_temp_canvas(x1 - x0, y1 - y0)?;
    for y in y0..y1 {
        for x in x0..x1 {
            let p = *surface.pixels().get_pixel(x, y);
            patch.surface_mut().pixels_mut().put_pixel(x - x0, y - y0, p);
        }
    }
    box_blur(patch.surface_mut(), radius, pool)?;
    for (x, y, p) in patch.surface().pixels().enumerate_pixels() {
        surface.pixels_mut().put_pixel(x + x0, y + y0, *p);
    }
    pool.return_temp_canvas(patch);
    Ok(())
}

/// A composited result together with where it sits relative to the source.
#[derive(Debug)]
pub struct Composited {
    pub entry: PoolEntry<RasterSurface>,
    /// Position of the result's top-left corner relative to the source's.
    pub origin: Vec2,
}

/// Maximum over every window of `2 * radius + 1` values, treating values
/// outside the slice as zero. Output is `2 * radius` longer than the input;
/// entry `j` covers inputs `j - 2 * radius ..= j`.
fn sliding_max(values: &[u8], radius: usize) -> Vec<u8> {
    let span = 2 * radius;
    let mut out = Vec::with_capacity(values.len() + span);
    let mut window: VecDeque<usize> = VecDeque::new();
    for j in 0..values.len() + span {
        if let Some(&v) = values.get(j) {
            while window.back().is_some_and(|&b| values[b] <= v) {
                window.pop_back();
            }
            window.push_back(j);
        }
        while window.front().is_some_and(|&f| f + span < j) {
            window.pop_front();
        }
        out.push(window.front().map_or(0, |&f| values[f]));
    }
    out
}

/// Alpha of `source` grown by `spread` pixels. The mask is `spread` pixels
/// larger than the source on every side.
struct SpreadMask {
    alpha: Vec<u8>,
    width: usize,
    height: usize,
    spread: i64,
}

impl SpreadMask {
    fn new(source: &RasterSurface, spread: u32) -> Self {
        let (w, h) = source.size();
        let (w, h, r) = (w as usize, h as usize, spread as usize);
        let width = w + 2 * r;
        let height = h + 2 * r;

        let mut rows = Vec::with_capacity(width * h);
        let mut line = Vec::with_capacity(w);
        for y in 0..h {
            line.clear();
            line.extend((0..w).map(|x| source.alpha_at(x as i64, y as i64)));
            rows.extend(sliding_max(&line, r));
        }

        let mut alpha = vec![0u8; width * height];
        let mut column = Vec::with_capacity(h);
        for x in 0..width {
            column.clear();
            column.extend((0..h).map(|y| rows[y * width + x]));
            for (y, a) in sliding_max(&column, r).into_iter().enumerate() {
                alpha[y * width + x] = a;
            }
        }
        Self {
            alpha,
            width,
            height,
            spread: i64::from(spread),
        }
    }

    /// Mask value at source coordinates; zero outside.
    fn at(&self, x: i64, y: i64) -> u8 {
        let (mx, my) = (x + self.spread, y + self.spread);
        if mx < 0 || my < 0 || mx as usize >= self.width || my as usize >= self.height {
            return 0;
        }
        self.alpha[my as usize * self.width + mx as usize]
    }
}

fn padded_side(side: u32, margin: u32) -> SurfaceResult<u32> {
    margin
        .checked_mul(2)
        .and_then(|both| side.checked_add(both))
        .ok_or_else(|| {
            SurfaceError::Unavailable(format!("shadow surface too large: {} + 2 * {}", side, margin))
        })
}

/// Render `source` with a tinted, blurred shadow of its alpha underneath.
///
/// The result is a pooled surface large enough to hold the shadow; hand it
/// back with [`CanvasPool::return_temp_canvas`] once drawn.
pub fn drop_shadow<F>(
    source: &RasterSurface,
    style: &ShadowStyle,
    pool: &mut CanvasPool<F>,
) -> SurfaceResult<Composited>
where
    F: SurfaceFactory<Surface = RasterSurface>,
{
    let style = style.limited();
    let margin = style.margin();
    let (width, height) = source.size();
    let mut entry = pool.get_temp_canvas(padded_side(width, margin)?, padded_side(height, margin)?)?;

    let tint = style.color.to_rgba8();
    let shift_x = i64::from(margin) + style.offset.x.round() as i64;
    let shift_y = i64::from(margin) + style.offset.y.round() as i64;
    let mask = SpreadMask::new(source, style.spread.round() as u32);
    for (x, y, pixel) in entry.surface_mut().pixels_mut().enumerate_pixels_mut() {
        let alpha = mask.at(i64::from(x) - shift_x, i64::from(y) - shift_y);
        let a = (u16::from(alpha) * u16::from(tint.a) / 255) as u8;
        pixel.0 = if a == 0 {
            [0, 0, 0, 0]
        } else {
            [tint.r, tint.g, tint.b, a]
        };
    }

    box_blur(entry.surface_mut(), style.blur_radius(), pool)?;
    entry
        .surface_mut()
        .draw_surface(source, i64::from(margin), i64::from(margin));

    let offset = -f64::from(margin);
    Ok(Composited {
        entry,
        origin: Vec2::new(offset, offset),
    })
}
