use std::sync::Arc;

use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::log_warn;

// ============================================================================
// CANVAS RESOLUTION
// ============================================================================

/// Fixed pixel size shared by every layer buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanvasResolution {
    pub width: u32,
    pub height: u32,
}

/// Largest layer buffer, in pixels.
pub const MAX_CANVAS_PIXELS: u64 = 256_000_000;

impl CanvasResolution {
    /// Used when no template dictates a size.
    pub const DEFAULT: CanvasResolution = CanvasResolution { width: 1024, height: 1024 };
    /// The license-plate variant always paints on this size.
    pub const LICENSE_PLATE: CanvasResolution = CanvasResolution { width: 420, height: 100 };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn size_f32(&self) -> (f32, f32) {
        (self.width as f32, self.height as f32)
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Non-empty and small enough for a layer buffer.
    pub fn is_allocatable(&self) -> bool {
        self.width > 0 && self.height > 0 && self.pixel_count() <= MAX_CANVAS_PIXELS
    }
}

impl std::fmt::Display for CanvasResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}×{}", self.width, self.height)
    }
}

// ============================================================================
// PIXEL RECT
// ============================================================================

/// Axis-aligned pixel rectangle in canvas space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }
}

// ============================================================================
// TILED IMAGE – sparse 64×64 chunk storage (Vec-indexed for speed)
// ============================================================================

pub const CHUNK_SIZE: u32 = 64;

/// A pixel with zero alpha, returned by reference for missing chunks.
static TRANSPARENT_PIXEL: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Sparse tiled image backed by a flat `Vec<Option<Arc<RgbaImage>>>`.
/// Chunk coordinates are mapped to a flat index via `cy * chunks_per_row + cx`.
///
/// Chunks are wrapped in `Arc` for copy-on-write: `clone()` only bumps
/// reference counts and mutations go through `Arc::make_mut`.
#[derive(Clone)]
pub struct TiledImage {
    width: u32,
    height: u32,
    chunks_per_row: u32,
    chunks: Vec<Option<Arc<RgbaImage>>>,
}

impl TiledImage {
    /// Create an empty (fully transparent) tiled image.
    pub fn new(width: u32, height: u32) -> Self {
        let (width, height) = {
            if !CanvasResolution::new(width, height).is_allocatable() {
                log_warn!("TiledImage::new: dimensions {}×{} rejected, clamped to 1×1", width, height);
                (1, 1)
            } else {
                (width, height)
            }
        };
        let chunks_per_row = width.div_ceil(CHUNK_SIZE);
        let chunks_per_col = height.div_ceil(CHUNK_SIZE);
        Self {
            width,
            height,
            chunks_per_row,
            chunks: vec![None; (chunks_per_row * chunks_per_col) as usize],
        }
    }

    /// Allocate and fill with `color`. A transparent fill allocates nothing.
    pub fn new_filled(width: u32, height: u32, color: Rgba<u8>) -> Self {
        let mut img = Self::new(width, height);
        if color[3] > 0 {
            img.fill(color);
        }
        img
    }

    /// Import from a flat `RgbaImage`. Only non-transparent chunks are stored.
    pub fn from_rgba_image(src: &RgbaImage) -> Self {
        let mut img = Self::new(src.width(), src.height());
        if img.width != src.width() || img.height != src.height() {
            return img;
        }
        let width = img.width;
        let height = img.height;
        let per_row = img.chunks_per_row;

        let chunks: Vec<Option<Arc<RgbaImage>>> = (0..img.chunks.len())
            .into_par_iter()
            .map(|flat| {
                let base_x = (flat as u32 % per_row) * CHUNK_SIZE;
                let base_y = (flat as u32 / per_row) * CHUNK_SIZE;
                let cw = CHUNK_SIZE.min(width - base_x);
                let ch = CHUNK_SIZE.min(height - base_y);
                let mut chunk = RgbaImage::new(CHUNK_SIZE, CHUNK_SIZE);
                let mut has_content = false;
                for ly in 0..ch {
                    for lx in 0..cw {
                        let px = *src.get_pixel(base_x + lx, base_y + ly);
                        if px != TRANSPARENT_PIXEL {
                            has_content = true;
                        }
                        chunk.put_pixel(lx, ly, px);
                    }
                }
                has_content.then(|| Arc::new(chunk))
            })
            .collect();

        img.chunks = chunks;
        img
    }

    /// Flatten into a contiguous `RgbaImage`.
    pub fn to_rgba_image(&self) -> RgbaImage {
        let mut out = RgbaImage::new(self.width, self.height);
        for (cx, cy) in self.chunk_keys() {
            let Some(chunk) = self.get_chunk(cx, cy) else { continue };
            let base_x = cx * CHUNK_SIZE;
            let base_y = cy * CHUNK_SIZE;
            let cw = CHUNK_SIZE.min(self.width - base_x);
            let ch = CHUNK_SIZE.min(self.height - base_y);
            for ly in 0..ch {
                for lx in 0..cw {
                    out.put_pixel(base_x + lx, base_y + ly, *chunk.get_pixel(lx, ly));
                }
            }
        }
        out
    }

    #[inline]
    fn chunk_index(&self, x: u32, y: u32) -> usize {
        ((y / CHUNK_SIZE) * self.chunks_per_row + x / CHUNK_SIZE) as usize
    }

    fn ensure_chunk_mut(&mut self, idx: usize) -> &mut RgbaImage {
        let arc = self.chunks[idx]
            .get_or_insert_with(|| Arc::new(RgbaImage::new(CHUNK_SIZE, CHUNK_SIZE)));
        Arc::make_mut(arc)
    }

    /// Read a pixel. Out-of-bounds and unallocated pixels read as transparent.
    pub fn get_pixel(&self, x: u32, y: u32) -> &Rgba<u8> {
        if x >= self.width || y >= self.height {
            return &TRANSPARENT_PIXEL;
        }
        match &self.chunks[self.chunk_index(x, y)] {
            Some(chunk) => chunk.get_pixel(x % CHUNK_SIZE, y % CHUNK_SIZE),
            None => &TRANSPARENT_PIXEL,
        }
    }

    /// Write a pixel. Out-of-bounds writes are dropped.
    pub fn put_pixel(&mut self, x: u32, y: u32, pixel: Rgba<u8>) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = self.chunk_index(x, y);
        if pixel == TRANSPARENT_PIXEL && self.chunks[idx].is_none() {
            return;
        }
        self.ensure_chunk_mut(idx)
            .put_pixel(x % CHUNK_SIZE, y % CHUNK_SIZE, pixel);
    }

    /// Mutable pixel access; allocates the chunk on demand. Caller guarantees bounds.
    pub fn get_pixel_mut(&mut self, x: u32, y: u32) -> &mut Rgba<u8> {
        let idx = self.chunk_index(x, y);
        self.ensure_chunk_mut(idx)
            .get_pixel_mut(x % CHUNK_SIZE, y % CHUNK_SIZE)
    }

    pub fn get_chunk(&self, cx: u32, cy: u32) -> Option<&RgbaImage> {
        let idx = (cy * self.chunks_per_row + cx) as usize;
        self.chunks.get(idx)?.as_deref()
    }

    /// Coordinates of every allocated chunk.
    pub fn chunk_keys(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let per_row = self.chunks_per_row;
        self.chunks
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_some())
            .map(move |(i, _)| (i as u32 % per_row, i as u32 / per_row))
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_some()).count()
    }

    /// True when no pixel carries any data.
    pub fn is_empty(&self) -> bool {
        self.chunks
            .iter()
            .flatten()
            .all(|chunk| chunk.pixels().all(|p| *p == TRANSPARENT_PIXEL))
    }

    pub fn fill(&mut self, color: Rgba<u8>) {
        for slot in &mut self.chunks {
            let arc = slot.get_or_insert_with(|| Arc::new(RgbaImage::new(CHUNK_SIZE, CHUNK_SIZE)));
            for pixel in Arc::make_mut(arc).pixels_mut() {
                *pixel = color;
            }
        }
    }

    /// Drop all chunks (make the image fully transparent).
    pub fn clear(&mut self) {
        for slot in &mut self.chunks {
            *slot = None;
        }
    }

    /// Make every pixel inside `rect` fully transparent. Chunks entirely
    /// covered by the rect are released; partially covered ones are zeroed
    /// pixel by pixel.
    pub fn clear_rect(&mut self, rect: PixelRect) {
        let x1 = (rect.x + rect.width).min(self.width);
        let y1 = (rect.y + rect.height).min(self.height);
        if rect.x >= x1 || rect.y >= y1 {
            return;
        }
        for cy in rect.y / CHUNK_SIZE..y1.div_ceil(CHUNK_SIZE) {
            for cx in rect.x / CHUNK_SIZE..x1.div_ceil(CHUNK_SIZE) {
                let idx = (cy * self.chunks_per_row + cx) as usize;
                if self.chunks[idx].is_none() {
                    continue;
                }
                let base_x = cx * CHUNK_SIZE;
                let base_y = cy * CHUNK_SIZE;
                let chunk_x1 = (base_x + CHUNK_SIZE).min(self.width);
                let chunk_y1 = (base_y + CHUNK_SIZE).min(self.height);
                if rect.x <= base_x && rect.y <= base_y && x1 >= chunk_x1 && y1 >= chunk_y1 {
                    self.chunks[idx] = None;
                    continue;
                }
                let chunk = self.ensure_chunk_mut(idx);
                for gy in rect.y.max(base_y)..y1.min(chunk_y1) {
                    for gx in rect.x.max(base_x)..x1.min(chunk_x1) {
                        chunk.put_pixel(gx - base_x, gy - base_y, TRANSPARENT_PIXEL);
                    }
                }
            }
        }
    }

    /// Copy the pixels inside `rect` into a detached buffer.
    pub fn extract_rect(&self, rect: PixelRect) -> RgbaImage {
        RgbaImage::from_fn(rect.width, rect.height, |x, y| {
            *self.get_pixel(rect.x + x, rect.y + y)
        })
    }

    /// Overwrite pixels starting at (`x`, `y`) with `src`, no blending.
    pub fn write_image(&mut self, x: u32, y: u32, src: &RgbaImage) {
        for (sx, sy, px) in src.enumerate_pixels() {
            self.put_pixel(x + sx, y + sy, *px);
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

// ============================================================================
// BLEND MODES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    Difference,
    Additive,
}

impl BlendMode {
    pub fn all() -> &'static [BlendMode] {
        &[
            BlendMode::Normal,
            BlendMode::Multiply,
            BlendMode::Screen,
            BlendMode::Overlay,
            BlendMode::Darken,
            BlendMode::Lighten,
            BlendMode::Difference,
            BlendMode::Additive,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            BlendMode::Normal => "Normal",
            BlendMode::Multiply => "Multiply",
            BlendMode::Screen => "Screen",
            BlendMode::Overlay => "Overlay",
            BlendMode::Darken => "Darken",
            BlendMode::Lighten => "Lighten",
            BlendMode::Difference => "Difference",
            BlendMode::Additive => "Additive",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(name))
    }
}

/// Blend `top` over `base` with `mode`, scaling `top`'s alpha by `opacity`.
pub fn blend_pixel(base: Rgba<u8>, top: Rgba<u8>, mode: BlendMode, opacity: f32) -> Rgba<u8> {
    // Fast path: fully transparent top pixel: nothing to blend
    if top[3] == 0 || opacity <= 0.0 {
        return base;
    }
    // Fast path: Normal blend, full opacity, fully opaque top pixel: just overwrite
    if mode == BlendMode::Normal && opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let opacity = opacity.clamp(0.0, 1.0);

    let base_r = base[0] as f32 / 255.0;
    let base_g = base[1] as f32 / 255.0;
    let base_b = base[2] as f32 / 255.0;
    let base_a = base[3] as f32 / 255.0;

    let top_r = top[0] as f32 / 255.0;
    let top_g = top[1] as f32 / 255.0;
    let top_b = top[2] as f32 / 255.0;
    let top_a = (top[3] as f32 / 255.0) * opacity;

    let (r, g, b) = match mode {
        BlendMode::Normal => (top_r, top_g, top_b),
        BlendMode::Multiply => (base_r * top_r, base_g * top_g, base_b * top_b),
        BlendMode::Screen => (
            1.0 - (1.0 - base_r) * (1.0 - top_r),
            1.0 - (1.0 - base_g) * (1.0 - top_g),
            1.0 - (1.0 - base_b) * (1.0 - top_b),
        ),
        BlendMode::Overlay => (
            overlay_channel(base_r, top_r),
            overlay_channel(base_g, top_g),
            overlay_channel(base_b, top_b),
        ),
        BlendMode::Darken => (base_r.min(top_r), base_g.min(top_g), base_b.min(top_b)),
        BlendMode::Lighten => (base_r.max(top_r), base_g.max(top_g), base_b.max(top_b)),
        BlendMode::Difference => (
            (base_r - top_r).abs(),
            (base_g - top_g).abs(),
            (base_b - top_b).abs(),
        ),
        BlendMode::Additive => (
            (base_r + top_r).min(1.0),
            (base_g + top_g).min(1.0),
            (base_b + top_b).min(1.0),
        ),
    };

    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let out_r = (r * top_a + base_r * base_a * (1.0 - top_a)) / out_a;
    let out_g = (g * top_a + base_g * base_a * (1.0 - top_a)) / out_a;
    let out_b = (b * top_a + base_b * base_a * (1.0 - top_a)) / out_a;

    Rgba([
        (out_r * 255.0).round().clamp(0.0, 255.0) as u8,
        (out_g * 255.0).round().clamp(0.0, 255.0) as u8,
        (out_b * 255.0).round().clamp(0.0, 255.0) as u8,
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

fn overlay_channel(base: f32, top: f32) -> f32 {
    if base < 0.5 {
        2.0 * base * top
    } else {
        1.0 - 2.0 * (1.0 - base) * (1.0 - top)
    }
}

// ============================================================================
// LAYER
// ============================================================================

pub struct Layer {
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub blend_mode: BlendMode,
    pub pixels: TiledImage,
    /// Bumped on every pixel mutation. Lets callers tell whether a layer
    /// has been edited since some earlier point.
    pub revision: u64,
    /// Set once pixels from a non-CORS-permissive source land here; pixel
    /// readback from a tainted layer is refused.
    pub tainted: bool,
}

impl Layer {
    pub fn new(name: String, resolution: CanvasResolution, fill_color: Rgba<u8>) -> Self {
        Self {
            name,
            visible: true,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            pixels: TiledImage::new_filled(resolution.width, resolution.height, fill_color),
            revision: 0,
            tainted: false,
        }
    }

    /// Record a pixel mutation.
    pub fn touch(&mut self) {
        self.revision += 1;
    }

    pub fn has_content(&self) -> bool {
        !self.pixels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    #[test]
    fn clear_rect_is_pixel_exact_across_chunk_boundaries() {
        let mut img = TiledImage::new_filled(200, 200, RED);
        img.clear_rect(PixelRect::new(60, 60, 10, 80));
        assert_eq!(img.get_pixel(59, 60), &RED);
        assert_eq!(img.get_pixel(60, 60)[3], 0);
        assert_eq!(img.get_pixel(69, 139)[3], 0);
        assert_eq!(img.get_pixel(70, 100), &RED);
        assert_eq!(img.get_pixel(65, 140), &RED);
    }

    #[test]
    fn clear_rect_releases_fully_covered_chunks() {
        let mut img = TiledImage::new_filled(128, 128, RED);
        assert_eq!(img.chunk_count(), 4);
        img.clear_rect(PixelRect::new(0, 0, 64, 64));
        assert_eq!(img.chunk_count(), 3);
    }

    #[test]
    fn extract_then_write_restores_region() {
        let mut img = TiledImage::new(100, 100);
        for y in 10..30 {
            for x in 10..30 {
                img.put_pixel(x, y, Rgba([x as u8, y as u8, 7, 200]));
            }
        }
        let rect = PixelRect::new(5, 5, 40, 40);
        let before = img.to_rgba_image();
        let saved = img.extract_rect(rect);
        img.clear_rect(rect);
        assert!(img.is_empty());
        img.write_image(rect.x, rect.y, &saved);
        assert_eq!(img.to_rgba_image(), before);
    }

    #[test]
    fn transparent_pixels_with_color_survive_round_trip() {
        let mut img = TiledImage::new(70, 70);
        img.put_pixel(66, 66, Rgba([9, 9, 9, 0]));
        assert_eq!(img.get_pixel(66, 66), &Rgba([9, 9, 9, 0]));
        assert!(!img.is_empty());
    }

    #[test]
    fn from_rgba_image_skips_empty_chunks() {
        let mut flat = RgbaImage::new(130, 130);
        flat.put_pixel(129, 129, RED);
        let tiled = TiledImage::from_rgba_image(&flat);
        assert_eq!(tiled.chunk_count(), 1);
        assert_eq!(tiled.to_rgba_image(), flat);
    }

    #[test]
    fn zero_dimensions_clamp_to_one_pixel() {
        let img = TiledImage::new(0, 10);
        assert_eq!((img.width(), img.height()), (1, 1));
    }

    #[test]
    fn normal_blend_respects_opacity() {
        let white = Rgba([255, 255, 255, 255]);
        let half = blend_pixel(white, RED, BlendMode::Normal, 0.5);
        assert_eq!(half[3], 255);
        assert_eq!(half[0], 255);
        assert!((i32::from(half[1]) - 128).abs() <= 1);
        assert_eq!(blend_pixel(white, RED, BlendMode::Normal, 0.0), white);
    }

    #[test]
    fn multiply_darkens() {
        let grey = Rgba([128, 128, 128, 255]);
        let out = blend_pixel(grey, Rgba([128, 255, 0, 255]), BlendMode::Multiply, 1.0);
        assert_eq!(out[1], 128);
        assert_eq!(out[2], 0);
        assert!(out[0] < 128);
    }

    #[test]
    fn blend_mode_names_round_trip() {
        for mode in BlendMode::all() {
            assert_eq!(BlendMode::from_name(mode.name()), Some(*mode));
        }
        assert_eq!(BlendMode::from_name("screen"), Some(BlendMode::Screen));
        assert_eq!(BlendMode::from_name("nope"), None);
    }
}
