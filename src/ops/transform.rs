// ============================================================================
// TRANSFORM OPERATIONS: resample, mirror and rasterize floating fragments
// ============================================================================

use egui::{Pos2, Vec2};
use image::{imageops, Rgba, RgbaImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::canvas::TiledImage;

/// Interpolation method for fragment resampling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    Nearest,
    #[default]
    Bilinear,
    Bicubic,
    Lanczos3,
}

impl Interpolation {
    pub fn label(&self) -> &'static str {
        match self {
            Interpolation::Nearest => "Nearest",
            Interpolation::Bilinear => "Bilinear",
            Interpolation::Bicubic => "Bicubic",
            Interpolation::Lanczos3 => "Lanczos3",
        }
    }

    pub fn all() -> &'static [Interpolation] {
        &[
            Interpolation::Nearest,
            Interpolation::Bilinear,
            Interpolation::Bicubic,
            Interpolation::Lanczos3,
        ]
    }

    pub fn to_filter(&self) -> imageops::FilterType {
        match self {
            Interpolation::Nearest => imageops::FilterType::Nearest,
            Interpolation::Bilinear => imageops::FilterType::Triangle,
            Interpolation::Bicubic => imageops::FilterType::CatmullRom,
            Interpolation::Lanczos3 => imageops::FilterType::Lanczos3,
        }
    }

    /// Case-insensitive lookup by label.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|i| i.label().eq_ignore_ascii_case(name))
    }
}

/// Where and how a fragment lands on the canvas, in canvas pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// Center of the placed fragment.
    pub center: Pos2,
    /// Target size after scaling (always ≥ 1×1).
    pub width: u32,
    pub height: u32,
    pub rotation_deg: f32,
    pub flip_x: bool,
    pub flip_y: bool,
}

impl Placement {
    /// Corners of the placed fragment (TL, TR, BL, BR) after rotation.
    pub fn corners(&self) -> [Pos2; 4] {
        let hw = self.width as f32 / 2.0;
        let hh = self.height as f32 / 2.0;
        let (sin, cos) = self.rotation_deg.to_radians().sin_cos();
        let c = self.center;
        [(-hw, -hh), (hw, -hh), (-hw, hh), (hw, hh)].map(|(x, y)| {
            Pos2::new(c.x + x * cos - y * sin, c.y + x * sin + y * cos)
        })
    }
}

/// Scale `source` to the placement size and apply mirroring.
pub fn prepare_source(source: &RgbaImage, placement: &Placement, interp: Interpolation) -> RgbaImage {
    let mut scaled = if source.dimensions() == (placement.width, placement.height) {
        source.clone()
    } else {
        imageops::resize(source, placement.width, placement.height, interp.to_filter())
    };
    if placement.flip_x {
        imageops::flip_horizontal_in_place(&mut scaled);
    }
    if placement.flip_y {
        imageops::flip_vertical_in_place(&mut scaled);
    }
    scaled
}

/// Source-over `source` onto `target` at `placement`. Each destination pixel
/// center is mapped back through the inverse rotation into the scaled
/// source. Returns the number of destination pixels written.
pub fn rasterize_fragment(
    target: &mut TiledImage,
    source: &RgbaImage,
    placement: &Placement,
    interp: Interpolation,
) -> usize {
    if source.width() == 0 || source.height() == 0 {
        return 0;
    }
    let scaled = prepare_source(source, placement, interp);
    let (sw, sh) = scaled.dimensions();
    let cw = target.width();
    let ch = target.height();

    // Tight bounding box of the rotated fragment.
    let corners = placement.corners();
    let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
    let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
    for c in &corners {
        min_x = min_x.min(c.x);
        min_y = min_y.min(c.y);
        max_x = max_x.max(c.x);
        max_y = max_y.max(c.y);
    }
    if max_x < 0.0 || max_y < 0.0 || min_x >= cw as f32 || min_y >= ch as f32 {
        return 0;
    }
    let row_start = min_y.floor().max(0.0) as u32;
    let row_end = (max_y.ceil() as u32).min(ch);
    let col_start = min_x.floor().max(0.0) as u32;
    let col_end = (max_x.ceil() as u32).min(cw);

    let (sin, cos) = placement.rotation_deg.to_radians().sin_cos();
    let center = placement.center;
    let origin = snap(Vec2::new(
        center.x - sw as f32 / 2.0,
        center.y - sh as f32 / 2.0,
    ));
    let rotated = placement.rotation_deg.rem_euclid(360.0) != 0.0;

    let target_ref = &*target;
    let patches: Vec<(u32, u32, Rgba<u8>)> = (row_start..row_end)
        .into_par_iter()
        .flat_map_iter(|dy| {
            let mut row = Vec::new();
            let py = dy as f32 + 0.5;
            for dx in col_start..col_end {
                let px = dx as f32 + 0.5;
                let (ux, uy) = if rotated {
                    let rx = px - center.x;
                    let ry = py - center.y;
                    (rx * cos + ry * sin + center.x, -rx * sin + ry * cos + center.y)
                } else {
                    (px, py)
                };
                let local_x = ux - origin.x;
                let local_y = uy - origin.y;
                if local_x < 0.0 || local_y < 0.0 || local_x >= sw as f32 || local_y >= sh as f32 {
                    continue;
                }
                let src = match interp {
                    Interpolation::Nearest => {
                        *scaled.get_pixel((local_x as u32).min(sw - 1), (local_y as u32).min(sh - 1))
                    }
                    _ => sample_bilinear(&scaled, local_x - 0.5, local_y - 0.5),
                };
                let dst = *target_ref.get_pixel(dx, dy);
                // Colour under zero alpha survives only onto empty pixels.
                if src[3] == 0 && (src.0 == [0; 4] || dst[3] != 0) {
                    continue;
                }
                row.push((dx, dy, alpha_blend(dst, src)));
            }
            row
        })
        .collect();

    let written = patches.len();
    for (x, y, px) in patches {
        target.put_pixel(x, y, px);
    }
    written
}

/// Pull near-integral offsets onto the pixel grid so float noise from the
/// display round trip cannot shift an unrotated fragment by a sub-pixel.
fn snap(v: Vec2) -> Vec2 {
    let snap1 = |f: f32| {
        let r = f.round();
        if (f - r).abs() < 1e-3 { r } else { f }
    };
    Vec2::new(snap1(v.x), snap1(v.y))
}

/// Bilinear interpolation sample from an RgbaImage at fractional coords.
/// Clamp-to-edge for out-of-bounds taps so borders never pick up
/// transparent black.
#[inline]
pub fn sample_bilinear(img: &RgbaImage, x: f32, y: f32) -> Rgba<u8> {
    let (w, h) = img.dimensions();
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let sample = |sx: i32, sy: i32| -> [f32; 4] {
        let cx = sx.clamp(0, w as i32 - 1) as u32;
        let cy = sy.clamp(0, h as i32 - 1) as u32;
        let p = img.get_pixel(cx, cy).0;
        [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32]
    };

    let p00 = sample(x0, y0);
    let p10 = sample(x0 + 1, y0);
    let p01 = sample(x0, y0 + 1);
    let p11 = sample(x0 + 1, y0 + 1);

    let w00 = (1.0 - fx) * (1.0 - fy);
    let w10 = fx * (1.0 - fy);
    let w01 = (1.0 - fx) * fy;
    let w11 = fx * fy;

    let mut out = [0u8; 4];
    for (i, o) in out.iter_mut().enumerate() {
        *o = (p00[i] * w00 + p10[i] * w10 + p01[i] * w01 + p11[i] * w11)
            .round()
            .clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

/// Simple alpha-composite: src over dst.
pub fn alpha_blend(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    if src[3] == 255 || dst[3] == 0 {
        return src;
    }
    if src[3] == 0 {
        return dst;
    }
    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }
    let inv = 1.0 / out_a;
    let ch = |i: usize| {
        ((src[i] as f32 * sa + dst[i] as f32 * da * (1.0 - sa)) * inv)
            .round()
            .clamp(0.0, 255.0) as u8
    };
    Rgba([ch(0), ch(1), ch(2), (out_a * 255.0).round().clamp(0.0, 255.0) as u8])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| Rgba([(x * 13) as u8, (y * 7) as u8, ((x + y) % 2 * 255) as u8, 255]))
    }

    fn placement_at(x: u32, y: u32, src: &RgbaImage) -> Placement {
        Placement {
            center: Pos2::new(x as f32 + src.width() as f32 / 2.0, y as f32 + src.height() as f32 / 2.0),
            width: src.width(),
            height: src.height(),
            rotation_deg: 0.0,
            flip_x: false,
            flip_y: false,
        }
    }

    #[test]
    fn identity_placement_is_pixel_exact() {
        for interp in [Interpolation::Bilinear, Interpolation::Nearest] {
            let src = checker(21, 17);
            let mut target = TiledImage::new(80, 80);
            let written = rasterize_fragment(&mut target, &src, &placement_at(30, 10, &src), interp);
            assert_eq!(written, 21 * 17);
            assert_eq!(target.extract_rect(crate::canvas::PixelRect::new(30, 10, 21, 17)), src);
            assert_eq!(target.get_pixel(29, 10)[3], 0);
            assert_eq!(target.get_pixel(51, 10)[3], 0);
        }
    }

    #[test]
    fn transparent_colour_is_kept_on_empty_target() {
        let mut src = checker(6, 6);
        src.put_pixel(2, 3, Rgba([10, 20, 30, 0]));
        src.put_pixel(4, 1, Rgba([0, 0, 0, 0]));
        let mut target = TiledImage::new(16, 16);
        rasterize_fragment(&mut target, &src, &placement_at(5, 5, &src), Interpolation::Bilinear);
        assert_eq!(target.extract_rect(crate::canvas::PixelRect::new(5, 5, 6, 6)), src);

        // Over existing content a zero-alpha pixel changes nothing.
        let mut filled = TiledImage::new_filled(16, 16, Rgba([1, 2, 3, 255]));
        rasterize_fragment(&mut filled, &src, &placement_at(5, 5, &src), Interpolation::Bilinear);
        assert_eq!(filled.get_pixel(7, 8), &Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn mirror_flips_source() {
        let src = RgbaImage::from_fn(2, 1, |x, _| if x == 0 { Rgba([255, 0, 0, 255]) } else { Rgba([0, 0, 255, 255]) });
        let mut target = TiledImage::new(4, 4);
        let mut placement = placement_at(1, 1, &src);
        placement.flip_x = true;
        rasterize_fragment(&mut target, &src, &placement, Interpolation::Nearest);
        assert_eq!(target.get_pixel(1, 1), &Rgba([0, 0, 255, 255]));
        assert_eq!(target.get_pixel(2, 1), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn quarter_turn_swaps_extent() {
        let src = RgbaImage::from_pixel(10, 2, Rgba([0, 255, 0, 255]));
        let mut target = TiledImage::new(20, 20);
        let placement = Placement { rotation_deg: 90.0, ..placement_at(5, 9, &src) };
        rasterize_fragment(&mut target, &src, &placement, Interpolation::Nearest);
        // Horizontal bar centered at (10, 10) becomes a vertical bar.
        assert_eq!(target.get_pixel(10, 6)[3], 255);
        assert_eq!(target.get_pixel(10, 13)[3], 255);
        assert_eq!(target.get_pixel(6, 10)[3], 0);
    }

    #[test]
    fn placement_outside_canvas_writes_nothing() {
        let src = checker(4, 4);
        let mut target = TiledImage::new(8, 8);
        let placement = Placement { center: Pos2::new(-20.0, 3.0), ..placement_at(0, 0, &src) };
        assert_eq!(rasterize_fragment(&mut target, &src, &placement, Interpolation::Bilinear), 0);
        assert!(target.is_empty());
    }

    #[test]
    fn alpha_blend_over_opaque() {
        let out = alpha_blend(Rgba([0, 0, 0, 255]), Rgba([255, 255, 255, 128]));
        assert_eq!(out[3], 255);
        assert!((i32::from(out[0]) - 128).abs() <= 1);
    }
}
