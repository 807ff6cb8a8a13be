// ============================================================================
// PAINT OPERATIONS: round-capped brush and eraser segments
// ============================================================================

use egui::Pos2;
use image::Rgba;
use rayon::prelude::*;

use crate::canvas::{blend_pixel, BlendMode, TiledImage};

/// How a single segment is laid down.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeStyle {
    /// Full line width in canvas pixels.
    pub width: f32,
    pub color: [u8; 4],
    pub opacity: f32,
    /// Clear instead of paint over.
    pub erase: bool,
}

/// Distance from `p` to the segment `a`–`b`.
#[inline]
fn segment_distance(p: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq < 1e-12 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Stamp a capsule from `from` to `to` into `pixels`. The capsule gives the
/// round cap at each end; consecutive segments share endpoints, which makes
/// the join round as well. Coverage is the signed distance at each pixel
/// center with a one-pixel ramp. Returns true when any pixel changed.
pub fn stroke_segment(pixels: &mut TiledImage, from: Pos2, to: Pos2, style: &StrokeStyle) -> bool {
    let radius = style.width.max(0.0) / 2.0;
    let opacity = style.opacity.clamp(0.0, 1.0);
    if radius <= 0.0 || opacity <= 0.0 {
        return false;
    }
    let w = pixels.width() as f32;
    let h = pixels.height() as f32;
    let pad = radius + 1.0;
    let min_x = (from.x.min(to.x) - pad).floor().max(0.0);
    let min_y = (from.y.min(to.y) - pad).floor().max(0.0);
    let max_x = (from.x.max(to.x) + pad).ceil().min(w);
    let max_y = (from.y.max(to.y) + pad).ceil().min(h);
    if min_x >= max_x || min_y >= max_y {
        return false;
    }
    let (x0, x1) = (min_x as u32, max_x as u32);
    let (y0, y1) = (min_y as u32, max_y as u32);

    let source = &*pixels;
    let patches: Vec<(u32, u32, Rgba<u8>)> = (y0..y1)
        .into_par_iter()
        .flat_map_iter(|y| {
            let mut row = Vec::new();
            for x in x0..x1 {
                let center = Pos2::new(x as f32 + 0.5, y as f32 + 0.5);
                let coverage = (radius + 0.5 - segment_distance(center, from, to)).clamp(0.0, 1.0);
                if coverage <= 0.0 {
                    continue;
                }
                let strength = coverage * opacity;
                let dst = *source.get_pixel(x, y);
                let out = if style.erase {
                    erase_pixel(dst, strength)
                } else {
                    blend_pixel(dst, Rgba(style.color), BlendMode::Normal, strength)
                };
                if out != dst {
                    row.push((x, y, out));
                }
            }
            row
        })
        .collect();

    let changed = !patches.is_empty();
    for (x, y, px) in patches {
        pixels.put_pixel(x, y, px);
    }
    changed
}

/// Reduce alpha by `strength`; colour channels are left alone.
#[inline]
fn erase_pixel(dst: Rgba<u8>, strength: f32) -> Rgba<u8> {
    if dst[3] == 0 {
        return dst;
    }
    let a = (dst[3] as f32 * (1.0 - strength)).round() as u8;
    if a == 0 {
        Rgba([0, 0, 0, 0])
    } else {
        Rgba([dst[0], dst[1], dst[2], a])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn style(width: f32, erase: bool) -> StrokeStyle {
        StrokeStyle { width, color: RED, opacity: 1.0, erase }
    }

    #[test]
    fn horizontal_stroke_covers_its_width() {
        let mut img = TiledImage::new_filled(300, 200, WHITE);
        assert!(stroke_segment(&mut img, Pos2::new(100.0, 100.0), Pos2::new(200.0, 100.0), &style(10.0, false)));
        for y in 95..=104 {
            assert_eq!(img.get_pixel(150, y), &Rgba(RED), "row {y}");
        }
        assert_eq!(img.get_pixel(150, 93), &WHITE);
        assert_eq!(img.get_pixel(150, 106), &WHITE);
        // Round cap extends past the end point.
        assert_eq!(img.get_pixel(202, 100), &Rgba(RED));
        assert_eq!(img.get_pixel(210, 100), &WHITE);
    }

    #[test]
    fn zero_length_segment_is_a_dot() {
        let mut img = TiledImage::new(20, 20);
        let p = Pos2::new(10.0, 10.0);
        stroke_segment(&mut img, p, p, &style(6.0, false));
        assert_eq!(img.get_pixel(10, 10), &Rgba(RED));
        assert_eq!(img.get_pixel(10, 16)[3], 0);
    }

    #[test]
    fn eraser_clears_to_transparent() {
        let mut img = TiledImage::new_filled(40, 40, WHITE);
        stroke_segment(&mut img, Pos2::new(5.0, 20.0), Pos2::new(35.0, 20.0), &style(8.0, true));
        assert_eq!(img.get_pixel(20, 20), &Rgba([0, 0, 0, 0]));
        assert_eq!(img.get_pixel(20, 5), &WHITE);
    }

    #[test]
    fn half_opacity_eraser_halves_alpha() {
        let mut img = TiledImage::new_filled(20, 20, WHITE);
        let s = StrokeStyle { opacity: 0.5, ..style(8.0, true) };
        stroke_segment(&mut img, Pos2::new(2.0, 10.0), Pos2::new(18.0, 10.0), &s);
        let px = img.get_pixel(10, 10);
        assert_eq!(px[0], 255);
        assert!((i32::from(px[3]) - 128).abs() <= 1);
    }

    #[test]
    fn stroke_off_canvas_changes_nothing() {
        let mut img = TiledImage::new(20, 20);
        assert!(!stroke_segment(&mut img, Pos2::new(-50.0, -50.0), Pos2::new(-30.0, -40.0), &style(4.0, false)));
        assert!(img.is_empty());
    }
}
