// ============================================================================
// GRADIENT FILL: two-stop linear / radial, full layer
// ============================================================================

use egui::Pos2;
use image::Rgba;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::canvas::TiledImage;
use crate::ops::transform::alpha_blend;

/// Shape of the gradient.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradientShape {
    /// Axis from start to end, clamped beyond both anchors.
    #[default]
    Linear,
    /// Centered on start, radius reaches end.
    Radial,
}

impl GradientShape {
    pub fn label(&self) -> &'static str {
        match self {
            GradientShape::Linear => "Linear",
            GradientShape::Radial => "Radial",
        }
    }

    pub fn all() -> &'static [GradientShape] {
        &[GradientShape::Linear, GradientShape::Radial]
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|s| s.label().eq_ignore_ascii_case(name))
    }
}

/// A resolved gradient ready to be sampled.
#[derive(Clone, Debug)]
pub struct Gradient {
    pub shape: GradientShape,
    pub start: Pos2,
    pub end: Pos2,
    /// 256-entry RGBA lookup table.
    lut: Vec<[u8; 4]>,
}

impl Gradient {
    /// Returns `None` when the anchors coincide; such a drag has no axis.
    pub fn new(shape: GradientShape, start: Pos2, end: Pos2, primary: [u8; 4], secondary: [u8; 4]) -> Option<Self> {
        if (end - start).length_sq() < 1e-6 {
            return None;
        }
        let lut = (0..256)
            .map(|i| {
                let t = i as f32 / 255.0;
                let inv = 1.0 - t;
                let mut c = [0u8; 4];
                for (ch, out) in c.iter_mut().enumerate() {
                    *out = (primary[ch] as f32 * inv + secondary[ch] as f32 * t).round() as u8;
                }
                c
            })
            .collect();
        Some(Self { shape, start, end, lut })
    }

    /// Gradient parameter for a canvas position, clamped to 0..1.
    #[inline]
    pub fn compute_t(&self, px: f32, py: f32) -> f32 {
        let (ax, ay) = (self.start.x, self.start.y);
        let dx = self.end.x - ax;
        let dy = self.end.y - ay;
        let len_sq = dx * dx + dy * dy;
        match self.shape {
            GradientShape::Linear => (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0),
            GradientShape::Radial => {
                let dist = ((px - ax) * (px - ax) + (py - ay) * (py - ay)).sqrt();
                (dist / len_sq.sqrt()).clamp(0.0, 1.0)
            }
        }
    }

    /// Sample the LUT at position t (0.0..1.0 clamped).
    #[inline]
    pub fn sample(&self, t: f32) -> [u8; 4] {
        self.lut[(t.clamp(0.0, 1.0) * 255.0).round() as usize]
    }

    /// Colour at an integer pixel coordinate.
    #[inline]
    pub fn color_at(&self, x: u32, y: u32) -> [u8; 4] {
        self.sample(self.compute_t(x as f32, y as f32))
    }

    /// Source-over the gradient across every pixel of `pixels` at `opacity`.
    /// Pixels are sampled at integer coordinates, so an anchor placed on a
    /// pixel receives exactly its stop colour.
    pub fn fill(&self, pixels: &mut TiledImage, opacity: f32) {
        let opacity = opacity.clamp(0.0, 1.0);
        if opacity <= 0.0 {
            return;
        }
        let mut flat = pixels.to_rgba_image();
        let width = flat.width() as usize;
        flat.par_chunks_mut(width * 4)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, px) in row.chunks_exact_mut(4).enumerate() {
                    let mut c = self.color_at(x as u32, y as u32);
                    c[3] = (c[3] as f32 * opacity).round() as u8;
                    let dst = Rgba([px[0], px[1], px[2], px[3]]);
                    px.copy_from_slice(&alpha_blend(dst, Rgba(c)).0);
                }
            });
        *pixels = TiledImage::from_rgba_image(&flat);
    }
}
