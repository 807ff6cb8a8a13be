// ============================================================================
// COMPOSITOR: flatten the layer stack into one RGBA buffer
// ============================================================================

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::canvas::{blend_pixel, CHUNK_SIZE};
use crate::components::layers::LayerStore;
use crate::error::{EngineError, EngineResult};

const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Flatten visible layers bottom → top over opaque white. Each layer's
/// opacity scales its alpha and its blend mode picks the colour formula.
/// Reads only; the store is never mutated.
pub fn composite(layers: &LayerStore) -> EngineResult<RgbaImage> {
    if let Some((id, layer)) = layers.iter().find(|(_, l)| l.visible && l.tainted) {
        return Err(EngineError::SecurityError(format!(
            "layer {} ('{}') holds pixels from a source without cross-origin access",
            id, layer.name
        )));
    }

    let res = layers.resolution();
    let width = res.width as usize;
    let mut out = RgbaImage::from_pixel(res.width, res.height, PAPER);
    let visible: Vec<_> = layers
        .iter()
        .map(|(_, l)| l)
        .filter(|l| l.visible && l.opacity > 0.0)
        .collect();

    // One band of chunk rows per task; unallocated chunks contribute nothing.
    let band_len = width * 4 * CHUNK_SIZE as usize;
    out.par_chunks_mut(band_len.max(4))
        .enumerate()
        .for_each(|(band, rows)| {
            let row_count = rows.len() / (width * 4);
            for layer in &visible {
                for cx in 0..res.width.div_ceil(CHUNK_SIZE) {
                    let Some(chunk) = layer.pixels.get_chunk(cx, band as u32) else { continue };
                    let x0 = cx * CHUNK_SIZE;
                    let cw = CHUNK_SIZE.min(res.width - x0);
                    for ly in 0..row_count as u32 {
                        for lx in 0..cw {
                            let top = *chunk.get_pixel(lx, ly);
                            if top[3] == 0 {
                                continue;
                            }
                            let off = (ly as usize * width + (x0 + lx) as usize) * 4;
                            let base = Rgba([rows[off], rows[off + 1], rows[off + 2], rows[off + 3]]);
                            let px = blend_pixel(base, top, layer.blend_mode, layer.opacity);
                            rows[off..off + 4].copy_from_slice(&px.0);
                        }
                    }
                }
            }
        });

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{BlendMode, CanvasResolution};

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    #[test]
    fn output_matches_resolution_and_starts_white() {
        let mut layers = LayerStore::new(CanvasResolution::new(130, 70));
        layers.add_layer("empty");
        let out = composite(&layers).unwrap();
        assert_eq!(out.dimensions(), (130, 70));
        assert!(out.pixels().all(|p| *p == PAPER));
    }

    #[test]
    fn upper_layers_win_and_opacity_scales() {
        let mut layers = LayerStore::new(CanvasResolution::new(100, 100));
        let a = layers.add_layer("A");
        layers.get_mut(a).unwrap().pixels.put_pixel(70, 70, RED);
        let out = composite(&layers).unwrap();
        assert_eq!(out.get_pixel(70, 70), &RED);

        layers.set_opacity(a, 0.5).unwrap();
        let out = composite(&layers).unwrap();
        let px = out.get_pixel(70, 70);
        assert_eq!((px[0], px[3]), (255, 255));
        assert!((i32::from(px[1]) - 128).abs() <= 1);
    }

    #[test]
    fn hidden_layers_are_skipped() {
        let mut layers = LayerStore::new(CanvasResolution::new(16, 16));
        let a = layers.add_layer("A");
        layers.get_mut(a).unwrap().pixels.fill(RED);
        layers.toggle_visibility(a).unwrap();
        let out = composite(&layers).unwrap();
        assert_eq!(out.get_pixel(3, 3), &PAPER);
    }

    #[test]
    fn blend_mode_is_honored() {
        let mut layers = LayerStore::new(CanvasResolution::new(8, 8));
        let a = layers.add_layer("A");
        layers.get_mut(a).unwrap().pixels.fill(Rgba([0, 0, 0, 255]));
        layers.set_blend_mode(a, BlendMode::Screen).unwrap();
        let out = composite(&layers).unwrap();
        assert_eq!(out.get_pixel(0, 0), &PAPER);
    }

    #[test]
    fn tainted_visible_layer_blocks_readback() {
        let mut layers = LayerStore::new(CanvasResolution::new(8, 8));
        let a = layers.add_layer("A");
        layers.get_mut(a).unwrap().tainted = true;
        assert!(matches!(composite(&layers), Err(EngineError::SecurityError(_))));
        layers.toggle_visibility(a).unwrap();
        assert!(composite(&layers).is_ok());
    }
}
