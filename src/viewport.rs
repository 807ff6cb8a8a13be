//! Display ↔ canvas coordinate mapping.
//!
//! The canvas is shown "contain"-style inside whatever rectangle the host
//! gives it: scaled uniformly until it touches the container on one axis and
//! centered on the other. A [`ViewportMapper`] is built from the current
//! container and resolution every time it is needed and never stored, so a
//! resize is picked up by the very next pointer event.

use egui::{Pos2, Rect, Vec2};

use crate::canvas::CanvasResolution;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportMapper {
    resolution: CanvasResolution,
    display_rect: Rect,
}

impl ViewportMapper {
    pub fn new(container: Rect, resolution: CanvasResolution) -> Self {
        Self {
            resolution,
            display_rect: contain_layout(container, resolution),
        }
    }

    /// The rectangle the canvas occupies on screen.
    pub fn display_rect(&self) -> Rect {
        self.display_rect
    }

    pub fn resolution(&self) -> CanvasResolution {
        self.resolution
    }

    /// False when the container collapsed to nothing; conversions then fail.
    pub fn is_usable(&self) -> bool {
        self.display_rect.width() > 0.0 && self.display_rect.height() > 0.0
    }

    /// Canvas pixels per display pixel, per axis.
    pub fn canvas_per_display(&self) -> Option<Vec2> {
        if !self.is_usable() {
            return None;
        }
        let (w, h) = self.resolution.size_f32();
        Some(Vec2::new(
            w / self.display_rect.width(),
            h / self.display_rect.height(),
        ))
    }

    /// `(client - origin) * (resolution / display size)`. Points outside the
    /// display rect map outside the canvas; callers decide what to do with them.
    pub fn to_canvas(&self, client: Pos2) -> Option<Pos2> {
        let ratio = self.canvas_per_display()?;
        let rel = client - self.display_rect.min;
        Some(Pos2::new(rel.x * ratio.x, rel.y * ratio.y))
    }

    pub fn to_display(&self, canvas: Pos2) -> Option<Pos2> {
        let ratio = self.canvas_per_display()?;
        Some(Pos2::new(
            self.display_rect.min.x + canvas.x / ratio.x,
            self.display_rect.min.y + canvas.y / ratio.y,
        ))
    }

    /// Convert a display-space offset into canvas pixels.
    pub fn delta_to_canvas(&self, delta: Vec2) -> Option<Vec2> {
        let ratio = self.canvas_per_display()?;
        Some(Vec2::new(delta.x * ratio.x, delta.y * ratio.y))
    }

    /// Convert a canvas-pixel offset into display pixels.
    pub fn delta_to_display(&self, delta: Vec2) -> Option<Vec2> {
        let ratio = self.canvas_per_display()?;
        Some(Vec2::new(delta.x / ratio.x, delta.y / ratio.y))
    }

    pub fn contains(&self, client: Pos2) -> bool {
        self.display_rect.contains(client)
    }
}

/// Largest rect with the resolution's aspect ratio that fits `container`,
/// centered inside it.
pub fn contain_layout(container: Rect, resolution: CanvasResolution) -> Rect {
    let (w, h) = resolution.size_f32();
    if w <= 0.0 || h <= 0.0 || container.width() <= 0.0 || container.height() <= 0.0 {
        return Rect::from_min_size(container.min, Vec2::ZERO);
    }
    let scale = (container.width() / w).min(container.height() / h);
    Rect::from_center_size(container.center(), Vec2::new(w * scale, h * scale))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn wide_container_letterboxes_horizontally() {
        let container = Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 400.0));
        let rect = contain_layout(container, CanvasResolution::new(1024, 1024));
        assert!(approx(rect.width(), 400.0));
        assert!(approx(rect.height(), 400.0));
        assert!(approx(rect.min.x, 200.0));
        assert!(approx(rect.min.y, 0.0));
    }

    #[test]
    fn plate_aspect_is_preserved() {
        let container = Rect::from_min_size(Pos2::new(10.0, 20.0), Vec2::new(500.0, 500.0));
        let rect = contain_layout(container, CanvasResolution::LICENSE_PLATE);
        assert!(approx(rect.width() / rect.height(), 4.2));
        assert!(approx(rect.width(), 500.0));
        assert!(approx(rect.center().y, 270.0));
    }

    #[test]
    fn pointer_maps_to_canvas_pixels() {
        let container = Rect::from_min_size(Pos2::new(100.0, 50.0), Vec2::new(512.0, 512.0));
        let mapper = ViewportMapper::new(container, CanvasResolution::new(1024, 1024));
        let p = mapper.to_canvas(Pos2::new(356.0, 306.0)).unwrap();
        assert!(approx(p.x, 512.0));
        assert!(approx(p.y, 512.0));
        let back = mapper.to_display(p).unwrap();
        assert!(approx(back.x, 356.0));
        assert!(approx(back.y, 306.0));
    }

    #[test]
    fn points_outside_map_outside() {
        let container = Rect::from_min_size(Pos2::ZERO, Vec2::new(100.0, 100.0));
        let mapper = ViewportMapper::new(container, CanvasResolution::new(200, 200));
        let p = mapper.to_canvas(Pos2::new(-10.0, 150.0)).unwrap();
        assert!(approx(p.x, -20.0));
        assert!(approx(p.y, 300.0));
        assert!(!mapper.contains(Pos2::new(-10.0, 150.0)));
    }

    #[test]
    fn collapsed_container_refuses_conversion() {
        let container = Rect::from_min_size(Pos2::ZERO, Vec2::new(0.0, 300.0));
        let mapper = ViewportMapper::new(container, CanvasResolution::DEFAULT);
        assert!(!mapper.is_usable());
        assert!(mapper.to_canvas(Pos2::new(1.0, 1.0)).is_none());
    }
}
