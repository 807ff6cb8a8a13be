use egui::Pos2;
use serde::{Deserialize, Serialize};

use crate::canvas::{CanvasResolution, PixelRect};
use crate::components::gizmo::{GizmoDrag, PendingFragment};
use crate::components::layers::LayerStore;
use crate::error::{EngineError, EngineResult};
use crate::io::ExternalImage;
use crate::ops::gradient::{Gradient, GradientShape};
use crate::ops::paint::{stroke_segment, StrokeStyle};
use crate::viewport::ViewportMapper;
use crate::{log_info, log_warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    #[default]
    Brush,
    Eraser,
    Gradient,
    /// Rectangular cut that lifts pixels into a floating fragment.
    Transform,
    Fill,
    Line,
    Rectangle,
    Ellipse,
    Lasso,
}

impl Tool {
    pub fn all() -> &'static [Tool] {
        &[
            Tool::Brush,
            Tool::Eraser,
            Tool::Gradient,
            Tool::Transform,
            Tool::Fill,
            Tool::Line,
            Tool::Rectangle,
            Tool::Ellipse,
            Tool::Lasso,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tool::Brush => "brush",
            Tool::Eraser => "eraser",
            Tool::Gradient => "gradient",
            Tool::Transform => "transform",
            Tool::Fill => "fill",
            Tool::Line => "line",
            Tool::Rectangle => "rectangle",
            Tool::Ellipse => "ellipse",
            Tool::Lasso => "lasso",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::all().iter().copied().find(|t| t.name().eq_ignore_ascii_case(name))
    }

    /// Declared but without committing behaviour; pointer input is ignored.
    pub fn is_inert(&self) -> bool {
        matches!(self, Tool::Fill | Tool::Line | Tool::Rectangle | Tool::Ellipse | Tool::Lasso)
    }
}

/// Shared settings for the drawing tools.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolProperties {
    /// Line width in canvas pixels.
    pub size: f32,
    pub primary: [u8; 4],
    pub secondary: [u8; 4],
    /// 0..1, applied to strokes, erasing and gradient fills.
    pub opacity: f32,
    pub gradient_shape: GradientShape,
}

impl Default for ToolProperties {
    fn default() -> Self {
        Self {
            size: 10.0,
            primary: [0, 0, 0, 255],
            secondary: [255, 255, 255, 255],
            opacity: 1.0,
            gradient_shape: GradientShape::Linear,
        }
    }
}

/// The one thing the editor is doing right now. Drawing, selecting and
/// placing are exclusive by construction.
pub enum Interaction {
    Idle,
    /// Brush / eraser stroke or gradient drag. `anchor` is the press point.
    Drawing { tool: Tool, anchor: Pos2, last: Pos2 },
    /// Rectangular cut in progress.
    Selecting { start: Pos2, end: Pos2 },
    /// External image queued for decode; input that would draw is ignored.
    Decoding { image: ExternalImage },
    /// A floating fragment awaits commit or cancel.
    Placing { fragment: PendingFragment, drag: Option<GizmoDrag> },
}

impl Interaction {
    pub fn name(&self) -> &'static str {
        match self {
            Interaction::Idle => "idle",
            Interaction::Drawing { .. } => "drawing",
            Interaction::Selecting { .. } => "selecting",
            Interaction::Decoding { .. } => "decoding",
            Interaction::Placing { .. } => "placing",
        }
    }
}

/// Parameters a cut needs from outside the controller.
pub struct CutContext<'a> {
    pub viewport: &'a ViewportMapper,
    pub min_selection_px: u32,
}

/// Pointer state machine for the drawing tools. Points arrive already in
/// canvas space.
pub struct ToolController {
    pub active_tool: Tool,
    pub properties: ToolProperties,
    state: Interaction,
}

impl ToolController {
    pub fn new(properties: ToolProperties) -> Self {
        Self { active_tool: Tool::default(), properties, state: Interaction::Idle }
    }

    pub fn state(&self) -> &Interaction {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut Interaction {
        &mut self.state
    }

    pub fn set_state(&mut self, state: Interaction) {
        self.state = state;
    }

    /// Hand the current interaction to the caller and go idle.
    pub fn take_state(&mut self) -> Interaction {
        std::mem::replace(&mut self.state, Interaction::Idle)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, Interaction::Idle)
    }

    pub fn pending_fragment(&self) -> Option<&PendingFragment> {
        match &self.state {
            Interaction::Placing { fragment, .. } => Some(fragment),
            _ => None,
        }
    }

    pub fn pending_fragment_mut(&mut self) -> Option<&mut PendingFragment> {
        match &mut self.state {
            Interaction::Placing { fragment, .. } => Some(fragment),
            _ => None,
        }
    }

    fn stroke_style(&self, tool: Tool) -> StrokeStyle {
        StrokeStyle {
            width: self.properties.size,
            color: self.properties.primary,
            opacity: self.properties.opacity,
            erase: tool == Tool::Eraser,
        }
    }

    /// Pointer down. Returns true when a drag began and the pointer should
    /// be captured. Only starts from `Idle`.
    pub fn press(&mut self, p: Pos2) -> bool {
        if !self.is_idle() {
            return false;
        }
        let tool = self.active_tool;
        self.state = match tool {
            Tool::Brush | Tool::Eraser | Tool::Gradient => Interaction::Drawing { tool, anchor: p, last: p },
            Tool::Transform => Interaction::Selecting { start: p, end: p },
            _ => {
                log_info!("Tool '{}' has no committing behaviour; input ignored", tool.name());
                return false;
            }
        };
        true
    }

    /// Pointer move while captured. Brush and eraser commit each segment
    /// immediately.
    pub fn drag(&mut self, p: Pos2, layers: &mut LayerStore) {
        let style = match &self.state {
            Interaction::Drawing { tool, .. } => self.stroke_style(*tool),
            _ => self.stroke_style(Tool::Brush),
        };
        match &mut self.state {
            Interaction::Drawing { tool: Tool::Gradient, last, .. } => *last = p,
            Interaction::Drawing { last, .. } => {
                let layer = layers.active_mut();
                if stroke_segment(&mut layer.pixels, *last, p, &style) {
                    layer.touch();
                }
                *last = p;
            }
            Interaction::Selecting { end, .. } => *end = p,
            _ => {}
        }
    }

    /// Pointer up. Finishes the drag; a qualifying cut moves the controller
    /// into `Placing`.
    pub fn release(&mut self, p: Pos2, layers: &mut LayerStore, ctx: &CutContext<'_>) -> EngineResult<()> {
        self.drag(p, layers);
        match self.take_state() {
            Interaction::Drawing { tool: Tool::Gradient, anchor, last } => {
                self.commit_gradient(anchor, last, layers);
                Ok(())
            }
            Interaction::Selecting { start, end } => self.cut(start, end, layers, ctx),
            other @ (Interaction::Decoding { .. } | Interaction::Placing { .. }) => {
                self.state = other;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Pointer cancelled. Segments already stroked stay; gradient and
    /// selection drags are dropped.
    pub fn abort(&mut self) {
        if matches!(self.state, Interaction::Drawing { .. } | Interaction::Selecting { .. }) {
            self.state = Interaction::Idle;
        }
    }

    fn commit_gradient(&self, start: Pos2, end: Pos2, layers: &mut LayerStore) {
        let props = &self.properties;
        let Some(gradient) = Gradient::new(props.gradient_shape, start, end, props.primary, props.secondary) else {
            log_info!("Zero-length gradient discarded");
            return;
        };
        let layer = layers.active_mut();
        gradient.fill(&mut layer.pixels, props.opacity);
        layer.touch();
        log_info!(
            "{} gradient ({:.1}, {:.1}) → ({:.1}, {:.1})",
            gradient.shape.label(),
            start.x,
            start.y,
            end.x,
            end.y
        );
    }

    fn cut(&mut self, start: Pos2, end: Pos2, layers: &mut LayerStore, ctx: &CutContext<'_>) -> EngineResult<()> {
        let rect = selection_rect(start, end, layers.resolution());
        if rect.width <= ctx.min_selection_px || rect.height <= ctx.min_selection_px {
            log_info!("Selection {}×{} below threshold, discarded", rect.width, rect.height);
            return Ok(());
        }
        let source = layers.active_id();
        let layer = layers.active_mut();
        if layer.tainted {
            log_warn!("Cut refused: layer {} holds cross-origin pixels", source);
            return Err(EngineError::SecurityError(format!(
                "cannot extract pixels from layer '{}'",
                layer.name
            )));
        }
        let pixels = layer.pixels.extract_rect(rect);
        layer.pixels.clear_rect(rect);
        layer.touch();
        log_info!("Cut {}×{} at ({}, {}) from layer {}", rect.width, rect.height, rect.x, rect.y, source);
        let fragment = PendingFragment::from_cut(pixels, source, rect, ctx.viewport);
        self.state = Interaction::Placing { fragment, drag: None };
        Ok(())
    }

    /// Start and current end of an in-progress gradient drag.
    pub fn gradient_preview(&self) -> Option<(Pos2, Pos2)> {
        match self.state {
            Interaction::Drawing { tool: Tool::Gradient, anchor, last } => Some((anchor, last)),
            _ => None,
        }
    }

    /// The rectangle an in-progress cut would lift.
    pub fn selection_preview(&self, resolution: CanvasResolution) -> Option<PixelRect> {
        match self.state {
            Interaction::Selecting { start, end } => Some(selection_rect(start, end, resolution)),
            _ => None,
        }
    }
}

/// Axis-aligned pixel rect spanned by two canvas points, rounded to the
/// grid and clamped to the canvas.
pub fn selection_rect(a: Pos2, b: Pos2, resolution: CanvasResolution) -> PixelRect {
    let (w, h) = resolution.size_f32();
    let x0 = a.x.min(b.x).round().clamp(0.0, w) as u32;
    let x1 = a.x.max(b.x).round().clamp(0.0, w) as u32;
    let y0 = a.y.min(b.y).round().clamp(0.0, h) as u32;
    let y1 = a.y.max(b.y).round().clamp(0.0, h) as u32;
    PixelRect::new(x0, y0, x1 - x0, y1 - y0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::{Rect, Vec2};
    use image::Rgba;

    const RES: CanvasResolution = CanvasResolution { width: 64, height: 64 };

    fn viewport() -> ViewportMapper {
        ViewportMapper::new(Rect::from_min_size(Pos2::ZERO, Vec2::splat(64.0)), RES)
    }

    fn release(tc: &mut ToolController, p: Pos2, layers: &mut LayerStore) -> EngineResult<()> {
        let vp = viewport();
        tc.release(p, layers, &CutContext { viewport: &vp, min_selection_px: 5 })
    }

    #[test]
    fn tool_names_round_trip() {
        for tool in Tool::all() {
            assert_eq!(Tool::from_name(tool.name()), Some(*tool));
        }
        assert!(Tool::Lasso.is_inert());
        assert!(!Tool::Transform.is_inert());
    }

    #[test]
    fn inert_tools_do_not_start_drags() {
        let mut tc = ToolController::new(ToolProperties::default());
        tc.active_tool = Tool::Ellipse;
        assert!(!tc.press(Pos2::new(3.0, 3.0)));
        assert!(tc.is_idle());
    }

    #[test]
    fn brush_paints_per_move() {
        let mut layers = LayerStore::new(RES);
        let mut tc = ToolController::new(ToolProperties { primary: [255, 0, 0, 255], size: 4.0, ..Default::default() });
        assert!(tc.press(Pos2::new(10.0, 10.0)));
        tc.drag(Pos2::new(30.0, 10.0), &mut layers);
        assert_eq!(layers.active().pixels.get_pixel(20, 10), &Rgba([255, 0, 0, 255]));
        assert_eq!(layers.active().revision, 1);
        release(&mut tc, Pos2::new(30.0, 10.0), &mut layers).unwrap();
        assert!(tc.is_idle());
    }

    #[test]
    fn gradient_only_mutates_on_release() {
        let mut layers = LayerStore::new(RES);
        let mut tc = ToolController::new(ToolProperties::default());
        tc.active_tool = Tool::Gradient;
        tc.press(Pos2::new(0.0, 0.0));
        tc.drag(Pos2::new(40.0, 0.0), &mut layers);
        assert_eq!(tc.gradient_preview(), Some((Pos2::new(0.0, 0.0), Pos2::new(40.0, 0.0))));
        assert_eq!(layers.active().revision, 0);
        release(&mut tc, Pos2::new(63.0, 0.0), &mut layers).unwrap();
        assert_eq!(layers.active().pixels.get_pixel(0, 5), &Rgba([0, 0, 0, 255]));
        assert_eq!(layers.active().pixels.get_pixel(63, 5), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn zero_length_gradient_is_discarded() {
        let mut layers = LayerStore::new(RES);
        let mut tc = ToolController::new(ToolProperties::default());
        tc.active_tool = Tool::Gradient;
        tc.press(Pos2::new(5.0, 5.0));
        release(&mut tc, Pos2::new(5.0, 5.0), &mut layers).unwrap();
        assert_eq!(layers.active().revision, 0);
    }

    #[test]
    fn small_selection_changes_nothing() {
        let mut layers = LayerStore::new(RES);
        let mut tc = ToolController::new(ToolProperties::default());
        tc.active_tool = Tool::Transform;
        tc.press(Pos2::new(10.0, 10.0));
        release(&mut tc, Pos2::new(15.0, 40.0), &mut layers).unwrap();
        assert!(tc.is_idle());
        assert_eq!(layers.active().revision, 0);
    }

    #[test]
    fn cut_lifts_pixels_into_fragment() {
        let mut layers = LayerStore::new(RES);
        let mut tc = ToolController::new(ToolProperties::default());
        tc.active_tool = Tool::Transform;
        tc.press(Pos2::new(40.0, 40.0));
        tc.drag(Pos2::new(20.0, 30.0), &mut layers);
        assert_eq!(tc.selection_preview(RES), Some(PixelRect::new(20, 30, 20, 10)));
        release(&mut tc, Pos2::new(10.0, 20.0), &mut layers).unwrap();
        let frag = tc.pending_fragment().unwrap();
        assert_eq!(frag.pixels.dimensions(), (30, 20));
        assert_eq!(frag.pixels.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(layers.active().pixels.get_pixel(10, 20)[3], 0);
        assert_eq!(layers.active().pixels.get_pixel(40, 40)[3], 255);
        // Drawing is locked out while placing.
        assert!(!tc.press(Pos2::new(1.0, 1.0)));
    }

    #[test]
    fn cut_from_tainted_layer_is_refused() {
        let mut layers = LayerStore::new(RES);
        layers.active_mut().tainted = true;
        let mut tc = ToolController::new(ToolProperties::default());
        tc.active_tool = Tool::Transform;
        tc.press(Pos2::new(0.0, 0.0));
        let err = release(&mut tc, Pos2::new(30.0, 30.0), &mut layers);
        assert!(matches!(err, Err(EngineError::SecurityError(_))));
        assert!(tc.is_idle());
        assert_eq!(layers.active().pixels.get_pixel(5, 5)[3], 255);
    }

    #[test]
    fn selection_rect_clamps_to_canvas() {
        let r = selection_rect(Pos2::new(-10.0, 50.2), Pos2::new(20.6, 90.0), RES);
        assert_eq!(r, PixelRect::new(0, 50, 21, 14));
    }
}
