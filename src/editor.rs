use std::path::Path;

use egui::{Pos2, Rect, Vec2};
use image::RgbaImage;

use crate::canvas::{BlendMode, CanvasResolution, PixelRect, MAX_CANVAS_PIXELS};
use crate::components::gizmo::{
    cancel_fragment, commit_fragment, CancelOutcome, GizmoDrag, HandleKind, HostLayer, PendingFragment,
};
use crate::components::layers::{LayerDirection, LayerId, LayerStore};
use crate::components::tools::{CutContext, Interaction, Tool, ToolController, ToolProperties};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::io::{decode_image, encode_png, ExternalImage};
use crate::ops::composite::composite;
use crate::viewport::ViewportMapper;
use crate::{log_err, log_info, log_warn};

/// Whether the editor can take input and produce output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineStatus {
    /// Waiting for a template to establish the resolution.
    AwaitingTemplate,
    Ready,
    /// Template load failed while the resolution depends on it. Loading
    /// another template recovers.
    Blocked(String),
}

/// Pointer capture for the lifetime of one drag. Acquired on a press that
/// starts an interaction, released on every exit path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PointerCapture {
    held: bool,
}

impl PointerCapture {
    fn acquire(&mut self) {
        self.held = true;
    }

    /// Returns true if the capture was held.
    fn release(&mut self) -> bool {
        std::mem::take(&mut self.held)
    }

    pub fn is_held(&self) -> bool {
        self.held
    }
}

/// Single editing session: the layer stack, the pointer-driven tools and the
/// floating fragment, wired to the viewport they are displayed in.
pub struct Editor {
    config: EngineConfig,
    resolution: Option<CanvasResolution>,
    status: EngineStatus,
    layers: LayerStore,
    tools: ToolController,
    container: Option<Rect>,
    capture: PointerCapture,
    template_guide: Option<RgbaImage>,
    images_received: usize,
}

impl Editor {
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let resolution = config.variant.initial_resolution();
        let status = if resolution.is_some() {
            EngineStatus::Ready
        } else {
            EngineStatus::AwaitingTemplate
        };
        log_info!(
            "Editor created: variant {:?}, resolution {}",
            config.variant,
            resolution.map_or_else(|| "pending".to_string(), |r| r.to_string())
        );
        Ok(Self {
            layers: LayerStore::new(resolution.unwrap_or(CanvasResolution::DEFAULT)),
            tools: ToolController::new(config.tool.clone()),
            config,
            resolution,
            status,
            container: None,
            capture: PointerCapture::default(),
            template_guide: None,
            images_received: 0,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn status(&self) -> &EngineStatus {
        &self.status
    }

    pub fn resolution(&self) -> Option<CanvasResolution> {
        self.resolution
    }

    pub fn is_ready(&self) -> bool {
        self.resolution.is_some() && self.status == EngineStatus::Ready
    }

    // ------------------------------------------------------------------
    //  Template / resolution
    // ------------------------------------------------------------------

    /// Decode a template. In the template variant it fixes the resolution;
    /// otherwise it is only kept as a guide.
    pub fn load_template(&mut self, bytes: &[u8]) -> EngineResult<()> {
        let image = match decode_image(bytes) {
            Ok(image) => image,
            Err(e) => {
                let msg = e.to_string();
                log_err!("Template load failed: {}", msg);
                if self.config.variant.follows_template() && self.resolution.is_none() {
                    self.status = EngineStatus::Blocked(msg.clone());
                }
                return Err(EngineError::LoadError(msg));
            }
        };
        if self.config.variant.follows_template() {
            self.set_resolution(CanvasResolution::new(image.width(), image.height()))?;
        }
        log_info!("Template loaded ({}×{})", image.width(), image.height());
        self.template_guide = Some(image);
        Ok(())
    }

    pub fn load_template_file(&mut self, path: &Path) -> EngineResult<()> {
        let bytes = std::fs::read(path).map_err(|e| {
            if self.config.variant.follows_template() && self.resolution.is_none() {
                self.status = EngineStatus::Blocked(e.to_string());
            }
            EngineError::LoadError(format!("{}: {}", path.display(), e))
        })?;
        self.load_template(&bytes)
    }

    /// Decoded template for overlay drawing. Never composited.
    pub fn template_guide(&self) -> Option<&RgbaImage> {
        self.template_guide.as_ref()
    }

    /// Reallocate every layer at `resolution`. Drags and any floating
    /// fragment are dropped; a queued decode survives.
    pub fn set_resolution(&mut self, resolution: CanvasResolution) -> EngineResult<()> {
        if !resolution.is_allocatable() {
            return Err(EngineError::Config(format!(
                "canvas resolution {} must be non-empty and at most {} pixels",
                resolution, MAX_CANVAS_PIXELS
            )));
        }
        self.capture.release();
        match self.tools.take_state() {
            Interaction::Placing { fragment, .. } => {
                // Same cleanup as cancel, so an untouched host layer goes too.
                let outcome = cancel_fragment(fragment, &mut self.layers);
                log_warn!("Resolution change discarded the floating fragment ({:?})", outcome);
            }
            state @ Interaction::Decoding { .. } => self.tools.set_state(state),
            _ => {}
        }
        self.layers.set_resolution(resolution);
        self.resolution = Some(resolution);
        self.status = EngineStatus::Ready;
        log_info!("Canvas resolution set to {}", resolution);
        Ok(())
    }

    // ------------------------------------------------------------------
    //  Viewport
    // ------------------------------------------------------------------

    /// Record the container rect the canvas is displayed in. Degenerate
    /// rects are ignored.
    pub fn set_container(&mut self, rect: Rect) {
        if !(rect.width() > 0.0 && rect.height() > 0.0 && rect.is_finite()) {
            log_warn!("Ignoring degenerate container {:?}", rect);
            return;
        }
        self.container = Some(rect);
    }

    /// Container rect; a canvas-sized rect at the origin until one is set.
    pub fn container(&self) -> Rect {
        self.container.unwrap_or_else(|| {
            let (w, h) = self.layers.resolution().size_f32();
            Rect::from_min_size(Pos2::ZERO, Vec2::new(w, h))
        })
    }

    /// Freshly computed mapping for the current container and resolution.
    pub fn viewport(&self) -> Option<ViewportMapper> {
        self.resolution
            .filter(|_| self.status == EngineStatus::Ready)
            .map(|res| ViewportMapper::new(self.container(), res))
    }

    // ------------------------------------------------------------------
    //  Tools
    // ------------------------------------------------------------------

    pub fn tool(&self) -> Tool {
        self.tools.active_tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tools.active_tool = tool;
    }

    pub fn tool_properties(&self) -> &ToolProperties {
        &self.tools.properties
    }

    pub fn tool_properties_mut(&mut self) -> &mut ToolProperties {
        &mut self.tools.properties
    }

    /// Name of the current interaction state.
    pub fn interaction(&self) -> &'static str {
        self.tools.state().name()
    }

    pub fn is_pointer_captured(&self) -> bool {
        self.capture.is_held()
    }

    // ------------------------------------------------------------------
    //  Pointer input (display space)
    // ------------------------------------------------------------------

    pub fn pointer_down(&mut self, pos: Pos2) -> EngineResult<()> {
        let Some(vp) = self.viewport() else { return Ok(()) };
        if self.capture.is_held() {
            return Ok(());
        }
        let (radius, offset) = (self.config.handle_grab_radius, self.config.rotate_handle_offset);
        match self.tools.state_mut() {
            Interaction::Placing { fragment, drag } => {
                if let Some(handle) = fragment.hit_test(pos, &vp, radius, offset) {
                    *drag = Some(GizmoDrag::new(handle, pos, fragment));
                    self.capture.acquire();
                }
            }
            Interaction::Idle => {
                if !vp.contains(pos) {
                    return Ok(());
                }
                if let Some(p) = vp.to_canvas(pos)
                    && self.tools.press(p)
                {
                    self.capture.acquire();
                }
            }
            _ => {}
        }
        Ok(())
    }

    pub fn pointer_move(&mut self, pos: Pos2) -> EngineResult<()> {
        if !self.capture.is_held() {
            return Ok(());
        }
        let Some(vp) = self.viewport() else { return Ok(()) };
        match self.tools.state_mut() {
            Interaction::Placing { fragment, drag: Some(drag) } => drag.update(fragment, pos, &vp),
            Interaction::Drawing { .. } | Interaction::Selecting { .. } => {
                if let Some(p) = vp.to_canvas(pos) {
                    self.tools.drag(p, &mut self.layers);
                }
            }
            _ => {}
        }
        Ok(())
    }

    pub fn pointer_up(&mut self, pos: Pos2) -> EngineResult<()> {
        if !self.capture.release() {
            return Ok(());
        }
        let Some(vp) = self.viewport() else {
            self.tools.abort();
            return Ok(());
        };
        if let Interaction::Placing { fragment, drag } = self.tools.state_mut() {
            if let Some(d) = drag.take() {
                d.update(fragment, pos, &vp);
            }
            return Ok(());
        }
        let Some(p) = vp.to_canvas(pos) else { return Ok(()) };
        let ctx = CutContext { viewport: &vp, min_selection_px: self.config.min_selection_px };
        self.tools.release(p, &mut self.layers, &ctx)
    }

    /// End any drag without completing it. Committed stroke segments and
    /// gizmo moves so far are kept.
    pub fn pointer_cancel(&mut self) {
        self.capture.release();
        if let Interaction::Placing { drag, .. } = self.tools.state_mut() {
            *drag = None;
        } else {
            self.tools.abort();
        }
    }

    // ------------------------------------------------------------------
    //  Previews
    // ------------------------------------------------------------------

    /// Start / end anchors of the gradient being dragged, canvas space.
    pub fn gradient_preview(&self) -> Option<(Pos2, Pos2)> {
        self.tools.gradient_preview()
    }

    /// The rectangle a cut in progress would lift.
    pub fn selection_rect(&self) -> Option<PixelRect> {
        self.tools.selection_preview(self.resolution?)
    }

    /// Fragment outline in display space (TL, TR, BL, BR).
    pub fn gizmo_outline(&self) -> Option<[Pos2; 4]> {
        let vp = self.viewport()?;
        Some(self.tools.pending_fragment()?.outline(&vp))
    }

    pub fn gizmo_handles(&self) -> Vec<(HandleKind, Pos2)> {
        match (self.viewport(), self.tools.pending_fragment()) {
            (Some(vp), Some(fragment)) => fragment.handles(&vp, self.config.rotate_handle_offset),
            _ => Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    //  External images
    // ------------------------------------------------------------------

    /// Queue encoded bytes for placement. Any drag ends, and a fragment
    /// already floating is cancelled so there is only ever one.
    pub fn receive_external_image(&mut self, image: ExternalImage) {
        self.capture.release();
        match self.tools.take_state() {
            Interaction::Placing { fragment, .. } => {
                let outcome = cancel_fragment(fragment, &mut self.layers);
                log_info!("Floating fragment replaced by incoming image ({:?})", outcome);
            }
            Interaction::Decoding { .. } => {
                log_info!("Queued image replaced");
            }
            _ => {}
        }
        log_info!("External image queued ({} bytes, {:?})", image.bytes.len(), image.cors);
        self.tools.set_state(Interaction::Decoding { image });
    }

    pub fn is_decoding(&self) -> bool {
        matches!(self.tools.state(), Interaction::Decoding { .. })
    }

    /// Decode the queued image into a canvas-covering fragment. Returns
    /// `Ok(false)` if nothing was queued. Stays queued on `NotReady`.
    pub fn process_pending_decode(&mut self) -> EngineResult<bool> {
        let Some(res) = self.viewport().map(|vp| vp.resolution()) else {
            return if self.is_decoding() { Err(EngineError::NotReady) } else { Ok(false) };
        };
        let image = match self.tools.take_state() {
            Interaction::Decoding { image } => image,
            other => {
                self.tools.set_state(other);
                return Ok(false);
            }
        };
        let pixels = decode_image(&image.bytes).map_err(|e| {
            log_err!("External image decode failed: {}", e);
            EngineError::Decode(e)
        })?;
        let mut fragment = PendingFragment::covering(pixels, res, !image.cors.allows_readback());
        if self.config.external_on_new_layer {
            self.images_received += 1;
            let id = self.layers.add_layer(&format!("Image {}", self.images_received));
            let revision = self.layers.get(id).map_or(0, |l| l.revision);
            fragment.created_layer = Some(HostLayer { layer: id, revision });
        }
        log_info!(
            "External image {}×{} floating over {}",
            fragment.pixels.width(),
            fragment.pixels.height(),
            res
        );
        self.tools.set_state(Interaction::Placing { fragment, drag: None });
        Ok(true)
    }

    /// Queue and immediately decode.
    pub fn place_external_image(&mut self, image: ExternalImage) -> EngineResult<()> {
        self.receive_external_image(image);
        self.process_pending_decode().map(|_| ())
    }

    // ------------------------------------------------------------------
    //  Floating fragment
    // ------------------------------------------------------------------

    pub fn pending_fragment(&self) -> Option<&PendingFragment> {
        self.tools.pending_fragment()
    }

    /// Draw the fragment into the active layer. `Ok(false)` when none floats.
    pub fn commit_fragment(&mut self) -> EngineResult<bool> {
        let Some(vp) = self.viewport() else { return Err(EngineError::NotReady) };
        match self.tools.take_state() {
            Interaction::Placing { fragment, .. } => {
                self.capture.release();
                commit_fragment(fragment, &mut self.layers, &vp, self.config.interpolation)?;
                Ok(true)
            }
            other => {
                self.tools.set_state(other);
                Ok(false)
            }
        }
    }

    pub fn cancel_fragment(&mut self) -> Option<CancelOutcome> {
        match self.tools.take_state() {
            Interaction::Placing { fragment, .. } => {
                self.capture.release();
                let outcome = cancel_fragment(fragment, &mut self.layers);
                log_info!("Fragment cancelled: {:?}", outcome);
                Some(outcome)
            }
            other => {
                self.tools.set_state(other);
                None
            }
        }
    }

    fn with_fragment(&mut self, f: impl FnOnce(&mut PendingFragment)) -> bool {
        match self.tools.pending_fragment_mut() {
            Some(fragment) => {
                f(fragment);
                true
            }
            None => false,
        }
    }

    /// Shift the fragment by a display-space offset.
    pub fn translate_fragment(&mut self, dx: f32, dy: f32) -> bool {
        self.with_fragment(|f| {
            f.transform.x += dx;
            f.transform.y += dy;
        })
    }

    /// Set scale magnitudes; mirror state is kept.
    pub fn set_fragment_scale(&mut self, scale_x: f32, scale_y: f32) -> bool {
        self.with_fragment(|f| f.set_scale(scale_x, scale_y))
    }

    pub fn set_fragment_rotation(&mut self, degrees: f32) -> bool {
        self.with_fragment(|f| f.transform.rotation_deg = degrees)
    }

    pub fn rotate_fragment(&mut self, degrees: f32) -> bool {
        self.with_fragment(|f| f.transform.rotation_deg += degrees)
    }

    pub fn mirror_fragment_x(&mut self) -> bool {
        self.with_fragment(PendingFragment::mirror_x)
    }

    pub fn mirror_fragment_y(&mut self) -> bool {
        self.with_fragment(PendingFragment::mirror_y)
    }

    // ------------------------------------------------------------------
    //  Layers
    // ------------------------------------------------------------------

    pub fn layers(&self) -> &LayerStore {
        &self.layers
    }

    pub fn add_layer(&mut self, name: &str) -> LayerId {
        self.layers.add_layer(name)
    }

    pub fn remove_layer(&mut self, id: LayerId) -> EngineResult<bool> {
        self.layers.remove_layer(id)
    }

    pub fn move_layer(&mut self, id: LayerId, direction: LayerDirection) -> EngineResult<bool> {
        self.layers.move_layer(id, direction)
    }

    pub fn toggle_visibility(&mut self, id: LayerId) -> EngineResult<bool> {
        self.layers.toggle_visibility(id)
    }

    pub fn set_layer_opacity(&mut self, id: LayerId, opacity: f32) -> EngineResult<()> {
        self.layers.set_opacity(id, opacity)
    }

    pub fn rename_layer(&mut self, id: LayerId, name: &str) -> EngineResult<()> {
        self.layers.rename(id, name)
    }

    pub fn set_blend_mode(&mut self, id: LayerId, mode: BlendMode) -> EngineResult<()> {
        self.layers.set_blend_mode(id, mode)
    }

    pub fn set_active_layer(&mut self, id: LayerId) -> EngineResult<()> {
        self.layers.set_active(id)
    }

    // ------------------------------------------------------------------
    //  Output
    // ------------------------------------------------------------------

    /// Flattened RGBA buffer at the canvas resolution.
    pub fn composite_image(&self) -> EngineResult<RgbaImage> {
        if !self.is_ready() {
            return Err(EngineError::NotReady);
        }
        let image = composite(&self.layers).inspect_err(|e| {
            log_warn!("Composite refused: {}", e);
        })?;
        log_info!("Composite {}×{} from {} layers", image.width(), image.height(), self.layers.len());
        Ok(image)
    }

    /// Flattened canvas as PNG bytes.
    pub fn get_composite(&self) -> EngineResult<Vec<u8>> {
        encode_png(&self.composite_image()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CanvasVariant;
    use crate::io::CorsMode;
    use image::Rgba;

    fn editor(variant: CanvasVariant) -> Editor {
        Editor::new(EngineConfig { variant, ..Default::default() }).unwrap()
    }

    fn png(w: u32, h: u32, color: [u8; 4]) -> Vec<u8> {
        encode_png(&RgbaImage::from_pixel(w, h, Rgba(color))).unwrap()
    }

    #[test]
    fn template_variant_waits_for_template() {
        let mut ed = editor(CanvasVariant::Template);
        assert_eq!(ed.status(), &EngineStatus::AwaitingTemplate);
        assert!(matches!(ed.get_composite(), Err(EngineError::NotReady)));

        assert!(matches!(ed.load_template(b"junk"), Err(EngineError::LoadError(_))));
        assert!(matches!(ed.status(), EngineStatus::Blocked(_)));
        assert!(matches!(ed.composite_image(), Err(EngineError::NotReady)));

        ed.load_template(&png(300, 200, [0, 0, 0, 255])).unwrap();
        assert!(ed.is_ready());
        assert_eq!(ed.composite_image().unwrap().dimensions(), (300, 200));
        assert!(ed.template_guide().is_some());
    }

    #[test]
    fn plate_ignores_template_size_and_failures() {
        let mut ed = editor(CanvasVariant::LicensePlate);
        assert!(ed.load_template(b"junk").is_err());
        assert!(ed.is_ready());
        ed.load_template(&png(10, 10, [1, 2, 3, 255])).unwrap();
        assert_eq!(ed.resolution(), Some(CanvasResolution::LICENSE_PLATE));
    }

    #[test]
    fn capture_outlives_leaving_the_canvas() {
        let mut ed = editor(CanvasVariant::Fixed { width: 100, height: 100 });
        ed.set_container(Rect::from_min_size(Pos2::ZERO, Vec2::new(200.0, 100.0)));
        // Display rect is (50,0)–(150,100).
        ed.pointer_down(Pos2::new(10.0, 50.0)).unwrap();
        assert!(!ed.is_pointer_captured());
        ed.pointer_down(Pos2::new(60.0, 50.0)).unwrap();
        assert!(ed.is_pointer_captured());
        ed.pointer_move(Pos2::new(180.0, 50.0)).unwrap();
        ed.pointer_up(Pos2::new(180.0, 50.0)).unwrap();
        assert!(!ed.is_pointer_captured());
        assert_eq!(ed.interaction(), "idle");
    }

    #[test]
    fn cancel_always_releases_capture() {
        let mut ed = editor(CanvasVariant::Fixed { width: 64, height: 64 });
        ed.set_tool(Tool::Transform);
        ed.pointer_down(Pos2::new(5.0, 5.0)).unwrap();
        ed.pointer_move(Pos2::new(40.0, 40.0)).unwrap();
        assert!(ed.selection_rect().is_some());
        ed.pointer_cancel();
        assert!(!ed.is_pointer_captured());
        assert!(ed.selection_rect().is_none());
        assert_eq!(ed.layers().active().revision, 0);
    }

    #[test]
    fn decode_suspends_drawing() {
        let mut ed = editor(CanvasVariant::Fixed { width: 64, height: 64 });
        ed.receive_external_image(ExternalImage::new(png(8, 8, [0, 255, 0, 255]), CorsMode::Anonymous));
        assert!(ed.is_decoding());
        ed.pointer_down(Pos2::new(10.0, 10.0)).unwrap();
        assert!(!ed.is_pointer_captured());
        assert!(ed.process_pending_decode().unwrap());
        assert_eq!(ed.layers().len(), 2);
        assert_eq!(ed.layers().active().name, "Image 1");
        assert!(ed.commit_fragment().unwrap());
        let px = ed.layers().active().pixels.get_pixel(63, 63);
        assert!(px[1] >= 254 && px[3] >= 254);
    }

    #[test]
    fn cancelling_external_image_removes_its_layer() {
        let mut ed = editor(CanvasVariant::Fixed { width: 32, height: 32 });
        ed.place_external_image(ExternalImage::new(png(4, 4, [9, 9, 9, 255]), CorsMode::SameOrigin)).unwrap();
        assert_eq!(ed.cancel_fragment(), Some(CancelOutcome::RemovedHostLayer));
        assert_eq!(ed.layers().len(), 1);
        assert_eq!(ed.cancel_fragment(), None);
    }

    #[test]
    fn opaque_image_taints_composite_but_not_session() {
        let mut ed = editor(CanvasVariant::Fixed { width: 16, height: 16 });
        ed.place_external_image(ExternalImage::new(png(4, 4, [9, 9, 9, 255]), CorsMode::Opaque)).unwrap();
        ed.commit_fragment().unwrap();
        assert!(matches!(ed.get_composite(), Err(EngineError::SecurityError(_))));
        let tainted = ed.layers().active_id();
        ed.toggle_visibility(tainted).unwrap();
        assert!(ed.get_composite().is_ok());
    }

    #[test]
    fn undecodable_image_returns_to_idle() {
        let mut ed = editor(CanvasVariant::Fixed { width: 16, height: 16 });
        ed.receive_external_image(ExternalImage::new(b"nope".to_vec(), CorsMode::SameOrigin));
        assert!(matches!(ed.process_pending_decode(), Err(EngineError::Decode(_))));
        assert_eq!(ed.interaction(), "idle");
        assert_eq!(ed.layers().len(), 1);
    }

    #[test]
    fn resolution_change_drops_fragment() {
        let mut ed = editor(CanvasVariant::Fixed { width: 16, height: 16 });
        ed.place_external_image(ExternalImage::new(png(4, 4, [9, 9, 9, 255]), CorsMode::SameOrigin)).unwrap();
        ed.set_resolution(CanvasResolution::new(20, 10)).unwrap();
        assert!(ed.pending_fragment().is_none());
        let names: Vec<_> = ed.layers().iter().map(|(_, l)| l.name.clone()).collect();
        assert_eq!(names, vec!["Background".to_string()]);
        assert_eq!(ed.composite_image().unwrap().dimensions(), (20, 10));
        assert!(ed.set_resolution(CanvasResolution::new(0, 10)).is_err());
    }

    #[test]
    fn oversized_resolution_is_refused_and_session_kept() {
        let mut ed = editor(CanvasVariant::Fixed { width: 16, height: 16 });
        let err = ed.set_resolution(CanvasResolution::new(17_000, 16_000));
        assert!(matches!(err, Err(EngineError::Config(_))));
        assert_eq!(ed.resolution(), Some(CanvasResolution::new(16, 16)));
        assert_eq!(ed.layers().active().pixels.width(), 16);

        ed.set_tool(Tool::Brush);
        ed.tool_properties_mut().primary = [255, 0, 0, 255];
        ed.pointer_down(Pos2::new(2.0, 8.0)).unwrap();
        ed.pointer_move(Pos2::new(14.0, 8.0)).unwrap();
        ed.pointer_up(Pos2::new(14.0, 8.0)).unwrap();
        assert_eq!(ed.composite_image().unwrap().get_pixel(8, 8).0, [255, 0, 0, 255]);
    }

    #[test]
    fn degenerate_container_is_ignored() {
        let mut ed = editor(CanvasVariant::Fixed { width: 16, height: 16 });
        ed.set_container(Rect::from_min_size(Pos2::ZERO, Vec2::new(0.0, 50.0)));
        assert_eq!(ed.container(), Rect::from_min_size(Pos2::ZERO, Vec2::splat(16.0)));
    }
}
