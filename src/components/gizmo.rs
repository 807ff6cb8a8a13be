// ============================================================================
// TRANSFORM GIZMO: the single floating fragment and its handles
// ============================================================================
//
// A pending fragment is a detached RGBA buffer plus a transform. Its offset
// lives in display space (relative to the display rect's center) so the
// outline tracks the pointer 1:1; commit converts back to canvas pixels using
// the buffer/display ratio of the moment.

use egui::{Pos2, Rect, Vec2};
use image::RgbaImage;

use crate::canvas::{CanvasResolution, PixelRect};
use crate::components::layers::{LayerId, LayerStore};
use crate::error::{EngineError, EngineResult};
use crate::ops::transform::{rasterize_fragment, Interpolation, Placement};
use crate::viewport::ViewportMapper;
use crate::{log_info, log_warn};

/// Smallest magnitude a scale axis may shrink to.
const MIN_SCALE: f32 = 0.01;

/// Translate / scale / mirror / rotate, applied about the fragment center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FragmentTransform {
    /// Offset of the fragment center from the display rect center, display px.
    pub x: f32,
    pub y: f32,
    /// Signed; a negative axis is mirrored.
    pub scale_x: f32,
    pub scale_y: f32,
    pub rotation_deg: f32,
}

impl Default for FragmentTransform {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, scale_x: 1.0, scale_y: 1.0, rotation_deg: 0.0 }
    }
}

/// Where a cut fragment came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestoreOrigin {
    pub layer: LayerId,
    pub rect: PixelRect,
}

/// Empty layer created to host an external fragment, with its revision at
/// creation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HostLayer {
    pub layer: LayerId,
    pub revision: u64,
}

pub struct PendingFragment {
    pub pixels: RgbaImage,
    /// Canvas-pixel size at scale 1.
    pub base_size: Vec2,
    pub transform: FragmentTransform,
    pub restore_origin: Option<RestoreOrigin>,
    pub created_layer: Option<HostLayer>,
    /// Pixels came from a source without cross-origin access.
    pub tainted: bool,
}

impl PendingFragment {
    /// Fragment lifted out of `rect`, placed exactly where it was.
    pub fn from_cut(pixels: RgbaImage, layer: LayerId, rect: PixelRect, viewport: &ViewportMapper) -> Self {
        let (cx, cy) = rect.center();
        let (w, h) = viewport.resolution().size_f32();
        let offset = viewport
            .delta_to_display(Vec2::new(cx - w / 2.0, cy - h / 2.0))
            .unwrap_or(Vec2::ZERO);
        Self {
            base_size: Vec2::new(rect.width as f32, rect.height as f32),
            pixels,
            transform: FragmentTransform { x: offset.x, y: offset.y, ..Default::default() },
            restore_origin: Some(RestoreOrigin { layer, rect }),
            created_layer: None,
            tainted: false,
        }
    }

    /// Fragment stretched to cover the whole canvas, whatever its aspect.
    pub fn covering(pixels: RgbaImage, resolution: CanvasResolution, tainted: bool) -> Self {
        let (w, h) = resolution.size_f32();
        Self {
            pixels,
            base_size: Vec2::new(w, h),
            transform: FragmentTransform::default(),
            restore_origin: None,
            created_layer: None,
            tainted,
        }
    }

    /// Canvas-space placement of the fragment as currently transformed.
    pub fn placement(&self, viewport: &ViewportMapper) -> Placement {
        let (w, h) = viewport.resolution().size_f32();
        let offset = viewport
            .delta_to_canvas(Vec2::new(self.transform.x, self.transform.y))
            .unwrap_or(Vec2::ZERO);
        let t = &self.transform;
        Placement {
            center: Pos2::new(w / 2.0 + offset.x, h / 2.0 + offset.y),
            width: (self.base_size.x * t.scale_x.abs()).round().max(1.0) as u32,
            height: (self.base_size.y * t.scale_y.abs()).round().max(1.0) as u32,
            rotation_deg: t.rotation_deg,
            flip_x: t.scale_x < 0.0,
            flip_y: t.scale_y < 0.0,
        }
    }

    /// Center of the fragment in display space.
    pub fn display_center(&self, display_rect: Rect) -> Pos2 {
        display_rect.center() + Vec2::new(self.transform.x, self.transform.y)
    }

    /// Unrotated half extents in display space.
    fn display_half_size(&self, viewport: &ViewportMapper) -> Vec2 {
        let t = &self.transform;
        let size = viewport
            .delta_to_display(Vec2::new(
                self.base_size.x * t.scale_x.abs(),
                self.base_size.y * t.scale_y.abs(),
            ))
            .unwrap_or(Vec2::ZERO);
        size / 2.0
    }

    /// Map a point from the fragment's local (unrotated, center-origin)
    /// frame into display space.
    fn local_to_display(&self, local: Vec2, viewport: &ViewportMapper) -> Pos2 {
        let (sin, cos) = self.transform.rotation_deg.to_radians().sin_cos();
        self.display_center(viewport.display_rect())
            + Vec2::new(local.x * cos - local.y * sin, local.x * sin + local.y * cos)
    }

    /// Outline corners in display space: TL, TR, BL, BR.
    pub fn outline(&self, viewport: &ViewportMapper) -> [Pos2; 4] {
        let hs = self.display_half_size(viewport);
        [
            Vec2::new(-hs.x, -hs.y),
            Vec2::new(hs.x, -hs.y),
            Vec2::new(-hs.x, hs.y),
            Vec2::new(hs.x, hs.y),
        ]
        .map(|v| self.local_to_display(v, viewport))
    }

    /// Every handle and where it sits in display space.
    pub fn handles(&self, viewport: &ViewportMapper, rotate_offset: f32) -> Vec<(HandleKind, Pos2)> {
        let hs = self.display_half_size(viewport);
        let mut out = vec![(
            HandleKind::Rotate,
            self.local_to_display(Vec2::new(0.0, -hs.y - rotate_offset), viewport),
        )];
        for kind in HandleKind::SCALE {
            let dir = kind.direction();
            out.push((kind, self.local_to_display(Vec2::new(dir.x * hs.x, dir.y * hs.y), viewport)));
        }
        out
    }

    /// Which handle (if any) is under `pos`. Rotate wins over corners, corners
    /// over edges, and anything inside the outline is a move.
    pub fn hit_test(&self, pos: Pos2, viewport: &ViewportMapper, grab_radius: f32, rotate_offset: f32) -> Option<HandleKind> {
        if let Some((kind, _)) = self
            .handles(viewport, rotate_offset)
            .into_iter()
            .find(|(_, p)| p.distance(pos) < grab_radius)
        {
            return Some(kind);
        }
        let local = self.to_local(pos, viewport);
        let hs = self.display_half_size(viewport);
        (local.x.abs() <= hs.x && local.y.abs() <= hs.y).then_some(HandleKind::Move)
    }

    /// Un-rotate a display point into the fragment's local frame.
    fn to_local(&self, pos: Pos2, viewport: &ViewportMapper) -> Vec2 {
        let d = pos - self.display_center(viewport.display_rect());
        unrotate(d, self.transform.rotation_deg)
    }

    pub fn mirror_x(&mut self) {
        self.transform.scale_x = -self.transform.scale_x;
    }

    pub fn mirror_y(&mut self) {
        self.transform.scale_y = -self.transform.scale_y;
    }

    /// Set scale magnitudes, keeping the current mirror signs.
    pub fn set_scale(&mut self, scale_x: f32, scale_y: f32) {
        self.transform.scale_x = with_sign(scale_x.abs().max(MIN_SCALE), self.transform.scale_x);
        self.transform.scale_y = with_sign(scale_y.abs().max(MIN_SCALE), self.transform.scale_y);
    }
}

/// Rotate a display-space vector by `-deg`.
fn unrotate(v: Vec2, deg: f32) -> Vec2 {
    let (sin, cos) = (-deg).to_radians().sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

fn with_sign(magnitude: f32, sign_of: f32) -> f32 {
    if sign_of < 0.0 { -magnitude } else { magnitude }
}

// ----------------------------------------------------------------------------
//  Handles and dragging
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleKind {
    Move,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Top,
    Bottom,
    Left,
    Right,
    Rotate,
}

impl HandleKind {
    /// Scale handles in hit-test priority: corners before edges.
    pub const SCALE: [HandleKind; 8] = [
        HandleKind::TopLeft,
        HandleKind::TopRight,
        HandleKind::BottomLeft,
        HandleKind::BottomRight,
        HandleKind::Top,
        HandleKind::Bottom,
        HandleKind::Left,
        HandleKind::Right,
    ];

    /// Which local axes the handle pushes outward; zero for untouched axes.
    pub fn direction(&self) -> Vec2 {
        match self {
            HandleKind::TopLeft => Vec2::new(-1.0, -1.0),
            HandleKind::TopRight => Vec2::new(1.0, -1.0),
            HandleKind::BottomLeft => Vec2::new(-1.0, 1.0),
            HandleKind::BottomRight => Vec2::new(1.0, 1.0),
            HandleKind::Top => Vec2::new(0.0, -1.0),
            HandleKind::Bottom => Vec2::new(0.0, 1.0),
            HandleKind::Left => Vec2::new(-1.0, 0.0),
            HandleKind::Right => Vec2::new(1.0, 0.0),
            HandleKind::Move | HandleKind::Rotate => Vec2::ZERO,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HandleKind::Move => "move",
            HandleKind::TopLeft => "top-left",
            HandleKind::TopRight => "top-right",
            HandleKind::BottomLeft => "bottom-left",
            HandleKind::BottomRight => "bottom-right",
            HandleKind::Top => "top",
            HandleKind::Bottom => "bottom",
            HandleKind::Left => "left",
            HandleKind::Right => "right",
            HandleKind::Rotate => "rotate",
        }
    }
}

/// A handle drag in progress. Everything is computed from the state at
/// drag start, so repeated moves never accumulate rounding.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GizmoDrag {
    pub handle: HandleKind,
    start_pointer: Pos2,
    start: FragmentTransform,
}

impl GizmoDrag {
    pub fn new(handle: HandleKind, start_pointer: Pos2, fragment: &PendingFragment) -> Self {
        Self { handle, start_pointer, start: fragment.transform }
    }

    pub fn update(&self, fragment: &mut PendingFragment, pointer: Pos2, viewport: &ViewportMapper) {
        let delta = pointer - self.start_pointer;
        let start = self.start;
        match self.handle {
            HandleKind::Move => {
                fragment.transform.x = start.x + delta.x;
                fragment.transform.y = start.y + delta.y;
            }
            HandleKind::Rotate => {
                let center = viewport.display_rect().center() + Vec2::new(start.x, start.y);
                let a0 = (self.start_pointer - center).angle();
                let a1 = (pointer - center).angle();
                fragment.transform.rotation_deg = start.rotation_deg + (a1 - a0).to_degrees();
            }
            handle => {
                let display = viewport.display_rect().size();
                if display.x <= 0.0 || display.y <= 0.0 {
                    return;
                }
                // Screen delta into the fragment's pre-rotation frame, then
                // normalized so a drag across the whole display rect changes
                // the scale by two (the opposite edge mirrors the motion).
                let local = unrotate(delta, start.rotation_deg);
                let dir = handle.direction();
                let grow = Vec2::new(2.0 * local.x * dir.x / display.x, 2.0 * local.y * dir.y / display.y);
                if dir.x != 0.0 {
                    let mag = (start.scale_x.abs() + grow.x).max(MIN_SCALE);
                    fragment.transform.scale_x = with_sign(mag, start.scale_x);
                }
                if dir.y != 0.0 {
                    let mag = (start.scale_y.abs() + grow.y).max(MIN_SCALE);
                    fragment.transform.scale_y = with_sign(mag, start.scale_y);
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------
//  Commit / cancel
// ----------------------------------------------------------------------------

/// Draw the fragment into the active layer with source-over.
pub fn commit_fragment(
    fragment: PendingFragment,
    layers: &mut LayerStore,
    viewport: &ViewportMapper,
    interp: Interpolation,
) -> EngineResult<usize> {
    let placement = fragment.placement(viewport);
    let target = layers.active_id();
    let layer = layers.get_mut(target).ok_or(EngineError::UnknownLayer(target))?;
    let written = rasterize_fragment(&mut layer.pixels, &fragment.pixels, &placement, interp);
    layer.touch();
    if fragment.tainted {
        layer.tainted = true;
    }
    log_info!(
        "Committed fragment {}×{} at ({:.1}, {:.1}) rot {:.1}° into layer {} ({} px)",
        placement.width,
        placement.height,
        placement.center.x,
        placement.center.y,
        placement.rotation_deg,
        target,
        written
    );
    Ok(written)
}

/// What cancelling did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Cut pixels written back to their source rectangle.
    Restored,
    /// Untouched auto-created host layer removed.
    RemovedHostLayer,
    /// Nothing to undo.
    Discarded,
}

pub fn cancel_fragment(fragment: PendingFragment, layers: &mut LayerStore) -> CancelOutcome {
    if let Some(origin) = fragment.restore_origin {
        match layers.get_mut(origin.layer) {
            Some(layer) => {
                layer.pixels.write_image(origin.rect.x, origin.rect.y, &fragment.pixels);
                layer.touch();
                log_info!("Cut restored into layer {}", origin.layer);
                return CancelOutcome::Restored;
            }
            None => {
                log_warn!("Cut source layer {} is gone; fragment discarded", origin.layer);
                return CancelOutcome::Discarded;
            }
        }
    }
    if let Some(host) = fragment.created_layer
        && layers.get(host.layer).is_some_and(|l| l.revision == host.revision)
        && matches!(layers.remove_layer(host.layer), Ok(true))
    {
        return CancelOutcome::RemovedHostLayer;
    }
    CancelOutcome::Discarded
}
