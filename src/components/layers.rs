use image::Rgba;

use crate::canvas::{BlendMode, CanvasResolution, Layer};
use crate::error::{EngineError, EngineResult};
use crate::log_info;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Handle into the layer arena. The generation guards against a stale handle
/// reaching a slot that has since been reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayerId {
    index: u32,
    generation: u32,
}

impl LayerId {
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerDirection {
    Up,
    Down,
}

struct Slot {
    generation: u32,
    layer: Option<Layer>,
}

/// Ordered layer stack. Buffers live in an arena of slots; `order` lists the
/// handles bottom → top. Always holds at least one layer and the active
/// handle always resolves.
pub struct LayerStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
    order: Vec<LayerId>,
    active: LayerId,
    background: Option<LayerId>,
    resolution: CanvasResolution,
    created: usize,
}

impl LayerStore {
    /// A store holding a single white "Background" layer.
    pub fn new(resolution: CanvasResolution) -> Self {
        let background = LayerId { index: 0, generation: 0 };
        Self {
            slots: vec![Slot {
                generation: 0,
                layer: Some(Layer::new("Background".to_string(), resolution, WHITE)),
            }],
            free: Vec::new(),
            order: vec![background],
            active: background,
            background: Some(background),
            resolution,
            created: 1,
        }
    }

    pub fn resolution(&self) -> CanvasResolution {
        self.resolution
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Handles bottom → top.
    pub fn ids(&self) -> &[LayerId] {
        &self.order
    }

    /// Layers bottom → top.
    pub fn iter(&self) -> impl Iterator<Item = (LayerId, &Layer)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.get(*id).map(|layer| (*id, layer)))
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.layer.as_ref()
    }

    pub fn get_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.layer.as_mut()
    }

    fn require_mut(&mut self, id: LayerId) -> EngineResult<&mut Layer> {
        self.get_mut(id).ok_or(EngineError::UnknownLayer(id))
    }

    /// Position in the bottom → top order.
    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.order.iter().position(|l| *l == id)
    }

    pub fn id_at(&self, position: usize) -> Option<LayerId> {
        self.order.get(position).copied()
    }

    pub fn active_id(&self) -> LayerId {
        self.active
    }

    pub fn active(&self) -> &Layer {
        // The active handle is kept valid by every mutating method.
        self.get(self.active)
            .unwrap_or_else(|| unreachable!("active layer {} missing", self.active))
    }

    pub fn active_mut(&mut self) -> &mut Layer {
        let active = self.active;
        self.get_mut(active)
            .unwrap_or_else(|| unreachable!("active layer {} missing", active))
    }

    pub fn set_active(&mut self, id: LayerId) -> EngineResult<()> {
        if !self.contains(id) {
            return Err(EngineError::UnknownLayer(id));
        }
        self.active = id;
        Ok(())
    }

    pub fn background_id(&self) -> Option<LayerId> {
        self.background
    }

    /// Append a transparent layer at the top and make it active.
    pub fn add_layer(&mut self, name: &str) -> LayerId {
        self.created += 1;
        let name = if name.trim().is_empty() {
            format!("Layer {}", self.created)
        } else {
            name.to_string()
        };
        let layer = Layer::new(name, self.resolution, TRANSPARENT);
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.layer = Some(layer);
                LayerId { index, generation: slot.generation }
            }
            None => {
                self.slots.push(Slot { generation: 0, layer: Some(layer) });
                LayerId { index: self.slots.len() as u32 - 1, generation: 0 }
            }
        };
        self.order.push(id);
        self.active = id;
        log_info!("Added layer {} ({} total)", id, self.order.len());
        id
    }

    /// Remove a layer. Returns `Ok(false)` when it is the last one left.
    /// If the active layer goes, activity moves to the neighbor below, or to
    /// the new bottom layer when there is none.
    pub fn remove_layer(&mut self, id: LayerId) -> EngineResult<bool> {
        let pos = self.index_of(id).ok_or(EngineError::UnknownLayer(id))?;
        if self.order.len() <= 1 {
            return Ok(false);
        }
        self.order.remove(pos);
        let slot = &mut self.slots[id.index as usize];
        slot.layer = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);

        if self.active == id {
            self.active = if pos > 0 { self.order[pos - 1] } else { self.order[0] };
        }
        if self.background == Some(id) {
            self.background = None;
        }
        log_info!("Removed layer {} ({} left)", id, self.order.len());
        Ok(true)
    }

    /// Swap with the adjacent layer. Returns `Ok(false)` at either end.
    pub fn move_layer(&mut self, id: LayerId, direction: LayerDirection) -> EngineResult<bool> {
        let pos = self.index_of(id).ok_or(EngineError::UnknownLayer(id))?;
        let target = match direction {
            LayerDirection::Up if pos + 1 < self.order.len() => pos + 1,
            LayerDirection::Down if pos > 0 => pos - 1,
            _ => return Ok(false),
        };
        self.order.swap(pos, target);
        Ok(true)
    }

    /// Flip visibility; returns the new state.
    pub fn toggle_visibility(&mut self, id: LayerId) -> EngineResult<bool> {
        let layer = self.require_mut(id)?;
        layer.visible = !layer.visible;
        Ok(layer.visible)
    }

    pub fn set_opacity(&mut self, id: LayerId, opacity: f32) -> EngineResult<()> {
        let layer = self.require_mut(id)?;
        layer.opacity = if opacity.is_finite() { opacity.clamp(0.0, 1.0) } else { 1.0 };
        Ok(())
    }

    pub fn rename(&mut self, id: LayerId, name: &str) -> EngineResult<()> {
        self.require_mut(id)?.name = name.to_string();
        Ok(())
    }

    pub fn set_blend_mode(&mut self, id: LayerId, mode: BlendMode) -> EngineResult<()> {
        self.require_mut(id)?.blend_mode = mode;
        Ok(())
    }

    /// Reallocate every buffer at `resolution`. The background is refilled
    /// white; everything else comes back empty.
    pub fn set_resolution(&mut self, resolution: CanvasResolution) {
        self.resolution = resolution;
        let background = self.background;
        for id in self.order.clone() {
            let fill = if Some(id) == background { WHITE } else { TRANSPARENT };
            if let Some(layer) = self.get_mut(id) {
                layer.pixels = Layer::new(String::new(), resolution, fill).pixels;
                layer.tainted = false;
                layer.touch();
            }
        }
        log_info!("Layer buffers reallocated at {}", resolution);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> LayerStore {
        LayerStore::new(CanvasResolution::new(32, 32))
    }

    #[test]
    fn starts_with_white_background() {
        let s = store();
        assert_eq!(s.len(), 1);
        assert_eq!(s.background_id(), Some(s.active_id()));
        assert_eq!(s.active().pixels.get_pixel(5, 5), &WHITE);
    }

    #[test]
    fn add_appends_on_top_and_activates() {
        let mut s = store();
        let a = s.add_layer("A");
        let b = s.add_layer("");
        assert_eq!(s.ids().last(), Some(&b));
        assert_eq!(s.active_id(), b);
        assert_eq!(s.get(a).unwrap().name, "A");
        assert_eq!(s.get(b).unwrap().name, "Layer 3");
        assert!(!s.get(b).unwrap().has_content());
    }

    #[test]
    fn last_layer_cannot_be_removed() {
        let mut s = store();
        let only = s.active_id();
        assert!(!s.remove_layer(only).unwrap());
        assert_eq!(s.len(), 1);
        assert_eq!(s.active_id(), only);
    }

    #[test]
    fn removing_active_selects_neighbor_below() {
        let mut s = store();
        let bg = s.active_id();
        let a = s.add_layer("A");
        let b = s.add_layer("B");
        assert!(s.remove_layer(b).unwrap());
        assert_eq!(s.active_id(), a);
        s.set_active(bg).unwrap();
        assert!(s.remove_layer(bg).unwrap());
        assert_eq!(s.active_id(), a);
        assert_eq!(s.background_id(), None);
    }

    #[test]
    fn removing_inactive_keeps_active() {
        let mut s = store();
        let a = s.add_layer("A");
        let b = s.add_layer("B");
        s.remove_layer(a).unwrap();
        assert_eq!(s.active_id(), b);
    }

    #[test]
    fn stale_handles_do_not_alias_reused_slots() {
        let mut s = store();
        let a = s.add_layer("A");
        s.remove_layer(a).unwrap();
        let c = s.add_layer("C");
        assert_eq!(a.index(), c.index());
        assert!(s.get(a).is_none());
        assert!(matches!(s.rename(a, "x"), Err(EngineError::UnknownLayer(_))));
        assert_eq!(s.get(c).unwrap().name, "C");
    }

    #[test]
    fn move_swaps_and_stops_at_bounds() {
        let mut s = store();
        let bg = s.active_id();
        let a = s.add_layer("A");
        assert!(!s.move_layer(a, LayerDirection::Up).unwrap());
        assert!(s.move_layer(a, LayerDirection::Down).unwrap());
        assert_eq!(s.ids(), &[a, bg]);
        assert!(!s.move_layer(a, LayerDirection::Down).unwrap());
        assert_eq!(s.active_id(), a);
    }

    #[test]
    fn setters_touch_only_their_layer() {
        let mut s = store();
        let bg = s.active_id();
        let a = s.add_layer("A");
        assert!(!s.toggle_visibility(a).unwrap());
        s.set_opacity(a, 3.0).unwrap();
        s.rename(a, "Renamed").unwrap();
        s.set_blend_mode(a, BlendMode::Screen).unwrap();
        let layer = s.get(a).unwrap();
        assert_eq!((layer.visible, layer.opacity), (false, 1.0));
        assert_eq!(layer.name, "Renamed");
        assert_eq!(layer.blend_mode, BlendMode::Screen);
        let bg_layer = s.get(bg).unwrap();
        assert!(bg_layer.visible);
        assert_eq!(bg_layer.blend_mode, BlendMode::Normal);
        assert_eq!(layer.revision, 0);
    }

    #[test]
    fn resolution_change_reallocates_and_clears() {
        let mut s = store();
        let a = s.add_layer("A");
        s.get_mut(a).unwrap().pixels.put_pixel(1, 1, Rgba([1, 2, 3, 255]));
        s.set_resolution(CanvasResolution::new(64, 16));
        let layer = s.get(a).unwrap();
        assert_eq!((layer.pixels.width(), layer.pixels.height()), (64, 16));
        assert!(!layer.has_content());
        let bg = s.get(s.background_id().unwrap()).unwrap();
        assert_eq!(bg.pixels.get_pixel(63, 15), &WHITE);
    }
}
