use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::canvas::{CanvasResolution, MAX_CANVAS_PIXELS};
use crate::components::tools::ToolProperties;
use crate::error::{EngineError, EngineResult};
use crate::ops::transform::Interpolation;

/// Which canvas the editor paints on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CanvasVariant {
    /// Resolution comes from the template image; nothing can be exported
    /// until one has decoded.
    Template,
    /// A fixed size known up front.
    Fixed { width: u32, height: u32 },
    /// The small plate canvas. Templates never change its size.
    LicensePlate,
}

impl Default for CanvasVariant {
    fn default() -> Self {
        let CanvasResolution { width, height } = CanvasResolution::DEFAULT;
        CanvasVariant::Fixed { width, height }
    }
}

impl CanvasVariant {
    /// Resolution available before any template loads.
    pub fn initial_resolution(&self) -> Option<CanvasResolution> {
        match *self {
            CanvasVariant::Template => None,
            CanvasVariant::Fixed { width, height } => Some(CanvasResolution::new(width, height)),
            CanvasVariant::LicensePlate => Some(CanvasResolution::LICENSE_PLATE),
        }
    }

    /// True when a decoded template dictates the canvas size.
    pub fn follows_template(&self) -> bool {
        matches!(self, CanvasVariant::Template)
    }

    /// Parse `template`, `plate` / `license-plate`, or `WIDTHxHEIGHT`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "template" => Some(CanvasVariant::Template),
            "plate" | "license-plate" | "license_plate" => Some(CanvasVariant::LicensePlate),
            "default" | "fixed" => Some(CanvasVariant::default()),
            other => {
                let (w, h) = other.split_once('x')?;
                let width = w.trim().parse().ok()?;
                let height = h.trim().parse().ok()?;
                CanvasResolution::new(width, height)
                    .is_allocatable()
                    .then_some(CanvasVariant::Fixed { width, height })
            }
        }
    }
}

/// Engine-wide knobs. Every field has a default so partial JSON files load.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub variant: CanvasVariant,
    /// Initial brush / gradient settings.
    pub tool: ToolProperties,
    /// Cut selections must exceed this many pixels on both axes.
    pub min_selection_px: u32,
    /// Gizmo handle hit radius in display pixels.
    pub handle_grab_radius: f32,
    /// Distance of the rotate handle above the top edge, display pixels.
    pub rotate_handle_offset: f32,
    /// Resampling filter used when a fragment is committed.
    pub interpolation: Interpolation,
    /// Host externally supplied images on a freshly created layer.
    pub external_on_new_layer: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            variant: CanvasVariant::default(),
            tool: ToolProperties::default(),
            min_selection_px: 5,
            handle_grab_radius: 10.0,
            rotate_handle_offset: 30.0,
            interpolation: Interpolation::Bilinear,
            external_on_new_layer: true,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(text: &str) -> EngineResult<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> EngineResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn validate(&self) -> EngineResult<()> {
        if let CanvasVariant::Fixed { width, height } = self.variant
            && !CanvasResolution::new(width, height).is_allocatable()
        {
            return Err(EngineError::Config(format!(
                "fixed canvas must be non-empty and at most {} pixels, got {}×{}",
                MAX_CANVAS_PIXELS, width, height
            )));
        }
        if !(0.0..=1.0).contains(&self.tool.opacity) {
            return Err(EngineError::Config(format!(
                "tool opacity {} outside 0..1",
                self.tool.opacity
            )));
        }
        if self.tool.size <= 0.0 {
            return Err(EngineError::Config("brush size must be positive".into()));
        }
        if self.handle_grab_radius <= 0.0 {
            return Err(EngineError::Config("handle grab radius must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_parsing() {
        assert_eq!(CanvasVariant::parse("template"), Some(CanvasVariant::Template));
        assert_eq!(CanvasVariant::parse("Plate"), Some(CanvasVariant::LicensePlate));
        assert_eq!(
            CanvasVariant::parse("640x480"),
            Some(CanvasVariant::Fixed { width: 640, height: 480 })
        );
        assert_eq!(CanvasVariant::parse("0x480"), None);
        assert_eq!(CanvasVariant::parse("huge"), None);
        assert_eq!(CanvasVariant::parse("17000x16000"), None);
    }

    #[test]
    fn oversized_fixed_canvas_is_rejected() {
        let config = EngineConfig {
            variant: CanvasVariant::Fixed { width: 17_000, height: 16_000 },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));
        let config = EngineConfig {
            variant: CanvasVariant::Fixed { width: 16_000, height: 16_000 },
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn variant_resolutions() {
        assert_eq!(CanvasVariant::Template.initial_resolution(), None);
        assert_eq!(
            CanvasVariant::LicensePlate.initial_resolution(),
            Some(CanvasResolution::new(420, 100))
        );
        assert_eq!(
            CanvasVariant::default().initial_resolution(),
            Some(CanvasResolution::new(1024, 1024))
        );
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{ "variant": { "kind": "license_plate" } }"#).unwrap();
        assert_eq!(config.variant, CanvasVariant::LicensePlate);
        assert_eq!(config.min_selection_px, 5);
        assert!(config.external_on_new_layer);
    }

    #[test]
    fn json_round_trip() {
        let config = EngineConfig::default();
        let text = config.to_json_string().unwrap();
        let back = EngineConfig::from_json_str(&text).unwrap();
        assert_eq!(back.variant, config.variant);
        assert_eq!(back.tool.size, config.tool.size);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "variant": { "kind": "fixed", "width": 0, "height": 5 } }"#);
        assert!(matches!(err, Err(EngineError::Config(_))));
        let err = EngineConfig::from_json_str(r#"{ "tool": { "opacity": 2.0 } }"#);
        assert!(matches!(err, Err(EngineError::Config(_))));
    }
}
