use std::io::Cursor;
use std::path::Path;

use image::codecs::png::PngEncoder;
use image::{ImageError, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::log_info;

/// How the bytes of an external image were fetched. Pixels from an
/// `Opaque` fetch may be drawn but never read back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorsMode {
    /// Produced locally (file import, clipboard, generator running in-process).
    #[default]
    SameOrigin,
    /// Remote, fetched with permissive cross-origin access.
    Anonymous,
    /// Remote, fetched without cross-origin access.
    Opaque,
}

impl CorsMode {
    pub fn allows_readback(&self) -> bool {
        !matches!(self, CorsMode::Opaque)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "same-origin" | "same_origin" | "local" => Some(CorsMode::SameOrigin),
            "anonymous" | "cors" => Some(CorsMode::Anonymous),
            "opaque" | "no-cors" => Some(CorsMode::Opaque),
            _ => None,
        }
    }
}

/// Encoded image bytes handed in by a collaborator (generator, example
/// library, file import), plus how they were obtained.
#[derive(Clone, Debug)]
pub struct ExternalImage {
    pub bytes: Vec<u8>,
    pub cors: CorsMode,
}

impl ExternalImage {
    pub fn new(bytes: Vec<u8>, cors: CorsMode) -> Self {
        Self { bytes, cors }
    }

    /// Read a local file; local files are always same-origin.
    pub fn from_path(path: &Path) -> EngineResult<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::new(bytes, CorsMode::SameOrigin))
    }
}

/// Decode any supported raster format to RGBA8.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, ImageError> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Encode an RGBA buffer as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> EngineResult<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    let encoder = PngEncoder::new(&mut out);
    #[allow(deprecated)]
    encoder
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ColorType::Rgba8,
        )
        .map_err(|e| EngineError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}

/// Write PNG bytes to disk.
pub fn write_png(bytes: &[u8], path: &Path) -> EngineResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    log_info!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
