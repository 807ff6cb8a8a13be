use crate::components::layers::LayerId;

/// Everything the engine can refuse to do.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No canvas resolution has been established yet (template still loading
    /// or failed to load).
    #[error("canvas resolution has not been established yet")]
    NotReady,
    /// Template or resolution source could not be loaded.
    #[error("template load failed: {0}")]
    LoadError(String),
    /// Pixel readback refused because the pixels came from a source that did
    /// not grant cross-origin access.
    #[error("pixel readback blocked: {0}")]
    SecurityError(String),
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("composite encode failed: {0}")]
    Encode(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no layer with id {0}")]
    UnknownLayer(LayerId),
    /// The requested operation conflicts with the interaction in progress.
    #[error("engine busy: {0}")]
    Busy(&'static str),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("script error: {0}")]
    Script(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
