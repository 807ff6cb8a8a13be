//! LayerPaint: a layered raster paint engine for fixed-resolution canvases.
//!
//! The [`editor::Editor`] owns one session: the layer stack, the pointer
//! driven tools, the floating fragment with its transform gizmo, and the
//! mapping between the on-screen container and canvas pixels.

#![allow(clippy::large_enum_variant)]

#[macro_use]
pub mod logger;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod config;
pub mod editor;
pub mod error;
pub mod io;
pub mod ops;
pub mod viewport;

pub use editor::{Editor, EngineStatus};
pub use error::{EngineError, EngineResult};
