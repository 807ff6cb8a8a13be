// ============================================================================
// OPS: pixel operations on layer buffers
// ============================================================================
//
//   paint.rs     - brush / eraser segments
//   gradient.rs  - two-stop linear and radial fills
//   transform.rs - resampling and fragment rasterization
//   composite.rs - layer stack flattening
//   scripting.rs - Rhai bindings driving an Editor
// ============================================================================

pub mod composite;
pub mod gradient;
pub mod paint;
pub mod scripting;
pub mod transform;
