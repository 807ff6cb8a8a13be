// ============================================================================
// COMPONENTS: interactive editing state
// ============================================================================
//
//   layers.rs - LayerStore arena, ordering and per-layer setters
//   tools.rs  - tool identifiers, properties and the pointer state machine
//   gizmo.rs  - floating fragment, transform handles, commit / cancel
// ============================================================================

pub mod gizmo;
pub mod layers;
pub mod tools;
