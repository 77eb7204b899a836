//! Umbra Scene
//!
//! Scene graph side of the cull engine:
//! - `SpatialNode`: hierarchy entity with transform, cull mode and filters
//! - `Scene`: slotmap arena rooted at a single group node
//! - `Renderable`: queueable leaf contract with per-frame-slot state
//! - `transform_system`: top-down matrix and bottom-up aggregate passes

pub mod node;
pub mod renderable;
pub mod scene;
pub mod transform;
pub mod transform_system;

pub use node::{CullMode, LodBands, NodeKind, SpatialNode};
pub use renderable::{
    ItemSnapshot, MAX_FRAME_SLOTS, MaterialId, MeshInstance, Renderable, RenderableState,
};
pub use scene::Scene;
pub use transform::Transform;

use slotmap::new_key_type;

new_key_type! {
    pub struct NodeKey;
}
