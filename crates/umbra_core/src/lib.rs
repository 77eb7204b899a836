//! Umbra Core
//!
//! Foundational types shared by every Umbra crate: queue/pass identifiers,
//! bounding volumes, the frustum, the camera provider contract, sort keys and
//! the error type.

pub mod bounds;
pub mod camera;
pub mod errors;
pub mod frustum;
pub mod ids;
pub mod sort;

pub use bounds::BoundingBox;
pub use camera::{Camera, CameraProvider, PlaneState, ProjectionType};
pub use errors::{CullError, Result};
pub use frustum::{Frustum, Intersection, PlaneMask};
pub use ids::{FrameId, PassId, PassMask, QueueId, QueueMask};
pub use sort::{SortContext, SortKey, SortStrategy};
