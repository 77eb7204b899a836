//! # Umbra
//!
//! Parallel scene culling and render-queue construction.
//!
//! Each frame, a [`FramePipeline`](cull::FramePipeline) walks a spatial scene
//! graph on a pool of worker threads, decides visibility per camera and pass,
//! assigns visible items to render queues with per-queue sort keys and hands
//! back sorted queues for a render backend to consume. Several frames can be
//! in flight at once: the backend reads the output of frame `N` while frame
//! `N + 1` is being culled.
//!
//! ## Crates
//!
//! | Module | Crate | Contents |
//! |---|---|---|
//! | [`core`] | `umbra_core` | ids, bounds, frustum, camera, sort keys, errors |
//! | [`scene`] | `umbra_scene` | nodes, scene arena, renderable contract |
//! | [`cull`] | `umbra_cull` | passes, queues, tasks, traversal, pipeline |
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use umbra::prelude::*;
//!
//! let mut scene = Scene::new();
//! let item = MeshInstance::new(BoundingBox::cube(Vec3::ZERO, 1.0), MaterialId(0), QueueId::OPAQUE);
//! scene.add_node(SpatialNode::renderable(Arc::new(item)));
//! scene.update();
//!
//! let mut camera = Camera::new_perspective(60.0, 16.0 / 9.0, 0.1, 500.0);
//! camera.look_at(Vec3::new(0.0, 2.0, 10.0), Vec3::ZERO, Vec3::Y);
//!
//! let passes = PassSet::new().with(Pass::new(PassId::OPAQUE, "Opaque", QueueId::OPAQUE.bit()));
//! let mut pipeline = FramePipeline::new(CullSettings::default())?;
//! pipeline.start_frame(FrameRequest::new(0, Arc::new(scene), Arc::new(camera), passes))?;
//! let output = pipeline.wait_finished(0)?;
//! ```

pub use umbra_core as core;
pub use umbra_cull as cull;
pub use umbra_scene as scene;

pub use umbra_core::errors;
pub use umbra_core::{CullError, Result};

pub use glam as math;

pub mod prelude {
    pub use glam::{Affine3A, Quat, Vec3};

    pub use umbra_core::{
        BoundingBox, Camera, CameraProvider, CullError, FrameId, Intersection, PassId, PassMask,
        QueueId, QueueMask, SortKey, SortStrategy,
    };
    pub use umbra_cull::{
        CullSettings, CullStats, DelegationPolicy, FrameOutput, FramePipeline, FrameRequest, Pass,
        PassSet, QueueConfig, RenderQueueSet,
    };
    pub use umbra_scene::{
        CullMode, LodBands, MaterialId, MeshInstance, NodeKey, NodeKind, Renderable, Scene,
        SpatialNode,
    };
}
