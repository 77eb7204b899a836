use std::sync::Arc;

use glam::Vec3;

use umbra_core::{BoundingBox, PassId, QueueId};
use umbra_cull::{Pass, PassSet};
use umbra_scene::{MaterialId, MeshInstance, NodeKey, Scene, SpatialNode};

/// Unit-sized mesh leaf for `queue` at `position`.
#[must_use]
pub fn mesh_leaf(queue: QueueId, position: Vec3) -> SpatialNode {
    let item = MeshInstance::new(BoundingBox::cube(Vec3::ZERO, 0.5), MaterialId(0), queue);
    SpatialNode::renderable(Arc::new(item)).with_position(position)
}

/// Root with one group per entry of `group_sizes`, each holding that many
/// opaque leaves near the origin. Returns the updated scene and the group keys.
#[must_use]
pub fn grouped_scene(group_sizes: &[u32]) -> (Scene, Vec<NodeKey>) {
    let mut scene = Scene::new();
    let mut groups = Vec::with_capacity(group_sizes.len());
    for (g, &size) in group_sizes.iter().enumerate() {
        let group = scene.add_node(SpatialNode::group());
        for i in 0..size {
            let position = Vec3::new(
                (i % 10) as f32 - 4.5,
                (i / 10) as f32 - 3.0,
                -(g as f32) * 2.0,
            );
            scene.add_to_parent(mesh_leaf(QueueId::OPAQUE, position), group);
        }
        groups.push(group);
    }
    scene.update();
    (scene, groups)
}

/// Square grid of `side * side` opaque leaves, spaced `spacing` apart on the
/// XY plane and split into one group per row.
#[must_use]
pub fn grid_scene(side: u32, spacing: f32) -> Scene {
    let mut scene = Scene::new();
    let offset = (side as f32 - 1.0) * spacing * 0.5;
    for row in 0..side {
        let group = scene.add_node(SpatialNode::group());
        for col in 0..side {
            let position = Vec3::new(
                col as f32 * spacing - offset,
                row as f32 * spacing - offset,
                0.0,
            );
            let queue = if (row + col) % 5 == 0 {
                QueueId::TRANSPARENT
            } else {
                QueueId::OPAQUE
            };
            scene.add_to_parent(mesh_leaf(queue, position), group);
        }
    }
    scene.update();
    scene
}

#[must_use]
pub fn opaque_pass() -> PassSet {
    PassSet::new().with(Pass::new(PassId::OPAQUE, "Opaque", QueueId::OPAQUE.bit()))
}

/// Depth, opaque, transparent and shadow passes.
#[must_use]
pub fn standard_passes() -> PassSet {
    PassSet::new()
        .with(Pass::new(PassId::DEPTH, "Depth", QueueId::OPAQUE.bit()))
        .with(Pass::new(PassId::OPAQUE, "Opaque", QueueId::OPAQUE.bit()))
        .with(Pass::new(
            PassId::TRANSPARENT,
            "Transparent",
            QueueId::TRANSPARENT.bit(),
        ))
        .with(Pass::new(
            PassId::SHADOW,
            "Shadow",
            QueueId::SHADOW_CASTER.bit(),
        ))
}
