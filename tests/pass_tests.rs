//! Pass Tests
//!
//! Tests for:
//! - Pass matching against aggregated node filters
//! - PassSet restoration after subtree traversal
//! - Job-level pass filters
//! - Ancestor queue filters bounding descendant queues

use std::sync::Arc;

use glam::Vec3;

use umbra::core::{BoundingBox, Intersection, PassId, PassMask, QueueId};
use umbra::cull::{CullJob, CullTask, Pass, PassSet, default_queues, queue_subtree};
use umbra::scene::{MaterialId, MeshInstance, NodeKey, Scene, SpatialNode};
use umbra_dev_utils::{looking_at_origin, mesh_leaf, standard_passes};

struct MixedScene {
    scene: Arc<Scene>,
    opaque_group: NodeKey,
    transparent_group: NodeKey,
    shadow_only: NodeKey,
}

fn mixed_scene() -> MixedScene {
    let mut scene = Scene::new();
    let opaque_group = scene.add_node(SpatialNode::group());
    for x in 0..3 {
        scene.add_to_parent(mesh_leaf(QueueId::OPAQUE, Vec3::new(x as f32, 0.0, 0.0)), opaque_group);
    }
    let transparent_group = scene.add_node(SpatialNode::group());
    scene.add_to_parent(mesh_leaf(QueueId::TRANSPARENT, Vec3::Y), transparent_group);
    let shadow_only = scene.add_node(mesh_leaf(QueueId::SHADOW_CASTER, Vec3::NEG_Y));
    scene.update();
    MixedScene {
        scene: Arc::new(scene),
        opaque_group,
        transparent_group,
        shadow_only,
    }
}

fn task(scene: &Arc<Scene>, passes: PassSet, pass_filter: PassMask) -> CullTask {
    let mut task = CullTask::new(0, &default_queues());
    task.configure(
        CullJob::for_scene(
            0,
            Arc::clone(scene),
            Arc::new(looking_at_origin(30.0, 500.0)),
            passes,
            pass_filter,
        ),
        None,
    )
    .expect("configure");
    task
}

#[test]
fn pass_matches_requires_queue_and_pass_bits() {
    let pass = Pass::new(PassId::OPAQUE, "Opaque", QueueId::OPAQUE.bit());
    assert!(pass.matches(QueueId::OPAQUE.bit(), PassMask::ALL, PassMask::ALL));
    assert!(!pass.matches(QueueId::TRANSPARENT.bit(), PassMask::ALL, PassMask::ALL));
    assert!(!pass.matches(QueueId::OPAQUE.bit(), PassId::DEPTH.bit(), PassMask::ALL));
    assert!(!pass.matches(QueueId::OPAQUE.bit(), PassMask::ALL, PassId::SHADOW.bit()));
}

#[test]
fn pass_set_is_restored_after_every_subtree() {
    let mixed = mixed_scene();
    let original = standard_passes();

    for node in [
        mixed.scene.root(),
        mixed.opaque_group,
        mixed.transparent_group,
        mixed.shadow_only,
    ] {
        let mut task = task(&mixed.scene, original.clone(), PassMask::ALL);
        assert!(queue_subtree(&mixed.scene, node, Intersection::Intersecting, &mut task));
        assert_eq!(task.passes(), &original, "pass set changed by subtree {node:?}");
    }
}

#[test]
fn subtree_without_matching_pass_is_skipped() {
    let mixed = mixed_scene();
    let passes = PassSet::new().with(Pass::new(PassId::OPAQUE, "Opaque", QueueId::OPAQUE.bit()));
    let mut task = task(&mixed.scene, passes.clone(), PassMask::ALL);

    assert!(!queue_subtree(&mixed.scene, mixed.transparent_group, Intersection::Intersecting, &mut task));
    assert_eq!(task.passes(), &passes);
    assert_eq!(task.visibility(mixed.transparent_group), None);
    assert_eq!(task.queues().total_len(), 0);
}

#[test]
fn disabled_pass_does_not_queue() {
    let mixed = mixed_scene();
    let passes = PassSet::new()
        .with(Pass::new(PassId::OPAQUE, "Opaque", QueueId::OPAQUE.bit()).disabled())
        .with(Pass::new(PassId::TRANSPARENT, "Transparent", QueueId::TRANSPARENT.bit()));
    let mut task = task(&mixed.scene, passes, PassMask::ALL);
    task.run().expect("run");

    assert_eq!(task.queues().get(QueueId::OPAQUE).map(|q| q.len()), Some(0));
    assert_eq!(task.queues().get(QueueId::TRANSPARENT).map(|q| q.len()), Some(1));
}

#[test]
fn job_pass_filter_limits_queues() {
    let mixed = mixed_scene();
    let mut task = task(&mixed.scene, standard_passes(), PassId::SHADOW.bit());
    task.run().expect("run");

    assert_eq!(task.queues().get(QueueId::SHADOW_CASTER).map(|q| q.len()), Some(1));
    assert_eq!(task.queues().get(QueueId::OPAQUE).map(|q| q.len()), Some(0));
    assert_eq!(task.queues().get(QueueId::TRANSPARENT).map(|q| q.len()), Some(0));
    assert_eq!(task.passes(), &standard_passes());
}

#[test]
fn node_pass_filter_excludes_subtree_from_pass() {
    let mut scene = Scene::new();
    let group = scene.add_node(SpatialNode::group().with_pass_filter(PassId::DEPTH.bit()));
    scene.add_to_parent(mesh_leaf(QueueId::OPAQUE, Vec3::ZERO), group);
    scene.update();
    let scene = Arc::new(scene);

    let opaque_only = PassSet::new().with(Pass::new(PassId::OPAQUE, "Opaque", QueueId::OPAQUE.bit()));
    let mut task = task(&scene, opaque_only, PassMask::ALL);
    assert!(!queue_subtree(&scene, group, Intersection::Intersecting, &mut task));
}

#[test]
fn ancestor_queue_filter_bounds_descendant_queues() {
    let both = QueueId::OPAQUE.bit() | QueueId::TRANSPARENT.bit();
    let mut scene = Scene::new();
    let group = scene.add_node(SpatialNode::group().with_queue_filter(QueueId::TRANSPARENT.bit()));
    let item = MeshInstance::new(BoundingBox::cube(Vec3::ZERO, 0.5), MaterialId(0), QueueId::OPAQUE)
        .with_queues(both);
    scene.add_to_parent(SpatialNode::renderable(Arc::new(item)), group);
    scene.update();
    let scene = Arc::new(scene);

    // One pass spanning both queues survives exclusion at the group.
    let passes = PassSet::new().with(Pass::new(PassId::OPAQUE, "Forward", both));
    let mut task = task(&scene, passes.clone(), PassMask::ALL);
    task.run().expect("run");

    assert_eq!(task.queues().get(QueueId::OPAQUE).map(|q| q.len()), Some(0));
    assert_eq!(task.queues().get(QueueId::TRANSPARENT).map(|q| q.len()), Some(1));
    assert_eq!(task.passes(), &passes);
}
