//! Visibility & Traversal Tests
//!
//! Tests for:
//! - Cull modes (Always, Never, Dynamic, Inherit)
//! - Inside-parent shortcut (no bound tests below a fully visible node)
//! - Plane-state restoration between siblings
//! - Leaf queueing through a full frame

use std::sync::Arc;

use glam::Vec3;

use umbra::core::{CameraProvider, Intersection, PassMask, QueueId};
use umbra::cull::{
    CullJob, CullSettings, CullTask, FramePipeline, FrameRequest, cull, default_queues,
    queue_subtree,
};
use umbra::scene::{CullMode, NodeKey, Scene, SpatialNode};
use umbra_dev_utils::{CountingCamera, grouped_scene, looking_at_origin, mesh_leaf, opaque_pass};

fn configured_task(scene: &Arc<Scene>, camera: Arc<dyn CameraProvider>) -> CullTask {
    let mut task = CullTask::new(0, &default_queues());
    task.configure(
        CullJob::for_scene(0, Arc::clone(scene), camera, opaque_pass(), PassMask::ALL),
        None,
    )
    .expect("pooled task accepts a job");
    task
}

fn single_leaf_scene(position: Vec3, mode: CullMode) -> (Arc<Scene>, NodeKey) {
    let mut scene = Scene::new();
    let leaf = scene.add_node(mesh_leaf(QueueId::OPAQUE, position).with_cull_mode(mode));
    scene.update();
    (Arc::new(scene), leaf)
}

// ============================================================================
// Cull Modes
// ============================================================================

#[test]
fn never_is_visible_and_inside_regardless_of_camera() {
    // Far outside the view volume, behind the camera.
    let (scene, leaf) = single_leaf_scene(Vec3::new(0.0, 0.0, 500.0), CullMode::Never);
    let camera = CountingCamera::new(looking_at_origin(50.0, 1000.0));
    let counter = camera.counter();
    let mut task = configured_task(&scene, Arc::new(camera));

    assert!(cull(&scene, leaf, Intersection::Intersecting, &mut task));
    assert_eq!(task.visibility(leaf), Some(Intersection::Inside));
    assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[test]
fn always_is_culled_regardless_of_bound() {
    let (scene, leaf) = single_leaf_scene(Vec3::ZERO, CullMode::Always);
    let mut task = configured_task(&scene, Arc::new(looking_at_origin(50.0, 1000.0)));

    assert!(!cull(&scene, leaf, Intersection::Inside, &mut task));
    assert_eq!(task.visibility(leaf), Some(Intersection::Outside));
}

#[test]
fn dynamic_tests_against_camera() {
    let (scene, leaf) = single_leaf_scene(Vec3::new(0.0, 0.0, 500.0), CullMode::Dynamic);
    let mut task = configured_task(&scene, Arc::new(looking_at_origin(50.0, 1000.0)));

    assert!(!cull(&scene, leaf, Intersection::Intersecting, &mut task));
    assert_eq!(task.visibility(leaf), Some(Intersection::Outside));
}

#[test]
fn inherit_under_never_skips_testing() {
    let mut scene = Scene::new();
    let group = scene.add_node(SpatialNode::group().with_cull_mode(CullMode::Never));
    let leaf = scene.add_to_parent(
        mesh_leaf(QueueId::OPAQUE, Vec3::new(0.0, 0.0, 500.0)).with_cull_mode(CullMode::Inherit),
        group,
    );
    scene.update();
    let scene = Arc::new(scene);
    let mut task = configured_task(&scene, Arc::new(looking_at_origin(50.0, 1000.0)));

    assert!(cull(&scene, leaf, Intersection::Intersecting, &mut task));
    assert_eq!(task.visibility(leaf), Some(Intersection::Inside));
}

// ============================================================================
// Inside-parent shortcut
// ============================================================================

#[test]
fn children_of_inside_parent_need_no_bound_tests() {
    let (scene, groups) = grouped_scene(&[12]);
    let scene = Arc::new(scene);
    let camera = CountingCamera::new(looking_at_origin(50.0, 1000.0));
    let counter = camera.counter();
    let mut task = configured_task(&scene, Arc::new(camera));

    assert!(queue_subtree(&scene, groups[0], Intersection::Intersecting, &mut task));

    assert_eq!(task.visibility(groups[0]), Some(Intersection::Inside));
    assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1);
    let group = scene.node(groups[0]).expect("group exists");
    for &child in group.children() {
        assert_eq!(task.visibility(child), Some(Intersection::Inside));
    }
    assert_eq!(task.queues().get(QueueId::OPAQUE).map(|q| q.len()), Some(12));
}

#[test]
fn sibling_does_not_inherit_plane_state() {
    let mut scene = Scene::new();
    let inside = scene.add_node(SpatialNode::group());
    scene.add_to_parent(mesh_leaf(QueueId::OPAQUE, Vec3::ZERO), inside);
    let outside = scene.add_node(SpatialNode::group());
    scene.add_to_parent(mesh_leaf(QueueId::OPAQUE, Vec3::new(400.0, 0.0, 0.0)), outside);
    scene.update();
    let scene = Arc::new(scene);

    let mut task = configured_task(&scene, Arc::new(looking_at_origin(50.0, 1000.0)));
    assert!(queue_subtree(&scene, scene.root(), Intersection::Intersecting, &mut task));

    // `inside` clears every plane; `outside` must still be tested against all of them.
    assert_eq!(task.visibility(scene.root()), Some(Intersection::Intersecting));
    assert_eq!(task.visibility(inside), Some(Intersection::Inside));
    assert_eq!(task.visibility(outside), Some(Intersection::Outside));
    assert_eq!(task.queues().total_len(), 1);
}

// ============================================================================
// Full frame
// ============================================================================

#[test]
fn inside_and_outside_leaf_yield_exactly_one_opaque_item() {
    let mut scene = Scene::new();
    let visible = scene.add_node(mesh_leaf(QueueId::OPAQUE, Vec3::ZERO));
    scene.add_node(mesh_leaf(QueueId::OPAQUE, Vec3::new(0.0, 0.0, 900.0)));
    scene.update();

    let settings = CullSettings {
        multithreading: false,
        ..Default::default()
    };
    let mut pipeline = FramePipeline::new(settings).expect("valid settings");
    pipeline
        .start_frame(FrameRequest::new(
            0,
            Arc::new(scene),
            Arc::new(looking_at_origin(50.0, 1000.0)),
            opaque_pass(),
        ))
        .expect("frame starts");
    let output = pipeline.wait_finished(0).expect("frame finishes");

    let opaque = output.queues.get(QueueId::OPAQUE).expect("opaque queue");
    assert_eq!(opaque.len(), 1);
    assert_eq!(opaque.entries()[0].node, visible);
    assert_eq!(output.queues.total_len(), 1);
}
