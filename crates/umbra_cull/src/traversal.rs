//! Cull Traversal
//!
//! Depth-first walk over a scene subtree on behalf of one [`CullTask`].
//!
//! # Per-subtree state
//!
//! Three pieces of task state are narrowed on the way down and must be back
//! to their previous value when a subtree returns:
//! - the pass set: passes that cannot match a subtree are excluded from it
//! - the queue scope: queues every ancestor's `queue_filter` allows
//! - the working camera's plane state: planes a parent is fully inside of
//!   are not retested for its children
//!
//! All three are restored unconditionally after every child, delegated or not.

use std::sync::Arc;

use umbra_core::{Intersection, QueueMask};
use umbra_scene::{CullMode, NodeKey, NodeKind, Renderable, Scene, SpatialNode};

use crate::queue::QueueEntry;
use crate::task::{CullTask, PrepareEntry};

/// Decides visibility of `key` and records it in the task's cache.
///
/// `parent_result` is the visibility of the node's parent in this traversal.
pub fn cull(scene: &Scene, key: NodeKey, parent_result: Intersection, task: &mut CullTask) -> bool {
    scene
        .node(key)
        .is_some_and(|node| classify(key, node, parent_result, task).is_visible())
}

fn classify(
    key: NodeKey,
    node: &SpatialNode,
    parent_result: Intersection,
    task: &mut CullTask,
) -> Intersection {
    let result = match node.effective_cull_mode() {
        CullMode::Always => Intersection::Outside,
        CullMode::Never => Intersection::Inside,
        CullMode::Dynamic | CullMode::Inherit => {
            if parent_result == Intersection::Inside {
                // Bounds nest: nothing below a fully visible parent can leave the volume.
                Intersection::Inside
            } else {
                task.camera.test_volume(node.world_bound())
            }
        }
    };

    task.visibility.insert(key, result);
    result
}

/// Culls and queues the subtree rooted at `key`.
///
/// Returns `false` when no pass of the task matches the subtree, in which
/// case nothing below `key` is tested or visited.
pub fn queue_subtree(
    scene: &Scene,
    key: NodeKey,
    parent_result: Intersection,
    task: &mut CullTask,
) -> bool {
    let Some(node) = scene.node(key) else {
        return false;
    };

    let outer_scope = task.queue_scope;
    task.queue_scope &= node.queue_filter;

    let node_queues = node.render_queue_filter() & task.queue_scope;
    let node_passes = node.render_pass_filter();
    let pass_filter = task.pass_filter;
    let exclusion = task
        .passes
        .exclude(|pass| pass.matches(node_queues, node_passes, pass_filter));

    let matched = !task.passes.is_empty();
    if matched {
        task.stats.nodes_visited += 1;
        let result = classify(key, node, parent_result, task);
        if result.is_visible() {
            visit_node(scene, key, node, result, task);
        } else {
            task.stats.nodes_culled += 1;
        }
    } else {
        task.stats.subtrees_skipped += 1;
    }

    task.passes.restore(exclusion);
    task.queue_scope = outer_scope;
    matched
}

fn visit_node(
    scene: &Scene,
    key: NodeKey,
    node: &SpatialNode,
    result: Intersection,
    task: &mut CullTask,
) {
    match &node.kind {
        NodeKind::Group => visit_children(scene, node.children(), result, task),
        NodeKind::Renderable(item) => {
            queue_item(key, node, item, task);
            visit_children(scene, node.children(), result, task);
        }
        NodeKind::Lod(bands) => {
            let distance = node.world_bound().center().distance(task.sort_context.eye);
            if let Some(&child) = bands.select(distance).and_then(|i| node.children().get(i)) {
                let saved = task.camera.plane_state();
                queue_subtree(scene, child, result, task);
                task.camera.restore_plane_state(saved);
            }
        }
    }
}

/// Visits children in order, handing suitable subtrees to idle tasks.
fn visit_children(scene: &Scene, children: &[NodeKey], result: Intersection, task: &mut CullTask) {
    if children.is_empty() {
        return;
    }

    let dispatcher = task.context.as_ref().map(|ctx| Arc::clone(&ctx.dispatcher));
    let mut remaining: u32 = children
        .iter()
        .filter_map(|&c| scene.node(c))
        .map(SpatialNode::subtree_size)
        .sum();

    for &child in children {
        let Some(child_node) = scene.node(child) else {
            continue;
        };
        let size = child_node.subtree_size();
        let saved = task.camera.plane_state();

        let delegated = dispatcher.as_ref().is_some_and(|d| {
            d.should_delegate(remaining, child_node) && d.try_delegate(task, child, result)
        });
        if delegated {
            task.stats.delegated += 1;
        } else {
            queue_subtree(scene, child, result, task);
        }

        task.camera.restore_plane_state(saved);
        remaining = remaining.saturating_sub(size);
    }
}

/// Appends a visible item to every queue it newly enters this frame.
fn queue_item(key: NodeKey, node: &SpatialNode, item: &Arc<dyn Renderable>, task: &mut CullTask) {
    let world = *node.world_matrix();
    let bound = item.local_bound().transform(&world);

    let mask: QueueMask = item.queue_mask()
        & task.queue_scope
        & task.passes.queue_mask_union()
        & task.queues.configured_mask();

    for queue in mask.iter() {
        if !task.entered.insert((key, queue)) {
            continue;
        }
        let Some(strategy) = task.queues.strategy(queue) else {
            continue;
        };
        let sort_key = item.compute_sort_key(queue, strategy, &task.sort_context, &world, &bound);
        task.queues.push(
            queue,
            QueueEntry {
                item: Arc::clone(item),
                node: key,
                sort_key,
                world,
            },
        );
        task.stats.items_queued += 1;
    }

    if item.clear_update(task.slot) {
        task.prepare.push(PrepareEntry {
            item: Arc::clone(item),
            node: key,
            world,
            bound,
        });
        task.stats.items_prepared += 1;
    }
}
