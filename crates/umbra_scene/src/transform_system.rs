//! Transform System
//!
//! Hierarchy passes run by [`Scene::update`](crate::Scene::update), kept apart
//! from `Scene` so that they only borrow the node arena.
//!
//! 1. [`update_world`]: top-down. Rebuilds local and world matrices, resolves
//!    inherited cull modes and node depths.
//! 2. [`update_aggregates`]: bottom-up. World bounds, queue/pass filter
//!    masks and subtree-size estimates.

use glam::Affine3A;
use slotmap::SlotMap;

use umbra_core::{BoundingBox, PassMask, QueueMask};

use crate::NodeKey;
use crate::node::{CullMode, NodeKind, SpatialNode};

/// Top-down world matrix pass, using an explicit stack instead of recursion.
///
/// An `Inherit` chain that reaches `root` resolves to `Dynamic`.
pub fn update_world(nodes: &mut SlotMap<NodeKey, SpatialNode>, root: NodeKey) {
    // (node, parent world, parent changed, parent effective mode, depth)
    let mut stack: Vec<(NodeKey, Affine3A, bool, CullMode, u16)> = Vec::with_capacity(64);
    stack.push((root, Affine3A::IDENTITY, false, CullMode::Dynamic, 0));

    while let Some((key, parent_world, parent_changed, parent_mode, depth)) = stack.pop() {
        let Some(node) = nodes.get_mut(key) else {
            continue;
        };

        let local_changed = node.transform.update_local_matrix();
        let world_changed = local_changed || parent_changed;

        if world_changed {
            let new_world = parent_world * *node.transform.local_matrix();
            node.transform.set_world_matrix(new_world);

            if let NodeKind::Renderable(item) = &node.kind {
                item.state().mark_dirty();
            }
        }

        node.effective_cull_mode = match node.cull_mode {
            CullMode::Inherit => parent_mode,
            explicit => explicit,
        };
        node.depth = depth;

        let world = node.transform.world_matrix;
        let mode = node.effective_cull_mode;
        // Reverse push keeps child order when popping.
        for &child in node.children.iter().rev() {
            stack.push((child, world, world_changed, mode, depth.saturating_add(1)));
        }
    }
}

/// Bottom-up aggregate pass. Must run after [`update_world`].
pub fn update_aggregates(nodes: &mut SlotMap<NodeKey, SpatialNode>, root: NodeKey) {
    let order = pre_order(nodes, root);

    for &key in order.iter().rev() {
        let Some(node) = nodes.get(key) else {
            continue;
        };
        let world = node.transform.world_matrix;

        let mut bound = node
            .local_bound
            .map_or(BoundingBox::EMPTY, |b| b.transform(&world));
        let mut queues = QueueMask::EMPTY;
        let mut passes = PassMask::EMPTY;
        let mut size: u32 = 0;

        if let NodeKind::Renderable(item) = &node.kind {
            bound = bound.union(&item.local_bound().transform(&world));
            queues |= item.queue_mask();
            passes |= item.pass_mask();
            size = 1;
        }

        let mut max_child: u32 = 0;
        for child in node.children.iter().filter_map(|&c| nodes.get(c)) {
            bound = bound.union(&child.world_bound);
            queues |= child.render_queue_filter;
            passes |= child.render_pass_filter;
            size = size.saturating_add(child.subtree_size);
            max_child = max_child.max(child.subtree_size);
        }

        // Only one level of detail is ever traversed.
        if matches!(node.kind, NodeKind::Lod(_)) {
            size = max_child;
        }

        queues &= node.queue_filter;
        passes &= node.pass_filter;

        if let Some(node) = nodes.get_mut(key) {
            node.world_bound = bound;
            node.render_queue_filter = queues;
            node.render_pass_filter = passes;
            node.subtree_size = size;
        }
    }
}

/// Keys of the subtree under `root` in depth-first pre-order.
#[must_use]
pub fn pre_order(nodes: &SlotMap<NodeKey, SpatialNode>, root: NodeKey) -> Vec<NodeKey> {
    let mut order = Vec::with_capacity(nodes.len());
    let mut stack = vec![root];
    while let Some(key) = stack.pop() {
        let Some(node) = nodes.get(key) else {
            continue;
        };
        order.push(key);
        stack.extend(node.children.iter().rev().copied());
    }
    order
}
