use slotmap::SlotMap;

use crate::NodeKey;
use crate::node::SpatialNode;
use crate::transform_system;

/// Arena of spatial nodes under a single group root.
///
/// Any mutable access marks the scene dirty; [`Scene::update`] recomputes
/// world matrices and aggregates and clears the flag. Cull traversal refuses
/// dirty scenes.
#[derive(Debug, Clone)]
pub struct Scene {
    nodes: SlotMap<NodeKey, SpatialNode>,
    root: NodeKey,
    dirty: bool,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(SpatialNode::group());
        Self {
            nodes,
            root,
            dirty: true,
        }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeKey {
        self.root
    }

    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of nodes, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Adds a node directly under the root.
    pub fn add_node(&mut self, node: SpatialNode) -> NodeKey {
        self.add_to_parent(node, self.root)
    }

    /// Adds a node under `parent`, falling back to the root if `parent` does
    /// not exist.
    pub fn add_to_parent(&mut self, mut node: SpatialNode, parent: NodeKey) -> NodeKey {
        let parent = if self.nodes.contains_key(parent) {
            parent
        } else {
            log::warn!("Parent node {parent:?} not found, adding under the scene root");
            self.root
        };

        node.parent = Some(parent);
        node.children.clear();
        let key = self.nodes.insert(node);
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(key);
        }
        self.dirty = true;
        key
    }

    /// Re-parents `child` under `parent`, appending it to the child list.
    ///
    /// Attaching the root, attaching a node to itself or to one of its own
    /// descendants is refused with a warning.
    pub fn attach(&mut self, child: NodeKey, parent: NodeKey) {
        if child == self.root {
            log::warn!("Cannot re-parent the scene root");
            return;
        }
        if child == parent {
            log::warn!("Cannot attach node to itself");
            return;
        }
        if !self.nodes.contains_key(child) || !self.nodes.contains_key(parent) {
            log::warn!("Attach with unknown node ({child:?} -> {parent:?}) ignored");
            return;
        }
        if self.is_ancestor(child, parent) {
            log::warn!("Attaching {child:?} under its own descendant {parent:?} would form a cycle");
            return;
        }

        self.unlink(child);
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(parent);
            c.transform.mark_dirty();
        }
        self.dirty = true;
    }

    /// Moves `node` (and its subtree) back under the root.
    pub fn detach(&mut self, node: NodeKey) {
        if node != self.root {
            self.attach(node, self.root);
        }
    }

    /// Removes a node and its whole subtree. The root cannot be removed.
    pub fn remove_node(&mut self, key: NodeKey) {
        if key == self.root || !self.nodes.contains_key(key) {
            return;
        }
        self.unlink(key);

        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(current) {
                stack.extend(node.children);
            }
        }
        self.dirty = true;
    }

    #[must_use]
    pub fn node(&self, key: NodeKey) -> Option<&SpatialNode> {
        self.nodes.get(key)
    }

    /// Mutable access. Marks the scene dirty.
    pub fn node_mut(&mut self, key: NodeKey) -> Option<&mut SpatialNode> {
        let node = self.nodes.get_mut(key)?;
        self.dirty = true;
        Some(node)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeKey, &SpatialNode)> {
        self.nodes.iter()
    }

    /// Returns `true` if `ancestor` lies on the parent chain of `node`.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: NodeKey, node: NodeKey) -> bool {
        let mut current = self.nodes.get(node).and_then(SpatialNode::parent);
        while let Some(key) = current {
            if key == ancestor {
                return true;
            }
            current = self.nodes.get(key).and_then(SpatialNode::parent);
        }
        false
    }

    /// Recomputes world matrices, then bounds, filters and subtree sizes.
    pub fn update(&mut self) {
        transform_system::update_world(&mut self.nodes, self.root);
        transform_system::update_aggregates(&mut self.nodes, self.root);
        self.dirty = false;
    }

    fn unlink(&mut self, key: NodeKey) {
        let parent = self.nodes.get(key).and_then(|n| n.parent);
        if let Some(parent) = parent
            && let Some(p) = self.nodes.get_mut(parent)
            && let Some(i) = p.children.iter().position(|&c| c == key)
        {
            p.children.remove(i);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glam::Vec3;
    use umbra_core::{BoundingBox, QueueId};

    use super::*;
    use crate::node::CullMode;
    use crate::renderable::{MaterialId, MeshInstance};

    fn leaf(queue: QueueId) -> SpatialNode {
        SpatialNode::renderable(Arc::new(MeshInstance::new(
            BoundingBox::cube(Vec3::ZERO, 1.0),
            MaterialId(0),
            queue,
        )))
    }

    #[test]
    fn new_scene_is_dirty_until_updated() {
        let mut scene = Scene::new();
        assert!(scene.is_dirty());
        scene.update();
        assert!(!scene.is_dirty());
        let _ = scene.node_mut(scene.root());
        assert!(scene.is_dirty());
    }

    #[test]
    fn attach_refuses_cycles() {
        let mut scene = Scene::new();
        let a = scene.add_node(SpatialNode::group());
        let b = scene.add_to_parent(SpatialNode::group(), a);
        scene.attach(a, b);
        assert_eq!(scene.node(a).and_then(SpatialNode::parent), Some(scene.root()));
        assert_eq!(scene.node(b).and_then(SpatialNode::parent), Some(a));
    }

    #[test]
    fn remove_node_drops_subtree() {
        let mut scene = Scene::new();
        let a = scene.add_node(SpatialNode::group());
        let b = scene.add_to_parent(leaf(QueueId::OPAQUE), a);
        scene.remove_node(a);
        assert!(scene.node(a).is_none());
        assert!(scene.node(b).is_none());
        assert!(scene.is_empty());
    }

    #[test]
    fn update_aggregates_sizes_filters_and_bounds() {
        let mut scene = Scene::new();
        let group = scene.add_node(SpatialNode::group().with_position(Vec3::new(10.0, 0.0, 0.0)));
        scene.add_to_parent(leaf(QueueId::OPAQUE), group);
        scene.add_to_parent(
            leaf(QueueId::TRANSPARENT).with_position(Vec3::new(0.0, 5.0, 0.0)),
            group,
        );
        scene.update();

        let node = scene.node(group).expect("group exists");
        assert_eq!(node.subtree_size(), 2);
        assert!(node.render_queue_filter().contains(QueueId::OPAQUE));
        assert!(node.render_queue_filter().contains(QueueId::TRANSPARENT));
        assert!(!node.render_queue_filter().contains(QueueId::OVERLAY));
        assert!(node.world_bound().contains_point(Vec3::new(10.0, 5.5, 0.0)));
        assert_eq!(node.depth(), 1);

        let root = scene.node(scene.root()).expect("root exists");
        assert_eq!(root.subtree_size(), 2);
    }

    #[test]
    fn inherit_resolves_to_nearest_explicit_ancestor() {
        let mut scene = Scene::new();
        let never = scene.add_node(SpatialNode::group().with_cull_mode(CullMode::Never));
        let child = scene.add_to_parent(
            leaf(QueueId::OPAQUE).with_cull_mode(CullMode::Inherit),
            never,
        );
        let orphan = scene.add_node(leaf(QueueId::OPAQUE).with_cull_mode(CullMode::Inherit));
        scene.update();

        assert_eq!(
            scene.node(child).map(SpatialNode::effective_cull_mode),
            Some(CullMode::Never)
        );
        assert_eq!(
            scene.node(orphan).map(SpatialNode::effective_cull_mode),
            Some(CullMode::Dynamic)
        );
    }
}
