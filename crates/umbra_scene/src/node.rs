use std::sync::Arc;

use glam::Affine3A;
use smallvec::SmallVec;

use umbra_core::{BoundingBox, PassMask, QueueMask};

use crate::renderable::Renderable;
use crate::transform::Transform;
use crate::NodeKey;

/// How a node decides its visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// Always culled.
    Always,
    /// Never culled; treated as fully inside.
    Never,
    /// Tested against the camera unless the parent is already fully inside.
    #[default]
    Dynamic,
    /// Uses the nearest ancestor's explicit mode.
    Inherit,
}

/// Distance bands of a level-of-detail node.
///
/// Child `i` is used while the camera distance is below `distances[i]`.
/// Beyond the last band nothing is drawn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LodBands {
    pub distances: SmallVec<[f32; 4]>,
}

impl LodBands {
    #[must_use]
    pub fn new(distances: &[f32]) -> Self {
        Self {
            distances: SmallVec::from_slice(distances),
        }
    }

    /// Index of the child to traverse at `distance`, if any.
    #[must_use]
    pub fn select(&self, distance: f32) -> Option<usize> {
        self.distances.iter().position(|&limit| distance < limit)
    }
}

/// Node category. Traversal dispatches on this tag.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Pure container.
    Group,
    /// Leaf carrying a queueable item. May still have children.
    Renderable(Arc<dyn Renderable>),
    /// Container that traverses exactly one child chosen by distance.
    Lod(LodBands),
}

/// Scene graph entity.
///
/// Hierarchy is expressed through keys: the parent key is a non-owning back
/// reference, the ordered `children` list is the owning direction.
///
/// Fields under "aggregates" are derived by [`Scene::update`](crate::Scene::update)
/// and must not be relied on while the scene is dirty.
#[derive(Debug, Clone)]
pub struct SpatialNode {
    // === Hierarchy ===
    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: Vec<NodeKey>,

    // === User data ===
    pub transform: Transform,
    pub kind: NodeKind,
    pub cull_mode: CullMode,
    /// Extra local-space bound merged into the world bound (mostly for groups).
    pub local_bound: Option<BoundingBox>,
    /// Queues this subtree may contribute to.
    pub queue_filter: QueueMask,
    /// Passes this subtree may contribute to.
    pub pass_filter: PassMask,

    // === Aggregates ===
    pub(crate) world_bound: BoundingBox,
    pub(crate) effective_cull_mode: CullMode,
    pub(crate) render_queue_filter: QueueMask,
    pub(crate) render_pass_filter: PassMask,
    pub(crate) subtree_size: u32,
    pub(crate) depth: u16,
}

impl SpatialNode {
    #[must_use]
    pub fn new(kind: NodeKind) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            transform: Transform::new(),
            kind,
            cull_mode: CullMode::Dynamic,
            local_bound: None,
            queue_filter: QueueMask::ALL,
            pass_filter: PassMask::ALL,
            world_bound: BoundingBox::EMPTY,
            effective_cull_mode: CullMode::Dynamic,
            render_queue_filter: QueueMask::EMPTY,
            render_pass_filter: PassMask::EMPTY,
            subtree_size: 0,
            depth: 0,
        }
    }

    #[must_use]
    pub fn group() -> Self {
        Self::new(NodeKind::Group)
    }

    #[must_use]
    pub fn renderable(item: Arc<dyn Renderable>) -> Self {
        Self::new(NodeKind::Renderable(item))
    }

    #[must_use]
    pub fn lod(bands: LodBands) -> Self {
        Self::new(NodeKind::Lod(bands))
    }

    // --- builder helpers ---

    #[must_use]
    pub fn with_cull_mode(mut self, mode: CullMode) -> Self {
        self.cull_mode = mode;
        self
    }

    #[must_use]
    pub fn with_position(mut self, position: glam::Vec3) -> Self {
        self.transform.position = position;
        self
    }

    #[must_use]
    pub fn with_queue_filter(mut self, filter: QueueMask) -> Self {
        self.queue_filter = filter;
        self
    }

    #[must_use]
    pub fn with_pass_filter(mut self, filter: PassMask) -> Self {
        self.pass_filter = filter;
        self
    }

    #[must_use]
    pub fn with_local_bound(mut self, bound: BoundingBox) -> Self {
        self.local_bound = Some(bound);
        self
    }

    // --- hierarchy ---

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    /// Containers are nodes whose subtree extends beyond themselves.
    #[inline]
    #[must_use]
    pub fn is_container(&self) -> bool {
        !self.children.is_empty()
    }

    #[must_use]
    pub fn item(&self) -> Option<&Arc<dyn Renderable>> {
        match &self.kind {
            NodeKind::Renderable(item) => Some(item),
            NodeKind::Group | NodeKind::Lod(_) => None,
        }
    }

    // --- aggregates ---

    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Affine3A {
        &self.transform.world_matrix
    }

    #[inline]
    #[must_use]
    pub fn world_bound(&self) -> &BoundingBox {
        &self.world_bound
    }

    /// Cull mode after resolving `Inherit`.
    #[inline]
    #[must_use]
    pub fn effective_cull_mode(&self) -> CullMode {
        self.effective_cull_mode
    }

    #[inline]
    #[must_use]
    pub fn render_queue_filter(&self) -> QueueMask {
        self.render_queue_filter
    }

    #[inline]
    #[must_use]
    pub fn render_pass_filter(&self) -> PassMask {
        self.render_pass_filter
    }

    /// Number of renderable items in this subtree (the work estimate).
    #[inline]
    #[must_use]
    pub fn subtree_size(&self) -> u32 {
        self.subtree_size
    }

    #[inline]
    #[must_use]
    pub fn depth(&self) -> u16 {
        self.depth
    }
}

impl Default for SpatialNode {
    fn default() -> Self {
        Self::group()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lod_select_picks_first_band_containing_distance() {
        let bands = LodBands::new(&[10.0, 50.0, 200.0]);
        assert_eq!(bands.select(0.0), Some(0));
        assert_eq!(bands.select(10.0), Some(1));
        assert_eq!(bands.select(199.0), Some(2));
        assert_eq!(bands.select(500.0), None);
    }
}
