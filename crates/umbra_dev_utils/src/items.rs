use glam::Affine3A;

use umbra_core::{BoundingBox, QueueId, QueueMask, SortContext, SortKey, SortStrategy};
use umbra_scene::{MaterialId, Renderable, RenderableState};

/// Item that panics as soon as traversal asks for its sort key.
#[derive(Debug)]
pub struct PanickingItem {
    bound: BoundingBox,
    state: RenderableState,
}

impl PanickingItem {
    #[must_use]
    pub fn new(bound: BoundingBox) -> Self {
        Self {
            bound,
            state: RenderableState::new(),
        }
    }
}

impl Renderable for PanickingItem {
    fn local_bound(&self) -> BoundingBox {
        self.bound
    }

    fn material(&self) -> MaterialId {
        MaterialId(u32::MAX)
    }

    fn queue_mask(&self) -> QueueMask {
        QueueId::OPAQUE.bit()
    }

    fn state(&self) -> &RenderableState {
        &self.state
    }

    fn compute_sort_key(
        &self,
        _queue: QueueId,
        _strategy: SortStrategy,
        _ctx: &SortContext,
        _world: &Affine3A,
        _world_bound: &BoundingBox,
    ) -> SortKey {
        panic!("sort key requested from a poisoned item");
    }
}
