//! Renderable Items
//!
//! A [`Renderable`] is the queueable payload of a leaf node. Its mutable
//! per-frame data lives in [`RenderableState`], which keeps one snapshot slot
//! per in-flight frame so that the render phase of frame `k` can read its
//! slot while cull/update work for frame `k + 1` writes another one.
//!
//! Slots are indexed by the frame pipeline's slot index, not by frame id:
//! two frames in flight never share a slot.
//!
//! # Ownership rules
//!
//! - A slot is written by exactly one `update` per frame id (`write` is
//!   idempotent for a repeated frame id).
//! - The per-slot "needs update" flag is cleared with an atomic swap, so when
//!   several cameras, passes or tasks reach the same item only one of them
//!   adds it to a prepare-list.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use glam::{Affine3A, Vec3};
use parking_lot::RwLock;

use umbra_core::{
    BoundingBox, FrameId, PassMask, QueueId, QueueMask, SortContext, SortKey, SortStrategy,
};

/// Number of per-item snapshot slots. Bounds the number of frames that may
/// be in flight at once.
pub const MAX_FRAME_SLOTS: usize = 4;

/// Opaque material reference. Binding is the backend's business.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MaterialId(pub u32);

/// World data of an item as seen by one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ItemSnapshot {
    pub frame: FrameId,
    pub world: Affine3A,
    pub bound: BoundingBox,
}

#[derive(Debug)]
pub struct RenderableState {
    slots: [RwLock<Option<ItemSnapshot>>; MAX_FRAME_SLOTS],
    needs_update: [AtomicBool; MAX_FRAME_SLOTS],
}

impl RenderableState {
    /// Every slot starts out needing an update.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| RwLock::new(None)),
            needs_update: std::array::from_fn(|_| AtomicBool::new(true)),
        }
    }

    /// Flags every slot as stale, e.g. after the owning node moved.
    pub fn mark_dirty(&self) {
        for flag in &self.needs_update {
            flag.store(true, Ordering::Release);
        }
    }

    /// Out-of-range slots never need an update.
    #[must_use]
    pub fn needs_update(&self, slot: usize) -> bool {
        self.needs_update
            .get(slot)
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }

    /// Clears the flag of `slot`, returning whether it was set.
    pub fn clear_update(&self, slot: usize) -> bool {
        self.needs_update
            .get(slot)
            .is_some_and(|flag| flag.swap(false, Ordering::AcqRel))
    }

    /// Stores `snapshot` in `slot`. A second write for the same frame id, or
    /// a write to an out-of-range slot, is ignored and returns `false`.
    pub fn write(&self, slot: usize, snapshot: ItemSnapshot) -> bool {
        let Some(lock) = self.slots.get(slot) else {
            return false;
        };
        let mut current = lock.write();
        if current.is_some_and(|existing| existing.frame == snapshot.frame) {
            return false;
        }
        *current = Some(snapshot);
        true
    }

    /// Latest snapshot stored in `slot`. It may have been written by an
    /// earlier frame that used the slot if the item has not changed since.
    #[must_use]
    pub fn snapshot(&self, slot: usize) -> Option<ItemSnapshot> {
        self.slots.get(slot).and_then(|lock| *lock.read())
    }
}

impl Default for RenderableState {
    fn default() -> Self {
        Self::new()
    }
}

/// Contract every queueable scene leaf fulfils.
pub trait Renderable: Send + Sync + fmt::Debug {
    /// Bound in the owning node's local space.
    fn local_bound(&self) -> BoundingBox;

    fn material(&self) -> MaterialId;

    /// Queues this item wants to be drawn in.
    fn queue_mask(&self) -> QueueMask;

    /// Passes this item participates in.
    fn pass_mask(&self) -> PassMask {
        PassMask::ALL
    }

    fn state(&self) -> &RenderableState;

    /// Point used for distance/depth sorting.
    fn sort_point(&self, _world: &Affine3A, world_bound: &BoundingBox) -> Vec3 {
        world_bound.center()
    }

    /// Sort key of this item in `queue`. Called once per queue the item
    /// newly enters in a frame.
    fn compute_sort_key(
        &self,
        _queue: QueueId,
        strategy: SortStrategy,
        ctx: &SortContext,
        world: &Affine3A,
        world_bound: &BoundingBox,
    ) -> SortKey {
        strategy.key(self.sort_point(world, world_bound), ctx)
    }

    fn needs_update(&self, slot: usize) -> bool {
        self.state().needs_update(slot)
    }

    fn clear_update(&self, slot: usize) -> bool {
        self.state().clear_update(slot)
    }

    /// Refreshes `slot` for `frame`. Must be idempotent per frame id.
    fn update(&self, frame: FrameId, slot: usize, world: &Affine3A, world_bound: &BoundingBox) {
        self.state().write(
            slot,
            ItemSnapshot {
                frame,
                world: *world,
                bound: *world_bound,
            },
        );
    }
}

/// Plain mesh-like renderable with a fixed local bound.
#[derive(Debug)]
pub struct MeshInstance {
    bound: BoundingBox,
    material: MaterialId,
    queues: QueueMask,
    passes: PassMask,
    state: RenderableState,
}

impl MeshInstance {
    #[must_use]
    pub fn new(bound: BoundingBox, material: MaterialId, queue: QueueId) -> Self {
        Self {
            bound,
            material,
            queues: queue.bit(),
            passes: PassMask::ALL,
            state: RenderableState::new(),
        }
    }

    #[must_use]
    pub fn with_queues(mut self, queues: QueueMask) -> Self {
        self.queues = queues;
        self
    }

    #[must_use]
    pub fn with_passes(mut self, passes: PassMask) -> Self {
        self.passes = passes;
        self
    }
}

impl Renderable for MeshInstance {
    fn local_bound(&self) -> BoundingBox {
        self.bound
    }

    fn material(&self) -> MaterialId {
        self.material
    }

    fn queue_mask(&self) -> QueueMask {
        self.queues
    }

    fn pass_mask(&self) -> PassMask {
        self.passes
    }

    fn state(&self) -> &RenderableState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_update_reports_once_per_slot() {
        let state = RenderableState::new();
        assert!(state.clear_update(1));
        assert!(!state.clear_update(1));
        // A different slot is still pending.
        assert!(state.needs_update(2));
        state.mark_dirty();
        assert!(state.needs_update(1));
    }

    #[test]
    fn out_of_range_slot_is_ignored() {
        let state = RenderableState::new();
        assert!(!state.needs_update(MAX_FRAME_SLOTS));
        assert!(!state.clear_update(MAX_FRAME_SLOTS));
        let snapshot = ItemSnapshot {
            frame: 0,
            world: Affine3A::IDENTITY,
            bound: BoundingBox::cube(Vec3::ZERO, 1.0),
        };
        assert!(!state.write(MAX_FRAME_SLOTS, snapshot));
        assert_eq!(state.snapshot(MAX_FRAME_SLOTS), None);
    }

    #[test]
    fn write_is_idempotent_per_frame() {
        let state = RenderableState::new();
        let snapshot = ItemSnapshot {
            frame: 3,
            world: Affine3A::IDENTITY,
            bound: BoundingBox::cube(Vec3::ZERO, 1.0),
        };
        assert!(state.write(1, snapshot));
        let moved = ItemSnapshot {
            world: Affine3A::from_translation(Vec3::X),
            ..snapshot
        };
        assert!(!state.write(1, moved));
        assert_eq!(state.snapshot(1), Some(snapshot));
        assert_eq!(state.snapshot(0), None);
        // A later frame reusing the slot replaces it.
        assert!(state.write(1, ItemSnapshot { frame: 7, ..moved }));
    }
}
