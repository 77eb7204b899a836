//! Render Queues
//!
//! A [`RenderQueueSet`] maps queue ids (`0..32`) to named queues, each with a
//! fixed [`SortStrategy`]. Tasks fill private sets during traversal; the frame
//! pipeline merges them into the frame's canonical set and sorts it once.
//!
//! # Ordering
//!
//! Entries are ordered by `(sort_key, node)`. The node key tie-break makes the
//! final order independent of merge order, so a frame culled on one thread
//! and the same frame culled on many produce identical queues.

use std::sync::Arc;

use glam::Affine3A;

use umbra_core::ids::MAX_MASK_BITS;
use umbra_core::{CullError, QueueId, QueueMask, Result, SortKey, SortStrategy};
use umbra_scene::{NodeKey, Renderable};

use crate::settings::QueueConfig;

/// One item queued for drawing.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub item: Arc<dyn Renderable>,
    pub node: NodeKey,
    pub sort_key: SortKey,
    pub world: Affine3A,
}

impl QueueEntry {
    #[inline]
    fn order(&self) -> (SortKey, NodeKey) {
        (self.sort_key, self.node)
    }
}

#[derive(Debug, Clone)]
pub struct RenderQueue {
    pub name: String,
    strategy: SortStrategy,
    entries: Vec<QueueEntry>,
    scratch: Vec<QueueEntry>,
}

impl RenderQueue {
    #[must_use]
    pub fn new(name: impl Into<String>, strategy: SortStrategy) -> Self {
        Self {
            name: name.into(),
            strategy,
            entries: Vec::new(),
            scratch: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn strategy(&self) -> SortStrategy {
        self.strategy
    }

    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, entry: QueueEntry) {
        self.entries.push(entry);
    }

    /// Stable sort into the scratch buffer, then swap it in.
    pub fn sort(&mut self) {
        if self.entries.len() < 2 {
            return;
        }
        self.scratch.clear();
        self.scratch.extend(self.entries.iter().cloned());
        self.scratch.sort_by_key(QueueEntry::order);
        std::mem::swap(&mut self.entries, &mut self.scratch);
        self.scratch.clear();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.scratch.clear();
    }

    fn append(&mut self, other: &mut RenderQueue) {
        self.entries.append(&mut other.entries);
    }
}

/// Per-frame collection of render queues indexed by [`QueueId`].
#[derive(Debug, Clone)]
pub struct RenderQueueSet {
    queues: Vec<Option<RenderQueue>>,
    configured: QueueMask,
}

impl Default for RenderQueueSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderQueueSet {
    #[must_use]
    pub fn new() -> Self {
        Self {
            queues: (0..MAX_MASK_BITS).map(|_| None).collect(),
            configured: QueueMask::EMPTY,
        }
    }

    #[must_use]
    pub fn from_configs(configs: &[QueueConfig]) -> Self {
        let mut set = Self::new();
        for config in configs {
            set.configure(config.id, config.name.clone(), config.strategy);
        }
        set
    }

    /// Declares a queue, replacing any existing one with the same id.
    pub fn configure(&mut self, id: QueueId, name: impl Into<String>, strategy: SortStrategy) {
        self.queues[usize::from(id.index())] = Some(RenderQueue::new(name, strategy));
        self.configured.insert(id);
    }

    /// Mask of the queue ids present in this set.
    #[inline]
    #[must_use]
    pub fn configured_mask(&self) -> QueueMask {
        self.configured
    }

    #[must_use]
    pub fn get(&self, id: QueueId) -> Option<&RenderQueue> {
        self.queues[usize::from(id.index())].as_ref()
    }

    pub fn get_mut(&mut self, id: QueueId) -> Option<&mut RenderQueue> {
        self.queues[usize::from(id.index())].as_mut()
    }

    #[must_use]
    pub fn strategy(&self, id: QueueId) -> Option<SortStrategy> {
        self.get(id).map(RenderQueue::strategy)
    }

    /// Appends to queue `id`. Returns `false` if the queue is not configured.
    pub fn push(&mut self, id: QueueId, entry: QueueEntry) -> bool {
        match self.get_mut(id) {
            Some(queue) => {
                queue.push(entry);
                true
            }
            None => false,
        }
    }

    /// Moves every entry of `other` into `self`, leaving `other` empty.
    ///
    /// Queues missing from `self` are adopted with their strategy. Nothing
    /// is moved if any shared queue disagrees on its strategy.
    pub fn merge(&mut self, other: &mut RenderQueueSet) -> Result<()> {
        for id in other.configured.iter() {
            if let (Some(ours), Some(theirs)) = (self.strategy(id), other.strategy(id))
                && ours != theirs
            {
                return Err(CullError::QueueStrategyMismatch {
                    queue: id,
                    expected: ours,
                    found: theirs,
                });
            }
        }

        for id in other.configured.iter() {
            let index = usize::from(id.index());
            let Some(theirs) = other.queues[index].as_mut() else {
                continue;
            };
            match &mut self.queues[index] {
                Some(ours) => ours.append(theirs),
                slot @ None => {
                    let mut adopted = RenderQueue::new(theirs.name.clone(), theirs.strategy);
                    adopted.append(theirs);
                    *slot = Some(adopted);
                    self.configured.insert(id);
                }
            }
        }
        Ok(())
    }

    pub fn sort_all(&mut self) {
        for queue in self.queues.iter_mut().flatten() {
            queue.sort();
        }
    }

    /// Empties every queue, keeping the configuration.
    pub fn clear(&mut self) {
        for queue in self.queues.iter_mut().flatten() {
            queue.clear();
        }
    }

    #[must_use]
    pub fn total_len(&self) -> usize {
        self.queues.iter().flatten().map(RenderQueue::len).sum()
    }

    /// Configured queues in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (QueueId, &RenderQueue)> {
        self.configured
            .iter()
            .filter_map(|id| self.get(id).map(|q| (id, q)))
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use slotmap::SlotMap;
    use umbra_core::BoundingBox;
    use umbra_scene::{MaterialId, MeshInstance};

    use super::*;

    fn entry(node: NodeKey, key: i64) -> QueueEntry {
        QueueEntry {
            item: Arc::new(MeshInstance::new(
                BoundingBox::cube(Vec3::ZERO, 1.0),
                MaterialId(0),
                QueueId::OPAQUE,
            )),
            node,
            sort_key: SortKey(key),
            world: Affine3A::IDENTITY,
        }
    }

    #[test]
    fn ties_break_on_node_key() {
        let mut keys: SlotMap<NodeKey, ()> = SlotMap::with_key();
        let a = keys.insert(());
        let b = keys.insert(());
        let mut queue = RenderQueue::new("Opaque", SortStrategy::FrontToBack);
        queue.push(entry(b, 5));
        queue.push(entry(a, 5));
        queue.push(entry(b, 1));
        queue.sort();
        let order: Vec<_> = queue.entries().iter().map(|e| (e.sort_key.0, e.node)).collect();
        assert_eq!(order, vec![(1, b), (5, a), (5, b)]);
    }

    #[test]
    fn merge_rejects_strategy_mismatch_without_moving() {
        let mut keys: SlotMap<NodeKey, ()> = SlotMap::with_key();
        let mut canonical = RenderQueueSet::new();
        canonical.configure(QueueId::TRANSPARENT, "Transparent", SortStrategy::BackToFront);
        let mut other = RenderQueueSet::new();
        other.configure(QueueId::TRANSPARENT, "Transparent", SortStrategy::FrontToBack);
        other.push(QueueId::TRANSPARENT, entry(keys.insert(()), 0));

        let err = canonical.merge(&mut other).unwrap_err();
        assert!(matches!(err, CullError::QueueStrategyMismatch { .. }));
        assert_eq!(other.total_len(), 1);
        assert_eq!(canonical.total_len(), 0);
    }

    #[test]
    fn merge_adopts_missing_queues() {
        let mut keys: SlotMap<NodeKey, ()> = SlotMap::with_key();
        let mut canonical = RenderQueueSet::new();
        let mut other = RenderQueueSet::new();
        other.configure(QueueId::OVERLAY, "Overlay", SortStrategy::AbsoluteDepth);
        other.push(QueueId::OVERLAY, entry(keys.insert(()), 0));

        canonical.merge(&mut other).expect("merge");
        assert!(canonical.configured_mask().contains(QueueId::OVERLAY));
        assert_eq!(canonical.strategy(QueueId::OVERLAY), Some(SortStrategy::AbsoluteDepth));
        assert_eq!(canonical.total_len(), 1);
        assert_eq!(other.total_len(), 0);
    }

    #[test]
    fn push_to_unconfigured_queue_is_refused() {
        let mut keys: SlotMap<NodeKey, ()> = SlotMap::with_key();
        let mut set = RenderQueueSet::new();
        assert!(!set.push(QueueId::OPAQUE, entry(keys.insert(()), 0)));
    }
}
