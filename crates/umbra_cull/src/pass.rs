//! Passes
//!
//! A [`Pass`] is one traversal intent (depth prepass, opaque, shadow...) that
//! draws from a subset of the render queues. During traversal the passes
//! that cannot match a subtree are taken out of the task's [`PassSet`] and
//! put back, in their original positions, once the subtree is done.

use smallvec::SmallVec;

use umbra_core::{PassId, PassMask, QueueMask};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pass {
    pub id: PassId,
    pub name: String,
    /// Queues this pass draws from.
    pub queue_filter: QueueMask,
    pub enabled: bool,
}

impl Pass {
    #[must_use]
    pub fn new(id: PassId, name: impl Into<String>, queue_filter: QueueMask) -> Self {
        Self {
            id,
            name: name.into(),
            queue_filter,
            enabled: true,
        }
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    #[inline]
    #[must_use]
    pub fn bit(&self) -> PassMask {
        self.id.bit()
    }

    /// Whether this pass can draw anything from a subtree with the given
    /// aggregated filters, under the job-level `pass_filter`.
    #[must_use]
    pub fn matches(
        &self,
        node_queue_filter: QueueMask,
        node_pass_filter: PassMask,
        pass_filter: PassMask,
    ) -> bool {
        self.enabled
            && node_queue_filter.intersects(self.queue_filter)
            && (pass_filter & node_pass_filter).contains(self.id)
    }
}

/// Passes removed by [`PassSet::exclude`], with their original indices.
#[derive(Debug, Default)]
#[must_use = "excluded passes must be restored"]
pub struct PassExclusion {
    removed: SmallVec<[(usize, Pass); 4]>,
}

impl PassExclusion {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.removed.len()
    }
}

/// Ordered list of active passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSet {
    passes: Vec<Pass>,
}

impl PassSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pass: Pass) {
        self.passes.push(pass);
    }

    #[must_use]
    pub fn with(mut self, pass: Pass) -> Self {
        self.passes.push(pass);
        self
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Pass> {
        self.passes.iter()
    }

    #[must_use]
    pub fn get(&self, id: PassId) -> Option<&Pass> {
        self.passes.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: PassId) -> Option<&mut Pass> {
        self.passes.iter_mut().find(|p| p.id == id)
    }

    /// Union of the queue filters of all enabled passes.
    #[must_use]
    pub fn queue_mask_union(&self) -> QueueMask {
        self.passes
            .iter()
            .filter(|p| p.enabled)
            .fold(QueueMask::EMPTY, |mask, p| mask | p.queue_filter)
    }

    /// Removes every pass for which `keep` is false. The returned exclusion
    /// must be handed back to [`PassSet::restore`].
    pub fn exclude(&mut self, mut keep: impl FnMut(&Pass) -> bool) -> PassExclusion {
        let mut exclusion = PassExclusion::default();
        if self.passes.iter().all(&mut keep) {
            return exclusion;
        }

        let mut kept = Vec::with_capacity(self.passes.len());
        for (index, pass) in self.passes.drain(..).enumerate() {
            if keep(&pass) {
                kept.push(pass);
            } else {
                exclusion.removed.push((index, pass));
            }
        }
        self.passes = kept;
        exclusion
    }

    /// Puts excluded passes back at their original positions.
    pub fn restore(&mut self, exclusion: PassExclusion) {
        // Ascending original indices: each insert lands where it was before.
        for (index, pass) in exclusion.removed {
            let at = index.min(self.passes.len());
            self.passes.insert(at, pass);
        }
    }
}

impl FromIterator<Pass> for PassSet {
    fn from_iter<I: IntoIterator<Item = Pass>>(iter: I) -> Self {
        Self {
            passes: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PassSet {
    type Item = &'a Pass;
    type IntoIter = std::slice::Iter<'a, Pass>;

    fn into_iter(self) -> Self::IntoIter {
        self.passes.iter()
    }
}

#[cfg(test)]
mod tests {
    use umbra_core::QueueId;

    use super::*;

    fn sample() -> PassSet {
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

    #[test]
    fn exclude_then_restore_preserves_order() {
        let original = sample();
        let mut passes = original.clone();
        let ex = passes.exclude(|p| p.id == PassId::OPAQUE || p.id == PassId::SHADOW);
        assert_eq!(ex.len(), 2);
        let ids: Vec<_> = passes.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![PassId::OPAQUE, PassId::SHADOW]);
        passes.restore(ex);
        assert_eq!(passes, original);
    }

    #[test]
    fn nested_exclusions_unwind() {
        let original = sample();
        let mut passes = original.clone();
        let outer = passes.exclude(|p| p.id != PassId::DEPTH);
        let inner = passes.exclude(|p| p.id == PassId::TRANSPARENT);
        assert_eq!(passes.len(), 1);
        passes.restore(inner);
        passes.restore(outer);
        assert_eq!(passes, original);
    }

    #[test]
    fn disabled_pass_never_matches() {
        let pass = Pass::new(PassId::OPAQUE, "Opaque", QueueMask::ALL).disabled();
        assert!(!pass.matches(QueueMask::ALL, PassMask::ALL, PassMask::ALL));
    }
}
