//! Cull Engine Settings
//!
//! [`CullSettings`] configures the worker pool, the number of in-flight frame
//! slots, the delegation heuristic and the set of render queues every frame
//! starts from.
//!
//! ```rust,ignore
//! use umbra::cull::{CullSettings, FramePipeline};
//!
//! // Single-threaded pipeline with three frames in flight
//! let settings = CullSettings {
//!     multithreading: false,
//!     frame_slots: 3,
//!     ..Default::default()
//! };
//! let pipeline = FramePipeline::new(settings)?;
//! ```

use std::num::NonZeroUsize;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use umbra_core::{CullError, QueueId, Result, SortStrategy};
use umbra_core::ids::MAX_MASK_BITS;
use umbra_scene::MAX_FRAME_SLOTS;

// ---------------------------------------------------------------------------
// DelegationPolicy
// ---------------------------------------------------------------------------

/// Decides whether a child subtree is worth handing to another task.
///
/// A child is eligible when the parent still has more than
/// `min_remaining_work` items left to visit and the child's estimate lies
/// strictly between `remaining / lower_divisor` and `remaining / upper_divisor`.
/// Smaller children are not worth the hand-off; larger ones would leave the
/// delegating task idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelegationPolicy {
    pub min_remaining_work: u32,
    pub lower_divisor: u32,
    pub upper_divisor: u32,
}

impl Default for DelegationPolicy {
    fn default() -> Self {
        Self {
            min_remaining_work: 16,
            lower_divisor: 4,
            upper_divisor: 2,
        }
    }
}

impl DelegationPolicy {
    /// Band test on integer estimates, evaluated without division.
    #[must_use]
    pub fn is_eligible(&self, remaining: u32, child_size: u32) -> bool {
        let remaining = u64::from(remaining);
        let child = u64::from(child_size);
        remaining > u64::from(self.min_remaining_work)
            && child * u64::from(self.lower_divisor) > remaining
            && child * u64::from(self.upper_divisor) < remaining
    }

    /// Indices of the children that would be delegated when visiting them in
    /// order, starting with `work` items left.
    #[must_use]
    pub fn eligible_children(&self, work: u32, child_sizes: &[u32]) -> Vec<usize> {
        let mut remaining = work;
        let mut eligible = Vec::new();
        for (i, &size) in child_sizes.iter().enumerate() {
            if self.is_eligible(remaining, size) {
                eligible.push(i);
            }
            remaining = remaining.saturating_sub(size);
        }
        eligible
    }
}

// ---------------------------------------------------------------------------
// Queue configuration
// ---------------------------------------------------------------------------

/// One render queue every frame starts with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    pub id: QueueId,
    pub name: String,
    pub strategy: SortStrategy,
}

impl QueueConfig {
    #[must_use]
    pub fn new(id: QueueId, name: impl Into<String>, strategy: SortStrategy) -> Self {
        Self {
            id,
            name: name.into(),
            strategy,
        }
    }
}

/// Opaque, transparent, background, overlay and shadow-caster queues.
#[must_use]
pub fn default_queues() -> Vec<QueueConfig> {
    vec![
        QueueConfig::new(QueueId::OPAQUE, "Opaque", SortStrategy::FrontToBack),
        QueueConfig::new(QueueId::TRANSPARENT, "Transparent", SortStrategy::BackToFront),
        QueueConfig::new(QueueId::BACKGROUND, "Background", SortStrategy::FrontToBack),
        QueueConfig::new(QueueId::OVERLAY, "Overlay", SortStrategy::AbsoluteDepth),
        QueueConfig::new(QueueId::SHADOW_CASTER, "ShadowCaster", SortStrategy::FrontToBack),
    ]
}

// ---------------------------------------------------------------------------
// CullSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullSettings {
    /// When disabled every job runs inline on the calling thread.
    pub multithreading: bool,
    /// Number of worker threads.
    pub worker_threads: usize,
    /// Frames that may be in flight at once, `2..=MAX_FRAME_SLOTS`.
    pub frame_slots: usize,
    pub delegation: DelegationPolicy,
    pub queues: Vec<QueueConfig>,
}

impl Default for CullSettings {
    fn default() -> Self {
        Self {
            multithreading: true,
            worker_threads: default_worker_threads(),
            frame_slots: 2,
            delegation: DelegationPolicy::default(),
            queues: default_queues(),
        }
    }
}

/// One thread is left for the frame driver.
fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map_or(1, NonZeroUsize::get)
        .saturating_sub(1)
        .max(1)
}

impl CullSettings {
    /// Checks structural constraints. Called by `FramePipeline::new`.
    pub fn validate(&self) -> Result<()> {
        if !(2..=MAX_FRAME_SLOTS).contains(&self.frame_slots) {
            return Err(CullError::InvalidSettings(format!(
                "frame_slots must be within 2..={MAX_FRAME_SLOTS}, got {}",
                self.frame_slots
            )));
        }
        if self.worker_threads == 0 {
            return Err(CullError::InvalidSettings(
                "worker_threads must be at least 1".to_string(),
            ));
        }

        let policy = &self.delegation;
        if policy.upper_divisor == 0 || policy.lower_divisor <= policy.upper_divisor {
            return Err(CullError::InvalidSettings(format!(
                "delegation band is empty: lower_divisor ({}) must exceed upper_divisor ({}) > 0",
                policy.lower_divisor, policy.upper_divisor
            )));
        }

        let mut seen = FxHashSet::default();
        for queue in &self.queues {
            if queue.id.index() >= MAX_MASK_BITS {
                return Err(CullError::InvalidSettings(format!(
                    "queue '{}' id {} is out of range",
                    queue.name,
                    queue.id.index()
                )));
            }
            if !seen.insert(queue.id) {
                return Err(CullError::InvalidSettings(format!(
                    "duplicate queue id {}",
                    queue.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_band_matches_quarter_to_half() {
        let policy = DelegationPolicy::default();
        assert!(!policy.is_eligible(100, 25));
        assert!(policy.is_eligible(100, 26));
        assert!(policy.is_eligible(100, 49));
        assert!(!policy.is_eligible(100, 50));
        // Below the threshold nothing is delegated.
        assert!(!policy.is_eligible(16, 6));
    }

    #[test]
    fn defaults_validate() {
        let settings = CullSettings::default();
        assert!(settings.validate().is_ok());
        assert!(settings.worker_threads >= 1);
        assert_eq!(settings.queues.len(), 5);
    }

    #[test]
    fn rejects_bad_slot_counts() {
        for slots in [0, 1, MAX_FRAME_SLOTS + 1] {
            let settings = CullSettings {
                frame_slots: slots,
                ..Default::default()
            };
            assert!(matches!(
                settings.validate(),
                Err(CullError::InvalidSettings(_))
            ));
        }
    }
}
