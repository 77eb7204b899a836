//! Error Types
//!
//! The main error type [`CullError`] covers every failure mode of the cull
//! engine. They fall into three groups:
//!
//! - **Configuration faults**: structural bugs such as merging queues with
//!   different sort strategies or handing a job to a busy task. The current
//!   operation aborts and is never retried.
//! - **Interruption**: a cull job died while running. The pipeline halts.
//! - **Backpressure**: no frame slot or idle task is available right now. The
//!   driver should wait for an in-flight frame and try again.
//!
//! ```rust,ignore
//! use umbra::errors::{CullError, Result};
//!
//! match pipeline.start_frame(request) {
//!     Err(err) if err.is_backpressure() => { /* wait_finished(oldest) */ }
//!     other => other?,
//! }
//! ```

use thiserror::Error;

use crate::ids::{FrameId, QueueId};
use crate::sort::SortStrategy;

#[derive(Error, Debug)]
pub enum CullError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Two queues with the same id disagree on how they are sorted.
    #[error("Queue {queue} sort strategy mismatch: expected {expected:?}, found {found:?}")]
    QueueStrategyMismatch {
        queue: QueueId,
        expected: SortStrategy,
        found: SortStrategy,
    },

    /// A job was assigned to a task that is not in the pooled state.
    #[error("Cull task {task} is busy ({state}) and cannot accept a new job")]
    TaskBusy { task: usize, state: &'static str },

    /// Settings failed validation.
    #[error("Invalid cull settings: {0}")]
    InvalidSettings(String),

    /// The scene was modified after its last `update()`.
    #[error("Scene aggregates are stale; call Scene::update before culling")]
    SceneNotUpdated,

    #[error("Frame {0} is already in flight")]
    FrameAlreadyStarted(FrameId),

    #[error("Frame {0} was never started")]
    FrameNotStarted(FrameId),

    // ========================================================================
    // Interruption
    // ========================================================================
    /// A cull job panicked or was torn down while busy.
    #[error("Cull task {task} interrupted during frame {frame}: {reason}")]
    Interrupted {
        frame: FrameId,
        task: usize,
        reason: String,
    },

    /// A previous interruption stopped frame production.
    #[error("Frame pipeline halted after an interrupted cull task")]
    PipelineHalted,

    // ========================================================================
    // Backpressure
    // ========================================================================
    #[error("No free frame slot for frame {frame}: all {slots} slots are in flight")]
    NoFreeFrameSlot { frame: FrameId, slots: usize },

    #[error("No idle cull task available for frame {0}")]
    NoIdleTask(FrameId),

    // ========================================================================
    // Platform
    // ========================================================================
    #[error("Failed to spawn cull worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

impl CullError {
    /// Returns `true` for transient resource exhaustion the driver should
    /// wait out rather than treat as a fault.
    #[must_use]
    pub fn is_backpressure(&self) -> bool {
        matches!(self, Self::NoFreeFrameSlot { .. } | Self::NoIdleTask(_))
    }

    /// Returns `true` if frame production cannot continue.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Interrupted { .. } | Self::PipelineHalted)
    }
}

/// Alias for `Result<T, CullError>`.
pub type Result<T> = std::result::Result<T, CullError>;
