//! Umbra Cull
//!
//! Parallel cull traversal and render-queue construction:
//! - [`FramePipeline`]: multi-buffered frame slots, task pool, result merging
//! - [`CullTask`] and [`traversal`]: the per-task depth-first cull walk
//! - [`WorkDispatcher`]: delegation of subtrees to idle tasks
//! - [`RenderQueueSet`] and [`PassSet`]: what gets queued, for which pass
//! - [`CullSettings`]: pool size, frame slots, delegation band, queues

pub mod dispatch;
pub mod pass;
pub mod pipeline;
pub mod pool;
pub mod queue;
pub mod settings;
pub mod task;
pub mod traversal;

pub use dispatch::WorkDispatcher;
pub use pass::{Pass, PassExclusion, PassSet};
pub use pipeline::{FrameOutput, FramePipeline, FrameRequest, FrameTracker, TaskOutcome, TaskReport};
pub use pool::{WorkerMessage, WorkerPool};
pub use queue::{QueueEntry, RenderQueue, RenderQueueSet};
pub use settings::{CullSettings, DelegationPolicy, QueueConfig, default_queues};
pub use task::{CullJob, CullStats, CullTask, JobContext, PrepareEntry, TaskState};
pub use traversal::{cull, queue_subtree};
