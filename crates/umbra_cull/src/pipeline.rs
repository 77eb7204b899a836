//! Frame Pipeline
//!
//! Orchestrates up to `frame_slots` frames in flight. Frame `f` occupies slot
//! `f % frame_slots` from [`FramePipeline::start_frame`] until
//! [`FramePipeline::wait_finished`], so the render phase of one frame can
//! consume its output while cull work for the next frames is running. The
//! same slot index selects the per-item state the frame reads and refreshes.
//!
//! # Completion
//!
//! Every task working on a frame (root and delegated) registers with the
//! frame's [`FrameTracker`] before it is submitted and reports exactly once
//! when it is done. A task registers the children it delegates before it
//! reports itself, so once the number of reports equals the number of
//! registrations no task of the frame is left running.
//!
//! ```rust,ignore
//! let mut pipeline = FramePipeline::new(CullSettings::default())?;
//! pipeline.start_frame(FrameRequest::new(frame, scene.clone(), camera.clone(), passes.clone()))?;
//! let output = pipeline.wait_finished(frame)?;
//! for (id, queue) in output.queues.iter() { /* submit in order */ }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, error, info};

use umbra_core::{CameraProvider, CullError, FrameId, PassMask, Result};
use umbra_scene::Scene;

use crate::dispatch::WorkDispatcher;
use crate::pass::PassSet;
use crate::pool::{self, WorkerPool};
use crate::queue::RenderQueueSet;
use crate::settings::CullSettings;
use crate::task::{CullJob, CullStats, CullTask, JobContext, PrepareEntry};

// ---------------------------------------------------------------------------
// Completion tracking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Finished,
    /// The job panicked or failed; carries the reason.
    Interrupted(String),
}

#[derive(Debug)]
pub struct TaskReport {
    pub task: Box<CullTask>,
    pub outcome: TaskOutcome,
}

/// Counts the tasks working on one frame and collects their reports.
#[derive(Debug)]
pub struct FrameTracker {
    frame: FrameId,
    spawned: AtomicUsize,
    reports: flume::Sender<TaskReport>,
}

impl FrameTracker {
    fn new(frame: FrameId, reports: flume::Sender<TaskReport>) -> Self {
        Self {
            frame,
            spawned: AtomicUsize::new(0),
            reports,
        }
    }

    #[inline]
    #[must_use]
    pub fn frame(&self) -> FrameId {
        self.frame
    }

    /// Must be called before the task is submitted.
    pub fn register(&self) {
        self.spawned.fetch_add(1, Ordering::AcqRel);
    }

    /// Undoes a [`FrameTracker::register`] whose task was never submitted.
    pub fn unregister(&self) {
        self.spawned.fetch_sub(1, Ordering::AcqRel);
    }

    #[must_use]
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::Acquire)
    }

    pub fn report(&self, report: TaskReport) {
        if self.reports.send(report).is_err() {
            log::warn!("Frame {} is no longer awaited; dropping task report", self.frame);
        }
    }
}

// ---------------------------------------------------------------------------
// Requests & Output
// ---------------------------------------------------------------------------

/// Everything the frame driver supplies to start a frame.
#[derive(Debug, Clone)]
pub struct FrameRequest {
    pub frame: FrameId,
    pub scene: Arc<Scene>,
    pub camera: Arc<dyn CameraProvider>,
    pub passes: PassSet,
    pub pass_filter: PassMask,
}

impl FrameRequest {
    #[must_use]
    pub fn new(
        frame: FrameId,
        scene: Arc<Scene>,
        camera: Arc<dyn CameraProvider>,
        passes: PassSet,
    ) -> Self {
        Self {
            frame,
            scene,
            camera,
            passes,
            pass_filter: PassMask::ALL,
        }
    }

    #[must_use]
    pub fn with_pass_filter(mut self, pass_filter: PassMask) -> Self {
        self.pass_filter = pass_filter;
        self
    }
}

/// Sorted result of one frame, read by the render backend.
#[derive(Debug)]
pub struct FrameOutput {
    pub frame: FrameId,
    /// Item state slot holding this frame's snapshots.
    pub slot: usize,
    pub queues: RenderQueueSet,
    pub passes: PassSet,
    /// Items whose frame slot was refreshed this frame, ordered by node key.
    pub prepared: Vec<PrepareEntry>,
    pub stats: CullStats,
}

struct InFlightFrame {
    frame: FrameId,
    tracker: Arc<FrameTracker>,
    reports: flume::Receiver<TaskReport>,
    passes: PassSet,
}

// ---------------------------------------------------------------------------
// FramePipeline
// ---------------------------------------------------------------------------

pub struct FramePipeline {
    settings: CullSettings,
    dispatcher: Arc<WorkDispatcher>,
    slots: Vec<Option<InFlightFrame>>,
    halted: bool,
    // Dropped last: joins the workers.
    pool: WorkerPool,
}

impl std::fmt::Debug for FramePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePipeline")
            .field("settings", &self.settings)
            .field("in_flight", &self.in_flight().collect::<Vec<_>>())
            .field("halted", &self.halted)
            .field("workers", &self.pool.len())
            .finish_non_exhaustive()
    }
}

impl FramePipeline {
    /// Validates `settings`, spawns the workers and fills the task pool with
    /// `worker_threads + frame_slots` tasks.
    pub fn new(settings: CullSettings) -> Result<Self> {
        settings.validate()?;

        let (job_tx, job_rx) = flume::unbounded();
        let dispatcher = Arc::new(WorkDispatcher::new(
            settings.delegation,
            settings.multithreading,
            job_tx.clone(),
        ));

        let task_count = settings.worker_threads + settings.frame_slots;
        for id in 0..task_count {
            dispatcher.release(Box::new(CullTask::new(id, &settings.queues)));
        }

        let pool = WorkerPool::spawn(settings.worker_threads, job_tx, job_rx, &dispatcher)?;
        info!(
            "Cull pipeline ready: {} workers, {} tasks, {} frame slots, multithreading {}",
            pool.len(),
            task_count,
            settings.frame_slots,
            if settings.multithreading { "on" } else { "off" }
        );

        let slots = (0..settings.frame_slots).map(|_| None).collect();
        Ok(Self {
            settings,
            dispatcher,
            slots,
            halted: false,
            pool,
        })
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &CullSettings {
        &self.settings
    }

    #[must_use]
    pub fn multithreading(&self) -> bool {
        self.dispatcher.multithreading()
    }

    /// Takes effect for frames started afterwards and for delegation
    /// decisions made from now on.
    pub fn set_multithreading(&mut self, enabled: bool) {
        self.dispatcher.set_multithreading(enabled);
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Frames started but not yet collected, in slot order.
    pub fn in_flight(&self) -> impl Iterator<Item = FrameId> + '_ {
        self.slots.iter().flatten().map(|f| f.frame)
    }

    /// Oldest frame in flight, the one to wait for under backpressure.
    #[must_use]
    pub fn oldest_in_flight(&self) -> Option<FrameId> {
        self.in_flight().min()
    }

    #[must_use]
    pub fn idle_tasks(&self) -> usize {
        self.dispatcher.idle_tasks()
    }

    fn slot_index(&self, frame: FrameId) -> usize {
        (frame % self.slots.len() as u64) as usize
    }

    /// Claims the frame's slot and starts culling `request.scene`.
    ///
    /// With multithreading disabled the whole traversal runs on the calling
    /// thread before this returns.
    pub fn start_frame(&mut self, request: FrameRequest) -> Result<()> {
        let frame = request.frame;
        if self.halted {
            return Err(CullError::PipelineHalted);
        }
        if request.scene.is_dirty() {
            return Err(CullError::SceneNotUpdated);
        }

        let slot = self.slot_index(frame);
        if let Some(busy) = &self.slots[slot] {
            return Err(if busy.frame == frame {
                CullError::FrameAlreadyStarted(frame)
            } else {
                CullError::NoFreeFrameSlot {
                    frame,
                    slots: self.slots.len(),
                }
            });
        }

        let Some(mut task) = self.dispatcher.acquire() else {
            return Err(CullError::NoIdleTask(frame));
        };

        let (report_tx, report_rx) = flume::unbounded();
        let tracker = Arc::new(FrameTracker::new(frame, report_tx));
        let context = JobContext {
            tracker: Arc::clone(&tracker),
            dispatcher: Arc::clone(&self.dispatcher),
        };
        let passes = request.passes.clone();
        let job = CullJob::for_scene(
            frame,
            request.scene,
            request.camera,
            request.passes,
            request.pass_filter,
        )
        .in_slot(slot);
        if let Err(err) = task.configure(job, Some(context)) {
            task.reset();
            self.dispatcher.release(task);
            return Err(err);
        }

        tracker.register();
        if self.dispatcher.multithreading() {
            if let Err(task) = self.dispatcher.submit(task) {
                pool::execute(task, &self.dispatcher);
            }
        } else {
            pool::execute(task, &self.dispatcher);
        }

        self.slots[slot] = Some(InFlightFrame {
            frame,
            tracker,
            reports: report_rx,
            passes,
        });
        Ok(())
    }

    /// Blocks until every task of `frame` has reported, then merges, sorts
    /// and returns the frame's queues. Tasks go back to the pool.
    ///
    /// An interrupted task halts the pipeline: this and every later
    /// `start_frame` fail.
    pub fn wait_finished(&mut self, frame: FrameId) -> Result<FrameOutput> {
        let slot = self.slot_index(frame);
        let in_flight = match self.slots[slot].take() {
            Some(f) if f.frame == frame => f,
            other => {
                self.slots[slot] = other;
                return Err(CullError::FrameNotStarted(frame));
            }
        };

        let mut queues = RenderQueueSet::from_configs(&self.settings.queues);
        let mut prepared = Vec::new();
        let mut stats = CullStats::default();
        let mut failure: Option<CullError> = None;
        let mut received = 0;

        while received < in_flight.tracker.spawned() {
            let Ok(TaskReport { mut task, outcome }) = in_flight.reports.recv() else {
                // The tracker keeps a sender alive, so this only happens if it was dropped.
                break;
            };
            received += 1;

            match outcome {
                TaskOutcome::Interrupted(reason) => {
                    error!("Frame {frame}: cull task {} interrupted: {reason}", task.id());
                    if !matches!(failure, Some(CullError::Interrupted { .. })) {
                        failure = Some(CullError::Interrupted {
                            frame,
                            task: task.id(),
                            reason,
                        });
                    }
                }
                TaskOutcome::Finished if failure.is_none() => {
                    if let Err(err) = queues.merge(task.queues_mut()) {
                        failure = Some(err);
                    } else {
                        prepared.extend(task.drain_prepared());
                        stats.accumulate(task.stats());
                    }
                }
                TaskOutcome::Finished => {}
            }

            task.reset();
            self.dispatcher.release(task);
        }

        if let Some(err) = failure {
            if err.is_fatal() {
                self.halted = true;
            }
            return Err(err);
        }

        queues.sort_all();
        prepared.sort_by_key(|entry| entry.node);

        debug!(
            "Frame {frame}: {} tasks, {} visited, {} culled, {} skipped, {} queued, {} prepared, {} delegated",
            stats.tasks,
            stats.nodes_visited,
            stats.nodes_culled,
            stats.subtrees_skipped,
            stats.items_queued,
            stats.items_prepared,
            stats.delegated
        );

        Ok(FrameOutput {
            frame,
            slot,
            queues,
            passes: in_flight.passes,
            prepared,
            stats,
        })
    }

    /// Waits for every frame in flight, oldest first.
    pub fn wait_all(&mut self) -> Vec<Result<FrameOutput>> {
        let mut frames: Vec<FrameId> = self.in_flight().collect();
        frames.sort_unstable();
        frames.into_iter().map(|f| self.wait_finished(f)).collect()
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        let pending = self.in_flight().count();
        info!(
            "Shutting down cull pipeline ({} workers, {pending} frames in flight)",
            self.pool.len()
        );
    }
}
