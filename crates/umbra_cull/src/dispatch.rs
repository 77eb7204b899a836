//! Work Dispatcher
//!
//! Decides, during traversal, whether a child subtree is worth handing to an
//! idle [`CullTask`] on another worker. Delegation is fire-and-forget: the
//! delegating task never waits for the subtree it gave away. The frame
//! tracker counts the new task so that `wait_finished` waits for it.

use std::sync::atomic::{AtomicBool, Ordering};

use umbra_core::Intersection;
use umbra_scene::{NodeKey, SpatialNode};

use crate::pool::WorkerMessage;
use crate::settings::DelegationPolicy;
use crate::task::CullTask;

#[derive(Debug)]
pub struct WorkDispatcher {
    policy: DelegationPolicy,
    multithreading: AtomicBool,
    job_tx: flume::Sender<WorkerMessage>,
    idle_tx: flume::Sender<Box<CullTask>>,
    idle_rx: flume::Receiver<Box<CullTask>>,
}

impl WorkDispatcher {
    pub(crate) fn new(
        policy: DelegationPolicy,
        multithreading: bool,
        job_tx: flume::Sender<WorkerMessage>,
    ) -> Self {
        let (idle_tx, idle_rx) = flume::unbounded();
        Self {
            policy,
            multithreading: AtomicBool::new(multithreading),
            job_tx,
            idle_tx,
            idle_rx,
        }
    }

    #[inline]
    #[must_use]
    pub fn policy(&self) -> &DelegationPolicy {
        &self.policy
    }

    #[inline]
    #[must_use]
    pub fn multithreading(&self) -> bool {
        self.multithreading.load(Ordering::Acquire)
    }

    pub fn set_multithreading(&self, enabled: bool) {
        self.multithreading.store(enabled, Ordering::Release);
    }

    /// Number of pooled tasks right now.
    #[must_use]
    pub fn idle_tasks(&self) -> usize {
        self.idle_rx.len()
    }

    /// Whether `child` should be handed off given `remaining` undone work of
    /// its parent. Only containers are delegated.
    #[must_use]
    pub fn should_delegate(&self, remaining: u32, child: &SpatialNode) -> bool {
        self.multithreading()
            && child.is_container()
            && self.policy.is_eligible(remaining, child.subtree_size())
    }

    /// Hands `child` to an idle task. Returns `false` if none was available
    /// (or it could not be submitted), in which case the caller processes
    /// the child inline.
    pub fn try_delegate(&self, parent: &CullTask, child: NodeKey, parent_result: Intersection) -> bool {
        let Some(context) = parent.context.clone() else {
            return false;
        };
        let Some(mut task) = self.acquire() else {
            return false;
        };
        let Some(job) = parent.child_job(child, parent_result) else {
            self.release(task);
            return false;
        };
        if let Err(err) = task.configure(job, Some(context.clone())) {
            log::warn!("Delegation to task {} refused: {err}", task.id());
            task.reset();
            self.release(task);
            return false;
        }

        let task_id = task.id();
        context.tracker.register();
        if let Err(flume::SendError(message)) = self.job_tx.send(WorkerMessage::Run(task)) {
            context.tracker.unregister();
            if let WorkerMessage::Run(mut task) = message {
                task.reset();
                self.release(task);
            }
            return false;
        }

        log::trace!(
            "Frame {}: task {} delegated subtree {child:?} to task {task_id}",
            parent.frame,
            parent.id()
        );
        true
    }

    /// Takes a pooled task without blocking.
    pub(crate) fn acquire(&self) -> Option<Box<CullTask>> {
        self.idle_rx.try_recv().ok()
    }

    /// Returns a reset task to the pool.
    pub(crate) fn release(&self, task: Box<CullTask>) {
        debug_assert_eq!(task.state(), crate::task::TaskState::Pooled);
        if self.idle_tx.send(task).is_err() {
            log::error!("Idle task pool disconnected; dropping task");
        }
    }

    /// Sends a configured root task to the workers. Gives the task back if
    /// no worker is listening.
    pub(crate) fn submit(&self, task: Box<CullTask>) -> Result<(), Box<CullTask>> {
        match self.job_tx.send(WorkerMessage::Run(task)) {
            Ok(()) => Ok(()),
            Err(flume::SendError(WorkerMessage::Run(task))) => Err(task),
            Err(flume::SendError(WorkerMessage::Shutdown)) => Ok(()),
        }
    }
}
