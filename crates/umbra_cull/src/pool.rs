//! Worker Pool
//!
//! Fixed set of OS threads blocked on a shared `flume` job channel. Each
//! worker runs one [`CullTask`] at a time and reports it back to its frame
//! tracker, whatever the outcome.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use umbra_core::Result;

use crate::dispatch::WorkDispatcher;
use crate::pipeline::{TaskOutcome, TaskReport};
use crate::task::CullTask;

#[derive(Debug)]
pub enum WorkerMessage {
    Run(Box<CullTask>),
    Shutdown,
}

#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    job_tx: flume::Sender<WorkerMessage>,
    job_rx: flume::Receiver<WorkerMessage>,
}

impl WorkerPool {
    pub fn spawn(
        count: usize,
        job_tx: flume::Sender<WorkerMessage>,
        job_rx: flume::Receiver<WorkerMessage>,
        dispatcher: &Arc<WorkDispatcher>,
    ) -> Result<Self> {
        let mut pool = Self {
            workers: Vec::with_capacity(count),
            job_tx,
            job_rx,
        };
        for index in 0..count {
            let rx = pool.job_rx.clone();
            let dispatcher = Arc::clone(dispatcher);
            let handle = thread::Builder::new()
                .name(format!("umbra-cull-{index}"))
                .spawn(move || worker_loop(&rx, &dispatcher))?;
            pool.workers.push(handle);
        }
        Ok(pool)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for _ in &self.workers {
            let _ = self.job_tx.send(WorkerMessage::Shutdown);
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("Cull worker panicked outside of a job");
            }
        }
        // Jobs queued behind the shutdown messages are never run.
        let dropped = self.job_rx.drain().count();
        if dropped > 0 {
            log::warn!("Dropped {dropped} queued cull jobs on shutdown");
        }
    }
}

fn worker_loop(rx: &flume::Receiver<WorkerMessage>, dispatcher: &WorkDispatcher) {
    while let Ok(message) = rx.recv() {
        match message {
            WorkerMessage::Run(task) => execute(task, dispatcher),
            WorkerMessage::Shutdown => break,
        }
    }
}

/// Runs a configured task and reports it to its frame tracker.
///
/// A panic inside the job is caught here and reported as an interruption.
/// A task without a frame context has no one to report to and goes straight
/// back to the pool.
pub(crate) fn execute(mut task: Box<CullTask>, dispatcher: &WorkDispatcher) {
    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| task.run())) {
        Ok(Ok(())) => TaskOutcome::Finished,
        Ok(Err(err)) => TaskOutcome::Interrupted(err.to_string()),
        Err(payload) => TaskOutcome::Interrupted(panic_message(payload.as_ref())),
    };

    let Some(context) = task.take_context() else {
        log::error!("Cull task {} ran without a frame context", task.id());
        task.reset();
        dispatcher.release(task);
        return;
    };
    context.tracker.report(TaskReport { task, outcome });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use umbra_core::{Camera, PassMask};
    use umbra_scene::Scene;

    use super::*;
    use crate::pass::PassSet;
    use crate::settings::{DelegationPolicy, default_queues};
    use crate::task::{CullJob, TaskState};

    #[test]
    fn task_without_context_returns_to_the_pool() {
        let (job_tx, _job_rx) = flume::unbounded();
        let dispatcher = WorkDispatcher::new(DelegationPolicy::default(), false, job_tx);

        let mut scene = Scene::new();
        scene.update();
        let mut camera = Camera::new_perspective(60.0, 1.0, 0.1, 100.0);
        camera.look_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);

        let mut task = Box::new(CullTask::new(4, &default_queues()));
        task.configure(
            CullJob::for_scene(0, Arc::new(scene), Arc::new(camera), PassSet::new(), PassMask::ALL),
            None,
        )
        .expect("configure");

        execute(task, &dispatcher);

        assert_eq!(dispatcher.idle_tasks(), 1);
        let pooled = dispatcher.acquire().expect("task back in the pool");
        assert_eq!(pooled.id(), 4);
        assert_eq!(pooled.state(), TaskState::Pooled);
    }
}
