//! Cull Tasks
//!
//! A [`CullTask`] is one reusable unit of traversal work. It owns everything
//! a traversal mutates (working camera clone, pass set, queue set,
//! prepare-list, visibility cache) so that no two tasks share mutable state.
//!
//! # Lifecycle
//!
//! ```text
//! Pooled ─configure→ Configured ─run→ Running → Finished ─reset→ Pooled
//! ```
//!
//! Between `Finished` and `reset` the frame pipeline merges the task's
//! queues and prepare-list into the frame output.

use std::sync::Arc;

use glam::Affine3A;
use rustc_hash::{FxHashMap, FxHashSet};

use umbra_core::{
    BoundingBox, Camera, CameraProvider, CullError, FrameId, Intersection, PassMask, QueueId,
    QueueMask, Result, SortContext,
};
use umbra_scene::{NodeKey, Renderable, Scene};

use crate::dispatch::WorkDispatcher;
use crate::pass::PassSet;
use crate::pipeline::FrameTracker;
use crate::queue::RenderQueueSet;
use crate::settings::QueueConfig;
use crate::traversal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Pooled,
    Configured,
    Running,
    Finished,
}

impl TaskState {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Pooled => "pooled",
            Self::Configured => "configured",
            Self::Running => "running",
            Self::Finished => "finished",
        }
    }
}

/// Per-traversal counters, summed over all tasks of a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CullStats {
    pub tasks: u32,
    pub nodes_visited: u32,
    pub nodes_culled: u32,
    /// Subtrees skipped because no pass matched them.
    pub subtrees_skipped: u32,
    pub items_queued: u32,
    pub items_prepared: u32,
    pub delegated: u32,
}

impl CullStats {
    pub fn accumulate(&mut self, other: &CullStats) {
        self.tasks += other.tasks;
        self.nodes_visited += other.nodes_visited;
        self.nodes_culled += other.nodes_culled;
        self.subtrees_skipped += other.subtrees_skipped;
        self.items_queued += other.items_queued;
        self.items_prepared += other.items_prepared;
        self.delegated += other.delegated;
    }
}

/// Item whose frame slot has to be refreshed at the end of the job.
#[derive(Debug, Clone)]
pub struct PrepareEntry {
    pub item: Arc<dyn Renderable>,
    pub node: NodeKey,
    pub world: Affine3A,
    pub bound: BoundingBox,
}

/// Everything a task needs to run one traversal.
#[derive(Debug)]
pub struct CullJob {
    pub frame: FrameId,
    /// Item state slot this frame reads and refreshes. Distinct for every
    /// frame in flight.
    pub slot: usize,
    pub scene: Arc<Scene>,
    /// Subtree root this job traverses.
    pub root: NodeKey,
    /// Camera the frame is rendered from.
    pub view: Arc<dyn CameraProvider>,
    /// Private working clone, carrying the delegating task's plane state.
    pub camera: Box<dyn CameraProvider>,
    pub passes: PassSet,
    pub pass_filter: PassMask,
    /// Queues allowed by the `queue_filter` of every ancestor of `root`.
    pub queue_scope: QueueMask,
    /// Visibility of `root`'s parent.
    pub parent_result: Intersection,
}

impl CullJob {
    /// Job covering a whole scene from `camera`, using item slot 0.
    #[must_use]
    pub fn for_scene(
        frame: FrameId,
        scene: Arc<Scene>,
        camera: Arc<dyn CameraProvider>,
        passes: PassSet,
        pass_filter: PassMask,
    ) -> Self {
        let root = scene.root();
        let working = camera.boxed_clone();
        Self {
            frame,
            slot: 0,
            scene,
            root,
            view: camera,
            camera: working,
            passes,
            pass_filter,
            queue_scope: QueueMask::ALL,
            parent_result: Intersection::Intersecting,
        }
    }

    #[must_use]
    pub fn in_slot(mut self, slot: usize) -> Self {
        self.slot = slot;
        self
    }
}

/// Links a running task to its frame and to the delegation machinery.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub tracker: Arc<FrameTracker>,
    pub dispatcher: Arc<WorkDispatcher>,
}

#[derive(Debug)]
pub struct CullTask {
    id: usize,
    state: TaskState,

    // === Job ===
    pub(crate) frame: FrameId,
    pub(crate) slot: usize,
    scene: Option<Arc<Scene>>,
    root: NodeKey,
    view: Option<Arc<dyn CameraProvider>>,
    pub(crate) camera: Box<dyn CameraProvider>,
    pub(crate) passes: PassSet,
    pub(crate) pass_filter: PassMask,
    pub(crate) queue_scope: QueueMask,
    parent_result: Intersection,
    pub(crate) sort_context: SortContext,
    pub(crate) context: Option<JobContext>,

    // === Output ===
    pub(crate) queues: RenderQueueSet,
    pub(crate) prepare: Vec<PrepareEntry>,
    pub(crate) stats: CullStats,

    // === Per-traversal scratch ===
    pub(crate) entered: FxHashSet<(NodeKey, QueueId)>,
    pub(crate) visibility: FxHashMap<NodeKey, Intersection>,
}

impl CullTask {
    #[must_use]
    pub fn new(id: usize, queues: &[QueueConfig]) -> Self {
        Self {
            id,
            state: TaskState::Pooled,
            frame: 0,
            slot: 0,
            scene: None,
            root: NodeKey::default(),
            view: None,
            camera: Box::new(Camera::default()),
            passes: PassSet::new(),
            pass_filter: PassMask::ALL,
            queue_scope: QueueMask::ALL,
            parent_result: Intersection::Intersecting,
            sort_context: SortContext::default(),
            context: None,
            queues: RenderQueueSet::from_configs(queues),
            prepare: Vec::new(),
            stats: CullStats::default(),
            entered: FxHashSet::default(),
            visibility: FxHashMap::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn frame(&self) -> FrameId {
        self.frame
    }

    #[inline]
    #[must_use]
    pub fn slot(&self) -> usize {
        self.slot
    }

    #[inline]
    #[must_use]
    pub fn queues(&self) -> &RenderQueueSet {
        &self.queues
    }

    pub fn queues_mut(&mut self) -> &mut RenderQueueSet {
        &mut self.queues
    }

    #[inline]
    #[must_use]
    pub fn passes(&self) -> &PassSet {
        &self.passes
    }

    #[inline]
    #[must_use]
    pub fn prepared(&self) -> &[PrepareEntry] {
        &self.prepare
    }

    #[inline]
    #[must_use]
    pub fn stats(&self) -> &CullStats {
        &self.stats
    }

    /// Result of the last visibility test of `node` in this traversal.
    #[must_use]
    pub fn visibility(&self, node: NodeKey) -> Option<Intersection> {
        self.visibility.get(&node).copied()
    }

    #[must_use]
    pub fn camera(&self) -> &dyn CameraProvider {
        self.camera.as_ref()
    }

    /// Assigns a job. Only pooled tasks accept one.
    pub fn configure(&mut self, job: CullJob, context: Option<JobContext>) -> Result<()> {
        if self.state != TaskState::Pooled {
            return Err(CullError::TaskBusy {
                task: self.id,
                state: self.state.name(),
            });
        }

        self.frame = job.frame;
        self.slot = job.slot;
        self.sort_context = job.view.sort_context();
        self.scene = Some(job.scene);
        self.root = job.root;
        self.view = Some(job.view);
        self.camera = job.camera;
        self.passes = job.passes;
        self.pass_filter = job.pass_filter;
        self.queue_scope = job.queue_scope;
        self.parent_result = job.parent_result;
        self.context = context;
        self.state = TaskState::Configured;
        Ok(())
    }

    /// Traverses the configured subtree, then refreshes the frame slot of
    /// every item on the prepare-list.
    pub fn run(&mut self) -> Result<()> {
        if self.state != TaskState::Configured {
            return Err(CullError::TaskBusy {
                task: self.id,
                state: self.state.name(),
            });
        }
        let Some(scene) = self.scene.clone() else {
            return Err(CullError::TaskBusy {
                task: self.id,
                state: "unassigned",
            });
        };
        if scene.is_dirty() {
            return Err(CullError::SceneNotUpdated);
        }

        self.state = TaskState::Running;
        self.stats.tasks += 1;

        let parent_result = self.parent_result;
        traversal::queue_subtree(&scene, self.root, parent_result, self);

        for entry in &self.prepare {
            entry.item.update(self.frame, self.slot, &entry.world, &entry.bound);
        }

        self.state = TaskState::Finished;
        Ok(())
    }

    /// Builds the job for a subtree handed off by this task.
    pub(crate) fn child_job(&self, root: NodeKey, parent_result: Intersection) -> Option<CullJob> {
        Some(CullJob {
            frame: self.frame,
            slot: self.slot,
            scene: Arc::clone(self.scene.as_ref()?),
            root,
            view: Arc::clone(self.view.as_ref()?),
            camera: self.camera.boxed_clone(),
            passes: self.passes.clone(),
            pass_filter: self.pass_filter,
            queue_scope: self.queue_scope,
            parent_result,
        })
    }

    pub(crate) fn take_context(&mut self) -> Option<JobContext> {
        self.context.take()
    }

    /// Moves the prepare-list out, leaving the buffer's capacity behind.
    pub fn drain_prepared(&mut self) -> std::vec::Drain<'_, PrepareEntry> {
        self.prepare.drain(..)
    }

    /// Drops all job data and returns the task to the pooled state. Queue
    /// configuration and buffer capacity are kept.
    pub fn reset(&mut self) {
        self.state = TaskState::Pooled;
        self.scene = None;
        self.view = None;
        self.root = NodeKey::default();
        self.passes = PassSet::new();
        self.pass_filter = PassMask::ALL;
        self.queue_scope = QueueMask::ALL;
        self.parent_result = Intersection::Intersecting;
        self.context = None;
        self.queues.clear();
        self.prepare.clear();
        self.stats = CullStats::default();
        self.entered.clear();
        self.visibility.clear();
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use umbra_core::{BoundingBox, PassId, QueueId};
    use umbra_scene::{MaterialId, MeshInstance, SpatialNode};

    use super::*;
    use crate::pass::Pass;
    use crate::settings::default_queues;

    fn camera() -> Arc<dyn CameraProvider> {
        let mut cam = Camera::new_perspective(60.0, 1.0, 0.1, 100.0);
        cam.look_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
        Arc::new(cam)
    }

    fn scene_with(positions: &[Vec3]) -> Arc<Scene> {
        let mut scene = Scene::new();
        for &p in positions {
            let item = MeshInstance::new(BoundingBox::cube(Vec3::ZERO, 0.5), MaterialId(1), QueueId::OPAQUE);
            scene.add_node(SpatialNode::renderable(Arc::new(item)).with_position(p));
        }
        scene.update();
        Arc::new(scene)
    }

    fn opaque_passes() -> PassSet {
        PassSet::new().with(Pass::new(PassId::OPAQUE, "Opaque", QueueId::OPAQUE.bit()))
    }

    #[test]
    fn configure_rejects_busy_task() {
        let scene = scene_with(&[Vec3::ZERO]);
        let mut task = CullTask::new(0, &default_queues());
        let job = || CullJob::for_scene(0, Arc::clone(&scene), camera(), opaque_passes(), PassMask::ALL);
        task.configure(job(), None).expect("first configure");
        let err = task.configure(job(), None).unwrap_err();
        assert!(matches!(err, CullError::TaskBusy { task: 0, state: "configured" }));
    }

    #[test]
    fn run_queues_visible_items_and_prepares_them() {
        let scene = scene_with(&[Vec3::ZERO, Vec3::new(500.0, 0.0, 0.0)]);
        let mut task = CullTask::new(3, &default_queues());
        task.configure(
            CullJob::for_scene(7, scene, camera(), opaque_passes(), PassMask::ALL),
            None,
        )
        .expect("configure");
        task.run().expect("run");

        assert_eq!(task.state(), TaskState::Finished);
        assert_eq!(task.queues().get(QueueId::OPAQUE).map(|q| q.len()), Some(1));
        assert_eq!(task.prepared().len(), 1);
        let item = &task.prepared()[0].item;
        assert_eq!(item.state().snapshot(0).map(|s| s.frame), Some(7));

        task.reset();
        assert_eq!(task.state(), TaskState::Pooled);
        assert_eq!(task.queues().total_len(), 0);
        assert!(task.queues().configured_mask().contains(QueueId::OPAQUE));
    }
}
