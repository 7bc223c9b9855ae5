//! Per-board session state and the event reducer.
//!
//! [`BoardSession`] owns the working copy of one project's tasks plus the
//! project list. Every mutation arrives as a [`BoardEvent`] and runs to
//! completion inside [`BoardSession::handle`], so a drop is applied locally
//! before its batch is handed back for persisting, and a snapshot always
//! replaces whatever the session held.

use lotion_proto::batch::WriteBatch;
use lotion_proto::board::{Column, Project, ProjectId, Task, TaskId};
use lotion_proto::store::FeedSnapshot;

use super::optimistic::apply_plan;
use super::order::OrderKeys;
use super::planner::{DropTarget, column_tasks, plan_reorder};
use super::sync::build_batch;

/// Events that change board state.
#[derive(Debug, Clone, PartialEq)]
pub enum BoardEvent {
    /// A drag gesture picked up a task.
    DragStart {
        /// The task being dragged.
        task_id: TaskId,
    },
    /// A drag gesture released its task.
    DragEnd {
        /// The task that was dragged.
        active: TaskId,
        /// Where it was released; `None` outside any target.
        over: Option<DropTarget>,
    },
    /// A drag gesture was abandoned.
    DragCancel,
    /// The live feed delivered an authoritative snapshot.
    Snapshot(FeedSnapshot),
}

/// Working state of one open board.
#[derive(Debug, Clone)]
pub struct BoardSession {
    project_id: ProjectId,
    tasks: Vec<Task>,
    projects: Vec<Project>,
    dragging: Option<TaskId>,
    keys: OrderKeys,
    synced: bool,
}

impl BoardSession {
    /// Creates an empty session showing `project_id`.
    #[must_use]
    pub const fn new(project_id: ProjectId, keys: OrderKeys) -> Self {
        Self {
            project_id,
            tasks: Vec::new(),
            projects: Vec::new(),
            dragging: None,
            keys,
            synced: false,
        }
    }

    /// Applies one event.
    ///
    /// Returns the batch to persist when the event was a drop that changed
    /// the board. The local task list already reflects it.
    pub fn handle(&mut self, event: BoardEvent) -> Option<WriteBatch> {
        match event {
            BoardEvent::DragStart { task_id } => {
                self.dragging = Some(task_id);
                None
            }
            BoardEvent::DragEnd { active, over } => self.drag_end(&active, over.as_ref()),
            BoardEvent::DragCancel => {
                self.dragging = None;
                None
            }
            BoardEvent::Snapshot(snapshot) => {
                self.apply_snapshot(snapshot);
                None
            }
        }
    }

    fn drag_end(&mut self, active: &TaskId, over: Option<&DropTarget>) -> Option<WriteBatch> {
        self.dragging = None;
        let over = over?;
        let plan = plan_reorder(&self.tasks, active, over)?;
        let after = apply_plan(&self.tasks, &plan, &self.keys);
        let batch = build_batch(&self.tasks, &plan, &after);
        self.tasks = after;
        tracing::debug!(
            task_id = %active,
            target = %over,
            column = %plan.target_column,
            ops = batch.len(),
            "task dropped"
        );
        Some(batch)
    }

    /// Replaces local state with an authoritative snapshot.
    ///
    /// Task snapshots for any other project are ignored. Returns whether
    /// the snapshot was taken.
    pub fn apply_snapshot(&mut self, snapshot: FeedSnapshot) -> bool {
        match snapshot {
            FeedSnapshot::Tasks { project_id, tasks } => {
                if project_id != self.project_id {
                    tracing::debug!(project_id = %project_id, "ignoring snapshot of another project");
                    return false;
                }
                self.tasks = tasks;
                self.synced = true;
            }
            FeedSnapshot::Projects { projects } => self.projects = projects,
        }
        true
    }

    /// Shows another project. Its tasks arrive with the next snapshot.
    pub fn switch_project(&mut self, project_id: ProjectId) {
        self.project_id = project_id;
        self.tasks.clear();
        self.dragging = None;
        self.synced = false;
    }

    /// Replaces the project list ahead of the live feed.
    pub fn set_projects(&mut self, projects: Vec<Project>) {
        self.projects = projects;
    }

    /// The project whose tasks are shown.
    #[must_use]
    pub const fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    /// Every task of the current project, in no particular order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// The tasks of `column`, sorted by order key.
    #[must_use]
    pub fn column(&self, column: Column) -> Vec<Task> {
        column_tasks(&self.tasks, column)
    }

    /// Looks up a task of the current project.
    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// The project list, sorted by order key.
    #[must_use]
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    /// The current project, once the project list has arrived.
    #[must_use]
    pub fn current_project(&self) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == self.project_id)
    }

    /// The task currently being dragged, if it is still on the board.
    #[must_use]
    pub fn dragging(&self) -> Option<&Task> {
        self.dragging.as_ref().and_then(|id| self.task(id))
    }

    /// The order key allocator of this board.
    #[must_use]
    pub const fn keys(&self) -> &OrderKeys {
        &self.keys
    }

    /// Whether a task snapshot has been received for the current project.
    #[must_use]
    pub const fn is_synced(&self) -> bool {
        self.synced
    }
}
