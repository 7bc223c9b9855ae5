//! Atomic multi-document write batches and the document set they apply to.
//!
//! A [`WriteBatch`] is an ordered list of [`WriteOp`]s. Applying it to a
//! [`Workspace`] either commits every operation or none: operations are run
//! against a staged copy which only replaces the live set once the whole
//! batch has succeeded.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::board::{Column, Project, ProjectId, Task, TaskId, sort_by_order};
use crate::store::{FeedKey, FeedSnapshot};

/// Errors raised while applying a write batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    /// An update or delete referenced a task that does not exist.
    #[error("task not found: {0}")]
    MissingTask(TaskId),

    /// An update or delete referenced a project that does not exist.
    #[error("project not found: {0}")]
    MissingProject(ProjectId),

    /// A task was written into a project that does not exist.
    #[error("task {task} references unknown project {project}")]
    UnknownProject {
        /// The task being written.
        task: TaskId,
        /// The project it claims to belong to.
        project: ProjectId,
    },
}

/// Partial update to a task document. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    /// New title.
    pub title: Option<String>,
    /// New column.
    pub column: Option<Column>,
    /// New order key.
    pub order: Option<f64>,
    /// New image location; `Some(None)` clears it.
    pub image_url: Option<Option<String>>,
}

impl TaskPatch {
    /// Returns `true` if the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.column.is_none()
            && self.order.is_none()
            && self.image_url.is_none()
    }

    /// Writes every set field onto `task`.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
        if let Some(column) = self.column {
            task.column = column;
        }
        if let Some(order) = self.order {
            task.order = order;
        }
        if let Some(image_url) = &self.image_url {
            task.image_url.clone_from(image_url);
        }
    }
}

/// Partial update to a project document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectPatch {
    /// New display name.
    pub name: Option<String>,
    /// New order key.
    pub order: Option<f64>,
}

impl ProjectPatch {
    /// Writes every set field onto `project`.
    pub fn apply_to(&self, project: &mut Project) {
        if let Some(name) = &self.name {
            project.name.clone_from(name);
        }
        if let Some(order) = self.order {
            project.order = order;
        }
    }
}

/// A single document write inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WriteOp {
    /// Create or overwrite a task.
    PutTask(Task),
    /// Patch an existing task; fails if it does not exist.
    UpdateTask {
        /// Task to update.
        id: TaskId,
        /// Fields to change.
        patch: TaskPatch,
    },
    /// Delete an existing task.
    DeleteTask(TaskId),
    /// Create or overwrite a project.
    PutProject(Project),
    /// Patch an existing project.
    UpdateProject {
        /// Project to update.
        id: ProjectId,
        /// Fields to change.
        patch: ProjectPatch,
    },
    /// Delete a project and every task it owns.
    DeleteProject(ProjectId),
}

/// An ordered list of writes committed atomically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub const fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Appends an operation.
    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    /// Appends a task patch.
    pub fn update_task(&mut self, id: TaskId, patch: TaskPatch) {
        self.ops.push(WriteOp::UpdateTask { id, patch });
    }

    /// Returns the operations in commit order.
    #[must_use]
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Number of operations in the batch.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns `true` if the batch contains no operations.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl From<Vec<WriteOp>> for WriteBatch {
    fn from(ops: Vec<WriteOp>) -> Self {
        Self { ops }
    }
}

/// Which live feeds a committed batch affected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Touched {
    /// The project list changed.
    pub projects: bool,
    /// Projects whose task list changed.
    pub task_projects: BTreeSet<ProjectId>,
}

impl Touched {
    /// Returns `true` if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.projects && self.task_projects.is_empty()
    }

    /// Lists the live feeds that need a fresh snapshot.
    #[must_use]
    pub fn feed_keys(&self) -> Vec<FeedKey> {
        let mut keys: Vec<FeedKey> = self
            .task_projects
            .iter()
            .cloned()
            .map(FeedKey::Tasks)
            .collect();
        if self.projects {
            keys.push(FeedKey::Projects);
        }
        keys
    }
}

/// The full authoritative document set: every project and task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workspace {
    projects: HashMap<ProjectId, Project>,
    tasks: HashMap<TaskId, Task>,
}

impl Workspace {
    /// Creates an empty workspace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a workspace from stored documents.
    #[must_use]
    pub fn from_documents(projects: Vec<Project>, tasks: Vec<Task>) -> Self {
        Self {
            projects: projects.into_iter().map(|p| (p.id.clone(), p)).collect(),
            tasks: tasks.into_iter().map(|t| (t.id.clone(), t)).collect(),
        }
    }

    /// Applies `batch` atomically.
    ///
    /// # Errors
    ///
    /// Returns the first [`BatchError`] encountered; in that case the
    /// workspace is left exactly as it was.
    pub fn apply(&mut self, batch: &WriteBatch) -> Result<Touched, BatchError> {
        let mut staged = self.clone();
        let mut touched = Touched::default();
        for op in batch.ops() {
            staged.apply_op(op, &mut touched)?;
        }
        *self = staged;
        Ok(touched)
    }

    fn apply_op(&mut self, op: &WriteOp, touched: &mut Touched) -> Result<(), BatchError> {
        match op {
            WriteOp::PutTask(task) => {
                if !self.projects.contains_key(&task.project_id) {
                    return Err(BatchError::UnknownProject {
                        task: task.id.clone(),
                        project: task.project_id.clone(),
                    });
                }
                if let Some(previous) = self.tasks.insert(task.id.clone(), task.clone()) {
                    touched.task_projects.insert(previous.project_id);
                }
                touched.task_projects.insert(task.project_id.clone());
            }
            WriteOp::UpdateTask { id, patch } => {
                let task = self
                    .tasks
                    .get_mut(id)
                    .ok_or_else(|| BatchError::MissingTask(id.clone()))?;
                patch.apply_to(task);
                touched.task_projects.insert(task.project_id.clone());
            }
            WriteOp::DeleteTask(id) => {
                let task = self
                    .tasks
                    .remove(id)
                    .ok_or_else(|| BatchError::MissingTask(id.clone()))?;
                touched.task_projects.insert(task.project_id);
            }
            WriteOp::PutProject(project) => {
                self.projects.insert(project.id.clone(), project.clone());
                touched.projects = true;
            }
            WriteOp::UpdateProject { id, patch } => {
                let project = self
                    .projects
                    .get_mut(id)
                    .ok_or_else(|| BatchError::MissingProject(id.clone()))?;
                patch.apply_to(project);
                touched.projects = true;
            }
            WriteOp::DeleteProject(id) => {
                if self.projects.remove(id).is_none() {
                    return Err(BatchError::MissingProject(id.clone()));
                }
                self.tasks.retain(|_, t| t.project_id != *id);
                touched.projects = true;
                touched.task_projects.insert(id.clone());
            }
        }
        Ok(())
    }

    /// Returns the tasks of `project`, sorted by order key.
    #[must_use]
    pub fn tasks_for(&self, project: &ProjectId) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .values()
            .filter(|t| t.project_id == *project)
            .cloned()
            .collect();
        sort_by_order(&mut tasks);
        tasks
    }

    /// Returns all projects sorted by order key.
    #[must_use]
    pub fn projects(&self) -> Vec<Project> {
        let mut projects: Vec<Project> = self.projects.values().cloned().collect();
        projects.sort_by(|a, b| a.order.total_cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        projects
    }

    /// Builds the current snapshot of one live feed.
    #[must_use]
    pub fn snapshot(&self, key: &FeedKey) -> FeedSnapshot {
        match key {
            FeedKey::Tasks(project_id) => FeedSnapshot::Tasks {
                project_id: project_id.clone(),
                tasks: self.tasks_for(project_id),
            },
            FeedKey::Projects => FeedSnapshot::Projects {
                projects: self.projects(),
            },
        }
    }

    /// Looks up a task by id.
    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Looks up a project by id.
    #[must_use]
    pub fn project(&self, id: &ProjectId) -> Option<&Project> {
        self.projects.get(id)
    }

    /// Returns every task, in no particular order.
    pub fn all_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Total number of task documents.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}
