//! Task and project CRUD on top of a [`Board`].
//!
//! These writes go straight to the store and show up locally through the
//! live feed. Only project reordering is applied optimistically, the same
//! way task drops are.

use lotion_proto::batch::{ProjectPatch, TaskPatch, WriteBatch, WriteOp};
use lotion_proto::board::{Column, Project, ProjectId, Task, TaskId, now_ms};

use super::BoardError;
use super::context::Board;
use super::planner::array_move;
use crate::store::TaskStore;

impl<S: TaskStore + 'static> Board<S> {
    /// Appends a new task to the end of `column` in the current project.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::TitleEmpty`] or [`BoardError::TitleTooLong`]
    /// for an invalid title, or [`BoardError::Store`] if the write fails.
    pub async fn add_task(&self, title: &str, column: Column) -> Result<Task, BoardError> {
        self.add_task_with_image(title, column, None).await
    }

    /// Appends a new task carrying an image link.
    ///
    /// # Errors
    ///
    /// Same as [`add_task`](Self::add_task).
    pub async fn add_task_with_image(
        &self,
        title: &str,
        column: Column,
        image_url: Option<String>,
    ) -> Result<Task, BoardError> {
        let index = self.session.column(column).len();
        self.insert(title, column, index, image_url).await
    }

    /// Inserts a new task at position `index` of `column`.
    ///
    /// The key is taken halfway between the neighbours. When no distinct
    /// key fits between them the whole column is renumbered in the same
    /// batch.
    ///
    /// # Errors
    ///
    /// Same as [`add_task`](Self::add_task).
    pub async fn insert_task(
        &self,
        title: &str,
        column: Column,
        index: usize,
    ) -> Result<Task, BoardError> {
        self.insert(title, column, index, None).await
    }

    #[allow(clippy::float_cmp)]
    async fn insert(
        &self,
        title: &str,
        column: Column,
        index: usize,
        image_url: Option<String>,
    ) -> Result<Task, BoardError> {
        let title = self.validate_title(title)?;
        let existing = self.session.column(column);
        let index = index.min(existing.len());
        let keys = self.session.keys();

        let mut batch = WriteBatch::new();
        let order = if index == existing.len() {
            keys.next_order_for_append(existing.iter().map(|t| t.order))
        } else {
            let before = index.checked_sub(1).map(|i| existing[i].order);
            let after = existing.get(index).map(|t| t.order);
            if let Some(order) = keys.order_between(before, after) {
                order
            } else {
                tracing::info!(column = %column, tasks = existing.len(), "order keys exhausted, renumbering");
                let orders = keys.sequential_orders(existing.len() + 1);
                for (i, task) in existing.iter().enumerate() {
                    let slot = if i < index { orders[i] } else { orders[i + 1] };
                    if task.order != slot {
                        batch.update_task(
                            task.id.clone(),
                            TaskPatch {
                                order: Some(slot),
                                ..TaskPatch::default()
                            },
                        );
                    }
                }
                orders[index]
            }
        };

        let task = Task {
            id: TaskId::new(),
            project_id: self.session.project_id().clone(),
            title,
            column,
            order,
            image_url,
        };
        batch.push(WriteOp::PutTask(task.clone()));
        self.commit(batch, "task").await?;
        tracing::info!(task_id = %task.id, column = %column, "task added");
        Ok(task)
    }

    /// Changes the title and/or image of a task.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::TaskNotFound`] if the task is not on the
    /// board, a title error for an invalid title, or [`BoardError::Store`].
    pub async fn edit_task(
        &self,
        id: &TaskId,
        title: Option<&str>,
        image_url: Option<Option<String>>,
    ) -> Result<(), BoardError> {
        self.require_task(id)?;
        let patch = TaskPatch {
            title: title.map(|t| self.validate_title(t)).transpose()?,
            image_url,
            ..TaskPatch::default()
        };
        if patch.is_empty() {
            return Ok(());
        }
        let mut batch = WriteBatch::new();
        batch.update_task(id.clone(), patch);
        self.commit(batch, "task").await
    }

    /// Deletes a task.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::TaskNotFound`] or [`BoardError::Store`].
    pub async fn delete_task(&self, id: &TaskId) -> Result<(), BoardError> {
        self.require_task(id)?;
        self.commit(WriteBatch::from(vec![WriteOp::DeleteTask(id.clone())]), "task")
            .await?;
        tracing::info!(task_id = %id, "task deleted");
        Ok(())
    }

    /// Creates a project at the end of the project list.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::NameEmpty`] or [`BoardError::Store`].
    pub async fn create_project(&self, name: &str) -> Result<Project, BoardError> {
        let name = validate_name(name)?;
        let order = self
            .session
            .keys()
            .next_order_for_append(self.session.projects().iter().map(|p| p.order));
        let project = Project {
            id: ProjectId::new(),
            name,
            order,
            created_at: now_ms(),
        };
        self.commit(
            WriteBatch::from(vec![WriteOp::PutProject(project.clone())]),
            "project",
        )
        .await?;
        tracing::info!(project_id = %project.id, "project created");
        Ok(project)
    }

    /// Renames a project.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::NameEmpty`], [`BoardError::ProjectNotFound`],
    /// or [`BoardError::Store`].
    pub async fn rename_project(&self, id: &ProjectId, name: &str) -> Result<(), BoardError> {
        let name = validate_name(name)?;
        self.require_project(id)?;
        self.commit(
            WriteBatch::from(vec![WriteOp::UpdateProject {
                id: id.clone(),
                patch: ProjectPatch {
                    name: Some(name),
                    ..ProjectPatch::default()
                },
            }]),
            "project",
        )
        .await
    }

    /// Deletes a project together with all of its tasks.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::ProjectNotFound`] or [`BoardError::Store`].
    pub async fn delete_project(&self, id: &ProjectId) -> Result<(), BoardError> {
        self.require_project(id)?;
        self.commit(
            WriteBatch::from(vec![WriteOp::DeleteProject(id.clone())]),
            "project",
        )
        .await?;
        tracing::info!(project_id = %id, "project deleted");
        Ok(())
    }

    /// Moves the project at `from` to position `to` of the project list.
    ///
    /// The list is renumbered and applied locally before the write, like a
    /// task drop. Returns `false` when nothing moved.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::ProjectNotFound`] if either index is out of
    /// range, or [`BoardError::Store`] if the write fails. A failed write
    /// is reported like a failed task reorder and corrected by the feed.
    #[allow(clippy::float_cmp)]
    pub async fn move_project(&mut self, from: usize, to: usize) -> Result<bool, BoardError> {
        let mut projects = self.session.projects().to_vec();
        if from >= projects.len() || to >= projects.len() {
            return Err(BoardError::ProjectNotFound(format!(
                "index {}",
                from.max(to)
            )));
        }
        if from == to {
            return Ok(false);
        }
        array_move(&mut projects, from, to);

        let orders = self.session.keys().sequential_orders(projects.len());
        let mut batch = WriteBatch::new();
        for (project, order) in projects.iter_mut().zip(orders) {
            if project.order != order {
                project.order = order;
                batch.push(WriteOp::UpdateProject {
                    id: project.id.clone(),
                    patch: ProjectPatch {
                        order: Some(order),
                        ..ProjectPatch::default()
                    },
                });
            }
        }
        self.session.set_projects(projects);
        self.writer.persist(batch).await?;
        Ok(true)
    }

    async fn commit(&self, batch: WriteBatch, what: &str) -> Result<(), BoardError> {
        self.store.commit(batch).await.map_err(|err| {
            tracing::warn!(error = %err, "{what} write failed");
            self.notifier.error(format!("Failed to save {what}"));
            BoardError::Store(err)
        })
    }

    fn validate_title(&self, title: &str) -> Result<String, BoardError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(BoardError::TitleEmpty);
        }
        if title.chars().count() > self.max_title_len {
            return Err(BoardError::TitleTooLong {
                max: self.max_title_len,
            });
        }
        Ok(title.to_string())
    }

    fn require_task(&self, id: &TaskId) -> Result<(), BoardError> {
        self.session
            .task(id)
            .map(|_| ())
            .ok_or_else(|| BoardError::TaskNotFound(id.to_string()))
    }

    fn require_project(&self, id: &ProjectId) -> Result<(), BoardError> {
        self.session
            .projects()
            .iter()
            .any(|p| &p.id == id)
            .then_some(())
            .ok_or_else(|| BoardError::ProjectNotFound(id.to_string()))
    }
}

fn validate_name(name: &str) -> Result<String, BoardError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(BoardError::NameEmpty);
    }
    Ok(name.to_string())
}
