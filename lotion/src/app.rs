//! Application state and keyboard handling.
//!
//! The TUI drives drags from the keyboard: `space` picks up the selected
//! task, the arrow keys move a drop cursor over tasks or the end of a
//! column, and `space` again releases it. Key handling never touches the
//! board directly; it returns an [`AppAction`] for the event loop.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use lotion_proto::board::{Column, ProjectId, TaskId};

use crate::board::{BoardEvent, BoardSession, DropTarget};
use crate::notify::Notification;

/// What the event loop should do after a key press.
#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    /// Feed an event to the board.
    Board(BoardEvent),
    /// Append a task to a column of the current project.
    AddTask {
        /// Task title as typed.
        title: String,
        /// Destination column.
        column: Column,
    },
    /// Delete a task.
    DeleteTask(TaskId),
    /// Create a project with the given name.
    CreateProject(String),
    /// Show another project.
    SwitchProject(ProjectId),
    /// Move the current project within the project list.
    MoveProject {
        /// Current position.
        from: usize,
        /// New position.
        to: usize,
    },
}

/// Where a keyboard drag would drop right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragCursor {
    /// The task being dragged.
    pub active: TaskId,
    /// Column under the cursor.
    pub column: Column,
    /// Slot in that column; one past the last task means the column itself.
    pub index: usize,
}

/// What a text prompt is collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Title of a new task for this column.
    AddTask(Column),
    /// Name of a new project.
    NewProject,
}

/// A single-line text prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// What the text is for.
    pub kind: PromptKind,
    /// Text typed so far.
    pub text: String,
}

/// Main application state.
pub struct App {
    /// Column with keyboard focus.
    pub focus: Column,
    /// Selected row per column, indexed by [`Column::index`].
    pub selected: [usize; 3],
    /// Active keyboard drag, if any.
    pub drag: Option<DragCursor>,
    /// Open text prompt, if any.
    pub prompt: Option<Prompt>,
    /// Most recent notification.
    pub notification: Option<Notification>,
    /// When the last task snapshot arrived, already formatted.
    pub last_sync: Option<String>,
    /// Whether the board talks to a store server.
    pub online: bool,
    /// Timestamp display format string (chrono).
    pub timestamp_format: String,
    /// Whether the app should quit.
    pub should_quit: bool,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    /// Create an application with nothing selected.
    #[must_use]
    pub fn new() -> Self {
        Self {
            focus: Column::NotStarted,
            selected: [0; 3],
            drag: None,
            prompt: None,
            notification: None,
            last_sync: None,
            online: false,
            timestamp_format: "%H:%M:%S".to_string(),
            should_quit: false,
        }
    }

    /// Set the format used for the last-sync time.
    #[must_use]
    pub fn with_timestamp_format(mut self, format: &str) -> Self {
        self.timestamp_format = format.to_string();
        self
    }

    /// Record that a snapshot just arrived.
    pub fn mark_synced(&mut self) {
        self.last_sync = Some(
            chrono::Local::now()
                .format(&self.timestamp_format)
                .to_string(),
        );
    }

    /// Show a notification in the status bar.
    pub fn notify(&mut self, notification: Notification) {
        self.notification = Some(notification);
    }

    /// Record whether the store connection is up, announcing a change.
    pub fn set_connection_status(&mut self, online: bool) {
        if self.online == online {
            return;
        }
        self.online = online;
        self.notify(if online {
            Notification::info("Connected to store")
        } else {
            Notification::error("Disconnected from store, changes are no longer saved")
        });
    }

    /// Row selected in `column`, clamped to its current length.
    #[must_use]
    pub fn selected_index(&self, session: &BoardSession, column: Column) -> usize {
        let len = session.column(column).len();
        self.selected[column.index()].min(len.saturating_sub(1))
    }

    /// Handle a key event.
    pub fn handle_key_event(&mut self, key: KeyEvent, session: &BoardSession) -> Option<AppAction> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return None;
        }
        if self.prompt.is_some() {
            return self.handle_prompt_key(key);
        }
        if self.drag.is_some() {
            return self.handle_drag_key(key, session);
        }
        self.handle_browse_key(key, session)
    }

    /// Handle key event while browsing the board.
    fn handle_browse_key(&mut self, key: KeyEvent, session: &BoardSession) -> Option<AppAction> {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Left | KeyCode::Char('h') => self.focus = step_column(self.focus, -1),
            KeyCode::Right | KeyCode::Char('l') => self.focus = step_column(self.focus, 1),
            KeyCode::Up | KeyCode::Char('k') => {
                let row = self.selected_index(session, self.focus);
                self.selected[self.focus.index()] = row.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let len = session.column(self.focus).len();
                let row = self.selected_index(session, self.focus);
                self.selected[self.focus.index()] = (row + 1).min(len.saturating_sub(1));
            }
            KeyCode::Char(' ') => return self.pick_up(session),
            KeyCode::Char('a') => {
                self.prompt = Some(Prompt {
                    kind: PromptKind::AddTask(self.focus),
                    text: String::new(),
                });
            }
            KeyCode::Char('n') => {
                self.prompt = Some(Prompt {
                    kind: PromptKind::NewProject,
                    text: String::new(),
                });
            }
            KeyCode::Char('d') => {
                let task = self.selected_task(session)?;
                return Some(AppAction::DeleteTask(task));
            }
            KeyCode::Char('[') => return self.neighbour_project(session, -1),
            KeyCode::Char(']') => return self.neighbour_project(session, 1),
            KeyCode::Char('<') => return self.move_project(session, -1),
            KeyCode::Char('>') => return self.move_project(session, 1),
            _ => {}
        }
        None
    }

    /// Handle key event while a task is being dragged.
    fn handle_drag_key(&mut self, key: KeyEvent, session: &BoardSession) -> Option<AppAction> {
        let cursor = self.drag.as_mut()?;
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => {
                cursor.column = step_column(cursor.column, -1);
                cursor.index = cursor.index.min(session.column(cursor.column).len());
            }
            KeyCode::Right | KeyCode::Char('l') => {
                cursor.column = step_column(cursor.column, 1);
                cursor.index = cursor.index.min(session.column(cursor.column).len());
            }
            KeyCode::Up | KeyCode::Char('k') => cursor.index = cursor.index.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                cursor.index = (cursor.index + 1).min(session.column(cursor.column).len());
            }
            KeyCode::Char(' ') | KeyCode::Enter => return Some(self.release(session)),
            KeyCode::Esc => {
                self.drag = None;
                return Some(AppAction::Board(BoardEvent::DragCancel));
            }
            _ => {}
        }
        None
    }

    /// Handle key event while a prompt is open.
    fn handle_prompt_key(&mut self, key: KeyEvent) -> Option<AppAction> {
        let prompt = self.prompt.as_mut()?;
        match key.code {
            KeyCode::Char(c) => prompt.text.push(c),
            KeyCode::Backspace => {
                prompt.text.pop();
            }
            KeyCode::Esc => self.prompt = None,
            KeyCode::Enter => {
                let prompt = self.prompt.take()?;
                return Some(match prompt.kind {
                    PromptKind::AddTask(column) => AppAction::AddTask {
                        title: prompt.text,
                        column,
                    },
                    PromptKind::NewProject => AppAction::CreateProject(prompt.text),
                });
            }
            _ => {}
        }
        None
    }

    /// Start dragging the selected task.
    fn pick_up(&mut self, session: &BoardSession) -> Option<AppAction> {
        let active = self.selected_task(session)?;
        self.drag = Some(DragCursor {
            active: active.clone(),
            column: self.focus,
            index: self.selected_index(session, self.focus),
        });
        Some(AppAction::Board(BoardEvent::DragStart { task_id: active }))
    }

    /// Release the dragged task at the cursor.
    fn release(&mut self, session: &BoardSession) -> AppAction {
        let Some(cursor) = self.drag.take() else {
            return AppAction::Board(BoardEvent::DragCancel);
        };
        let over = drop_target(session, &cursor);
        self.focus = cursor.column;
        self.selected[cursor.column.index()] = landing_index(session, &cursor);
        AppAction::Board(BoardEvent::DragEnd {
            active: cursor.active,
            over: Some(over),
        })
    }

    fn selected_task(&self, session: &BoardSession) -> Option<TaskId> {
        let tasks = session.column(self.focus);
        tasks
            .get(self.selected_index(session, self.focus))
            .map(|t| t.id.clone())
    }

    fn current_project_index(session: &BoardSession) -> Option<usize> {
        session
            .projects()
            .iter()
            .position(|p| &p.id == session.project_id())
    }

    fn neighbour_project(&self, session: &BoardSession, step: isize) -> Option<AppAction> {
        let projects = session.projects();
        let current = Self::current_project_index(session).unwrap_or(0);
        let next = current.checked_add_signed(step)?;
        let project = projects.get(next)?;
        Some(AppAction::SwitchProject(project.id.clone()))
    }

    fn move_project(&self, session: &BoardSession, step: isize) -> Option<AppAction> {
        let from = Self::current_project_index(session)?;
        let to = from.checked_add_signed(step)?;
        (to < session.projects().len()).then_some(AppAction::MoveProject { from, to })
    }
}

/// The drop target under a drag cursor.
///
/// The cursor sits in the gap above a task. Within its own column the
/// dragged task leaves a hole, so a gap below it targets the task above the
/// gap. A slot past the last task of another column targets the column.
#[must_use]
pub fn drop_target(session: &BoardSession, cursor: &DragCursor) -> DropTarget {
    session
        .column(cursor.column)
        .get(landing_index(session, cursor))
        .map_or(DropTarget::Column(cursor.column), |t| {
            DropTarget::Task(t.id.clone())
        })
}

/// Index the dragged task ends up at in the cursor's column.
fn landing_index(session: &BoardSession, cursor: &DragCursor) -> usize {
    let origin = session
        .column(cursor.column)
        .iter()
        .position(|t| t.id == cursor.active);
    match origin {
        Some(from) if cursor.index > from => cursor.index - 1,
        _ => cursor.index,
    }
}

/// The column `step` places to the left (negative) or right of `column`,
/// stopping at the edges.
fn step_column(column: Column, step: isize) -> Column {
    let last = Column::ALL.len() - 1;
    let index = column.index().saturating_add_signed(step).min(last);
    Column::ALL[index]
}
