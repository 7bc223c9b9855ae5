//! `Lotion`: personal kanban board in the terminal.
//!
//! Shows one project's tasks in three columns and lets the user drag tasks
//! between and within them from the keyboard. Reorders are shown at once
//! and written to the store in the background.
//!
//! ```bash
//! # Offline demo board
//! cargo run --bin lotion
//!
//! # Against a running lotion-store
//! cargo run --bin lotion -- --store-url ws://127.0.0.1:9100/ws --project Home
//! ```

use std::io;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_appender::non_blocking::WorkerGuard;

use lotion::app::{App, AppAction};
use lotion::board::{Board, BoardError, BoardEvent, OrderKeys};
use lotion::config::{CliArgs, ClientConfig};
use lotion::feed;
use lotion::notify::{Notification, Notifier};
use lotion::store::memory::InMemoryStore;
use lotion::store::remote::RemoteStore;
use lotion::store::{StoreError, TaskStore};
use lotion::ui;
use lotion_proto::batch::Workspace;
use lotion_proto::board::{Column, Project, ProjectId, Task, TaskId, now_ms};
use lotion_proto::store::{FeedKey, FeedSnapshot};

type Term = Terminal<CrosstermBackend<io::Stdout>>;

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config: {e}");
            ClientConfig::default()
        }
    };

    // Logs go to a file; ratatui owns stdout.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    tracing::info!("lotion starting");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &config).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    tracing::info!("lotion exiting");
    result
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown so buffered
/// entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("lotion.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Picks the store and runs the board against it.
///
/// A store URL that cannot be reached falls back to the offline demo board.
async fn run_app(terminal: &mut Term, config: &ClientConfig) -> io::Result<()> {
    let mut app = App::new().with_timestamp_format(&config.timestamp_format);

    let Some(url) = &config.store_url else {
        return run_board(terminal, Arc::new(demo_store()), config, app).await;
    };
    match RemoteStore::connect(url, config.remote_options()).await {
        Ok(store) => {
            app.online = true;
            tracing::info!(url = %url, "connected to store");
            run_board(terminal, Arc::new(store), config, app).await
        }
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "store unreachable, running offline");
            app.notify(Notification::error(format!(
                "Could not connect to store, running offline ({e})"
            )));
            run_board(terminal, Arc::new(demo_store()), config, app).await
        }
    }
}

/// Main loop: draw, apply feed snapshots and notifications, handle keys.
async fn run_board<S: TaskStore + 'static>(
    terminal: &mut Term,
    store: Arc<S>,
    config: &ClientConfig,
    mut app: App,
) -> io::Result<()> {
    let (notifier, mut notifications) = Notifier::new(config.notification_buffer);
    let (event_tx, mut event_rx) = mpsc::channel(config.channel_capacity);

    let projects = initial_projects(&store, config).await?;
    let project_id = pick_project(&store, &projects, config.project.as_deref()).await?;

    let mut board = Board::new(
        Arc::clone(&store),
        project_id.clone(),
        OrderKeys::new(config.order_gap),
        notifier.clone(),
    )
    .with_max_title_len(config.max_task_title_len);
    board.handle(BoardEvent::Snapshot(FeedSnapshot::Projects { projects }));

    let projects_listener = feed::follow(&store, FeedKey::Projects, event_tx.clone())
        .await
        .map_err(io::Error::other)?;
    let mut tasks_listener = feed::follow(&store, FeedKey::Tasks(project_id), event_tx.clone())
        .await
        .map_err(io::Error::other)?;

    loop {
        terminal.draw(|frame| ui::draw(frame, &app, board.session()))?;

        // Drain snapshots pushed by the live feeds.
        while let Ok(event) = event_rx.try_recv() {
            let tasks_update = matches!(&event, BoardEvent::Snapshot(FeedSnapshot::Tasks { .. }));
            board.handle(event);
            if tasks_update {
                app.mark_synced();
            }
        }

        // The open project was deleted elsewhere.
        if board.session().current_project().is_none()
            && let Some(first) = board.session().projects().first()
        {
            let first = first.id.clone();
            tasks_listener = switch_feed(&mut board, tasks_listener, first, &event_tx).await?;
        }

        while let Ok(notification) = notifications.try_recv() {
            app.notify(notification);
        }

        // The live feeds have ended with the connection.
        if app.online && !board.store().is_connected() {
            tracing::warn!("store connection lost");
            app.set_connection_status(false);
        }

        if event::poll(config.poll_timeout)?
            && let Event::Key(key) = event::read()?
        {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if let Some(action) = app.handle_key_event(key, board.session()) {
                tasks_listener =
                    perform(&mut board, action, tasks_listener, &notifier, &event_tx).await?;
            }
        }

        if app.should_quit {
            projects_listener.abort();
            tasks_listener.abort();
            return Ok(());
        }
    }
}

/// Carries out one [`AppAction`].
///
/// Returns the task feed listener, which changes on a project switch.
async fn perform<S: TaskStore + 'static>(
    board: &mut Board<S>,
    action: AppAction,
    tasks_listener: JoinHandle<()>,
    notifier: &Notifier,
    events: &mpsc::Sender<BoardEvent>,
) -> io::Result<JoinHandle<()>> {
    let result = match action {
        AppAction::Board(event) => {
            // The write runs detached; a failure is reported by the writer.
            board.handle(event);
            Ok(())
        }
        AppAction::AddTask { title, column } => board.add_task(&title, column).await.map(drop),
        AppAction::DeleteTask(id) => board.delete_task(&id).await,
        AppAction::CreateProject(name) => board.create_project(&name).await.map(|project| {
            notifier.info(format!("Created project {}", project.name));
        }),
        AppAction::SwitchProject(project_id) => {
            return switch_feed(board, tasks_listener, project_id, events).await;
        }
        AppAction::MoveProject { from, to } => board.move_project(from, to).await.map(drop),
    };
    match result {
        Ok(()) | Err(BoardError::Store(_)) => {}
        Err(e) => notifier.error(e.to_string()),
    }
    Ok(tasks_listener)
}

/// Points the board and the task feed at another project.
async fn switch_feed<S: TaskStore + 'static>(
    board: &mut Board<S>,
    old_listener: JoinHandle<()>,
    project_id: ProjectId,
    events: &mpsc::Sender<BoardEvent>,
) -> io::Result<JoinHandle<()>> {
    old_listener.abort();
    let previous = board.session().project_id().clone();
    if let Err(e) = board.store().unsubscribe(FeedKey::Tasks(previous)).await {
        tracing::warn!(error = %e, "failed to unsubscribe from previous project");
    }
    board.switch_project(project_id.clone());
    feed::follow(board.store(), FeedKey::Tasks(project_id), events.clone())
        .await
        .map_err(io::Error::other)
}

/// Reads the project list once before the board is built.
async fn initial_projects<S: TaskStore>(
    store: &Arc<S>,
    config: &ClientConfig,
) -> io::Result<Vec<Project>> {
    let mut feed = store.subscribe_projects().await.map_err(io::Error::other)?;
    let snapshot = tokio::time::timeout(config.connect_timeout, feed.next())
        .await
        .map_err(|_| io::Error::other(StoreError::Timeout))?;
    let projects = match snapshot {
        Some(FeedSnapshot::Projects { projects }) => projects,
        Some(FeedSnapshot::Tasks { .. }) | None => Vec::new(),
    };
    if let Err(e) = store.unsubscribe(FeedKey::Projects).await {
        tracing::debug!(error = %e, "project list unsubscribe failed");
    }
    Ok(projects)
}

/// Chooses the project to open: by name, else the first, else a new one.
async fn pick_project<S: TaskStore>(
    store: &Arc<S>,
    projects: &[Project],
    wanted: Option<&str>,
) -> io::Result<ProjectId> {
    if let Some(name) = wanted {
        if let Some(project) = projects.iter().find(|p| p.name == name) {
            return Ok(project.id.clone());
        }
        tracing::warn!(project = name, "project not found, opening the first one");
    }
    if let Some(project) = projects.first() {
        return Ok(project.id.clone());
    }

    let project = Project {
        id: ProjectId::new(),
        name: wanted.unwrap_or("My board").to_string(),
        order: OrderKeys::default().gap(),
        created_at: now_ms(),
    };
    let id = project.id.clone();
    store
        .commit(vec![lotion_proto::batch::WriteOp::PutProject(project)].into())
        .await
        .map_err(io::Error::other)?;
    Ok(id)
}

/// Offline store seeded with a small demo project.
fn demo_store() -> InMemoryStore {
    let project = Project {
        id: ProjectId::new(),
        name: "Getting started".to_string(),
        order: 100.0,
        created_at: now_ms(),
    };
    let seed = [
        (Column::NotStarted, "Write the launch checklist"),
        (Column::NotStarted, "Pick a color scheme"),
        (Column::NotStarted, "Invite the team"),
        (Column::InProgress, "Draft the onboarding doc"),
        (Column::Done, "Set up the board"),
    ];
    let mut next = [0.0_f64; 3];
    let tasks = seed
        .into_iter()
        .map(|(column, title)| {
            next[column.index()] += 100.0;
            Task {
                id: TaskId::new(),
                project_id: project.id.clone(),
                title: title.to_string(),
                column,
                order: next[column.index()],
                image_url: None,
            }
        })
        .collect();
    InMemoryStore::with_workspace(Workspace::from_documents(vec![project], tasks))
}
