//! Terminal UI rendering.

pub mod board_view;
pub mod project_tabs;
pub mod status_bar;
pub mod theme;

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
};

use crate::app::App;
use crate::board::BoardSession;
use lotion_proto::board::Column;

/// Main draw function for the entire UI.
pub fn draw(frame: &mut Frame, app: &App, session: &BoardSession) {
    // Project tabs on top, status bar at the bottom.
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    project_tabs::render(frame, main_chunks[0], app, session);

    let column_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 3); 3])
        .split(main_chunks[1]);

    for column in Column::ALL {
        board_view::render(frame, column_chunks[column.index()], column, app, session);
    }

    status_bar::render(frame, main_chunks[2], app);
}
