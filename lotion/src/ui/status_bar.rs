//! Status bar rendering.

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
};

use super::theme;
use crate::app::App;
use crate::notify::NotificationLevel;

/// Render the status bar at the bottom of the screen.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let help_text = if app.prompt.is_some() {
        "Enter: save | Esc: cancel"
    } else if app.drag.is_some() {
        "←→↑↓: move | Space: drop | Esc: cancel"
    } else {
        "Space: pick up | a: add | d: delete | n: project | []: switch | <>: reorder | q: quit"
    };

    let (dot_color, mode) = if app.online {
        (theme::SUCCESS, "Online")
    } else {
        (theme::OFFLINE, "Offline")
    };

    let mut spans = vec![
        Span::styled("Lotion v0.1.0", theme::bold()),
        Span::raw(" | "),
        Span::styled("●", theme::normal().fg(dot_color)),
        Span::raw(format!(" {mode}")),
    ];
    if let Some(synced) = &app.last_sync {
        spans.push(Span::styled(format!(" (synced {synced})"), theme::dimmed()));
    }
    if let Some(notification) = &app.notification {
        let color = match notification.level {
            NotificationLevel::Info => theme::SUCCESS,
            NotificationLevel::Error => theme::ERROR,
        };
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            notification.message.clone(),
            theme::bold().fg(color),
        ));
    }
    spans.push(Span::raw(" | "));
    spans.push(Span::styled(help_text, theme::dimmed()));

    let paragraph = Paragraph::new(Line::from(spans)).style(theme::status_bar_bg());
    frame.render_widget(paragraph, area);
}
