//! Project tab strip rendering.

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
};

use super::theme;
use crate::app::{App, PromptKind};
use crate::board::BoardSession;

/// Render the project list as a single line of tabs.
///
/// An open new-project prompt is shown as a trailing tab.
pub fn render(frame: &mut Frame, area: Rect, app: &App, session: &BoardSession) {
    let mut spans = vec![Span::styled(" Projects: ", theme::dimmed())];
    if session.projects().is_empty() {
        spans.push(Span::styled("(loading)", theme::dimmed()));
    }
    for project in session.projects() {
        let style = if &project.id == session.project_id() {
            theme::selected()
        } else {
            theme::normal()
        };
        spans.push(Span::styled(format!(" {} ", project.name), style));
        spans.push(Span::raw(" "));
    }
    if let Some(prompt) = &app.prompt
        && prompt.kind == PromptKind::NewProject
    {
        spans.push(Span::styled(format!(" + {}_ ", prompt.text), theme::highlighted()));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
