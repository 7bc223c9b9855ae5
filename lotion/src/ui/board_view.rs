//! Board column rendering.

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem},
};

use lotion_proto::board::Column;

use super::theme;
use crate::app::{App, PromptKind};
use crate::board::BoardSession;

/// Render one column: its tasks, the drop cursor, and an open prompt.
pub fn render(frame: &mut Frame, area: Rect, column: Column, app: &App, session: &BoardSession) {
    let tasks = session.column(column);
    let focused = app.focus == column && app.drag.is_none();
    let selected = app.selected_index(session, column);
    let drop_index = app
        .drag
        .as_ref()
        .filter(|cursor| cursor.column == column)
        .map(|cursor| cursor.index);
    let dragged = app.drag.as_ref().map(|cursor| &cursor.active);

    let mut items: Vec<ListItem> = Vec::with_capacity(tasks.len() + 2);
    for (i, task) in tasks.iter().enumerate() {
        if drop_index == Some(i) {
            items.push(drop_marker());
        }
        let style = if dragged == Some(&task.id) {
            theme::dragging()
        } else if focused && i == selected {
            theme::selected()
        } else {
            theme::normal()
        };
        let mut spans = vec![Span::styled(task.title.clone(), style)];
        if task.image_url.is_some() {
            spans.push(Span::styled(" [img]", theme::dimmed()));
        }
        items.push(ListItem::new(Line::from(spans)));
    }
    if drop_index == Some(tasks.len()) {
        items.push(drop_marker());
    }
    if let Some(prompt) = &app.prompt
        && prompt.kind == PromptKind::AddTask(column)
    {
        items.push(ListItem::new(Line::from(vec![
            Span::styled("+ ", theme::highlighted()),
            Span::styled(format!("{}_", prompt.text), theme::normal()),
        ])));
    }

    let border_style = if focused || drop_index.is_some() {
        theme::highlighted()
    } else {
        theme::normal()
    };
    let block = Block::default()
        .title(Span::styled(
            format!(" {} ({}) ", column.title(), tasks.len()),
            theme::column_title(column),
        ))
        .borders(Borders::ALL)
        .border_style(border_style);

    frame.render_widget(List::new(items).block(block), area);
}

fn drop_marker() -> ListItem<'static> {
    ListItem::new(Line::from(Span::styled("▶ drop here", theme::drop_marker())))
}
