//! Frame layout for the TUI

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
    Frame,
};

use super::app::App;
use super::{compose, log_pane, messages};
use crate::chat::ChatView;

/// Returns status indicator symbol and color based on connection state
fn status_indicator(connected: bool) -> (&'static str, Color, &'static str) {
    if connected {
        ("*", Color::Green, "connected")
    } else {
        ("o", Color::Red, "disconnected")
    }
}

/// Main render function
pub fn render(frame: &mut Frame, app: &App, view: &ChatView) {
    let log_height = if app.log_pane.visible {
        log_pane::LOG_PANE_HEIGHT
    } else {
        0
    };

    let [header_area, messages_area, log_area, compose_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(log_height),
        Constraint::Length(compose::COMPOSE_HEIGHT),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    render_header(header_area, frame.buffer_mut(), view);

    let title = format!("Chat with {}", view.props().receiver_label());
    messages::render(messages_area, frame.buffer_mut(), &view.render(), &title);

    if app.log_pane.visible {
        log_pane::render(log_area, frame.buffer_mut(), &app.log_pane);
    }

    compose::render(compose_area, frame, &app.compose, view.is_authorized());

    render_status(status_area, frame.buffer_mut(), app);
}

fn render_header(area: Rect, buf: &mut Buffer, view: &ChatView) {
    let (symbol, color, label) = status_indicator(view.is_connected());
    let me = &view.props().sender;

    let left = format!(" duochat  {} ({})", me.id, me.role);
    let right = format!("{} {} ", symbol, label);
    let padding = (area.width as usize).saturating_sub(left.len() + right.len());

    let line = Line::from(vec![
        Span::styled(
            left,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" ".repeat(padding)),
        Span::styled(right, Style::default().fg(color)),
    ]);

    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

fn render_status(area: Rect, buf: &mut Buffer, app: &App) {
    let line = match &app.status_message {
        Some(msg) => Line::from(Span::styled(
            format!(" {} ", msg),
            Style::default().fg(Color::Yellow),
        )),
        None => {
            let sep = Span::styled(" | ", Style::default().fg(Color::DarkGray));
            let hint = |s: &'static str| Span::styled(s, Style::default().fg(Color::Gray));
            Line::from(vec![
                hint(" Enter: send"),
                sep.clone(),
                hint("Ctrl-U: clear"),
                sep.clone(),
                hint("F2: log"),
                sep,
                hint("Esc: quit"),
            ])
        }
    };

    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}
