//! Log pane: captured tracing output, toggled with F2.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use super::log_capture::LogBuffer;

/// Lines kept for display; older ones are discarded.
const MAX_LINES: usize = 1000;

/// Height of the pane when visible.
pub const LOG_PANE_HEIGHT: u16 = 8;

pub struct LogPaneState {
    source: LogBuffer,
    lines: Vec<String>,
    pub visible: bool,
}

impl LogPaneState {
    pub fn new(source: LogBuffer) -> Self {
        Self {
            source,
            lines: Vec::new(),
            visible: false,
        }
    }

    /// Pull new lines from the capture buffer. Call once per frame.
    pub fn refresh(&mut self) {
        self.lines.extend(self.source.drain());
        if self.lines.len() > MAX_LINES {
            let excess = self.lines.len() - MAX_LINES;
            self.lines.drain(..excess);
        }
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }

    #[cfg(test)]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

/// Render the newest lines that fit.
pub fn render(area: Rect, buf: &mut Buffer, state: &LogPaneState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            " Log ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let start = state.lines.len().saturating_sub(inner.height as usize);
    let lines: Vec<Line> = state.lines[start..]
        .iter()
        .map(|line| {
            Line::from(Span::styled(
                line.clone(),
                Style::default().fg(level_color(line)),
            ))
        })
        .collect();
    Paragraph::new(lines).render(inner, buf);
}

/// Color by the level tag the fmt layer writes into each line.
fn level_color(line: &str) -> Color {
    if line.contains("ERROR") {
        Color::Red
    } else if line.contains(" WARN") {
        Color::Yellow
    } else if line.contains(" INFO") {
        Color::Green
    } else {
        Color::DarkGray
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_accumulates_and_caps() {
        let source = LogBuffer::new();
        let mut pane = LogPaneState::new(source.clone());

        source.push("a".to_string());
        pane.refresh();
        source.push("b".to_string());
        pane.refresh();
        assert_eq!(pane.lines(), &["a".to_string(), "b".to_string()]);

        for round in 0..3 {
            for i in 0..400 {
                source.push(format!("{}-{}", round, i));
            }
            pane.refresh();
        }
        assert_eq!(pane.lines().len(), MAX_LINES);
        assert_eq!(pane.lines().last().map(String::as_str), Some("2-399"));
    }

    #[test]
    fn test_toggle() {
        let mut pane = LogPaneState::new(LogBuffer::new());
        assert!(!pane.visible);
        pane.toggle();
        assert!(pane.visible);
    }

    #[test]
    fn test_level_color() {
        assert_eq!(level_color("2024-03-01T12:00:00Z  WARN channel closed"), Color::Yellow);
        assert_eq!(level_color("2024-03-01T12:00:00Z ERROR boom"), Color::Red);
        assert_eq!(level_color("2024-03-01T12:00:00Z DEBUG frame"), Color::DarkGray);
    }
}
