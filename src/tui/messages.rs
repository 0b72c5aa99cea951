//! Messages pane: the conversation, its empty placeholder, or the sign-in gate.

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};
use unicode_width::UnicodeWidthChar;

use crate::chat::{Direction, Rendered, RenderedMessage};

/// Bubbles take at most this share of the pane width (percent).
const BUBBLE_WIDTH_PCT: usize = 75;

/// Render the messages pane, pinned to the newest message.
pub fn render(area: Rect, buf: &mut Buffer, rendered: &Rendered, title: &str) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Plain)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            format!(" {} ", title),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let lines = build_lines(rendered, inner.width as usize);
    let visible = inner.height as usize;
    let skip = lines.len().saturating_sub(visible);

    let shown: Vec<Line<'static>> = lines.into_iter().skip(skip).collect();
    Paragraph::new(shown).render(inner, buf);
}

/// Lay out the rendering contract as terminal lines.
fn build_lines(rendered: &Rendered, width: usize) -> Vec<Line<'static>> {
    match rendered {
        Rendered::SignInGate => vec![
            Line::from(""),
            Line::from(Span::styled(
                "Unauthorized, please sign in",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ))
            .alignment(Alignment::Center),
            Line::from(Span::styled(
                "Run `duochat login --token <TOKEN>` and restart",
                Style::default().fg(Color::Gray),
            ))
            .alignment(Alignment::Center),
        ],
        Rendered::Empty { placeholder } => vec![
            Line::from(""),
            Line::from(Span::styled(
                placeholder.clone(),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            ))
            .alignment(Alignment::Center),
        ],
        Rendered::Conversation(messages) => {
            let bubble = (width * BUBBLE_WIDTH_PCT / 100).max(10);
            let mut lines = Vec::new();
            for msg in messages {
                push_bubble(&mut lines, msg, bubble);
            }
            lines
        }
    }
}

fn push_bubble(lines: &mut Vec<Line<'static>>, msg: &RenderedMessage, width: usize) {
    let (alignment, style) = match msg.direction {
        Direction::Outgoing => (Alignment::Right, Style::default().fg(Color::Cyan)),
        Direction::Incoming => (Alignment::Left, Style::default().fg(Color::White)),
    };

    for row in wrap(&msg.content, width) {
        lines.push(Line::from(Span::styled(row, style)).alignment(alignment));
    }
    lines.push(
        Line::from(Span::styled(
            short_time(&msg.timestamp),
            Style::default().fg(Color::DarkGray),
        ))
        .alignment(alignment),
    );
}

/// "2024-03-01T12:30:05.000Z" -> "12:30"; anything else is shown as-is.
fn short_time(timestamp: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(timestamp)
        .map(|t| t.with_timezone(&chrono::Local).format("%H:%M").to_string())
        .unwrap_or_else(|_| timestamp.to_string())
}

/// Greedy word wrap by display width; words longer than a row are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut rows = Vec::new();

    for paragraph in text.split('\n') {
        let mut row = String::new();
        let mut row_w = 0;

        for word in paragraph.split(' ') {
            let word_w: usize = word.chars().map(|c| c.width().unwrap_or(0)).sum();
            let sep = usize::from(!row.is_empty());

            if row_w + sep + word_w <= width {
                if sep == 1 {
                    row.push(' ');
                }
                row.push_str(word);
                row_w += sep + word_w;
                continue;
            }

            if !row.is_empty() {
                rows.push(std::mem::take(&mut row));
                row_w = 0;
            }
            for c in word.chars() {
                let cw = c.width().unwrap_or(0);
                if row_w + cw > width && !row.is_empty() {
                    rows.push(std::mem::take(&mut row));
                    row_w = 0;
                }
                row.push(c);
                row_w += cw;
            }
        }
        rows.push(row);
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_wrap_words() {
        assert_eq!(wrap("hello world", 20), vec!["hello world"]);
        assert_eq!(wrap("hello world", 7), vec!["hello", "world"]);
        assert_eq!(wrap("a\nb", 10), vec!["a", "b"]);
    }

    #[test]
    fn test_wrap_splits_long_word() {
        assert_eq!(wrap("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert_eq!(wrap("hi abcdefgh", 4), vec!["hi", "abcd", "efgh"]);
    }

    #[test]
    fn test_directions_align() {
        let rendered = Rendered::Conversation(vec![
            RenderedMessage {
                direction: Direction::Outgoing,
                content: "mine".to_string(),
                timestamp: "t".to_string(),
            },
            RenderedMessage {
                direction: Direction::Incoming,
                content: "theirs".to_string(),
                timestamp: "t".to_string(),
            },
        ]);
        let lines = build_lines(&rendered, 40);
        assert_eq!(lines.len(), 4);
        assert_eq!(line_text(&lines[0]), "mine");
        assert_eq!(lines[0].alignment, Some(Alignment::Right));
        assert_eq!(line_text(&lines[2]), "theirs");
        assert_eq!(lines[2].alignment, Some(Alignment::Left));
    }

    #[test]
    fn test_placeholder_and_gate() {
        let lines = build_lines(
            &Rendered::Empty {
                placeholder: "No Messages Yet With Ms. Lee".to_string(),
            },
            40,
        );
        assert!(lines
            .iter()
            .any(|l| line_text(l) == "No Messages Yet With Ms. Lee"));

        let lines = build_lines(&Rendered::SignInGate, 40);
        assert!(lines.iter().any(|l| line_text(l).contains("sign in")));
    }

    #[test]
    fn test_short_time_passthrough() {
        assert_eq!(short_time("not a time"), "not a time");
    }
}
