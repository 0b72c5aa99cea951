//! Compose box: single-line text input with cursor.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthChar;

/// Height of the compose box: border + input line + border.
pub const COMPOSE_HEIGHT: u16 = 3;

/// Editing state for the compose box.
#[derive(Default)]
pub struct ComposeState {
    /// Current input text.
    pub input: String,
    /// Cursor position (character offset into `input`).
    pub cursor_pos: usize,
}

impl ComposeState {
    pub fn insert_char(&mut self, c: char) {
        let byte_pos = self.char_to_byte(self.cursor_pos);
        self.input.insert(byte_pos, c);
        self.cursor_pos += 1;
    }

    /// Delete the character before the cursor.
    pub fn backspace(&mut self) {
        if self.cursor_pos == 0 {
            return;
        }
        let start = self.char_to_byte(self.cursor_pos - 1);
        let end = self.char_to_byte(self.cursor_pos);
        self.input.drain(start..end);
        self.cursor_pos -= 1;
    }

    /// Delete the character under the cursor.
    pub fn delete(&mut self) {
        if self.cursor_pos >= self.input.chars().count() {
            return;
        }
        let start = self.char_to_byte(self.cursor_pos);
        let end = self.char_to_byte(self.cursor_pos + 1);
        self.input.drain(start..end);
    }

    pub fn move_left(&mut self) {
        self.cursor_pos = self.cursor_pos.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor_pos = (self.cursor_pos + 1).min(self.input.chars().count());
    }

    pub fn move_home(&mut self) {
        self.cursor_pos = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor_pos = self.input.chars().count();
    }

    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor_pos = 0;
    }

    fn char_to_byte(&self, char_pos: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }
}

/// Render the compose box and place the terminal cursor when focused.
pub fn render(area: Rect, frame: &mut Frame, state: &ComposeState, enabled: bool) {
    let border_style = if enabled {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(border_style);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height == 0 || inner.width < 2 {
        return;
    }
    let input_area = Rect::new(inner.x, inner.y, inner.width, 1);

    if state.input.is_empty() {
        let placeholder = Span::styled(
            " Type a message...",
            Style::default().fg(Color::DarkGray),
        );
        frame.render_widget(Paragraph::new(Line::from(placeholder)), input_area);
        if enabled {
            frame.set_cursor_position((input_area.x + 1, input_area.y));
        }
        return;
    }

    let view = visible_window(&state.input, state.cursor_pos, input_area.width as usize - 1);
    let line = Line::from(Span::styled(
        format!(" {}", view.text),
        Style::default().fg(Color::White),
    ));
    frame.render_widget(Paragraph::new(line), input_area);
    if enabled {
        frame.set_cursor_position((input_area.x + 1 + view.cursor_col as u16, input_area.y));
    }
}

/// The slice of input that fits on screen, and the cursor column within it.
#[derive(Debug, PartialEq, Eq)]
struct Window {
    text: String,
    cursor_col: usize,
}

/// Scroll the input horizontally so the cursor stays visible in `width` columns.
fn visible_window(input: &str, cursor_pos: usize, width: usize) -> Window {
    if width == 0 {
        return Window {
            text: String::new(),
            cursor_col: 0,
        };
    }

    let chars: Vec<(char, usize)> = input
        .chars()
        .map(|c| (c, c.width().unwrap_or(0)))
        .collect();
    let cursor_pos = cursor_pos.min(chars.len());

    // Walk left from the cursor until the window is full, keeping one column for it.
    let mut start = cursor_pos;
    let mut used = 1;
    while start > 0 && used + chars[start - 1].1 <= width {
        used += chars[start - 1].1;
        start -= 1;
    }

    let cursor_col: usize = chars[start..cursor_pos].iter().map(|(_, w)| w).sum();
    let mut text = String::new();
    let mut cols = 0;
    for &(c, w) in &chars[start..] {
        if cols + w > width {
            break;
        }
        text.push(c);
        cols += w;
    }

    Window { text, cursor_col }
}
