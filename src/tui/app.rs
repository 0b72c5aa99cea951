//! TUI application state and main event loop

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::{FutureExt, StreamExt};
use ratatui::DefaultTerminal;

use super::compose::ComposeState;
use super::log_capture::LogBuffer;
use super::log_pane::LogPaneState;
use super::ui;
use crate::chat::ChatSession;

/// Redraw at least this often so the log pane stays current.
const IDLE_REDRAW: Duration = Duration::from_millis(250);

pub(super) const CONNECTING: &str = "Connecting...";

/// What a key press asks the loop to do beyond editing.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    Send,
    Quit,
}

/// Application state
pub struct App {
    pub compose: ComposeState,
    pub log_pane: LogPaneState,
    /// One-shot hint shown in the status bar until the next key press
    pub status_message: Option<String>,
    pub should_exit: bool,
}

impl App {
    pub fn new(logs: LogBuffer) -> Self {
        Self {
            compose: ComposeState::default(),
            log_pane: LogPaneState::new(logs),
            status_message: None,
            should_exit: false,
        }
    }

    /// Apply a key press to local state.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Action> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        self.status_message = None;

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => Some(Action::Quit),
            KeyCode::Char('c') if ctrl => Some(Action::Quit),
            KeyCode::Char('u') if ctrl => {
                self.compose.clear();
                None
            }
            KeyCode::Char(c) if !ctrl => {
                self.compose.insert_char(c);
                None
            }
            KeyCode::Enter => Some(Action::Send),
            KeyCode::Backspace => {
                self.compose.backspace();
                None
            }
            KeyCode::Delete => {
                self.compose.delete();
                None
            }
            KeyCode::Left => {
                self.compose.move_left();
                None
            }
            KeyCode::Right => {
                self.compose.move_right();
                None
            }
            KeyCode::Home => {
                self.compose.move_home();
                None
            }
            KeyCode::End => {
                self.compose.move_end();
                None
            }
            KeyCode::F(2) => {
                self.log_pane.toggle();
                None
            }
            _ => None,
        }
    }
}

/// Run the TUI for one conversation, restoring the terminal even on panic.
pub async fn run(session: ChatSession, logs: LogBuffer) -> Result<()> {
    let mut terminal = ratatui::init();
    let result = AssertUnwindSafe(run_app(&mut terminal, session, logs))
        .catch_unwind()
        .await;
    ratatui::restore();

    match result {
        Ok(r) => r,
        Err(e) => std::panic::resume_unwind(e),
    }
}

async fn run_app(
    terminal: &mut DefaultTerminal,
    mut session: ChatSession,
    logs: LogBuffer,
) -> Result<()> {
    let mut app = App::new(logs);
    let mut events = EventStream::new();

    // Show the frame before connecting; the handshake can take a while.
    if session.view().is_authorized() {
        app.status_message = Some(CONNECTING.to_string());
    }
    terminal.draw(|frame| ui::render(frame, &app, session.view()))?;
    session.mount().await;
    app.status_message = None;

    while !app.should_exit {
        app.log_pane.refresh();
        terminal.draw(|frame| ui::render(frame, &app, session.view()))?;

        tokio::select! {
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) => {
                    let action = app.handle_key(key);
                    session.view_mut().set_draft(app.compose.input.clone());
                    match action {
                        Some(Action::Send) => send(&mut app, &mut session).await,
                        Some(Action::Quit) => app.should_exit = true,
                        None => {}
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    session.teardown().await;
                    return Err(e.into());
                }
                None => app.should_exit = true,
            },
            event = session.next_event() => session.apply(event),
            _ = tokio::time::sleep(IDLE_REDRAW) => {}
        }
    }

    session.teardown().await;
    Ok(())
}

async fn send(app: &mut App, session: &mut ChatSession) {
    if session.send().await.is_some() {
        app.compose.clear();
        return;
    }
    let view = session.view();
    app.status_message = if !view.is_authorized() {
        Some("Not signed in".to_string())
    } else if !view.is_connected() {
        Some("Not connected, message not sent".to_string())
    } else {
        None
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn test_typing_and_send() {
        let mut app = App::new(LogBuffer::new());
        for c in "hi".chars() {
            assert_eq!(app.handle_key(press(KeyCode::Char(c))), None);
        }
        assert_eq!(app.compose.input, "hi");
        assert_eq!(app.handle_key(press(KeyCode::Enter)), Some(Action::Send));
        // Sending is the loop's job; the box is untouched here.
        assert_eq!(app.compose.input, "hi");
    }

    #[test]
    fn test_control_keys() {
        let mut app = App::new(LogBuffer::new());
        app.handle_key(press(KeyCode::Char('x')));
        assert_eq!(app.handle_key(ctrl('u')), None);
        assert!(app.compose.input.is_empty());
        assert_eq!(app.handle_key(ctrl('c')), Some(Action::Quit));
        assert_eq!(app.handle_key(press(KeyCode::Esc)), Some(Action::Quit));
    }

    #[test]
    fn test_f2_toggles_log_and_release_is_ignored() {
        let mut app = App::new(LogBuffer::new());
        app.handle_key(press(KeyCode::F(2)));
        assert!(app.log_pane.visible);

        let release = KeyEvent {
            code: KeyCode::Char('z'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        assert_eq!(app.handle_key(release), None);
        assert!(app.compose.input.is_empty());
    }

    #[test]
    fn test_key_clears_status_message() {
        let mut app = App::new(LogBuffer::new());
        app.status_message = Some("Not connected".to_string());
        app.handle_key(press(KeyCode::Left));
        assert!(app.status_message.is_none());
    }
}
