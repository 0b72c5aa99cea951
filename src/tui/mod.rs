//! Terminal chat view
//!
//! Terminal user interface using Ratatui.

mod app;
mod compose;
mod log_capture;
mod log_pane;
mod messages;
mod ui;

pub use app::run;
pub use log_capture::LogBuffer;
