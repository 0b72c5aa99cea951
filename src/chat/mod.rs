//! Headless two-party conversation: state, rendering contract and lifecycle

mod session;
mod view;

pub use session::ChatSession;
pub use view::{ChatView, Direction, HistoryPolicy, Rendered, RenderedMessage};
