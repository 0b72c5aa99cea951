//! Data models for the conversation

mod conversation;
mod message;

pub use conversation::*;
pub use message::*;
