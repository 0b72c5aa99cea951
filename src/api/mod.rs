//! HTTP API for the chat service

pub mod client;
mod history;

pub use client::HistoryClient;
pub use history::{read_history, HistoryError, HistoryService, SignedOut};
