//! Conversation state and the rendering contract
//!
//! `ChatView` owns everything shown for one conversation: the draft, the
//! ordered message history and the connection flag. It performs no I/O;
//! `ChatSession` feeds it channel events and fetch results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::HistoryError;
use crate::auth::Credential;
use crate::models::{ConversationProps, Message};

/// How a completed history fetch is combined with what is already shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryPolicy {
    /// The fetched list replaces the local one wholesale.
    #[default]
    Replace,
    /// Local messages missing from the fetched list are kept, then sorted by timestamp.
    Merge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub direction: Direction,
    pub content: String,
    pub timestamp: String,
}

/// What the view shows right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// No credential: sign in first.
    SignInGate,
    /// Authorized, nothing to show yet.
    Empty { placeholder: String },
    Conversation(Vec<RenderedMessage>),
}

pub struct ChatView {
    props: ConversationProps,
    credential: Option<Credential>,
    policy: HistoryPolicy,
    draft: String,
    history: Vec<Message>,
    refetch_generation: u64,
    connected: bool,
}

impl ChatView {
    pub fn new(props: ConversationProps, credential: Option<Credential>) -> Self {
        Self {
            props,
            credential,
            policy: HistoryPolicy::default(),
            draft: String::new(),
            history: Vec::new(),
            refetch_generation: 0,
            connected: false,
        }
    }

    pub fn with_policy(mut self, policy: HistoryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn props(&self) -> &ConversationProps {
        &self.props
    }

    pub fn is_authorized(&self) -> bool {
        self.credential.is_some()
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Bumped by every successful send; each new value asks for a re-fetch.
    pub fn refetch_generation(&self) -> u64 {
        self.refetch_generation
    }

    /// Switch to another conversation. Messages of the old one are dropped.
    pub fn reset(&mut self, props: ConversationProps) {
        self.props = props;
        self.history.clear();
        self.connected = false;
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Update the receiver's display name; history and connection are untouched.
    pub fn rename_receiver(&mut self, name: impl Into<String>) {
        self.props.receiver_username = name.into();
    }

    /// Turn the draft into an outgoing message.
    ///
    /// No-op returning `None` when the trimmed draft is empty or no channel
    /// connection is established. Otherwise the message is appended at once
    /// (before any server confirmation), the refetch generation advances and
    /// the draft is cleared; the caller emits the returned message.
    pub fn send_message(&mut self, now: DateTime<Utc>) -> Option<Message> {
        let content = self.draft.trim();
        if content.is_empty() || !self.connected {
            return None;
        }

        let msg = Message::outgoing(&self.props, content, now);
        self.history.push(msg.clone());
        self.refetch_generation += 1;
        self.draft.clear();
        Some(msg)
    }

    /// Append a message from the channel, in arrival order.
    pub fn receive(&mut self, msg: Message) {
        self.history.push(msg);
    }

    /// Apply a finished history fetch. Failures leave an empty conversation.
    pub fn apply_history(&mut self, result: Result<Vec<Message>, HistoryError>) {
        match result {
            Ok(fetched) => {
                tracing::debug!("Loaded {} messages", fetched.len());
                self.history = match self.policy {
                    HistoryPolicy::Replace => fetched,
                    HistoryPolicy::Merge => merge(fetched, &self.history),
                };
            }
            Err(e) => {
                tracing::warn!("Failed to fetch messages: {}", e);
                self.history.clear();
            }
        }
    }

    pub fn render(&self) -> Rendered {
        if self.credential.is_none() {
            return Rendered::SignInGate;
        }
        if self.history.is_empty() {
            return Rendered::Empty {
                placeholder: format!("No Messages Yet With {}", self.props.receiver_label()),
            };
        }

        let viewer = &self.props.sender.id;
        Rendered::Conversation(
            self.history
                .iter()
                .map(|msg| RenderedMessage {
                    direction: if msg.is_from(viewer) {
                        Direction::Outgoing
                    } else {
                        Direction::Incoming
                    },
                    content: msg.content.clone(),
                    timestamp: msg.timestamp.clone(),
                })
                .collect(),
        )
    }
}

/// Fetched messages plus local ones the server did not return, oldest first.
fn merge(mut fetched: Vec<Message>, local: &[Message]) -> Vec<Message> {
    for msg in local {
        if !fetched.contains(msg) {
            fetched.push(msg.clone());
        }
    }
    // Stable: equal or unparsable timestamps keep their relative order.
    fetched.sort_by_key(|m| m.sent_at().map_or(i64::MAX, |t| t.timestamp_millis()));
    fetched
}
