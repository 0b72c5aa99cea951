//! Conversation identity models

use serde::{Deserialize, Serialize};

/// One side of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    /// Participant type tag, e.g. "student" or "teacher".
    pub role: String,
}

impl Participant {
    pub fn new(id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
        }
    }
}

/// The (sender, receiver) tuple that scopes a message history.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationId {
    pub sender: Participant,
    pub receiver: Participant,
}

/// Everything a view needs to know about the conversation it shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationProps {
    /// The local (viewing) participant.
    pub sender: Participant,
    /// The remote participant.
    pub receiver: Participant,
    /// Display label for the remote participant.
    pub receiver_username: String,
}

impl ConversationProps {
    pub fn new(sender: Participant, receiver: Participant, receiver_username: &str) -> Self {
        Self {
            sender,
            receiver,
            receiver_username: receiver_username.to_string(),
        }
    }

    pub fn id(&self) -> ConversationId {
        ConversationId {
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
        }
    }

    /// Label for the remote participant; falls back to their id.
    pub fn receiver_label(&self) -> &str {
        if self.receiver_username.trim().is_empty() {
            &self.receiver.id
        } else {
            &self.receiver_username
        }
    }
}
