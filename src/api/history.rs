//! Message history reads

use anyhow::Context;
use async_trait::async_trait;

use super::client::HistoryClient;
use crate::auth::TokenStore;
use crate::config::Config;
use crate::models::{ConversationId, Message, Participant};

/// Ways a history read can fail. The view treats all of them the same.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("401 Unauthorized for {0}. Token may be invalid -- run 'duochat login'.")]
    Unauthorized(String),
    #[error("HTTP {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },
    #[error("malformed history response: {0}")]
    Malformed(String),
}

/// Source of the durable record of past messages for a participant pair.
#[async_trait]
pub trait HistoryService: Send + Sync {
    async fn fetch(&self, conversation: &ConversationId) -> Result<Vec<Message>, HistoryError>;
}

/// Stand-in used when no credential is available; every read is unauthorized.
pub struct SignedOut;

#[async_trait]
impl HistoryService for SignedOut {
    async fn fetch(&self, conversation: &ConversationId) -> Result<Vec<Message>, HistoryError> {
        Err(HistoryError::Unauthorized(format!(
            "chat/{}/{}/{}/{}",
            conversation.sender.id,
            conversation.sender.role,
            conversation.receiver.id,
            conversation.receiver.role
        )))
    }
}

/// Decode a history body. Anything but an array of messages is malformed.
pub fn parse_history(body: serde_json::Value) -> Result<Vec<Message>, HistoryError> {
    if !body.is_array() {
        let kind = match body {
            serde_json::Value::Null => "null",
            serde_json::Value::Bool(_) => "boolean",
            serde_json::Value::Number(_) => "number",
            serde_json::Value::String(_) => "string",
            serde_json::Value::Object(_) => "object",
            serde_json::Value::Array(_) => "array",
        };
        return Err(HistoryError::Malformed(format!(
            "expected an array, got {}",
            kind
        )));
    }
    serde_json::from_value(body).map_err(|e| HistoryError::Malformed(e.to_string()))
}

/// Print the conversation with `receiver` (CLI `history` command).
pub async fn read_history(config: &Config, receiver: Participant) -> anyhow::Result<()> {
    let sender = config.participant()?;
    let credential = config
        .credential()
        .context("Not signed in. Run 'duochat login --token <TOKEN>' first.")?;
    let client = HistoryClient::new(&config.endpoint(), credential)?;

    let conversation = ConversationId {
        sender: sender.clone(),
        receiver,
    };
    let msgs = client
        .fetch(&conversation)
        .await
        .context("Failed to fetch messages")?;

    if msgs.is_empty() {
        println!("(no messages)");
        return Ok(());
    }

    for msg in &msgs {
        let arrow = if msg.is_from(&sender.id) { ">" } else { "<" };
        println!("[{}] {} {}: {}", msg.timestamp, arrow, msg.sender_id, msg.content);
    }

    Ok(())
}
