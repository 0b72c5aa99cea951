//! Real-time event channel
//!
//! The chat service speaks Socket.IO over WebSocket. Clients `join` with
//! their identity, emit `sendMessage`, and receive `receiveMessage` events
//! routed to them by the server.

pub mod packet;
pub mod socketio;
pub mod websocket;

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time;

use crate::auth::TokenStore;
use crate::config::Config;
use crate::models::{ConversationProps, Message, Participant};
pub use packet::PacketError;
pub use socketio::SocketIoConnector;

/// Outbound: register this connection for a participant.
pub const JOIN: &str = "join";
/// Outbound: deliver a message to its receiver.
pub const SEND_MESSAGE: &str = "sendMessage";
/// Inbound: a message addressed to us.
pub const RECEIVE_MESSAGE: &str = "receiveMessage";

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("invalid endpoint {0}")]
    InvalidEndpoint(String),
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("connection rejected by server: {0}")]
    Rejected(String),
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("channel is closed")]
    Closed,
    #[error(transparent)]
    Packet(#[from] PacketError),
}

/// A bidirectional, event-named connection to the chat server.
#[async_trait]
pub trait RealtimeChannel: Send {
    /// Emit an event. Fire-and-forget: no acknowledgment is awaited.
    async fn emit(&mut self, event: &str, payload: Value) -> Result<(), ChannelError>;

    /// Start listening for `event`; payloads arrive in order on the receiver.
    /// The receiver ends when the connection goes away.
    fn subscribe(&mut self, event: &str) -> mpsc::UnboundedReceiver<Value>;

    /// Stop listening for `event`.
    fn unsubscribe(&mut self, event: &str);

    /// Close the connection. Calling it again is a no-op.
    async fn disconnect(&mut self) -> Result<(), ChannelError>;
}

/// Opens fresh channel connections.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn RealtimeChannel>, ChannelError>;
}

/// Payload of the `join` event.
pub fn join_payload(participant: &Participant) -> Value {
    serde_json::json!({
        "senderId": participant.id,
        "senderRole": participant.role,
    })
}

async fn connect(connector: &dyn ChannelConnector) -> Result<Box<dyn RealtimeChannel>> {
    connector
        .connect()
        .await
        .context("Failed to connect to chat channel")
}

/// Announce `participant` on the connection.
async fn join(channel: &mut dyn RealtimeChannel, participant: &Participant) -> Result<()> {
    channel
        .emit(JOIN, join_payload(participant))
        .await
        .context("Failed to join channel")?;
    tracing::info!("Joined channel as {} ({})", participant.id, participant.role);
    Ok(())
}

/// Send a single message and disconnect (CLI `send` command).
pub async fn send_once(config: &Config, receiver: Participant, content: &str) -> Result<()> {
    let sender = config.participant()?;
    config
        .credential()
        .context("Not signed in. Run 'duochat login --token <TOKEN>' first.")?;

    let content = content.trim();
    anyhow::ensure!(!content.is_empty(), "Message must not be empty");

    let props = ConversationProps::new(sender.clone(), receiver, "");
    let msg = Message::outgoing(&props, content, chrono::Utc::now());

    let connector = SocketIoConnector::new(config.endpoint());
    let mut channel = connect(&connector).await?;
    join(channel.as_mut(), &sender).await?;
    let payload = serde_json::to_value(&msg).context("Failed to encode message")?;
    channel
        .emit(SEND_MESSAGE, payload)
        .await
        .context("Failed to send message")?;
    channel.disconnect().await?;

    println!("Message sent.");
    Ok(())
}

/// Print incoming messages until Ctrl-C (CLI `listen` command).
///
/// Reconnects with exponential backoff (1s, 2s, 4s, ... capped at 64s);
/// a connection that stayed up for a minute resets the backoff.
pub async fn listen(config: &Config) -> Result<()> {
    let sender = config.participant()?;
    config
        .credential()
        .context("Not signed in. Run 'duochat login --token <TOKEN>' first.")?;
    let connector = SocketIoConnector::new(config.endpoint());

    let stability_threshold = Duration::from_secs(60);
    let mut backoff = 1u64;

    loop {
        let started = Instant::now();
        match listen_once(&connector, &sender).await {
            Ok(true) => return Ok(()),
            Ok(false) => tracing::warn!("Channel closed by server"),
            Err(e) => tracing::warn!("Channel error: {:#}", e),
        }

        if started.elapsed() >= stability_threshold {
            backoff = 1;
        }
        tracing::info!("Reconnecting in {}s...", backoff);

        tokio::select! {
            _ = time::sleep(Duration::from_secs(backoff)) => {}
            _ = tokio::signal::ctrl_c() => {
                println!("Shutting down...");
                return Ok(());
            }
        }
        backoff = (backoff * 2).min(64);
    }
}

/// One connection's worth of listening. Returns `true` on Ctrl-C.
async fn listen_once(connector: &dyn ChannelConnector, sender: &Participant) -> Result<bool> {
    let mut channel = connect(connector).await?;
    // Subscribe first so messages routed right after the join are not missed.
    let mut inbound = channel.subscribe(RECEIVE_MESSAGE);
    join(channel.as_mut(), sender).await?;

    println!("Listening for messages... (Ctrl-C to stop)");

    let shutdown = loop {
        tokio::select! {
            payload = inbound.recv() => match payload {
                Some(payload) => match serde_json::from_value::<Message>(payload) {
                    Ok(msg) => println!("[{}] {}: {}", msg.timestamp, msg.sender_id, msg.content),
                    Err(e) => tracing::warn!("Skipping malformed message: {}", e),
                },
                None => break false,
            },
            _ = tokio::signal::ctrl_c() => {
                println!("Shutting down...");
                break true;
            }
        }
    };

    channel.unsubscribe(RECEIVE_MESSAGE);
    channel.disconnect().await?;
    Ok(shutdown)
}
