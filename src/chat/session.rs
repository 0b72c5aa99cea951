//! Conversation lifecycle: channel connection, history fetches, event pump
//!
//! Everything here runs on the caller's task. Fetches are spawned, scoped to
//! a `CancellationToken` per conversation, and report back over an mpsc
//! queue so their results are applied on the same task as everything else.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::view::ChatView;
use crate::api::{HistoryError, HistoryService};
use crate::channel::{
    join_payload, ChannelConnector, RealtimeChannel, JOIN, RECEIVE_MESSAGE, SEND_MESSAGE,
};
use crate::models::{ConversationProps, Message};

/// Something that happened outside the view and must be applied to it.
#[derive(Debug)]
pub enum SessionEvent {
    /// Payload of a `receiveMessage` event.
    Received(Value),
    /// The inbound stream ended.
    ChannelClosed,
    /// A history fetch finished.
    HistoryLoaded {
        scope: u64,
        result: Result<Vec<Message>, HistoryError>,
    },
}

struct FetchDone {
    scope: u64,
    result: Result<Vec<Message>, HistoryError>,
}

pub struct ChatSession {
    view: ChatView,
    connector: Arc<dyn ChannelConnector>,
    history: Arc<dyn HistoryService>,
    channel: Option<Box<dyn RealtimeChannel>>,
    inbound: Option<mpsc::UnboundedReceiver<Value>>,
    scope: CancellationToken,
    scope_id: u64,
    fetch_tx: mpsc::UnboundedSender<FetchDone>,
    fetch_rx: mpsc::UnboundedReceiver<FetchDone>,
}

impl ChatSession {
    pub fn new(
        view: ChatView,
        connector: Arc<dyn ChannelConnector>,
        history: Arc<dyn HistoryService>,
    ) -> Self {
        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
        Self {
            view,
            connector,
            history,
            channel: None,
            inbound: None,
            scope: CancellationToken::new(),
            scope_id: 0,
            fetch_tx,
            fetch_rx,
        }
    }

    pub fn view(&self) -> &ChatView {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ChatView {
        &mut self.view
    }

    /// Start the conversation: connect, join, subscribe, fetch history.
    ///
    /// Does nothing without a credential.
    pub async fn mount(&mut self) {
        if !self.view.is_authorized() {
            tracing::info!("No credential, conversation stays behind the sign-in gate");
            return;
        }
        self.open_channel().await;
        self.schedule_fetch();
    }

    /// Stop the conversation: cancel fetches, unsubscribe, then disconnect.
    ///
    /// The session can be mounted again afterwards.
    pub async fn teardown(&mut self) {
        self.scope.cancel();
        self.new_scope();

        if let Some(mut channel) = self.channel.take() {
            channel.unsubscribe(RECEIVE_MESSAGE);
            if let Err(e) = channel.disconnect().await {
                tracing::warn!("Channel disconnect failed: {}", e);
            }
        }
        self.inbound = None;
        self.view.set_connected(false);
    }

    /// Show a different conversation.
    ///
    /// A new local participant reopens the channel; a new remote participant
    /// only needs a fresh history fetch. A new display name alone changes
    /// nothing but the label.
    pub async fn set_conversation(&mut self, props: ConversationProps) {
        if props.id() == self.view.props().id() {
            self.view.rename_receiver(props.receiver_username);
            return;
        }

        if props.sender != self.view.props().sender {
            self.teardown().await;
            self.view.reset(props);
            self.mount().await;
        } else {
            let connected = self.view.is_connected();
            self.scope.cancel();
            self.view.reset(props);
            self.view.set_connected(connected);
            self.new_scope();
            self.schedule_fetch();
        }
    }

    /// Send the draft. Returns the message when one was sent.
    pub async fn send(&mut self) -> Option<Message> {
        let msg = self.view.send_message(Utc::now())?;

        match serde_json::to_value(&msg) {
            Ok(payload) => {
                if let Some(channel) = self.channel.as_mut() {
                    if let Err(e) = channel.emit(SEND_MESSAGE, payload).await {
                        tracing::warn!("Failed to emit message: {}", e);
                    }
                }
            }
            Err(e) => tracing::warn!("Failed to encode message: {}", e),
        }

        tracing::debug!(
            "Sent message, refetching history (generation {})",
            self.view.refetch_generation()
        );
        self.schedule_fetch();
        Some(msg)
    }

    /// Wait for the next channel event or fetch completion.
    ///
    /// Pends forever when there is nothing left to wait for, so it is meant
    /// to sit in a `tokio::select!` next to user input.
    pub async fn next_event(&mut self) -> SessionEvent {
        tokio::select! {
            payload = recv_inbound(&mut self.inbound) => match payload {
                Some(payload) => SessionEvent::Received(payload),
                None => SessionEvent::ChannelClosed,
            },
            Some(done) = self.fetch_rx.recv() => SessionEvent::HistoryLoaded {
                scope: done.scope,
                result: done.result,
            },
        }
    }

    pub fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Received(payload) => match serde_json::from_value::<Message>(payload) {
                Ok(msg) => self.view.receive(msg),
                Err(e) => tracing::warn!("Skipping malformed message: {}", e),
            },
            SessionEvent::ChannelClosed => {
                tracing::warn!("Channel closed, no more live messages");
                self.inbound = None;
                self.view.set_connected(false);
            }
            SessionEvent::HistoryLoaded { scope, result } => {
                if scope != self.scope_id || self.scope.is_cancelled() {
                    tracing::debug!("Dropping history from a finished conversation");
                    return;
                }
                self.view.apply_history(result);
            }
        }
    }

    async fn open_channel(&mut self) {
        let sender = self.view.props().sender.clone();

        let mut channel = match self.connector.connect().await {
            Ok(channel) => channel,
            Err(e) => {
                tracing::warn!("Could not connect to chat channel: {}", e);
                self.view.set_connected(false);
                return;
            }
        };

        // Subscribe before joining so nothing routed right after the join is missed.
        self.inbound = Some(channel.subscribe(RECEIVE_MESSAGE));
        if let Err(e) = channel.emit(JOIN, join_payload(&sender)).await {
            tracing::warn!("Failed to join channel: {}", e);
        }
        self.channel = Some(channel);
        self.view.set_connected(true);
        tracing::info!("Joined channel as {} ({})", sender.id, sender.role);
    }

    fn new_scope(&mut self) {
        self.scope = CancellationToken::new();
        self.scope_id += 1;
    }

    fn schedule_fetch(&mut self) {
        if !self.view.is_authorized() {
            return;
        }

        let history = Arc::clone(&self.history);
        let conversation = self.view.props().id();
        let token = self.scope.clone();
        let scope = self.scope_id;
        let tx = self.fetch_tx.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::debug!("History fetch cancelled");
                }
                result = history.fetch(&conversation) => {
                    let _ = tx.send(FetchDone { scope, result });
                }
            }
        });
    }
}

async fn recv_inbound(inbound: &mut Option<mpsc::UnboundedReceiver<Value>>) -> Option<Value> {
    match inbound {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
