//! Socket.IO implementation of the real-time channel
//!
//! After the handshake the socket is split: a writer task owns the sink and
//! drains an outbound queue, a reader task owns the stream, answers pings and
//! dispatches events to subscribers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::packet::{EnginePacket, SocketPacket};
use super::websocket::{ChannelSocket, WsSink, WsSource};
use super::{ChannelConnector, ChannelError, RealtimeChannel};

/// How long disconnect waits for queued frames to flush.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Event subscribers; `None` once the reader has stopped.
type Subscribers = Arc<Mutex<Option<HashMap<String, mpsc::UnboundedSender<Value>>>>>;

/// Connects to a Socket.IO server at a fixed endpoint.
pub struct SocketIoConnector {
    endpoint: String,
}

impl SocketIoConnector {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ChannelConnector for SocketIoConnector {
    async fn connect(&self) -> Result<Box<dyn RealtimeChannel>, ChannelError> {
        let channel = SocketIoChannel::connect(&self.endpoint).await?;
        Ok(Box::new(channel))
    }
}

/// An open Socket.IO connection.
pub struct SocketIoChannel {
    sid: String,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    subscribers: Subscribers,
    shutdown: CancellationToken,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl SocketIoChannel {
    pub async fn connect(endpoint: &str) -> Result<Self, ChannelError> {
        let socket = ChannelSocket::connect(endpoint).await?;
        let (sink, source, session) = socket.split();

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let subscribers: Subscribers = Arc::new(Mutex::new(Some(HashMap::new())));
        let shutdown = CancellationToken::new();

        // The server pings every interval and waits timeout for the pong.
        let liveness =
            Duration::from_millis(session.ping_interval_ms + session.ping_timeout_ms);

        let writer = tokio::spawn(writer_loop(sink, out_rx));
        let reader = tokio::spawn(reader_loop(
            source,
            liveness,
            out_tx.clone(),
            Arc::clone(&subscribers),
            shutdown.clone(),
        ));

        Ok(Self {
            sid: session.sid,
            outbound: Some(out_tx),
            subscribers,
            shutdown,
            reader: Some(reader),
            writer: Some(writer),
        })
    }

    #[cfg(test)]
    pub fn sid(&self) -> &str {
        &self.sid
    }

    fn queue(&self, packet: EnginePacket) -> Result<(), ChannelError> {
        let text = packet.encode();
        tracing::debug!("WS send: {}", text);
        self.outbound
            .as_ref()
            .ok_or(ChannelError::Closed)?
            .send(Message::Text(text))
            .map_err(|_| ChannelError::Closed)
    }
}

#[async_trait]
impl RealtimeChannel for SocketIoChannel {
    async fn emit(&mut self, event: &str, payload: Value) -> Result<(), ChannelError> {
        self.queue(EnginePacket::Message(SocketPacket::event(event, payload)))
    }

    fn subscribe(&mut self, event: &str) -> mpsc::UnboundedReceiver<Value> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut guard = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_mut() {
            Some(subs) => {
                if subs.insert(event.to_string(), tx).is_some() {
                    tracing::debug!("Replaced existing subscriber for {}", event);
                }
            }
            // Connection already gone: the receiver sees end-of-stream at once.
            None => drop(tx),
        }
        rx
    }

    fn unsubscribe(&mut self, event: &str) {
        let mut guard = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(subs) = guard.as_mut() {
            subs.remove(event);
        }
    }

    async fn disconnect(&mut self) -> Result<(), ChannelError> {
        let Some(outbound) = self.outbound.take() else {
            return Ok(());
        };
        tracing::info!("Disconnecting channel (sid={})", self.sid);

        // Stop the reader first so it drops its handle on the outbound queue.
        self.shutdown.cancel();
        if let Some(reader) = self.reader.take() {
            let _ = reader.await;
        }

        let _ = outbound.send(Message::Text(
            EnginePacket::Message(SocketPacket::Disconnect).encode(),
        ));
        let _ = outbound.send(Message::Close(None));
        drop(outbound);

        if let Some(writer) = self.writer.take() {
            if tokio::time::timeout(FLUSH_TIMEOUT, writer).await.is_err() {
                tracing::warn!("Timed out flushing channel on disconnect");
            }
        }
        Ok(())
    }
}

impl Drop for SocketIoChannel {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
    }
}

async fn writer_loop(mut sink: WsSink, mut rx: mpsc::UnboundedReceiver<Message>) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if let Err(e) = sink.send(msg).await {
            tracing::warn!("Failed to send WebSocket frame: {:#}", e);
            break;
        }
        if closing {
            break;
        }
    }
    let _ = sink.close().await;
}

async fn reader_loop(
    mut source: WsSource,
    liveness: Duration,
    outbound: mpsc::UnboundedSender<Message>,
    subscribers: Subscribers,
    shutdown: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => break,
            frame = tokio::time::timeout(liveness, source.next()) => match frame {
                Ok(frame) => frame,
                Err(_) => {
                    tracing::warn!("No traffic from server for {:?}, connection presumed dead", liveness);
                    break;
                }
            },
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                tracing::debug!("WS recv: {}", text);
                match EnginePacket::decode(&text) {
                    Ok(EnginePacket::Ping(data)) => {
                        let _ = outbound.send(Message::Text(EnginePacket::Pong(data).encode()));
                    }
                    Ok(EnginePacket::Message(SocketPacket::Event { name, args, .. })) => {
                        dispatch(&subscribers, &name, args);
                    }
                    Ok(EnginePacket::Message(SocketPacket::Disconnect)) => {
                        tracing::info!("Server disconnected the socket");
                        break;
                    }
                    Ok(EnginePacket::Close) => {
                        tracing::info!("Engine.IO close from server");
                        break;
                    }
                    Ok(other) => tracing::debug!("Ignoring packet: {:?}", other),
                    Err(e) => tracing::warn!("Undecodable frame {:?}: {}", text, e),
                }
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!("WebSocket closed: {:?}", frame);
                break;
            }
            Some(Ok(other)) => {
                tracing::debug!("WS frame (ignored): {:?}", other);
            }
            Some(Err(e)) => {
                tracing::warn!("WebSocket receive error: {:#}", e);
                break;
            }
            None => break,
        }
    }

    // Dropping the senders tells every subscriber the stream has ended.
    subscribers
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .take();
}

fn dispatch(subscribers: &Subscribers, name: &str, args: Vec<Value>) {
    let mut guard = subscribers.lock().unwrap_or_else(|e| e.into_inner());
    let Some(subs) = guard.as_mut() else {
        return;
    };
    let Some(tx) = subs.get(name) else {
        tracing::debug!("No subscriber for event {}", name);
        return;
    };
    let payload = args.into_iter().next().unwrap_or(Value::Null);
    if tx.send(payload).is_err() {
        subs.remove(name);
    }
}
