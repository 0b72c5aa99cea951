//! WebSocket connection and Socket.IO handshake

use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use super::packet::{EnginePacket, SocketPacket};
use super::ChannelError;

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
pub type WsSink = SplitSink<WsStream, Message>;
pub type WsSource = SplitStream<WsStream>;

/// How long the open + connect exchange may take.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Engine.IO session parameters from the open packet.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub sid: String,
    pub ping_interval_ms: u64,
    pub ping_timeout_ms: u64,
}

/// Socket.IO URL for a service endpoint (`http` -> `ws`, `https` -> `wss`).
pub fn socket_url(endpoint: &str) -> Result<Url, ChannelError> {
    let mut url =
        Url::parse(endpoint).map_err(|e| ChannelError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ChannelError::InvalidEndpoint(format!(
                "{}: unsupported scheme {}",
                endpoint, other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| ChannelError::InvalidEndpoint(endpoint.to_string()))?;

    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| ChannelError::InvalidEndpoint(endpoint.to_string()))?;
        segments.pop_if_empty().push("socket.io").push("");
    }
    url.query_pairs_mut()
        .clear()
        .append_pair("EIO", "4")
        .append_pair("transport", "websocket");

    Ok(url)
}

/// A connected socket that has completed the Socket.IO handshake.
pub struct ChannelSocket {
    stream: WsStream,
    pub session: SessionInfo,
}

impl ChannelSocket {
    /// Connect to the endpoint and join the default namespace.
    pub async fn connect(endpoint: &str) -> Result<Self, ChannelError> {
        let url = socket_url(endpoint)?;
        tracing::info!("Connecting WebSocket to {}", url);

        let (stream, response) = connect_async(url.as_str()).await?;
        tracing::info!("WebSocket connected (status={})", response.status());

        let mut socket = Self {
            stream,
            session: SessionInfo {
                sid: String::new(),
                ping_interval_ms: 25_000,
                ping_timeout_ms: 20_000,
            },
        };

        tokio::time::timeout(HANDSHAKE_TIMEOUT, socket.handshake())
            .await
            .map_err(|_| ChannelError::Timeout("Socket.IO handshake"))??;

        Ok(socket)
    }

    async fn handshake(&mut self) -> Result<(), ChannelError> {
        // 1. Engine.IO open packet
        match self.recv_packet().await? {
            Some(EnginePacket::Open(info)) => {
                self.session = SessionInfo {
                    sid: info["sid"].as_str().unwrap_or_default().to_string(),
                    ping_interval_ms: info["pingInterval"].as_u64().unwrap_or(25_000),
                    ping_timeout_ms: info["pingTimeout"].as_u64().unwrap_or(20_000),
                };
                tracing::debug!("Engine.IO open: {:?}", self.session);
            }
            Some(other) => {
                return Err(ChannelError::Handshake(format!(
                    "expected open packet, got {:?}",
                    other
                )))
            }
            None => return Err(ChannelError::Closed),
        }

        // 2. Join the default namespace and wait for the server's verdict
        self.send_packet(&EnginePacket::Message(SocketPacket::Connect(None)))
            .await?;

        loop {
            match self.recv_packet().await? {
                Some(EnginePacket::Message(SocketPacket::Connect(data))) => {
                    tracing::info!(
                        "Socket.IO connected (sid={})",
                        data.as_ref()
                            .and_then(|d| d["sid"].as_str())
                            .unwrap_or("?")
                    );
                    return Ok(());
                }
                Some(EnginePacket::Message(SocketPacket::ConnectError(data))) => {
                    let reason = data["message"]
                        .as_str()
                        .map(String::from)
                        .unwrap_or_else(|| data.to_string());
                    return Err(ChannelError::Rejected(reason));
                }
                Some(EnginePacket::Ping(data)) => {
                    self.send_packet(&EnginePacket::Pong(data)).await?;
                }
                Some(other) => {
                    tracing::debug!("Ignoring packet during handshake: {:?}", other);
                }
                None => return Err(ChannelError::Closed),
            }
        }
    }

    /// Send an Engine.IO packet as a text frame.
    async fn send_packet(&mut self, packet: &EnginePacket) -> Result<(), ChannelError> {
        let text = packet.encode();
        tracing::debug!("WS send: {}", text);
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Receive the next Engine.IO packet, answering WebSocket pings.
    async fn recv_packet(&mut self) -> Result<Option<EnginePacket>, ChannelError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!("WS recv: {}", text);
                    return Ok(Some(EnginePacket::decode(&text)?));
                }
                Some(Ok(Message::Ping(data))) => {
                    self.stream.send(Message::Pong(data)).await?;
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!("WebSocket closed during handshake: {:?}", frame);
                    return Ok(None);
                }
                Some(Ok(other)) => {
                    tracing::debug!("WS frame (ignored): {:?}", other);
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }

    /// Split into independent write and read halves.
    pub fn split(self) -> (WsSink, WsSource, SessionInfo) {
        let (sink, source) = self.stream.split();
        (sink, source, self.session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_url_from_http() {
        let url = socket_url("http://localhost:3000").unwrap();
        assert_eq!(
            url.as_str(),
            "ws://localhost:3000/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn test_socket_url_keeps_base_path() {
        let url = socket_url("https://chat.example.org/app/").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://chat.example.org/app/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn test_socket_url_rejects_other_schemes() {
        assert!(matches!(
            socket_url("ftp://example.org"),
            Err(ChannelError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            socket_url("::nope"),
            Err(ChannelError::InvalidEndpoint(_))
        ));
    }
}
