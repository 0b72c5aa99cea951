//! Engine.IO v4 / Socket.IO v5 text packet codec
//!
//! Frame layout on the WebSocket:
//!   0{json}  open        2  ping       4...  message (Socket.IO packet)
//!   1        close       3  pong       5/6   upgrade / noop
//!
//! Socket.IO packet inside a `4` frame: `TYPE[/nsp,][ACK_ID][JSON]`, e.g.
//! `42["receiveMessage",{...}]` or `4012["ack-me",1]`.

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("empty packet")]
    Empty,
    #[error("unknown packet type {0:?}")]
    UnknownType(char),
    #[error("unsupported packet type {0:?}")]
    Unsupported(char),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid event: {0}")]
    InvalidEvent(String),
}

/// Transport-level packet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Value),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

/// Socket.IO packet carried in an Engine.IO message.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Option<Value>),
    Disconnect,
    Event {
        name: String,
        args: Vec<Value>,
        ack: Option<u64>,
    },
    Ack {
        id: u64,
        args: Vec<Value>,
    },
    ConnectError(Value),
}

impl SocketPacket {
    /// Event with a single payload argument, no ack requested.
    pub fn event(name: &str, payload: Value) -> Self {
        SocketPacket::Event {
            name: name.to_string(),
            args: vec![payload],
            ack: None,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            SocketPacket::Connect(None) => "0".to_string(),
            SocketPacket::Connect(Some(auth)) => format!("0{}", auth),
            SocketPacket::Disconnect => "1".to_string(),
            SocketPacket::Event { name, args, ack } => {
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                let ack = ack.map(|id| id.to_string()).unwrap_or_default();
                format!("2{}{}", ack, Value::Array(items))
            }
            SocketPacket::Ack { id, args } => {
                format!("3{}{}", id, Value::Array(args.clone()))
            }
            SocketPacket::ConnectError(data) => format!("4{}", data),
        }
    }

    pub fn decode(text: &str) -> Result<Self, PacketError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or(PacketError::Empty)?;
        let mut rest = chars.as_str();

        // Namespace prefix ("/admin,") is only present for non-default namespaces.
        if rest.starts_with('/') {
            rest = match rest.find(',') {
                Some(pos) => &rest[pos + 1..],
                None => "",
            };
        }

        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        let ack = if digits > 0 {
            rest[..digits].parse::<u64>().ok()
        } else {
            None
        };
        let body = &rest[digits..];

        match kind {
            '0' => {
                if body.is_empty() {
                    Ok(SocketPacket::Connect(None))
                } else {
                    Ok(SocketPacket::Connect(Some(serde_json::from_str(body)?)))
                }
            }
            '1' => Ok(SocketPacket::Disconnect),
            '2' => {
                let mut items = match serde_json::from_str::<Value>(body)? {
                    Value::Array(items) => items,
                    other => {
                        return Err(PacketError::InvalidEvent(format!(
                            "expected array, got {}",
                            other
                        )))
                    }
                };
                if items.is_empty() {
                    return Err(PacketError::InvalidEvent("missing event name".into()));
                }
                let name = match items.remove(0) {
                    Value::String(name) => name,
                    other => {
                        return Err(PacketError::InvalidEvent(format!(
                            "event name must be a string, got {}",
                            other
                        )))
                    }
                };
                Ok(SocketPacket::Event {
                    name,
                    args: items,
                    ack,
                })
            }
            '3' => {
                let id = ack.ok_or_else(|| PacketError::InvalidEvent("ack without id".into()))?;
                let args = match serde_json::from_str::<Value>(body)? {
                    Value::Array(items) => items,
                    other => vec![other],
                };
                Ok(SocketPacket::Ack { id, args })
            }
            '4' => {
                let data = if body.is_empty() {
                    Value::Null
                } else {
                    serde_json::from_str(body)?
                };
                Ok(SocketPacket::ConnectError(data))
            }
            '5' | '6' => Err(PacketError::Unsupported(kind)),
            other => Err(PacketError::UnknownType(other)),
        }
    }
}

impl EnginePacket {
    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(data) => format!("0{}", data),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{}", data),
            EnginePacket::Pong(data) => format!("3{}", data),
            EnginePacket::Message(packet) => format!("4{}", packet.encode()),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }

    pub fn decode(text: &str) -> Result<Self, PacketError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or(PacketError::Empty)?;
        let rest = chars.as_str();

        match kind {
            '0' => Ok(EnginePacket::Open(serde_json::from_str(rest)?)),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(rest.to_string())),
            '3' => Ok(EnginePacket::Pong(rest.to_string())),
            '4' => Ok(EnginePacket::Message(SocketPacket::decode(rest)?)),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(PacketError::UnknownType(other)),
        }
    }
}
