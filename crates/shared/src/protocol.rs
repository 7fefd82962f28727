//! Real-time protocol definitions: Engine.IO v4 framing carrying Socket.IO v5 packets.
//!
//! The event server is a Socket.IO server. Engine.IO is the transport layer
//! (one packet per websocket frame, or `\x1e`-separated payloads over HTTP
//! long-polling); Socket.IO packets travel inside Engine.IO `message` packets.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Engine.IO protocol revision spoken by the client.
pub const ENGINE_IO_VERSION: u8 = 4;

/// Path the Socket.IO server is mounted on.
pub const SOCKET_IO_PATH: &str = "/socket.io/";

/// Separator between packets in a long-polling payload.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// The namespace every event is sent on.
pub const DEFAULT_NAMESPACE: &str = "/";

/// Wire-level event names.
pub mod events {
    /// Control events
    pub const JOIN_ROOM: &str = "join_room";
    pub const LEAVE_ROOM: &str = "leave_room";

    /// Stock events
    pub const STOCK_UPDATE: &str = "stock:update";
    pub const STOCK_LOW_ALERT: &str = "stock:low_alert";

    /// Receipt events
    pub const RECEIPT_CREATED: &str = "receipt:created";
    pub const RECEIPT_UPDATED: &str = "receipt:updated";
    pub const RECEIPT_PROCESSED: &str = "receipt:processed";

    /// Delivery events
    pub const DELIVERY_CREATED: &str = "delivery:created";
    pub const DELIVERY_UPDATED: &str = "delivery:updated";
    pub const DELIVERY_PROCESSED: &str = "delivery:processed";

    /// Transfer events
    pub const TRANSFER_CREATED: &str = "transfer:created";
    pub const TRANSFER_UPDATED: &str = "transfer:updated";
    pub const TRANSFER_PROCESSED: &str = "transfer:processed";

    /// Adjustment events
    pub const ADJUSTMENT_CREATED: &str = "adjustment:created";
    pub const ADJUSTMENT_PROCESSED: &str = "adjustment:processed";

    /// Product events
    pub const PRODUCT_CREATED: &str = "product:created";
    pub const PRODUCT_UPDATED: &str = "product:updated";
    pub const PRODUCT_DELETED: &str = "product:deleted";

    /// Every domain event the backend broadcasts.
    pub const DOMAIN_EVENTS: &[&str] = &[
        STOCK_UPDATE,
        STOCK_LOW_ALERT,
        RECEIPT_CREATED,
        RECEIPT_UPDATED,
        RECEIPT_PROCESSED,
        DELIVERY_CREATED,
        DELIVERY_UPDATED,
        DELIVERY_PROCESSED,
        TRANSFER_CREATED,
        TRANSFER_UPDATED,
        TRANSFER_PROCESSED,
        ADJUSTMENT_CREATED,
        ADJUSTMENT_PROCESSED,
        PRODUCT_CREATED,
        PRODUCT_UPDATED,
        PRODUCT_DELETED,
    ];

    /// Lifecycle notifications raised locally by the client, never sent on the wire.
    pub const CONNECT: &str = "connect";
    pub const DISCONNECT: &str = "disconnect";
    pub const CONNECT_ERROR: &str = "connect_error";
    pub const RECONNECT_FAILED: &str = "reconnect_failed";

    /// Names the client reserves for its own lifecycle notifications.
    pub fn is_reserved(name: &str) -> bool {
        matches!(name, CONNECT | DISCONNECT | CONNECT_ERROR | RECONNECT_FAILED)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("empty packet")]
    Empty,
    #[error("unknown packet type '{0}'")]
    UnknownPacketType(char),
    #[error("invalid handshake: {0}")]
    InvalidHandshake(String),
    #[error("invalid packet data: {0}")]
    InvalidData(String),
    #[error("binary packets are not supported")]
    UnsupportedBinary,
}

/// Handshake data carried by the Engine.IO `open` packet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

impl Handshake {
    /// How long the connection may stay silent before it is considered dead.
    pub fn heartbeat_deadline_ms(&self) -> u64 {
        self.ping_interval + self.ping_timeout
    }
}

/// An Engine.IO packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or(ProtocolError::Empty)?;
        let data = chars.as_str();

        match kind {
            '0' => serde_json::from_str(data)
                .map(EnginePacket::Open)
                .map_err(|e| ProtocolError::InvalidHandshake(e.to_string())),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(data.to_string())),
            '3' => Ok(EnginePacket::Pong(data.to_string())),
            '4' => Ok(EnginePacket::Message(data.to_string())),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            // Binary payloads over polling are base64 with a 'b' prefix.
            'b' => Err(ProtocolError::UnsupportedBinary),
            other => Err(ProtocolError::UnknownPacketType(other)),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(handshake) => {
                let json = serde_json::to_string(handshake).unwrap_or_default();
                format!("0{json}")
            }
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{data}"),
            EnginePacket::Pong(data) => format!("3{data}"),
            EnginePacket::Message(data) => format!("4{data}"),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }

    /// Wrap a Socket.IO packet in an Engine.IO message.
    pub fn socket(packet: &SocketPacket) -> Self {
        EnginePacket::Message(packet.encode())
    }
}

/// Split a long-polling payload into its packets.
pub fn decode_payload(payload: &str) -> Result<Vec<EnginePacket>, ProtocolError> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }
    payload
        .split(RECORD_SEPARATOR)
        .map(EnginePacket::decode)
        .collect()
}

/// Join packets into a long-polling payload.
pub fn encode_payload(packets: &[EnginePacket]) -> String {
    packets
        .iter()
        .map(EnginePacket::encode)
        .collect::<Vec<_>>()
        .join(&RECORD_SEPARATOR.to_string())
}

/// A Socket.IO packet, carried inside an Engine.IO message.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        namespace: String,
        id: u64,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        data: Option<Value>,
    },
}

impl SocketPacket {
    /// CONNECT to the default namespace.
    pub fn connect() -> Self {
        SocketPacket::Connect {
            namespace: DEFAULT_NAMESPACE.to_string(),
            data: None,
        }
    }

    /// DISCONNECT from the default namespace.
    pub fn disconnect() -> Self {
        SocketPacket::Disconnect {
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }

    /// EVENT on the default namespace with at most one argument.
    pub fn event(name: impl Into<String>, payload: Option<Value>) -> Self {
        SocketPacket::Event {
            namespace: DEFAULT_NAMESPACE.to_string(),
            id: None,
            name: name.into(),
            args: payload.into_iter().collect(),
        }
    }

    fn kind(&self) -> char {
        match self {
            SocketPacket::Connect { .. } => '0',
            SocketPacket::Disconnect { .. } => '1',
            SocketPacket::Event { .. } => '2',
            SocketPacket::Ack { .. } => '3',
            SocketPacket::ConnectError { .. } => '4',
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            SocketPacket::Connect { namespace, .. }
            | SocketPacket::Disconnect { namespace }
            | SocketPacket::Event { namespace, .. }
            | SocketPacket::Ack { namespace, .. }
            | SocketPacket::ConnectError { namespace, .. } => namespace,
        }
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(self.kind());

        let namespace = self.namespace();
        if namespace != DEFAULT_NAMESPACE {
            out.push_str(namespace);
            out.push(',');
        }

        match self {
            SocketPacket::Connect { data, .. } | SocketPacket::ConnectError { data, .. } => {
                if let Some(data) = data {
                    out.push_str(&data.to_string());
                }
            }
            SocketPacket::Disconnect { .. } => {}
            SocketPacket::Event { id, name, args, .. } => {
                if let Some(id) = id {
                    out.push_str(&id.to_string());
                }
                let mut array = Vec::with_capacity(args.len() + 1);
                array.push(Value::String(name.clone()));
                array.extend(args.iter().cloned());
                out.push_str(&Value::Array(array).to_string());
            }
            SocketPacket::Ack { id, args, .. } => {
                out.push_str(&id.to_string());
                out.push_str(&Value::Array(args.clone()).to_string());
            }
        }
        out
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or(ProtocolError::Empty)?;
        let mut rest = chars.as_str();

        if matches!(kind, '5' | '6') {
            return Err(ProtocolError::UnsupportedBinary);
        }

        let namespace = if rest.starts_with('/') {
            let end = rest.find(',').unwrap_or(rest.len());
            let namespace = rest[..end].to_string();
            rest = rest.get(end + 1..).unwrap_or("");
            namespace
        } else {
            DEFAULT_NAMESPACE.to_string()
        };

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let id = if digits > 0 {
            let id = rest[..digits]
                .parse::<u64>()
                .map_err(|e| ProtocolError::InvalidData(e.to_string()))?;
            rest = &rest[digits..];
            Some(id)
        } else {
            None
        };

        let data = if rest.is_empty() {
            None
        } else {
            Some(
                serde_json::from_str::<Value>(rest)
                    .map_err(|e| ProtocolError::InvalidData(e.to_string()))?,
            )
        };

        match kind {
            '0' => Ok(SocketPacket::Connect { namespace, data }),
            '1' => Ok(SocketPacket::Disconnect { namespace }),
            '2' => {
                let Some(Value::Array(mut items)) = data else {
                    return Err(ProtocolError::InvalidData("event data must be an array".into()));
                };
                if items.is_empty() {
                    return Err(ProtocolError::InvalidData("event without a name".into()));
                }
                let Value::String(name) = items.remove(0) else {
                    return Err(ProtocolError::InvalidData("event name must be a string".into()));
                };
                Ok(SocketPacket::Event {
                    namespace,
                    id,
                    name,
                    args: items,
                })
            }
            '3' => {
                let id = id.ok_or_else(|| ProtocolError::InvalidData("ack without an id".into()))?;
                let args = match data {
                    Some(Value::Array(items)) => items,
                    None => Vec::new(),
                    Some(_) => {
                        return Err(ProtocolError::InvalidData("ack data must be an array".into()))
                    }
                };
                Ok(SocketPacket::Ack { namespace, id, args })
            }
            '4' => Ok(SocketPacket::ConnectError { namespace, data }),
            other => Err(ProtocolError::UnknownPacketType(other)),
        }
    }

    /// Human-readable reason carried by a CONNECT_ERROR packet.
    pub fn error_message(&self) -> Option<String> {
        let SocketPacket::ConnectError { data, .. } = self else {
            return None;
        };
        Some(match data {
            Some(Value::Object(map)) => map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
            Some(Value::String(message)) => message.clone(),
            Some(other) => other.to_string(),
            None => "connection refused".to_string(),
        })
    }
}
