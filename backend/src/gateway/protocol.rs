//! Gateway wire protocol
//!
//! Frame types exchanged with the gateway and the text codec for them.
//! Every WebSocket text message carries exactly one JSON frame, tagged by
//! `type`: `req` (client request), `res` (correlated response) or `evt`
//! (unsolicited event).

use super::error::GatewayError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Protocol version spoken by this client (sent as both min and max)
pub const PROTOCOL_VERSION: u32 = 3;

/// Method name of the handshake request
pub const CONNECT_METHOD: &str = "connect";

/// Client identifier announced during the handshake
pub const CLIENT_ID: &str = "agent-dashboard";

/// Human-readable client label announced during the handshake
pub const CLIENT_DISPLAY_NAME: &str = "Agent Dashboard";

/// Operating mode announced during the handshake
pub const CLIENT_MODE: &str = "backend";

/// Role requested during the handshake
pub const OPERATOR_ROLE: &str = "operator";

/// Scope requested during the handshake
pub const OPERATOR_ADMIN_SCOPE: &str = "operator.admin";

/// A single protocol frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    /// Client → gateway request
    #[serde(rename = "req")]
    Request(RequestFrame),
    /// Gateway → client response to a request
    #[serde(rename = "res")]
    Response(ResponseFrame),
    /// Gateway → client unsolicited event
    #[serde(rename = "evt")]
    Event(EventFrame),
}

/// Outbound request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    /// Correlation id echoed back by the matching response
    pub id: String,
    /// Remote method name
    pub method: String,
    /// Method parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Inbound response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    /// Correlation id of the request this answers
    pub id: String,
    /// Whether the request succeeded
    pub ok: bool,
    /// Result payload when `ok`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Error details when not `ok`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

/// Structured error carried by a failed response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorShape {
    /// Numeric error code (non-numeric codes read as 0)
    #[serde(default, deserialize_with = "lenient_code")]
    pub code: i64,
    /// Error message
    #[serde(default)]
    pub message: String,
}

/// Inbound event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    /// Event name
    pub event: String,
    /// Event payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl ResponseFrame {
    /// Convert the response into the caller-facing outcome
    pub fn into_result(self) -> Result<Value, GatewayError> {
        if self.ok {
            return Ok(self.payload.unwrap_or(Value::Null));
        }
        let (code, message) = match self.error {
            Some(err) if !err.message.is_empty() => (err.code, err.message),
            Some(err) => (err.code, "Unknown error".to_string()),
            None => (0, "Unknown error".to_string()),
        };
        Err(GatewayError::Remote { code, message })
    }
}

fn lenient_code<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_i64().unwrap_or(0))
}

/// Identity metadata sent in the handshake
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client identifier
    pub id: String,
    /// Human-readable label
    pub display_name: String,
    /// Client version
    pub version: String,
    /// Host platform
    pub platform: String,
    /// Operating mode
    pub mode: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            id: CLIENT_ID.to_string(),
            display_name: CLIENT_DISPLAY_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            platform: std::env::consts::OS.to_string(),
            mode: CLIENT_MODE.to_string(),
        }
    }
}

/// Credential block of the handshake
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthParams {
    /// Bearer token
    pub token: String,
}

/// Parameters of the `connect` handshake request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    /// Lowest protocol version accepted
    pub min_protocol: u32,
    /// Highest protocol version accepted
    pub max_protocol: u32,
    /// Client identity
    pub client: ClientInfo,
    /// Advertised capabilities (always empty)
    pub caps: Vec<String>,
    /// Optional credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthParams>,
    /// Requested role
    pub role: String,
    /// Requested scopes
    pub scopes: Vec<String>,
}

impl ConnectParams {
    /// Build handshake parameters; an empty token is treated as no token
    pub fn new(token: Option<&str>) -> Self {
        let auth = token
            .filter(|t| !t.is_empty())
            .map(|t| AuthParams {
                token: t.to_string(),
            });
        Self {
            min_protocol: PROTOCOL_VERSION,
            max_protocol: PROTOCOL_VERSION,
            client: ClientInfo::default(),
            caps: Vec::new(),
            auth,
            role: OPERATOR_ROLE.to_string(),
            scopes: vec![OPERATOR_ADMIN_SCOPE.to_string()],
        }
    }
}

/// Result of decoding one inbound text message
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A response to route by correlation id
    Response(ResponseFrame),
    /// An unsolicited event
    Event(EventFrame),
    /// Valid JSON with a kind this client does not handle
    Ignored(String),
    /// Not valid JSON or not a well-formed frame
    Malformed,
}

/// Serialize a frame to its wire text
pub fn encode(frame: &Frame) -> Result<String, GatewayError> {
    serde_json::to_string(frame).map_err(|e| GatewayError::Encode(e.to_string()))
}

/// Parse one inbound wire message
///
/// Never fails: anything that is not a usable `res` or `evt` frame is
/// reported as `Ignored` or `Malformed` for the caller to drop.
pub fn decode(text: &str) -> Inbound {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => return Inbound::Malformed,
    };

    let kind = match value.get("type").and_then(Value::as_str) {
        Some(kind) => kind.to_string(),
        None => return Inbound::Malformed,
    };

    match kind.as_str() {
        "res" => serde_json::from_value(value)
            .map(Inbound::Response)
            .unwrap_or(Inbound::Malformed),
        "evt" => serde_json::from_value(value)
            .map(Inbound::Event)
            .unwrap_or(Inbound::Malformed),
        _ => Inbound::Ignored(kind),
    }
}
