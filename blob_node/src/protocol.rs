use blob_core::ServiceError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One inbound frame: a named event, an optional ack id the server must
/// reply to, and an event-specific data payload.
#[derive(Debug, Deserialize)]
pub struct InboundFrame {
    pub event: String,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub data: Value,
}

/// A reply to one inbound frame's ack id.
#[derive(Debug, Serialize)]
pub struct AckFrame {
    pub ack: u64,
    pub data: Value,
}

/// A server-initiated frame with no corresponding inbound ack id.
#[derive(Debug, Serialize)]
pub struct EventFrame {
    pub event: &'static str,
}

/// Fire-and-forget events a connection task may receive from elsewhere
/// (currently only the subscription fan-out).
#[derive(Debug, Clone, Copy)]
pub enum OutboundEvent {
    Changed,
}

impl OutboundEvent {
    pub fn to_frame(self) -> EventFrame {
        match self {
            OutboundEvent::Changed => EventFrame { event: "changed" },
        }
    }
}

/// `data` of an `auth` frame: `{"token": "<token>"}`.
pub fn parse_auth_token(data: &Value) -> Result<&str, ServiceError> {
    data.get("token")
        .and_then(Value::as_str)
        .ok_or(ServiceError::AccessDenied)
}

/// `data` of a `ref` frame: the bare reference string, or the literal
/// `"none"` marker.
pub fn parse_ref_payload(data: &Value) -> Result<&str, ServiceError> {
    data.as_str()
        .ok_or_else(|| ServiceError::validation("ref payload must be a string"))
}

/// `data` of a `get` frame: `{"known": <version>}`, `known` optional.
pub fn parse_known_version(data: &Value) -> Result<Option<i64>, ServiceError> {
    match data.get("known") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| ServiceError::validation("known must be an integer")),
    }
}

/// `data` of a `set` frame: `{"data": "<base64>", "version": <version>}`.
pub fn parse_set_payload(data: &Value) -> Result<(String, Option<i64>), ServiceError> {
    let text = data
        .get("data")
        .and_then(Value::as_str)
        .ok_or_else(|| ServiceError::validation("data must be a string"))?
        .to_string();
    let version = match data.get("version") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            value
                .as_i64()
                .ok_or_else(|| ServiceError::validation("version must be an integer"))?,
        ),
    };
    Ok((text, version))
}
