//! Wire frame codec for the gateway session protocol.
//!
//! Three frame variants travel over the duplex channel, discriminated by a
//! top-level `type` tag:
//!
//! | tag     | direction        | shape                                      |
//! |---------|------------------|--------------------------------------------|
//! | `req`   | client → server  | `{id, method, params}`                     |
//! | `res`   | server → client  | `{id, ok, payload?, error?}`               |
//! | `event` | server → client  | `{event, payload?, seq?}`                  |
//!
//! The codec is strict: unknown top-level keys, empty required strings,
//! non-object `params`, and negative `seq` are all rejected. Dispatch on the
//! tag is done by hand (rather than serde's internal tagging) so that
//! unknown-key rejection applies per variant.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Wire error codes
// ---------------------------------------------------------------------------

/// Stable error codes surfaced to clients in `res.error.code`.
pub mod codes {
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const INVALID_PARAMS: &str = "INVALID_PARAMS";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const RISK_BLOCKED: &str = "RISK_BLOCKED";

    // Connector-mapped codes (see aegis-connector's mapping table).
    pub const MARKET_CLOSED: &str = "MARKET_CLOSED";
    pub const TRADE_CONTEXT_BUSY: &str = "TRADE_CONTEXT_BUSY";
    pub const INSUFFICIENT_FUNDS: &str = "INSUFFICIENT_FUNDS";
    pub const INVALID_STOPS: &str = "INVALID_STOPS";
    pub const CONNECTOR_ERROR: &str = "CONNECTOR_ERROR";
}

/// The request id echoed when the incoming message is too malformed to
/// recover one.
pub const UNRECOVERABLE_ID: &str = "invalid";

// ---------------------------------------------------------------------------
// Error shape
// ---------------------------------------------------------------------------

/// Structured error carried inside a failed response frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl ErrorShape {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: None,
            retry_after_ms: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }
}

// ---------------------------------------------------------------------------
// Frame variants
// ---------------------------------------------------------------------------

/// Client-initiated method call. `params` defaults to an empty object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestFrame {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// Server response correlated to a request by `id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseFrame {
    pub id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

impl ResponseFrame {
    pub fn ok(id: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, error: ErrorShape) -> Self {
        Self {
            id: id.into(),
            ok: false,
            payload: None,
            error: Some(error),
        }
    }
}

/// Server-initiated event. Not correlated to a request id at the frame
/// level; some event payloads carry a `requestId` field instead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventFrame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload: Some(payload),
            seq: None,
        }
    }
}

/// A parsed wire frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Request(RequestFrame),
    Response(ResponseFrame),
    Event(EventFrame),
}

impl Frame {
    /// The wire tag for this variant.
    pub fn tag(&self) -> &'static str {
        match self {
            Frame::Request(_) => "req",
            Frame::Response(_) => "res",
            Frame::Event(_) => "event",
        }
    }

    /// Serialize back to a JSON object including the `type` tag.
    pub fn to_value(&self) -> Value {
        let mut value = match self {
            Frame::Request(f) => serde_json::to_value(f),
            Frame::Response(f) => serde_json::to_value(f),
            Frame::Event(f) => serde_json::to_value(f),
        }
        .expect("frame serialization must not fail");

        if let Value::Object(ref mut map) = value {
            map.insert("type".to_string(), Value::String(self.tag().to_string()));
        }
        value
    }

    /// Serialize to the single-line wire text.
    pub fn to_wire(&self) -> String {
        serde_json::to_string(&self.to_value()).expect("frame serialization must not fail")
    }
}

// ---------------------------------------------------------------------------
// Codec errors
// ---------------------------------------------------------------------------

/// Why an incoming message failed to parse as a frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameError {
    /// The message is not a JSON object at all.
    NotAnObject,
    /// The `type` tag is missing or not a string.
    MissingType,
    /// The `type` tag is not one of `req` / `res` / `event`.
    UnknownType(String),
    /// The variant body failed validation (unknown key, wrong type,
    /// empty required string, negative seq).
    Invalid(String),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::NotAnObject => write!(f, "frame is not a JSON object"),
            FrameError::MissingType => write!(f, "frame is missing the type tag"),
            FrameError::UnknownType(tag) => write!(f, "unknown frame type: {tag}"),
            FrameError::Invalid(msg) => write!(f, "invalid frame: {msg}"),
        }
    }
}

impl std::error::Error for FrameError {}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a JSON value into a validated frame.
pub fn parse_frame(value: &Value) -> Result<Frame, FrameError> {
    let object = match value {
        Value::Object(map) => map,
        _ => return Err(FrameError::NotAnObject),
    };

    let tag = match object.get("type") {
        Some(Value::String(tag)) => tag.as_str(),
        Some(_) | None => return Err(FrameError::MissingType),
    };

    // Re-deserialize the body without the tag so deny_unknown_fields applies
    // to the variant struct.
    let mut body = object.clone();
    body.remove("type");
    let body = Value::Object(body);

    let invalid = |err: serde_json::Error| FrameError::Invalid(err.to_string());

    match tag {
        "req" => {
            let mut frame: RequestFrame = serde_json::from_value(body).map_err(invalid)?;
            frame.id = require_non_empty("id", &frame.id)?;
            frame.method = require_non_empty("method", &frame.method)?;
            Ok(Frame::Request(frame))
        }
        "res" => {
            let mut frame: ResponseFrame = serde_json::from_value(body).map_err(invalid)?;
            frame.id = require_non_empty("id", &frame.id)?;
            if let Some(ref error) = frame.error {
                require_non_empty("error.code", &error.code)?;
                require_non_empty("error.message", &error.message)?;
            }
            Ok(Frame::Response(frame))
        }
        "event" => {
            let mut frame: EventFrame = serde_json::from_value(body).map_err(invalid)?;
            frame.event = require_non_empty("event", &frame.event)?;
            Ok(Frame::Event(frame))
        }
        other => Err(FrameError::UnknownType(other.to_string())),
    }
}

/// Parse raw wire text into a validated frame.
pub fn parse_frame_str(text: &str) -> Result<Frame, FrameError> {
    let value: Value = serde_json::from_str(text).map_err(|_| FrameError::NotAnObject)?;
    parse_frame(&value)
}

/// Extract the request id to echo in an error response for a message that
/// failed frame validation. Falls back to [`UNRECOVERABLE_ID`].
pub fn recover_request_id(text: &str) -> String {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => match map.get("id") {
            Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
            _ => UNRECOVERABLE_ID.to_string(),
        },
        _ => UNRECOVERABLE_ID.to_string(),
    }
}

/// Required strings are trimmed; an empty result rejects the frame.
fn require_non_empty(field: &str, value: &str) -> Result<String, FrameError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FrameError::Invalid(format!("{field} must be non-empty")));
    }
    Ok(trimmed.to_string())
}
