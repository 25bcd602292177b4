//! Per-connection session state machine.
//!
//! A session starts in PreConnect: the first frame must be a
//! `gateway.connect` request whose protocol range covers this server's
//! version (and whose token matches, when token auth is configured). Once
//! open, frames are handled strictly in order; each request produces zero
//! or more event frames followed by exactly one response frame. Protocol
//! errors never tear the session down.
//!
//! The machine is transport-free: `handle_text` maps one inbound text
//! frame to the ordered list of outbound frames, so scenario tests drive
//! it without sockets and the WebSocket loop stays a dumb pump.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use aegis_protocol::{
    codes, parse_frame_str, recover_request_id, ErrorShape, EventFrame, Frame, RequestFrame,
    ResponseFrame,
};

use crate::methods;
use crate::state::AppState;
use crate::{PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION};

// ---------------------------------------------------------------------------
// gateway.connect params
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConnectClientInfo {
    name: String,
    kind: String,
    platform: String,
    version: String,
    #[serde(default)]
    #[allow(dead_code)]
    device_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConnectProtocolRange {
    min: u64,
    max: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConnectParams {
    client: ConnectClientInfo,
    protocol: ConnectProtocolRange,
    #[serde(default)]
    auth: Option<Map<String, Value>>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct Session {
    state: Arc<AppState>,
    connected: bool,
    session_id: Option<String>,
    /// Session-scoped marketplace follows: (accountId, strategyId) → follow
    /// payload. Dies with the session by design.
    pub(crate) follows: BTreeMap<(String, String), Value>,
    seq: u64,
}

impl Session {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            connected: false,
            session_id: None,
            follows: BTreeMap::new(),
            seq: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub(crate) fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Wrap a server-initiated event with this session's sequence number.
    pub fn event_frame(&mut self, event: &str, payload: Value) -> String {
        self.seq += 1;
        Frame::Event(EventFrame {
            event: event.to_string(),
            payload: Some(payload),
            seq: Some(self.seq),
        })
        .to_wire()
    }

    pub(crate) fn response_wire(response: ResponseFrame) -> String {
        Frame::Response(response).to_wire()
    }

    /// Handle one inbound text frame; returns the outbound frames in send
    /// order (events first, then the response).
    pub async fn handle_text(&mut self, text: &str) -> Vec<String> {
        let frame = match parse_frame_str(text) {
            Ok(frame) => frame,
            Err(_) => {
                return vec![Self::response_wire(ResponseFrame::err(
                    recover_request_id(text),
                    ErrorShape::new(codes::INVALID_REQUEST, "invalid request frame"),
                ))];
            }
        };

        let request = match frame {
            Frame::Request(request) => request,
            Frame::Response(_) | Frame::Event(_) => {
                return vec![Self::response_wire(ResponseFrame::err(
                    recover_request_id(text),
                    ErrorShape::new(
                        codes::INVALID_REQUEST,
                        "gateway accepts request frames only",
                    ),
                ))];
            }
        };

        if !self.connected {
            return vec![self.handle_connect(request).await];
        }

        methods::dispatch(self, request).await
    }

    // -----------------------------------------------------------------------
    // PreConnect
    // -----------------------------------------------------------------------

    async fn handle_connect(&mut self, request: RequestFrame) -> String {
        if request.method != "gateway.connect" {
            return Self::response_wire(ResponseFrame::err(
                request.id,
                ErrorShape::new(
                    codes::INVALID_REQUEST,
                    "first request must be gateway.connect",
                ),
            ));
        }

        let params: ConnectParams =
            match serde_json::from_value(Value::Object(request.params.clone())) {
                Ok(params) => params,
                Err(_) => {
                    return Self::response_wire(ResponseFrame::err(
                        request.id,
                        ErrorShape::new(codes::INVALID_PARAMS, "invalid gateway.connect params"),
                    ));
                }
            };

        if params.protocol.min < 1
            || params.protocol.max < 1
            || params.protocol.min > PROTOCOL_VERSION
            || params.protocol.max < PROTOCOL_VERSION
        {
            return Self::response_wire(ResponseFrame::err(
                request.id,
                ErrorShape::new(codes::INVALID_REQUEST, "protocol mismatch")
                    .with_details(json!({"expectedProtocol": PROTOCOL_VERSION})),
            ));
        }

        // Bearer-token auth, compared against configuration. Any other auth
        // mode admits without a token.
        let auth_config = {
            let config = self.state.config.read().await;
            config.gateway.auth.clone()
        };
        if auth_config.mode == "token" {
            let presented = params
                .auth
                .as_ref()
                .and_then(|auth| auth.get("token"))
                .and_then(Value::as_str);
            if presented != Some(auth_config.token.as_str()) {
                return Self::response_wire(ResponseFrame::err(
                    request.id,
                    ErrorShape::new(codes::INVALID_REQUEST, "authentication failed"),
                ));
            }
        }

        let session_id = format!("sess_{}", &Uuid::new_v4().simple().to_string()[..12]);
        self.connected = true;
        self.session_id = Some(session_id.clone());
        tracing::info!(
            session_id = %session_id,
            client = %params.client.name,
            kind = %params.client.kind,
            platform = %params.client.platform,
            version = %params.client.version,
            "session connected"
        );

        Self::response_wire(ResponseFrame::ok(
            request.id,
            json!({
                "protocol": {"selected": PROTOCOL_VERSION},
                "session": {"sessionId": session_id, "role": "operator"},
                "server": {"name": SERVER_NAME, "version": SERVER_VERSION},
            }),
        ))
    }
}
