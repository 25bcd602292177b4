//! Method dispatch for open sessions.
//!
//! Every handler produces a [`Reply`] (payload + events emitted before the
//! response + an optional audit obligation) or a [`Failure`] (structured
//! error with the same event/audit hooks). `dispatch` writes the audit
//! record before any frame goes out, then emits events, then exactly one
//! response. Failed side-effecting methods audit under
//! `<method>.blocked`.

mod accounts;
mod agent;
mod backtests;
mod config;
mod copytrade;
mod devices;
mod feeds;
mod gateway;
mod marketplace;
mod memory;
mod plugins;
mod risk;
mod trades;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use aegis_protocol::{codes, ErrorShape, RequestFrame, ResponseFrame};

use crate::session::Session;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Handler outcome types
// ---------------------------------------------------------------------------

pub(crate) struct AuditRecord {
    pub action: String,
    pub data: Value,
}

pub(crate) struct Reply {
    pub payload: Value,
    pub events: Vec<(String, Value)>,
    pub audit: Option<AuditRecord>,
}

impl Reply {
    pub fn ok(payload: Value) -> Self {
        Self {
            payload,
            events: Vec::new(),
            audit: None,
        }
    }

    pub fn with_event(mut self, event: &str, payload: Value) -> Self {
        self.events.push((event.to_string(), payload));
        self
    }

    pub fn with_audit(mut self, action: &str, data: Value) -> Self {
        self.audit = Some(AuditRecord {
            action: action.to_string(),
            data,
        });
        self
    }
}

pub(crate) struct Failure {
    pub error: ErrorShape,
    pub events: Vec<(String, Value)>,
    pub audit: Option<AuditRecord>,
}

impl Failure {
    pub fn new(error: ErrorShape) -> Self {
        Self {
            error,
            events: Vec::new(),
            audit: None,
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorShape::new(codes::INVALID_PARAMS, message.into()))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorShape::new(codes::NOT_FOUND, message.into()))
    }

    /// Disk or subsystem failure with no more specific mapping.
    pub fn system(message: impl Into<String>) -> Self {
        Self::new(ErrorShape::new(codes::CONNECTOR_ERROR, message.into()).with_retryable(false))
    }

    pub fn with_event(mut self, event: &str, payload: Value) -> Self {
        self.events.push((event.to_string(), payload));
        self
    }

    pub fn with_audit(mut self, action: &str, data: Value) -> Self {
        self.audit = Some(AuditRecord {
            action: action.to_string(),
            data,
        });
        self
    }
}

pub(crate) type MethodResult = Result<Reply, Failure>;

/// Parse request params into a method's typed schema.
pub(crate) fn parse_params<T: DeserializeOwned>(
    params: &Map<String, Value>,
) -> Result<T, Failure> {
    serde_json::from_value(Value::Object(params.clone()))
        .map_err(|err| Failure::invalid_params(err.to_string()))
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub(crate) async fn dispatch(session: &mut Session, request: RequestFrame) -> Vec<String> {
    let state = session.state();
    let outcome = route(session, &state, &request).await;

    let (events, audit, response) = match outcome {
        Ok(reply) => (
            reply.events,
            reply.audit,
            ResponseFrame::ok(request.id.clone(), reply.payload),
        ),
        Err(failure) => (
            failure.events,
            failure.audit,
            ResponseFrame::err(request.id.clone(), failure.error),
        ),
    };

    // Audit is durable before anything reaches the wire.
    if let Some(audit) = audit {
        let mut store = state.audit.lock().await;
        if let Err(err) = store.append("user", &audit.action, &request.id, audit.data) {
            tracing::error!(error = %err, action = %audit.action, "audit append failed");
        }
    }

    let mut frames = Vec::with_capacity(events.len() + 1);
    for (event, payload) in events {
        frames.push(session.event_frame(&event, payload));
    }
    frames.push(Session::response_wire(response));
    frames
}

async fn route(session: &mut Session, state: &AppState, request: &RequestFrame) -> MethodResult {
    let params = &request.params;
    match request.method.as_str() {
        "gateway.connect" => Err(Failure::new(ErrorShape::new(
            codes::INVALID_REQUEST,
            "session is already connected",
        ))),
        "gateway.ping" => gateway::ping(),
        "gateway.status" => gateway::status(session, state),

        "config.get" => config::get(state).await,
        "config.schema" => config::schema(),
        "config.patch" => config::patch(state, params).await,

        "plugins.status" => plugins::status(state).await,

        "risk.preview" => risk::preview(&request.id, params),
        "risk.status" => risk::status(state).await,
        "risk.emergencyStop" => risk::emergency_stop(state, params).await,
        "risk.resume" => risk::resume(state, params).await,

        "agent.run" => agent::run(state, params).await,
        "agent.queue.status" => agent::queue_status(state, params).await,

        "memory.search" => memory::search(state, params).await,

        "backtests.run" => backtests::run(&request.id, params),

        "devices.pair" => devices::pair(state, params).await,
        "devices.list" => devices::list(state).await,
        "devices.unpair" => devices::unpair(state, params).await,
        "devices.registerPush" => devices::register_push(state, params).await,
        "devices.notifyTest" => devices::notify_test(state, params).await,

        "trades.place" => trades::place(state, &request.id, params).await,
        "trades.modify" => trades::modify(state, &request.id, params).await,
        "trades.cancel" => trades::cancel(state, &request.id, params).await,
        "trades.closePosition" => trades::close_position(state, &request.id, params).await,

        "accounts.connect" => accounts::connect(state, params).await,
        "accounts.list" => accounts::list(state).await,
        "accounts.get" => accounts::get(state, params).await,
        "accounts.status" => accounts::status(state, params).await,
        "accounts.disconnect" => accounts::disconnect(state, params).await,

        "feeds.list" => feeds::list(state).await,
        "feeds.subscribe" => feeds::subscribe(state, params).await,
        "feeds.unsubscribe" => feeds::unsubscribe(state, params).await,
        "feeds.getCandles" => feeds::get_candles(state, params).await,

        "agents.create" => agent::create(state, params).await,
        "agents.list" => agent::list(state).await,
        "agents.get" => agent::get(state, params).await,

        "marketplace.signals" => marketplace::signals(),
        "marketplace.follow" => marketplace::follow(session, params),
        "marketplace.unfollow" => marketplace::unfollow(session, params),
        "marketplace.myFollows" => marketplace::my_follows(session),

        "copytrade.preview" => copytrade::preview(state, &request.id, params).await,
        "copytrade.status" => copytrade::status(state).await,
        "copytrade.pause" => copytrade::pause(state).await,
        "copytrade.resume" => copytrade::resume(state).await,

        other => Err(Failure::not_found(format!("unknown method: {other}"))),
    }
}
