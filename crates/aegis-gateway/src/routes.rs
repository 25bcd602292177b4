//! HTTP surface: `GET /health` and the `GET /ws` session endpoint.
//!
//! The WebSocket loop is a dumb pump: inbound text frames go through the
//! session state machine, broadcast bus events are forwarded to connected
//! sessions, and everything else (ping/pong, close) is transport
//! housekeeping.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use crate::session::Session;
use crate::state::AppState;

/// Build the application router wired to the given shared state.
/// Middleware layers (CORS, tracing) are attached by `main.rs` so tests
/// can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_session(socket, state))
}

/// Per-connection task. Within one session, frame handling is strictly
/// sequential: the next inbound frame is not processed until the previous
/// request's events and response are on the wire.
async fn run_session(socket: WebSocket, state: Arc<AppState>) {
    let mut session = Session::new(Arc::clone(&state));
    let mut bus_rx = state.bus.subscribe();
    let (mut tx, mut rx) = socket.split();

    loop {
        tokio::select! {
            message = rx.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        for frame in session.handle_text(&text).await {
                            if tx.send(Message::Text(frame)).await.is_err() {
                                info!(session_id = ?session.session_id(), "send failed; closing session");
                                return;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if tx.send(Message::Pong(data)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        debug!(error = %err, "websocket receive error; closing session");
                        break;
                    }
                    _ => {}
                }
            }

            bus_event = bus_rx.recv() => {
                match bus_event {
                    Ok(event) => {
                        // Server-initiated events only flow once the session
                        // has completed gateway.connect.
                        if session.is_connected() {
                            let frame = session.event_frame(&event.event, event.payload);
                            if tx.send(Message::Text(frame)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "session lagged behind the event bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    info!(session_id = ?session.session_id(), "session closed");
}
