//! Shared helpers for gateway scenario tests: an in-process AppState over a
//! temp data dir, and frame builders for driving the session machine
//! without sockets.
#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;

use aegis_config::{default_config, AppConfig};
use aegis_gateway::session::Session;
use aegis_gateway::state::AppState;

/// Config with auth disabled, for tests that aren't about auth.
pub fn open_config() -> AppConfig {
    let mut config = default_config();
    config.gateway.auth.mode = "none".to_string();
    config
}

pub fn make_state(dir: &tempfile::TempDir, config: AppConfig) -> Arc<AppState> {
    AppState::new(config, dir.path().join("data"), dir.path().join("agents")).expect("app state")
}

pub fn make_session(state: &Arc<AppState>) -> Session {
    Session::new(Arc::clone(state))
}

pub fn request(id: &str, method: &str, params: Value) -> String {
    json!({"type": "req", "id": id, "method": method, "params": params}).to_string()
}

pub fn connect_frame() -> String {
    request(
        "req_connect_1",
        "gateway.connect",
        json!({
            "client": {"name": "web", "kind": "web", "platform": "browser", "version": "0.1.0"},
            "protocol": {"min": 1, "max": 1},
        }),
    )
}

pub fn parse(frame: &str) -> Value {
    serde_json::from_str(frame).expect("frame is valid JSON")
}

/// Drive one frame and split the output into (events, response).
pub async fn roundtrip(session: &mut Session, frame: &str) -> (Vec<Value>, Value) {
    let mut frames: Vec<Value> = Vec::new();
    for out in session.handle_text(frame).await {
        frames.push(parse(&out));
    }
    let response = frames.pop().expect("at least a response frame");
    assert_eq!(response["type"], json!("res"));
    for event in &frames {
        assert_eq!(event["type"], json!("event"));
    }
    (frames, response)
}

/// Connect the session and assert success.
pub async fn connect(session: &mut Session) {
    let (_events, response) = roundtrip(session, &connect_frame()).await;
    assert_eq!(response["ok"], json!(true), "connect failed: {response}");
}
