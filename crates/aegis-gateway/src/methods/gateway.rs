use chrono::Utc;
use serde_json::json;

use crate::methods::{MethodResult, Reply};
use crate::session::Session;
use crate::state::AppState;
use crate::{PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION};

pub(crate) fn ping() -> MethodResult {
    Ok(Reply::ok(json!({"now": Utc::now()})))
}

pub(crate) fn status(session: &Session, state: &AppState) -> MethodResult {
    let uptime_seconds = (Utc::now() - state.started_at).num_seconds().max(0);
    Ok(Reply::ok(json!({
        "protocolVersion": PROTOCOL_VERSION,
        "uptimeSeconds": uptime_seconds,
        "sessionId": session.session_id(),
        "server": {"name": SERVER_NAME, "version": SERVER_VERSION},
    })))
}
