use serde_json::{json, Map, Value};

use aegis_config::{apply_patch, config_hash, config_schema};

use crate::methods::{Failure, MethodResult, Reply};
use crate::state::AppState;

pub(crate) async fn get(state: &AppState) -> MethodResult {
    let config = state.config.read().await;
    Ok(Reply::ok(json!({
        "config": serde_json::to_value(&*config).expect("config serialization must not fail"),
        "configHash": config_hash(&config),
    })))
}

pub(crate) fn schema() -> MethodResult {
    Ok(Reply::ok(json!({"schema": config_schema()})))
}

/// Deep-merge the params object into the live config and re-validate.
/// The running config is only replaced when the patched tree validates.
pub(crate) async fn patch(state: &AppState, params: &Map<String, Value>) -> MethodResult {
    let patch = Value::Object(params.clone());
    let current = state.config.read().await.clone();

    match apply_patch(&current, &patch) {
        Ok(next) => {
            let payload = json!({
                "config": serde_json::to_value(&next).expect("config serialization must not fail"),
                "configHash": config_hash(&next),
            });
            *state.config.write().await = next;
            Ok(Reply::ok(payload).with_audit("config.patch", json!({"patch": patch})))
        }
        Err(err) => Err(Failure::invalid_params(err.to_string()).with_audit(
            "config.patch.blocked",
            json!({"patch": patch, "error": err.to_string()}),
        )),
    }
}
