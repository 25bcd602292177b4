use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use aegis_marketplace::{CopyTradeSignal, FollowerConstraints};

use crate::methods::{parse_params, Failure, MethodResult, Reply};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PreviewParams {
    account_id: String,
    signal: CopyTradeSignal,
    constraints: FollowerConstraints,
}

/// Map one published signal for a follower account. The preview never
/// places an order; when copy-trading is live (not paused) the mapped
/// intent is additionally announced as `event.copytrade.execution` so
/// dashboards can watch the mirror flow.
pub(crate) async fn preview(
    state: &AppState,
    request_id: &str,
    params: &Map<String, Value>,
) -> MethodResult {
    let params: PreviewParams = parse_params(params)?;
    if params.account_id.trim().is_empty() {
        return Err(Failure::invalid_params("accountId must be non-empty"));
    }
    params
        .constraints
        .validate()
        .map_err(Failure::invalid_params)?;
    if !(params.signal.volume > 0.0) {
        return Err(Failure::invalid_params("signal.volume must be > 0"));
    }

    let (result, paused) = {
        let mut hub = state.copytrade.lock().await;
        let result = hub.preview(
            &params.account_id,
            params.constraints.clone(),
            &params.signal,
            Utc::now(),
        );
        (result, hub.paused)
    };

    let result_value =
        serde_json::to_value(&result).expect("mapping result serialization must not fail");

    let mut reply = Reply::ok(result_value.clone()).with_event(
        "event.copytrade.preview",
        json!({
            "requestId": request_id,
            "accountId": params.account_id,
            "result": result_value.clone(),
        }),
    );

    if let Some(ref intent) = result.intent {
        if !paused {
            reply = reply.with_event(
                "event.copytrade.execution",
                json!({
                    "accountId": params.account_id,
                    "signalId": params.signal.signal_id,
                    "intent": serde_json::to_value(intent)
                        .expect("intent serialization must not fail"),
                }),
            );
        }
    }

    Ok(reply.with_audit(
        "copytrade.preview",
        json!({
            "accountId": params.account_id,
            "signalId": params.signal.signal_id,
            "result": result_value,
        }),
    ))
}

pub(crate) async fn status(state: &AppState) -> MethodResult {
    let payload = state.copytrade.lock().await.status_payload();
    Ok(Reply::ok(payload).with_audit("copytrade.status", json!({})))
}

pub(crate) async fn pause(state: &AppState) -> MethodResult {
    let mut hub = state.copytrade.lock().await;
    hub.paused = true;
    Ok(Reply::ok(json!({"paused": true})).with_audit("copytrade.pause", json!({})))
}

pub(crate) async fn resume(state: &AppState) -> MethodResult {
    let mut hub = state.copytrade.lock().await;
    hub.paused = false;
    Ok(Reply::ok(json!({"paused": false})).with_audit("copytrade.resume", json!({})))
}
