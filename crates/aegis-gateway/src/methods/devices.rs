use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::methods::{parse_params, Failure, MethodResult, Reply};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PairParams {
    device_id: String,
    platform: String,
    label: String,
    push_token: String,
}

pub(crate) async fn pair(state: &AppState, params: &Map<String, Value>) -> MethodResult {
    let params: PairParams = parse_params(params)?;
    let device = state
        .devices
        .write()
        .await
        .pair(
            &params.device_id,
            &params.platform,
            &params.label,
            &params.push_token,
            Utc::now(),
        )
        .map_err(|err| Failure::system(format!("device persistence failed: {err:#}")))?;

    Ok(Reply::ok(json!({"device": device.public_payload()})).with_audit(
        "devices.pair",
        json!({"deviceId": device.device_id, "platform": device.platform}),
    ))
}

pub(crate) async fn list(state: &AppState) -> MethodResult {
    let devices = state.devices.read().await;
    let items: Vec<Value> = devices
        .list()
        .into_iter()
        .map(|device| device.public_payload())
        .collect();
    Ok(Reply::ok(json!({"devices": items})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct DeviceIdParams {
    device_id: String,
}

pub(crate) async fn unpair(state: &AppState, params: &Map<String, Value>) -> MethodResult {
    let params: DeviceIdParams = parse_params(params)?;
    let removed = state
        .devices
        .write()
        .await
        .unpair(&params.device_id)
        .map_err(|err| Failure::system(format!("device persistence failed: {err:#}")))?;

    Ok(Reply::ok(json!({"removed": removed})).with_audit(
        "devices.unpair",
        json!({"deviceId": params.device_id, "removed": removed}),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RegisterPushParams {
    device_id: String,
    push_token: String,
}

pub(crate) async fn register_push(state: &AppState, params: &Map<String, Value>) -> MethodResult {
    let params: RegisterPushParams = parse_params(params)?;
    let device = state
        .devices
        .write()
        .await
        .register_push(&params.device_id, &params.push_token, Utc::now())
        .map_err(|err| Failure::system(format!("device persistence failed: {err:#}")))?;

    match device {
        Some(device) => Ok(Reply::ok(json!({"device": device.public_payload()})).with_audit(
            "devices.registerPush",
            json!({"deviceId": device.device_id}),
        )),
        None => Err(
            Failure::not_found(format!("unknown device: {}", params.device_id)).with_audit(
                "devices.registerPush.blocked",
                json!({"deviceId": params.device_id, "error": "unknown device"}),
            ),
        ),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct NotifyTestParams {
    device_id: String,
    #[serde(default)]
    message: Option<String>,
}

pub(crate) async fn notify_test(state: &AppState, params: &Map<String, Value>) -> MethodResult {
    let params: NotifyTestParams = parse_params(params)?;
    let message = params.message.unwrap_or_else(|| "test".to_string());
    let outcome = state
        .devices
        .write()
        .await
        .notify_test(&params.device_id, &message, Utc::now())
        .map_err(|err| Failure::system(format!("device persistence failed: {err:#}")))?;

    Ok(Reply::ok(outcome.clone()).with_audit(
        "devices.notifyTest",
        json!({"deviceId": params.device_id, "outcome": outcome}),
    ))
}
