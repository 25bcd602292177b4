use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use aegis_risk::{evaluate, AccountRiskSnapshot, EmergencyAction, RiskPolicy, TradeIntent};

use crate::methods::{parse_params, Failure, MethodResult, Reply};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct RiskEvalParams {
    pub intent: TradeIntent,
    pub policy: RiskPolicy,
    pub snapshot: AccountRiskSnapshot,
}

impl RiskEvalParams {
    pub(crate) fn validate(&self) -> Result<(), Failure> {
        self.intent.validate().map_err(Failure::invalid_params)?;
        self.policy.validate().map_err(Failure::invalid_params)?;
        Ok(())
    }
}

pub(crate) fn preview(request_id: &str, params: &Map<String, Value>) -> MethodResult {
    let params: RiskEvalParams = parse_params(params)?;
    params.validate()?;

    let decision = evaluate(&params.intent, &params.policy, &params.snapshot);
    let decision_value =
        serde_json::to_value(&decision).expect("decision serialization must not fail");

    Ok(Reply::ok(decision_value.clone())
        .with_event(
            "event.risk.preview",
            json!({"requestId": request_id, "decision": decision_value}),
        )
        .with_audit("risk.preview", json!({"decision": decision_value})))
}

pub(crate) async fn status(state: &AppState) -> MethodResult {
    let status = state.risk_control.read().await.status();
    Ok(Reply::ok(
        serde_json::to_value(&status).expect("risk status serialization must not fail"),
    )
    .with_audit("risk.status", json!({})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct EmergencyStopParams {
    action: EmergencyAction,
    #[serde(default)]
    reason: Option<String>,
}

pub(crate) async fn emergency_stop(state: &AppState, params: &Map<String, Value>) -> MethodResult {
    let params: EmergencyStopParams = parse_params(params)?;
    let status = state
        .risk_control
        .write()
        .await
        .activate(params.action, params.reason.clone(), Utc::now());
    let status_value =
        serde_json::to_value(&status).expect("risk status serialization must not fail");

    // Status event first, then the action-specific secondary event.
    let (secondary_event, secondary_payload) = match params.action {
        EmergencyAction::CancelAll => (
            "event.trade.canceled",
            json!({"scope": "all", "reason": params.reason}),
        ),
        EmergencyAction::CloseAll => (
            "event.trade.closed",
            json!({"scope": "all", "reason": params.reason}),
        ),
        EmergencyAction::PauseTrading | EmergencyAction::DisableLive => (
            "event.risk.alert",
            json!({
                "kind": "emergencyStop",
                "action": params.action.as_str(),
                "reason": params.reason,
            }),
        ),
    };

    Ok(Reply::ok(status_value.clone())
        .with_event("event.risk.emergencyStop", status_value.clone())
        .with_event(secondary_event, secondary_payload)
        .with_audit(
            "risk.emergencyStop",
            json!({"action": params.action.as_str(), "reason": params.reason, "status": status_value}),
        ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ResumeParams {
    #[serde(default)]
    reason: Option<String>,
}

pub(crate) async fn resume(state: &AppState, params: &Map<String, Value>) -> MethodResult {
    let params: ResumeParams = parse_params(params)?;
    let status = state
        .risk_control
        .write()
        .await
        .resume(params.reason.clone(), Utc::now());
    let status_value =
        serde_json::to_value(&status).expect("risk status serialization must not fail");

    Ok(Reply::ok(status_value.clone())
        .with_event("event.risk.emergencyStop", status_value.clone())
        .with_audit(
            "risk.resume",
            json!({"reason": params.reason, "status": status_value}),
        ))
}
