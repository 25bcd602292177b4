use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use aegis_connector::ConnectorError;
use aegis_protocol::{codes, ErrorShape};
use aegis_risk::{evaluate, RiskDecision};

use crate::methods::risk::RiskEvalParams;
use crate::methods::{parse_params, Failure, MethodResult, Reply};
use crate::state::AppState;

/// Place a market order. Two gates run before anything reaches the broker:
/// the process-wide kill-switch, then the per-account risk policy. A
/// blocked trade answers `RISK_BLOCKED` with the full decision in
/// `details.decision` and leaves a `trades.place.blocked` audit line.
pub(crate) async fn place(
    state: &AppState,
    request_id: &str,
    params: &Map<String, Value>,
) -> MethodResult {
    let params: RiskEvalParams = parse_params(params)?;
    params.validate()?;

    // Gate 1: kill-switch. Overrides policy entirely.
    {
        let control = state.risk_control.read().await;
        if control.is_stopped() {
            let decision = RiskDecision::from_violations(vec![control.emergency_stop_violation()]);
            let decision_value =
                serde_json::to_value(&decision).expect("decision serialization must not fail");
            return Err(risk_blocked(request_id, decision_value));
        }
    }

    // Gate 2: per-account policy.
    let decision = evaluate(&params.intent, &params.policy, &params.snapshot);
    if !decision.allowed {
        let decision_value =
            serde_json::to_value(&decision).expect("decision serialization must not fail");
        return Err(risk_blocked(request_id, decision_value));
    }

    match state.execution.place(&params.intent, Utc::now()).await {
        Ok(execution) => {
            let execution_value =
                serde_json::to_value(&execution).expect("execution serialization must not fail");
            Ok(Reply::ok(json!({"execution": execution_value.clone()}))
                .with_event(
                    "event.trade.executed",
                    json!({"requestId": request_id, "execution": execution_value.clone()}),
                )
                .with_audit(
                    "trades.place",
                    json!({"intent": params.intent, "execution": execution_value}),
                ))
        }
        Err(err) => Err(connector_failure("trades.place", err)),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ModifyParams {
    account_id: String,
    order_id: String,
    open_price: f64,
    #[serde(default)]
    stop_loss: Option<f64>,
    #[serde(default)]
    take_profit: Option<f64>,
}

pub(crate) async fn modify(
    state: &AppState,
    request_id: &str,
    params: &Map<String, Value>,
) -> MethodResult {
    let params: ModifyParams = parse_params(params)?;
    let execution = state.execution.modify(
        &params.account_id,
        &params.order_id,
        params.open_price,
        params.stop_loss,
        params.take_profit,
        Utc::now(),
    );
    let execution_value =
        serde_json::to_value(&execution).expect("execution serialization must not fail");

    Ok(Reply::ok(json!({"execution": execution_value.clone()}))
        .with_event(
            "event.trade.modified",
            json!({"requestId": request_id, "execution": execution_value.clone()}),
        )
        .with_audit(
            "trades.modify",
            json!({"orderId": params.order_id, "execution": execution_value}),
        ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CancelParams {
    account_id: String,
    order_id: String,
}

pub(crate) async fn cancel(
    state: &AppState,
    request_id: &str,
    params: &Map<String, Value>,
) -> MethodResult {
    let params: CancelParams = parse_params(params)?;
    match state
        .execution
        .cancel(&params.account_id, &params.order_id, Utc::now())
        .await
    {
        Ok(execution) => {
            let execution_value =
                serde_json::to_value(&execution).expect("execution serialization must not fail");
            Ok(Reply::ok(json!({"execution": execution_value.clone()}))
                .with_event(
                    "event.trade.canceled",
                    json!({"requestId": request_id, "execution": execution_value.clone()}),
                )
                .with_audit(
                    "trades.cancel",
                    json!({"orderId": params.order_id, "execution": execution_value}),
                ))
        }
        Err(err) => Err(connector_failure("trades.cancel", err)),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ClosePositionParams {
    account_id: String,
    position_id: String,
}

pub(crate) async fn close_position(
    state: &AppState,
    request_id: &str,
    params: &Map<String, Value>,
) -> MethodResult {
    let params: ClosePositionParams = parse_params(params)?;
    let execution =
        state
            .execution
            .close_position(&params.account_id, &params.position_id, Utc::now());
    let execution_value =
        serde_json::to_value(&execution).expect("execution serialization must not fail");

    Ok(Reply::ok(json!({"execution": execution_value.clone()}))
        .with_event(
            "event.trade.closed",
            json!({"requestId": request_id, "execution": execution_value.clone()}),
        )
        .with_audit(
            "trades.closePosition",
            json!({"positionId": params.position_id, "execution": execution_value}),
        ))
}

// ---------------------------------------------------------------------------
// Failure helpers
// ---------------------------------------------------------------------------

fn risk_blocked(request_id: &str, decision_value: Value) -> Failure {
    Failure::new(
        ErrorShape::new(codes::RISK_BLOCKED, "trade blocked by risk controls")
            .with_details(json!({"decision": decision_value.clone()})),
    )
    .with_event(
        "event.risk.alert",
        json!({"requestId": request_id, "decision": decision_value.clone()}),
    )
    .with_audit("trades.place.blocked", json!({"decision": decision_value}))
}

fn connector_failure(method: &str, err: ConnectorError) -> Failure {
    Failure::new(
        ErrorShape::new(err.code.clone(), err.message.clone())
            .with_retryable(err.retryable)
            .with_details(json!({"provider": "connector"})),
    )
    .with_audit(
        &format!("{method}.blocked"),
        json!({"error": {"code": err.code, "message": err.message, "retryable": err.retryable}}),
    )
}
