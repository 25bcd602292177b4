use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use aegis_queues::{AgentRequest, RequestPriority};

use crate::methods::{parse_params, Failure, MethodResult, Reply};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// agent.run / agent.queue.status
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RunRequestSpec {
    request_id: String,
    kind: String,
    #[serde(default)]
    priority: Option<RequestPriority>,
    #[serde(default)]
    dedupe_key: Option<String>,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RunParams {
    agent_id: String,
    request: RunRequestSpec,
}

pub(crate) async fn run(state: &AppState, params: &Map<String, Value>) -> MethodResult {
    let params: RunParams = parse_params(params)?;
    let request = AgentRequest {
        request_id: params.request.request_id,
        agent_id: params.agent_id.clone(),
        kind: params.request.kind,
        priority: params.request.priority.unwrap_or_default(),
        dedupe_key: params.request.dedupe_key,
        payload: params.request.payload.unwrap_or_default(),
    };
    request.validate().map_err(Failure::invalid_params)?;

    let request_id = request.request_id.clone();
    let now_ms = Utc::now().timestamp_millis();

    let (decision, queue_status) = {
        let mut queues = state.queues.lock().await;
        let decision = queues
            .enqueue(request, now_ms)
            .map_err(|err| Failure::system(format!("queue persistence failed: {err:#}")))?;
        (decision, queues.status_payload(&params.agent_id))
    };

    let decision_value =
        serde_json::to_value(&decision).expect("decision serialization must not fail");

    Ok(Reply::ok(json!({"decision": decision_value}))
        .with_event("event.agent.status", queue_status)
        .with_audit(
            "agent.run",
            json!({
                "agentId": params.agent_id,
                "requestId": request_id,
                "decision": decision_value,
            }),
        ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct QueueStatusParams {
    agent_id: String,
}

pub(crate) async fn queue_status(state: &AppState, params: &Map<String, Value>) -> MethodResult {
    let params: QueueStatusParams = parse_params(params)?;
    let payload = state.queues.lock().await.status_payload(&params.agent_id);
    Ok(Reply::ok(payload))
}

// ---------------------------------------------------------------------------
// agents.create / agents.list / agents.get
// ---------------------------------------------------------------------------

const DEFAULT_SOUL_TEMPLATE: &str = "# SOUL\n\nPatient, risk-first, process over outcome.";
const DEFAULT_MANUAL_TEMPLATE: &str =
    "# TRADING MANUAL\n\nTrade only the configured symbols. Respect every risk gate.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CreateParams {
    agent_id: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    soul_template: Option<String>,
    #[serde(default)]
    manual_template: Option<String>,
}

pub(crate) async fn create(state: &AppState, params: &Map<String, Value>) -> MethodResult {
    let params: CreateParams = parse_params(params)?;
    if params.agent_id.trim().is_empty() {
        return Err(Failure::invalid_params("agentId must be non-empty"));
    }

    let label = params.label.unwrap_or_else(|| params.agent_id.clone());
    let agent = state
        .agents
        .write()
        .await
        .create(
            &params.agent_id,
            &label,
            params
                .soul_template
                .as_deref()
                .unwrap_or(DEFAULT_SOUL_TEMPLATE),
            params
                .manual_template
                .as_deref()
                .unwrap_or(DEFAULT_MANUAL_TEMPLATE),
            Utc::now(),
        )
        .map_err(|err| Failure::system(format!("agent bootstrap failed: {err:#}")))?;

    let agent_value = serde_json::to_value(&agent).expect("agent serialization must not fail");
    Ok(Reply::ok(json!({"agent": agent_value}))
        .with_event(
            "event.agent.status",
            json!({"agentId": agent.agent_id, "status": agent.status}),
        )
        .with_audit(
            "agents.create",
            json!({"agentId": agent.agent_id, "label": label}),
        ))
}

pub(crate) async fn list(state: &AppState) -> MethodResult {
    let agents = state.agents.read().await;
    let items: Vec<Value> = agents
        .list()
        .into_iter()
        .map(|a| serde_json::to_value(a).expect("agent serialization must not fail"))
        .collect();
    Ok(Reply::ok(json!({"agents": items})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct GetParams {
    agent_id: String,
}

pub(crate) async fn get(state: &AppState, params: &Map<String, Value>) -> MethodResult {
    let params: GetParams = parse_params(params)?;
    let agents = state.agents.read().await;
    match agents.get(&params.agent_id) {
        Some(agent) => Ok(Reply::ok(json!({
            "agent": serde_json::to_value(agent).expect("agent serialization must not fail"),
        }))),
        None => Err(Failure::not_found(format!(
            "unknown agent: {}",
            params.agent_id
        ))),
    }
}
