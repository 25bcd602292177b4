use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use aegis_hooks::HookRuntime;
use aegis_queues::{AgentRequest, RequestPriority};
use aegis_risk::TradeIntent;

/// A normalized event flowing out of a feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FeedEvent {
    pub event_id: String,
    pub ts: String,
    pub source: String,
    pub topic: String,
    #[serde(default)]
    pub payload: Map<String, Value>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub timeframe: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookType {
    Wake,
    Autotrade,
    Copytrade,
}

/// A hook wired to one or more feed topics on behalf of an agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HookRegistration {
    pub hook_id: String,
    pub agent_id: String,
    pub hook_type: HookType,
    pub hook_path: String,
    pub topics: Vec<String>,
}

/// Everything one feed event produced across all matching hooks.
#[derive(Clone, Debug, Default)]
pub struct FeedPipelineOutput {
    pub wake_requests: Vec<AgentRequest>,
    pub trade_intents: Vec<TradeIntent>,
    pub hook_errors: Vec<Value>,
}

/// Fans a feed event out to every registered hook whose topics match.
/// Hook failures (including budget overruns) are collected per hook and
/// never abort the rest of the fan-out.
pub struct FeedHookPipeline {
    hook_runtime: Arc<HookRuntime>,
    hooks: Vec<HookRegistration>,
}

impl FeedHookPipeline {
    pub fn new(hook_runtime: Arc<HookRuntime>) -> Self {
        Self {
            hook_runtime,
            hooks: Vec::new(),
        }
    }

    pub fn register_hook(&mut self, registration: HookRegistration) {
        self.hooks.push(registration);
    }

    pub fn hooks(&self) -> &[HookRegistration] {
        &self.hooks
    }

    pub async fn process_event(&self, event: &FeedEvent, now: DateTime<Utc>) -> FeedPipelineOutput {
        let mut output = FeedPipelineOutput::default();
        let event_payload =
            serde_json::to_value(event).expect("feed event serialization must not fail");

        for registration in &self.hooks {
            if !registration.topics.iter().any(|t| t == &event.topic) {
                continue;
            }

            let decision = match self
                .hook_runtime
                .evaluate_hook(&registration.hook_path, &event_payload, &json!({}), None)
                .await
            {
                Ok(decision) => decision,
                Err(err) => {
                    output.hook_errors.push(json!({
                        "hookId": registration.hook_id,
                        "agentId": registration.agent_id,
                        "error": err.to_string(),
                    }));
                    continue;
                }
            };

            let decision_type = decision
                .get("decision")
                .and_then(Value::as_str)
                .unwrap_or("IGNORE")
                .to_uppercase();

            if registration.hook_type == HookType::Wake && decision_type == "WAKE" {
                let mut payload = Map::new();
                payload.insert("reason".to_string(), decision.get("reason").cloned().unwrap_or(Value::Null));
                payload.insert("triggerEventId".to_string(), json!(event.event_id));
                payload.insert("triggerTopic".to_string(), json!(event.topic));
                payload.insert("triggerTs".to_string(), json!(now));

                output.wake_requests.push(AgentRequest {
                    request_id: format!("ar_{}_{}", event.event_id, registration.hook_id),
                    agent_id: registration.agent_id.clone(),
                    kind: "hook_trigger".to_string(),
                    priority: RequestPriority::Normal,
                    dedupe_key: decision
                        .get("dedupeKey")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    payload,
                });
            }

            if matches!(
                registration.hook_type,
                HookType::Autotrade | HookType::Copytrade
            ) && decision_type == "TRADE_INTENT"
            {
                let raw_intent = decision.get("intent").cloned().unwrap_or(json!({}));
                match serde_json::from_value::<TradeIntent>(raw_intent) {
                    Ok(intent) => output.trade_intents.push(intent),
                    Err(err) => output.hook_errors.push(json!({
                        "hookId": registration.hook_id,
                        "agentId": registration.agent_id,
                        "error": format!("invalid trade intent: {err}"),
                    })),
                }
            }
        }

        output
    }
}
