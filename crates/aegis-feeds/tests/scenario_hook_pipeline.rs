//! Pipeline scenarios: topic matching, wake request construction, trade
//! intents, and per-hook error isolation.

use aegis_feeds::{FeedEvent, FeedHookPipeline, HookRegistration, HookType};
use aegis_hooks::HookRuntime;
use chrono::{TimeZone, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;

fn event(topic: &str) -> FeedEvent {
    FeedEvent {
        event_id: "evt_1".to_string(),
        ts: "2026-07-01T10:00:00Z".to_string(),
        source: "market.candles".to_string(),
        topic: topic.to_string(),
        payload: Map::new(),
        symbol: Some("ETHUSDm".to_string()),
        timeframe: Some("5m".to_string()),
        account_id: None,
    }
}

fn registration(hook_id: &str, hook_type: HookType, topics: &[&str]) -> HookRegistration {
    HookRegistration {
        hook_id: hook_id.to_string(),
        agent_id: "agent_eth_5m".to_string(),
        hook_type,
        hook_path: format!("hooks/{hook_id}.rs"),
        topics: topics.iter().map(|t| t.to_string()).collect(),
    }
}

#[tokio::test]
async fn wake_decision_becomes_agent_request() {
    let runtime = Arc::new(HookRuntime::new());
    runtime.register(
        "hooks/wake.rs",
        Arc::new(|_: &Value, _: &Value| {
            Ok(json!({"decision": "WAKE", "reason": "candle closed", "dedupeKey": "eth-candle"}))
        }),
    );

    let mut pipeline = FeedHookPipeline::new(runtime);
    pipeline.register_hook(registration("wake", HookType::Wake, &["market.candle.closed"]));

    let now = Utc.with_ymd_and_hms(2026, 7, 1, 10, 0, 0).unwrap();
    let output = pipeline.process_event(&event("market.candle.closed"), now).await;

    assert_eq!(output.wake_requests.len(), 1);
    let request = &output.wake_requests[0];
    assert_eq!(request.request_id, "ar_evt_1_wake");
    assert_eq!(request.agent_id, "agent_eth_5m");
    assert_eq!(request.kind, "hook_trigger");
    assert_eq!(request.dedupe_key.as_deref(), Some("eth-candle"));
    assert_eq!(request.payload["triggerTopic"], json!("market.candle.closed"));
    assert!(output.trade_intents.is_empty());
    assert!(output.hook_errors.is_empty());
}

#[tokio::test]
async fn topic_mismatch_skips_the_hook() {
    let runtime = Arc::new(HookRuntime::new());
    runtime.register(
        "hooks/wake.rs",
        Arc::new(|_: &Value, _: &Value| Ok(json!({"decision": "WAKE"}))),
    );

    let mut pipeline = FeedHookPipeline::new(runtime);
    pipeline.register_hook(registration("wake", HookType::Wake, &["market.tick"]));

    let now = Utc.with_ymd_and_hms(2026, 7, 1, 10, 0, 0).unwrap();
    let output = pipeline.process_event(&event("market.candle.closed"), now).await;
    assert!(output.wake_requests.is_empty());
}

#[tokio::test]
async fn autotrade_intent_is_validated_and_collected() {
    let runtime = Arc::new(HookRuntime::new());
    runtime.register(
        "hooks/auto.rs",
        Arc::new(|_: &Value, _: &Value| {
            Ok(json!({
                "decision": "TRADE_INTENT",
                "intent": {
                    "accountId": "acct_demo_1",
                    "symbol": "ETHUSDm",
                    "action": "PLACE_MARKET_ORDER",
                    "side": "buy",
                    "volume": 0.1,
                    "stopLoss": 2400.0,
                    "takeProfit": 2700.0,
                },
            }))
        }),
    );

    let mut pipeline = FeedHookPipeline::new(runtime);
    pipeline.register_hook(registration("auto", HookType::Autotrade, &["market.candle.closed"]));

    let now = Utc.with_ymd_and_hms(2026, 7, 1, 10, 0, 0).unwrap();
    let output = pipeline.process_event(&event("market.candle.closed"), now).await;

    assert_eq!(output.trade_intents.len(), 1);
    assert_eq!(output.trade_intents[0].symbol, "ETHUSDm");
}

#[tokio::test]
async fn hook_failures_are_isolated_per_hook() {
    let runtime = Arc::new(HookRuntime::new());
    runtime.register(
        "hooks/broken.rs",
        Arc::new(|_: &Value, _: &Value| Err("boom".to_string())),
    );
    runtime.register(
        "hooks/wake.rs",
        Arc::new(|_: &Value, _: &Value| Ok(json!({"decision": "WAKE"}))),
    );

    let mut pipeline = FeedHookPipeline::new(runtime);
    pipeline.register_hook(registration("broken", HookType::Wake, &["market.candle.closed"]));
    pipeline.register_hook(registration("wake", HookType::Wake, &["market.candle.closed"]));

    let now = Utc.with_ymd_and_hms(2026, 7, 1, 10, 0, 0).unwrap();
    let output = pipeline.process_event(&event("market.candle.closed"), now).await;

    assert_eq!(output.hook_errors.len(), 1);
    assert_eq!(output.hook_errors[0]["hookId"], json!("broken"));
    // The healthy hook still produced its wake request.
    assert_eq!(output.wake_requests.len(), 1);
}
