//! Hook runtime scenarios: the time budget is hard, and the decision
//! contract is enforced.

use aegis_hooks::{HookRuntime, HookRuntimeError};
use serde_json::{json, Value};
use std::sync::Arc;

fn wake_script() -> Arc<dyn aegis_hooks::HookScript> {
    Arc::new(|event: &Value, _state: &Value| {
        Ok(json!({
            "decision": "WAKE",
            "reason": format!("topic {}", event["topic"].as_str().unwrap_or("?")),
        }))
    })
}

#[tokio::test]
async fn registered_script_evaluates_within_budget() {
    let runtime = HookRuntime::new();
    runtime.register("hooks/wake_on_candle.rs", wake_script());

    let decision = runtime
        .evaluate_hook(
            "hooks/wake_on_candle.rs",
            &json!({"topic": "market.candle.closed"}),
            &json!({}),
            None,
        )
        .await
        .expect("evaluation succeeds");

    assert_eq!(decision["decision"], json!("WAKE"));
    assert_eq!(decision["reason"], json!("topic market.candle.closed"));
}

#[tokio::test]
async fn unknown_hook_path_is_not_found() {
    let runtime = HookRuntime::new();
    let err = runtime
        .evaluate_hook("hooks/missing.rs", &json!({}), &json!({}), None)
        .await
        .expect_err("missing hook must fail");
    assert!(matches!(err, HookRuntimeError::NotFound { .. }));
}

#[tokio::test]
async fn slow_script_is_cut_off_by_the_budget() {
    let runtime = HookRuntime::new();
    runtime.register(
        "hooks/slow.rs",
        Arc::new(|_: &Value, _: &Value| {
            std::thread::sleep(std::time::Duration::from_millis(200));
            Ok(json!({"decision": "WAKE"}))
        }),
    );

    let err = runtime
        .evaluate_hook("hooks/slow.rs", &json!({}), &json!({}), Some(20))
        .await
        .expect_err("slow hook must time out");
    assert_eq!(err, HookRuntimeError::Timeout { timeout_ms: 20 });
}

#[tokio::test]
async fn non_object_decision_is_rejected() {
    let runtime = HookRuntime::new();
    runtime.register(
        "hooks/bad.rs",
        Arc::new(|_: &Value, _: &Value| Ok(json!("WAKE"))),
    );

    let err = runtime
        .evaluate_hook("hooks/bad.rs", &json!({}), &json!({}), None)
        .await
        .expect_err("non-object decision must fail");
    assert_eq!(err, HookRuntimeError::BadDecision);
}

#[tokio::test]
async fn script_errors_surface_as_failed() {
    let runtime = HookRuntime::new();
    runtime.register(
        "hooks/broken.rs",
        Arc::new(|_: &Value, _: &Value| Err("division by zero".to_string())),
    );

    let err = runtime
        .evaluate_hook("hooks/broken.rs", &json!({}), &json!({}), None)
        .await
        .expect_err("failing hook must surface");
    assert_eq!(err, HookRuntimeError::Failed("division by zero".to_string()));
}
