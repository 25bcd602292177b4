//! Agent queue scenarios through the session: followup admission, queue
//! status payloads, and snapshot persistence across a process restart.

mod common;

use common::{connect, make_session, make_state, open_config, request, roundtrip};
use serde_json::json;

fn run_frame(id: &str, request_id: &str) -> String {
    request(
        id,
        "agent.run",
        json!({
            "agentId": "agent_eth_5m",
            "request": {
                "requestId": request_id,
                "kind": "hook_trigger",
                "priority": "normal",
                "payload": {"message": format!("run {request_id}")},
            },
        }),
    )
}

#[tokio::test]
async fn followup_run_then_enqueue_updates_queue_status() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = make_state(&dir, open_config());
    let mut session = make_session(&state);
    connect(&mut session).await;

    let (events_1, run_1) = roundtrip(&mut session, &run_frame("req_run_1", "ar_1")).await;
    assert_eq!(run_1["payload"]["decision"]["type"], json!("run_now"));
    assert_eq!(events_1[0]["event"], json!("event.agent.status"));
    assert_eq!(events_1[0]["payload"]["activeRequestId"], json!("ar_1"));

    let (_events, run_2) = roundtrip(&mut session, &run_frame("req_run_2", "ar_2")).await;
    assert_eq!(run_2["payload"]["decision"]["type"], json!("enqueued"));

    let (_events, status) = roundtrip(
        &mut session,
        &request(
            "req_qs_1",
            "agent.queue.status",
            json!({"agentId": "agent_eth_5m"}),
        ),
    )
    .await;
    assert_eq!(status["payload"]["activeRequestId"], json!("ar_1"));
    assert_eq!(status["payload"]["pendingCount"], json!(1));
    assert_eq!(status["payload"]["mode"], json!("followup"));
}

#[tokio::test]
async fn duplicate_dedupe_key_is_deduped_across_requests() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = make_state(&dir, open_config());
    let mut session = make_session(&state);
    connect(&mut session).await;

    let frame = |id: &str, request_id: &str| {
        request(
            id,
            "agent.run",
            json!({
                "agentId": "agent_eth_5m",
                "request": {
                    "requestId": request_id,
                    "kind": "hook_trigger",
                    "dedupeKey": "candle-close-eth",
                },
            }),
        )
    };

    let (_events, first) = roundtrip(&mut session, &frame("req_1", "ar_1")).await;
    assert_eq!(first["payload"]["decision"]["type"], json!("run_now"));

    let (_events, second) = roundtrip(&mut session, &frame("req_2", "ar_2")).await;
    assert_eq!(second["payload"]["decision"]["type"], json!("deduped"));
}

#[tokio::test]
async fn unknown_agent_status_reads_as_empty_default_queue() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = make_state(&dir, open_config());
    let mut session = make_session(&state);
    connect(&mut session).await;

    let (_events, status) = roundtrip(
        &mut session,
        &request(
            "req_qs",
            "agent.queue.status",
            json!({"agentId": "agent_ghost"}),
        ),
    )
    .await;
    assert_eq!(status["payload"]["pendingCount"], json!(0));
    assert!(status["payload"]["activeRequestId"].is_null());
}

#[tokio::test]
async fn queue_state_survives_a_restart_via_the_snapshot_file() {
    let dir = tempfile::tempdir().expect("tempdir");

    {
        let state = make_state(&dir, open_config());
        let mut session = make_session(&state);
        connect(&mut session).await;
        roundtrip(&mut session, &run_frame("req_run_1", "ar_1")).await;
        roundtrip(&mut session, &run_frame("req_run_2", "ar_2")).await;
    }

    // A fresh process over the same data dir sees the same queue.
    let state = make_state(&dir, open_config());
    let mut session = make_session(&state);
    connect(&mut session).await;

    let (_events, status) = roundtrip(
        &mut session,
        &request(
            "req_qs_2",
            "agent.queue.status",
            json!({"agentId": "agent_eth_5m"}),
        ),
    )
    .await;
    assert_eq!(status["payload"]["activeRequestId"], json!("ar_1"));
    assert_eq!(status["payload"]["pendingCount"], json!(1));
}

#[tokio::test]
async fn malformed_run_params_are_invalid_params_and_session_continues() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = make_state(&dir, open_config());
    let mut session = make_session(&state);
    connect(&mut session).await;

    let (_events, bad) = roundtrip(
        &mut session,
        &request("req_bad", "agent.run", json!({"agentId": "agent_eth_5m"})),
    )
    .await;
    assert_eq!(bad["error"]["code"], json!("INVALID_PARAMS"));

    // Next request on the same session is processed normally.
    let (_events, good) = roundtrip(&mut session, &run_frame("req_ok", "ar_9")).await;
    assert_eq!(good["ok"], json!(true));
}
