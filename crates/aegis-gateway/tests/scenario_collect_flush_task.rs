//! Collect-mode scenarios across the whole stack: a collect queue seeded
//! from the snapshot file, buffered admissions via `agent.run`, and the
//! background flusher turning the buffer into one synthetic batch announced
//! on the event bus.

mod common;

use common::{connect, make_session, make_state, open_config, request, roundtrip};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;

use aegis_gateway::tasks::spawn_collect_flusher;
use aegis_queues::{AgentQueue, QueueDropPolicy, QueueMode, QueueSettings, QueueSnapshotStore};

/// Seed the snapshot file with a collect-mode queue so the gateway loads
/// it at boot (queue settings travel via persistence, not the wire).
fn seed_collect_queue(dir: &tempfile::TempDir, agent_id: &str, debounce_ms: u64) {
    let store = QueueSnapshotStore::new(dir.path().join("data/state/agent_queues.json"))
        .expect("snapshot store");
    let mut queues = BTreeMap::new();
    queues.insert(
        agent_id.to_string(),
        AgentQueue::new(QueueSettings {
            mode: QueueMode::Collect,
            cap: 50,
            drop_policy: QueueDropPolicy::Old,
            debounce_ms,
        }),
    );
    store.save(&queues).expect("seed snapshot");
}

fn run_frame(id: &str, request_id: &str) -> String {
    request(
        id,
        "agent.run",
        json!({
            "agentId": "agent_collector",
            "request": {"requestId": request_id, "kind": "hook_trigger"},
        }),
    )
}

#[tokio::test]
async fn collect_mode_buffers_instead_of_running() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_collect_queue(&dir, "agent_collector", 10_000);
    let state = make_state(&dir, open_config());
    let mut session = make_session(&state);
    connect(&mut session).await;

    for (req_id, ar_id) in [("req_1", "ar_1"), ("req_2", "ar_2"), ("req_3", "ar_3")] {
        let (_events, response) = roundtrip(&mut session, &run_frame(req_id, ar_id)).await;
        assert_eq!(response["payload"]["decision"]["type"], json!("collecting"));
    }

    let (_events, status) = roundtrip(
        &mut session,
        &request(
            "req_qs",
            "agent.queue.status",
            json!({"agentId": "agent_collector"}),
        ),
    )
    .await;
    // Nothing runs directly out of the buffer.
    assert!(status["payload"]["activeRequestId"].is_null());
    assert_eq!(status["payload"]["collectCount"], json!(3));
}

#[tokio::test]
async fn flusher_promotes_one_synthetic_batch_after_the_debounce() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_collect_queue(&dir, "agent_collector", 50);
    let state = make_state(&dir, open_config());
    let mut session = make_session(&state);
    connect(&mut session).await;

    for (req_id, ar_id) in [("req_1", "ar_1"), ("req_2", "ar_2")] {
        roundtrip(&mut session, &run_frame(req_id, ar_id)).await;
    }

    let mut bus_rx = state.bus.subscribe();
    spawn_collect_flusher(std::sync::Arc::clone(&state), Duration::from_millis(10));

    // The flusher announces the changed queue once the window elapses.
    let event = tokio::time::timeout(Duration::from_secs(5), bus_rx.recv())
        .await
        .expect("flush within the timeout")
        .expect("bus open");
    assert_eq!(event.event, "event.agent.status");
    let active = event.payload["activeRequestId"]
        .as_str()
        .expect("batch is active")
        .to_string();
    assert!(active.starts_with("collected_"), "{active}");

    let (_events, status) = roundtrip(
        &mut session,
        &request(
            "req_qs",
            "agent.queue.status",
            json!({"agentId": "agent_collector"}),
        ),
    )
    .await;
    assert_eq!(status["payload"]["collectCount"], json!(0));
    assert_eq!(status["payload"]["activeRequestId"], json!(active));
}
