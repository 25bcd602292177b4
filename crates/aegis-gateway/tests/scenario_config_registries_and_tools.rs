//! Remaining method-surface scenarios through the session: config
//! get/schema/patch, plugin resolution, account and device lifecycles,
//! feeds, agent workspace creation, backtests, and memory search.

mod common;

use common::{connect, make_session, make_state, open_config, request, roundtrip};
use serde_json::json;

#[tokio::test]
async fn config_get_patch_and_reject_cycle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = make_state(&dir, open_config());
    let mut session = make_session(&state);
    connect(&mut session).await;

    let (_events, got) = roundtrip(&mut session, &request("req_c1", "config.get", json!({}))).await;
    assert_eq!(got["payload"]["config"]["gateway"]["port"], json!(18789));
    let hash_before = got["payload"]["configHash"].as_str().expect("hash").to_string();

    let (_events, schema) =
        roundtrip(&mut session, &request("req_c2", "config.schema", json!({}))).await;
    assert_eq!(schema["payload"]["schema"]["title"], json!("AegisGatewayConfig"));

    // Patch: deep merge + re-validate.
    let (_events, patched) = roundtrip(
        &mut session,
        &request("req_c3", "config.patch", json!({"gateway": {"port": 9100}})),
    )
    .await;
    assert_eq!(patched["ok"], json!(true));
    assert_eq!(patched["payload"]["config"]["gateway"]["port"], json!(9100));
    assert_ne!(patched["payload"]["configHash"].as_str().expect("hash"), hash_before);

    // A schema-breaking patch is rejected and the live config is kept.
    let (_events, rejected) = roundtrip(
        &mut session,
        &request("req_c4", "config.patch", json!({"gateway": {"bogus": true}})),
    )
    .await;
    assert_eq!(rejected["error"]["code"], json!("INVALID_PARAMS"));

    let (_events, after) = roundtrip(&mut session, &request("req_c5", "config.get", json!({}))).await;
    assert_eq!(after["payload"]["config"]["gateway"]["port"], json!(9100));
}

#[tokio::test]
async fn plugins_status_resolves_the_default_memory_slot() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = make_state(&dir, open_config());
    let mut session = make_session(&state);
    connect(&mut session).await;

    let (_events, response) =
        roundtrip(&mut session, &request("req_p1", "plugins.status", json!({}))).await;
    let payload = &response["payload"];
    assert!(payload["enabledPlugins"]
        .as_array()
        .expect("enabled")
        .iter()
        .any(|p| p == "sqlite_fts"));
    assert_eq!(payload["activeSlots"]["memory"], json!("sqlite_fts"));
    assert!(payload["diagnostics"].as_array().expect("diagnostics").is_empty());
}

#[tokio::test]
async fn account_lifecycle_with_status_events() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = make_state(&dir, open_config());
    let mut session = make_session(&state);
    connect(&mut session).await;

    let (events, connected) = roundtrip(
        &mut session,
        &request(
            "req_a1",
            "accounts.connect",
            json!({
                "accountId": "acct_demo_1",
                "connectorId": "metaapi_mcp",
                "providerAccountId": "prov_1",
                "mode": "demo",
                "label": "Demo",
                "allowedSymbols": ["ETHUSDm"],
            }),
        ),
    )
    .await;
    assert_eq!(connected["payload"]["account"]["status"], json!("connected"));
    assert_eq!(events[0]["event"], json!("event.account.status"));

    let (_events, listed) =
        roundtrip(&mut session, &request("req_a2", "accounts.list", json!({}))).await;
    assert_eq!(listed["payload"]["accounts"].as_array().expect("accounts").len(), 1);

    let (_events, status) = roundtrip(
        &mut session,
        &request("req_a3", "accounts.status", json!({"accountId": "acct_demo_1"})),
    )
    .await;
    assert_eq!(status["payload"]["status"], json!("connected"));

    let (events, disconnected) = roundtrip(
        &mut session,
        &request("req_a4", "accounts.disconnect", json!({"accountId": "acct_demo_1"})),
    )
    .await;
    assert_eq!(
        disconnected["payload"]["account"]["status"],
        json!("disconnected")
    );
    assert_eq!(events[0]["payload"]["status"], json!("disconnected"));

    let (_events, missing) = roundtrip(
        &mut session,
        &request("req_a5", "accounts.get", json!({"accountId": "acct_ghost"})),
    )
    .await;
    assert_eq!(missing["error"]["code"], json!("NOT_FOUND"));
}

#[tokio::test]
async fn device_lifecycle_hides_push_tokens() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = make_state(&dir, open_config());
    let mut session = make_session(&state);
    connect(&mut session).await;

    let (_events, paired) = roundtrip(
        &mut session,
        &request(
            "req_d1",
            "devices.pair",
            json!({
                "deviceId": "dev_1",
                "platform": "ios",
                "label": "Phone",
                "pushToken": "tok_secret",
            }),
        ),
    )
    .await;
    assert!(paired["payload"]["device"].get("pushToken").is_none());

    let (_events, notified) = roundtrip(
        &mut session,
        &request(
            "req_d2",
            "devices.notifyTest",
            json!({"deviceId": "dev_1", "message": "ping"}),
        ),
    )
    .await;
    assert_eq!(notified["payload"]["status"], json!("queued"));

    let (_events, push_missing) = roundtrip(
        &mut session,
        &request(
            "req_d3",
            "devices.registerPush",
            json!({"deviceId": "dev_ghost", "pushToken": "tok_x"}),
        ),
    )
    .await;
    assert_eq!(push_missing["error"]["code"], json!("NOT_FOUND"));

    let (_events, unpaired) = roundtrip(
        &mut session,
        &request("req_d4", "devices.unpair", json!({"deviceId": "dev_1"})),
    )
    .await;
    assert_eq!(unpaired["payload"]["removed"], json!(true));
}

#[tokio::test]
async fn feeds_catalog_subscriptions_and_candles() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = make_state(&dir, open_config());
    let mut session = make_session(&state);
    connect(&mut session).await;

    let (_events, subscribed) = roundtrip(
        &mut session,
        &request(
            "req_f1",
            "feeds.subscribe",
            json!({
                "topics": ["market.candle.closed"],
                "symbols": ["ETHUSDm"],
                "timeframes": ["5m"],
            }),
        ),
    )
    .await;
    let sub_id = subscribed["payload"]["subscription"]["subscriptionId"]
        .as_str()
        .expect("subscriptionId")
        .to_string();

    let (_events, listed) = roundtrip(&mut session, &request("req_f2", "feeds.list", json!({}))).await;
    assert_eq!(listed["payload"]["feeds"].as_array().expect("feeds").len(), 2);
    assert_eq!(
        listed["payload"]["subscriptions"].as_array().expect("subs").len(),
        1
    );

    let (_events, candles) = roundtrip(
        &mut session,
        &request(
            "req_f3",
            "feeds.getCandles",
            json!({"symbol": "ETHUSDm", "timeframe": "5m", "limit": 3}),
        ),
    )
    .await;
    let items = candles["payload"]["candles"].as_array().expect("candles");
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["symbol"], json!("ETHUSDm"));

    let (_events, unsubscribed) = roundtrip(
        &mut session,
        &request("req_f4", "feeds.unsubscribe", json!({"subscriptionId": sub_id})),
    )
    .await;
    assert_eq!(unsubscribed["payload"]["removed"], json!(true));
}

#[tokio::test]
async fn agents_create_bootstraps_the_workspace() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = make_state(&dir, open_config());
    let mut session = make_session(&state);
    connect(&mut session).await;

    let (events, created) = roundtrip(
        &mut session,
        &request(
            "req_ag1",
            "agents.create",
            json!({"agentId": "agent_eth_5m", "label": "ETH scalper"}),
        ),
    )
    .await;
    assert_eq!(created["payload"]["agent"]["status"], json!("ready"));
    assert_eq!(events[0]["event"], json!("event.agent.status"));

    let workspace = dir.path().join("agents/agent_eth_5m");
    assert!(workspace.join("SOUL.md").is_file());
    assert!(workspace.join("state/agent_state.json").is_file());
    assert!(workspace.join("journal/trade_logs").is_dir());

    let (_events, fetched) = roundtrip(
        &mut session,
        &request("req_ag2", "agents.get", json!({"agentId": "agent_eth_5m"})),
    )
    .await;
    assert_eq!(fetched["payload"]["agent"]["agentId"], json!("agent_eth_5m"));
}

#[tokio::test]
async fn backtest_run_returns_metrics_and_report_event() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = make_state(&dir, open_config());
    let mut session = make_session(&state);
    connect(&mut session).await;

    let (events, response) = roundtrip(
        &mut session,
        &request(
            "req_b1",
            "backtests.run",
            json!({
                "candles": [
                    {"ts": "t0", "open": 100.0, "high": 102.0, "low": 99.0, "close": 101.0},
                    {"ts": "t1", "open": 101.0, "high": 106.0, "low": 100.0, "close": 105.0},
                    {"ts": "t2", "open": 105.0, "high": 107.0, "low": 104.0, "close": 106.0},
                ],
                "signals": [
                    {"index": 0, "side": "buy", "entry": 101.0, "stopLoss": 99.0, "takeProfit": 105.0},
                ],
            }),
        ),
    )
    .await;

    assert_eq!(response["payload"]["metrics"]["trades"], json!(1));
    assert_eq!(response["payload"]["metrics"]["winRatePct"], json!(100.0));
    assert_eq!(response["payload"]["trades"][0]["outcome"], json!("win"));
    assert_eq!(events[0]["event"], json!("event.backtests.report"));
    assert_eq!(events[0]["payload"]["requestId"], json!("req_b1"));
}

#[tokio::test]
async fn memory_search_indexes_agent_workspaces_on_demand() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = make_state(&dir, open_config());
    let mut session = make_session(&state);
    connect(&mut session).await;

    // Create an agent, then enrich its memory file out-of-band.
    roundtrip(
        &mut session,
        &request("req_m1", "agents.create", json!({"agentId": "agent_eth_5m"})),
    )
    .await;
    std::fs::write(
        dir.path().join("agents/agent_eth_5m/memory/MEMORY.md"),
        "# MEMORY\nLondon breakout entries outperform on ETH.\n",
    )
    .expect("write memory");

    let (_events, found) = roundtrip(
        &mut session,
        &request("req_m2", "memory.search", json!({"query": "London breakout"})),
    )
    .await;
    let hits = found["payload"]["hits"].as_array().expect("hits");
    assert_eq!(hits.len(), 1);
    assert!(hits[0]["snippet"].as_str().expect("snippet").contains("London"));
    assert!(hits[0]["path"].as_str().expect("path").ends_with("MEMORY.md"));
}
