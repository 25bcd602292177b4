//! Config loader scenarios: JSONC parsing, env interpolation, strict
//! validation, deep-merge patching, and the canonical hash.

use aegis_config::{
    apply_patch, config_hash, default_config, load_config, ConfigError,
};
use serde_json::json;

fn write_config(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("aegis.jsonc");
    std::fs::write(&path, body).expect("write config");
    path
}

#[test]
fn jsonc_with_comments_and_env_vars_loads() {
    let dir = tempfile::tempdir().expect("tempdir");
    // Unique name to avoid cross-test env collisions.
    std::env::set_var("AEGIS_TEST_TOKEN_A", "secret-token");
    let path = write_config(
        &dir,
        r#"{
  // operator gateway
  "gateway": {
    "host": "127.0.0.1",
    "port": 18789,
    /* bearer auth */
    "auth": {"mode": "token", "token": "${AEGIS_TEST_TOKEN_A}"}
  },
  "accounts": [{
    "accountId": "acct_demo_1",
    "connectorId": "metaapi_mcp",
    "providerAccountId": "prov_1",
    "mode": "demo",
    "label": "Demo",
    "allowedSymbols": ["ETHUSDm"]
  }]
}"#,
    );

    let config = load_config(&path).expect("load");
    assert_eq!(config.gateway.port, 18789);
    assert_eq!(config.gateway.auth.token, "secret-token");
    assert_eq!(config.accounts.len(), 1);
    assert_eq!(config.accounts[0].allowed_symbols, vec!["ETHUSDm"]);
    // Defaults fill the omitted sections.
    assert!(config.feeds.candles.enabled);
    assert!(config.plugins.allow.is_empty());
}

#[test]
fn missing_env_var_substitutes_empty_and_fails_validation() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::env::remove_var("AEGIS_TEST_TOKEN_MISSING");
    let path = write_config(
        &dir,
        r#"{"gateway": {"host": "0.0.0.0", "port": 1, "auth": {"mode": "token", "token": "${AEGIS_TEST_TOKEN_MISSING}"}}}"#,
    );

    let err = load_config(&path).expect_err("empty token must fail");
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn unknown_fields_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_config(
        &dir,
        r#"{"gateway": {"host": "h", "port": 1, "auth": {"mode": "token", "token": "t"}}, "surprise": true}"#,
    );

    let err = load_config(&path).expect_err("unknown field must fail");
    match err {
        ConfigError::Validation(msg) => assert!(msg.contains("surprise"), "{msg}"),
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn missing_file_is_its_own_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = load_config(dir.path().join("nope.jsonc")).expect_err("missing file");
    assert!(matches!(err, ConfigError::Missing(_)));
}

#[test]
fn patch_deep_merges_and_revalidates() {
    let current = default_config();

    let patched = apply_patch(&current, &json!({"gateway": {"port": 9100}})).expect("patch");
    assert_eq!(patched.gateway.port, 9100);
    // Untouched branches survive the merge.
    assert_eq!(patched.gateway.host, current.gateway.host);
    assert_eq!(
        patched.feeds.candles.poll_seconds_by_timeframe,
        current.feeds.candles.poll_seconds_by_timeframe
    );

    // A patch that breaks the schema is rejected wholesale.
    let err = apply_patch(&current, &json!({"gateway": {"port": 0}})).expect_err("bad port");
    assert!(matches!(err, ConfigError::Validation(_)));

    let err = apply_patch(&current, &json!({"gateway": {"bogus": 1}})).expect_err("unknown key");
    assert!(matches!(err, ConfigError::Validation(_)));

    let err = apply_patch(&current, &json!("not an object")).expect_err("non-object patch");
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn hash_is_stable_and_tracks_content() {
    let a = default_config();
    let b = default_config();
    assert_eq!(config_hash(&a), config_hash(&b));

    let patched = apply_patch(&a, &json!({"gateway": {"port": 9100}})).expect("patch");
    assert_ne!(config_hash(&a), config_hash(&patched));
}

#[test]
fn default_config_matches_documented_defaults() {
    let config = default_config();
    assert_eq!(config.gateway.host, "0.0.0.0");
    assert_eq!(config.gateway.port, 18789);
    assert_eq!(config.gateway.auth.mode, "token");
    assert_eq!(
        config.plugins.slots.get("memory"),
        Some(&"sqlite_fts".to_string())
    );
    assert_eq!(
        config.feeds.candles.poll_seconds_by_timeframe.get("5m"),
        Some(&45)
    );
    assert!(!config.feeds.price_ticks.enabled);
}
