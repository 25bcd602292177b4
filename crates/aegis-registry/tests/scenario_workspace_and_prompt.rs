//! Workspace bootstrap and prompt assembly scenarios.

use aegis_registry::{bootstrap_agent_workspace, build_system_prompt, PromptContext};

#[test]
fn bootstrap_creates_full_tree_and_seed_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let workspace = bootstrap_agent_workspace(dir.path(), "agent_eth_5m", "# SOUL", "# MANUAL")
        .expect("bootstrap");

    for sub in [
        "hooks",
        "strategies",
        "journal/daily",
        "journal/trade_logs",
        "memory/notes",
        "artifacts/backtests",
        "artifacts/reports",
        "state",
    ] {
        assert!(workspace.join(sub).is_dir(), "missing dir {sub}");
    }

    assert_eq!(
        std::fs::read_to_string(workspace.join("SOUL.md")).expect("SOUL.md"),
        "# SOUL\n"
    );
    assert_eq!(
        std::fs::read_to_string(workspace.join("memory/MEMORY.md")).expect("MEMORY.md"),
        "# MEMORY\n"
    );

    let state: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(workspace.join("state/agent_state.json")).expect("state"),
    )
    .expect("state json");
    assert_eq!(state["agentId"], serde_json::json!("agent_eth_5m"));
    assert_eq!(state["status"], serde_json::json!("idle"));
    assert!(state["lastRunId"].is_null());
}

#[test]
fn bootstrap_never_overwrites_existing_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let workspace =
        bootstrap_agent_workspace(dir.path(), "agent_a", "# SOUL v1", "# MANUAL").expect("first");

    std::fs::write(workspace.join("memory/MEMORY.md"), "# MEMORY\ncustom notes\n")
        .expect("write custom");

    // Second bootstrap with a different template must leave both the edited
    // memory file and the original SOUL untouched.
    bootstrap_agent_workspace(dir.path(), "agent_a", "# SOUL v2", "# MANUAL").expect("second");

    assert_eq!(
        std::fs::read_to_string(workspace.join("SOUL.md")).expect("SOUL.md"),
        "# SOUL v1\n"
    );
    assert_eq!(
        std::fs::read_to_string(workspace.join("memory/MEMORY.md")).expect("MEMORY.md"),
        "# MEMORY\ncustom notes\n"
    );
}

#[test]
fn prompt_sorts_and_dedupes_tools_and_appends_citations() {
    let context = PromptContext {
        agent_id: "agent_eth_5m".to_string(),
        enabled_tools: vec![
            "trades.place".to_string(),
            "  memory.search ".to_string(),
            "trades.place".to_string(),
            "".to_string(),
        ],
        soul_text: "Be patient.\n".to_string(),
        manual_text: "Trade ETH only.".to_string(),
        trigger_summary: "candle closed".to_string(),
        memory_citations: vec!["MEMORY.md:12".to_string(), " ".to_string()],
    };

    let prompt = build_system_prompt(&context);

    let tools_section: Vec<&str> = prompt
        .lines()
        .skip_while(|l| *l != "## Enabled tools")
        .take_while(|l| !l.is_empty())
        .collect();
    assert_eq!(
        tools_section,
        vec!["## Enabled tools", "- memory.search", "- trades.place"]
    );

    assert!(prompt.contains("## Memory citations\n- MEMORY.md:12"));
    assert!(prompt.ends_with('\n'));

    // Deterministic: identical context produces identical text.
    assert_eq!(prompt, build_system_prompt(&context));
}

#[test]
fn prompt_without_tools_shows_none_marker() {
    let context = PromptContext {
        agent_id: "agent_x".to_string(),
        ..PromptContext::default()
    };
    let prompt = build_system_prompt(&context);
    assert!(prompt.contains("## Enabled tools\n- (none)"));
    assert!(!prompt.contains("## Memory citations"));
}
