use anyhow::{Context, Result};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

/// Create an agent's workspace tree and seed files.
///
/// Idempotent: directories are created as needed and existing files are
/// never overwritten, so re-running against a live workspace cannot destroy
/// an agent's accumulated memory or journal.
pub fn bootstrap_agent_workspace(
    base_dir: impl AsRef<Path>,
    agent_id: &str,
    soul_template: &str,
    manual_template: &str,
) -> Result<PathBuf> {
    let workspace_path = base_dir.as_ref().join(agent_id);

    let directories = [
        workspace_path.clone(),
        workspace_path.join("hooks"),
        workspace_path.join("strategies"),
        workspace_path.join("journal").join("daily"),
        workspace_path.join("journal").join("trade_logs"),
        workspace_path.join("memory").join("notes"),
        workspace_path.join("artifacts").join("backtests"),
        workspace_path.join("artifacts").join("reports"),
        workspace_path.join("state"),
    ];
    for directory in &directories {
        fs::create_dir_all(directory)
            .with_context(|| format!("create workspace dir {:?}", directory))?;
    }

    write_if_missing(
        &workspace_path.join("SOUL.md"),
        &format!("{}\n", soul_template.trim()),
    )?;
    write_if_missing(
        &workspace_path.join("TRADING_MANUAL.md"),
        &format!("{}\n", manual_template.trim()),
    )?;
    write_if_missing(&workspace_path.join("memory").join("MEMORY.md"), "# MEMORY\n")?;
    write_if_missing(
        &workspace_path.join("journal").join("learnings.md"),
        "# Learnings\n",
    )?;

    let state_file = workspace_path.join("state").join("agent_state.json");
    if !state_file.exists() {
        let state = json!({
            "agentId": agent_id,
            "status": "idle",
            "lastRunId": null,
        });
        let text = serde_json::to_string_pretty(&state).context("serialize agent state failed")?;
        fs::write(&state_file, format!("{text}\n"))
            .with_context(|| format!("write agent state {:?}", state_file))?;
    }

    Ok(workspace_path)
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    fs::write(path, content).with_context(|| format!("create seed file {:?}", path))?;
    Ok(())
}
