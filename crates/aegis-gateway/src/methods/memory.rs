use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::methods::{parse_params, Failure, MethodResult, Reply};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SearchParams {
    query: String,
    #[serde(default)]
    max_results: Option<usize>,
    #[serde(default)]
    workspace_dir: Option<String>,
}

/// Full-text search over agent workspaces. The workspace is (re)indexed on
/// demand so searches always see the latest markdown.
pub(crate) async fn search(state: &AppState, params: &Map<String, Value>) -> MethodResult {
    let params: SearchParams = parse_params(params)?;
    let max_results = params.max_results.unwrap_or(10).clamp(1, 100);

    let workspace_dir = match params.workspace_dir {
        Some(dir) => std::path::PathBuf::from(dir),
        None => state.agents.read().await.workspace_base_dir().to_path_buf(),
    };

    state
        .memory
        .index_workspace(&workspace_dir)
        .map_err(|err| Failure::system(format!("memory indexing failed: {err:#}")))?;
    let hits = state
        .memory
        .search(&params.query, max_results)
        .map_err(|err| Failure::system(format!("memory search failed: {err:#}")))?;

    let hits: Vec<Value> = hits
        .into_iter()
        .map(|hit| serde_json::to_value(hit).expect("hit serialization must not fail"))
        .collect();

    Ok(Reply::ok(json!({"hits": hits})).with_audit(
        "memory.search",
        json!({"query": params.query, "maxResults": max_results}),
    ))
}
