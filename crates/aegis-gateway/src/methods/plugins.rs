use crate::methods::{MethodResult, Reply};
use crate::state::AppState;

pub(crate) async fn status(state: &AppState) -> MethodResult {
    let resolved = state.plugins.read().await.resolve();
    Ok(Reply::ok(
        serde_json::to_value(resolved).expect("plugin resolution serialization must not fail"),
    ))
}
