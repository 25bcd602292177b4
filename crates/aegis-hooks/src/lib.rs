//! aegis-hooks
//!
//! The hook-script evaluation contract: a registered script is a pure
//! `evaluate(event, state) -> decision` callable executed off the async
//! runtime under a hard time budget (200 ms by default, overridable per
//! call). How a script is sandboxed is the embedder's concern; the runtime
//! only enforces the contract — the budget, and that a decision is a JSON
//! object.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Default evaluation budget in milliseconds.
pub const DEFAULT_HOOK_TIMEOUT_MS: u64 = 200;

/// A loaded hook script. Implementations must be safe to call from a
/// blocking worker thread.
pub trait HookScript: Send + Sync {
    fn evaluate(&self, event: &Value, state: &Value) -> Result<Value, String>;
}

/// Blanket impl so plain closures can be registered in embedders and tests.
impl<F> HookScript for F
where
    F: Fn(&Value, &Value) -> Result<Value, String> + Send + Sync,
{
    fn evaluate(&self, event: &Value, state: &Value) -> Result<Value, String> {
        self(event, state)
    }
}

/// Why a hook evaluation failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HookRuntimeError {
    /// No script is registered under the given path.
    NotFound { hook_path: String },
    /// The script exceeded its time budget.
    Timeout { timeout_ms: u64 },
    /// The script itself returned an error (or panicked).
    Failed(String),
    /// The script returned something other than a JSON object.
    BadDecision,
}

impl std::fmt::Display for HookRuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookRuntimeError::NotFound { hook_path } => {
                write!(f, "hook not found: {hook_path}")
            }
            HookRuntimeError::Timeout { timeout_ms } => {
                write!(f, "hook execution timed out after {timeout_ms}ms")
            }
            HookRuntimeError::Failed(msg) => write!(f, "hook failed: {msg}"),
            HookRuntimeError::BadDecision => {
                write!(f, "hook evaluate() must return an object")
            }
        }
    }
}

impl std::error::Error for HookRuntimeError {}

/// Registry + executor for hook scripts, keyed by hook path.
pub struct HookRuntime {
    scripts: RwLock<HashMap<String, Arc<dyn HookScript>>>,
    default_timeout_ms: u64,
}

impl Default for HookRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl HookRuntime {
    pub fn new() -> Self {
        Self {
            scripts: RwLock::new(HashMap::new()),
            default_timeout_ms: DEFAULT_HOOK_TIMEOUT_MS,
        }
    }

    pub fn with_default_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    /// Register (or replace) the script behind a hook path.
    pub fn register(&self, hook_path: impl Into<String>, script: Arc<dyn HookScript>) {
        self.scripts
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(hook_path.into(), script);
    }

    /// Evaluate a hook against an event and a state object.
    ///
    /// The script runs on a blocking worker; the budget is enforced with a
    /// hard timeout and clamped to at least 1 ms.
    pub async fn evaluate_hook(
        &self,
        hook_path: &str,
        event: &Value,
        state: &Value,
        timeout_ms: Option<u64>,
    ) -> Result<Value, HookRuntimeError> {
        let script = {
            let scripts = self
                .scripts
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            scripts.get(hook_path).cloned()
        };
        let Some(script) = script else {
            return Err(HookRuntimeError::NotFound {
                hook_path: hook_path.to_string(),
            });
        };

        let timeout_ms = timeout_ms.unwrap_or(self.default_timeout_ms).max(1);
        let event = event.clone();
        let state = state.clone();

        let task = tokio::task::spawn_blocking(move || script.evaluate(&event, &state));
        let joined = tokio::time::timeout(Duration::from_millis(timeout_ms), task)
            .await
            .map_err(|_| HookRuntimeError::Timeout { timeout_ms })?;

        let decision = joined
            .map_err(|err| HookRuntimeError::Failed(err.to_string()))?
            .map_err(HookRuntimeError::Failed)?;

        if !decision.is_object() {
            return Err(HookRuntimeError::BadDecision);
        }
        Ok(decision)
    }
}
