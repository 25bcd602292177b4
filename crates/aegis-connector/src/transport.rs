use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// The broker connector's own end-to-end call timeout.
pub const DEFAULT_CONNECTOR_TIMEOUT_SECS: u64 = 20;

/// How tool calls reach the broker. Object-safe so the gateway can hold a
/// `dyn` transport and tests can inject fakes.
#[async_trait]
pub trait ConnectorTransport: Send + Sync {
    async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<Value>;
}

/// HTTP transport for tool-call compatible broker bridges.
///
/// POSTs `{"tool": ..., "arguments": ...}` to `<base>/tool/call` with an
/// optional bearer token and unwraps the `result` envelope when present.
pub struct HttpConnectorTransport {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpConnectorTransport {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_CONNECTOR_TIMEOUT_SECS))
            .build()
            .context("build connector http client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }
}

#[async_trait]
impl ConnectorTransport for HttpConnectorTransport {
    async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<Value> {
        let url = format!("{}/tool/call", self.base_url);
        let mut request = self.client.post(&url).json(&json!({
            "tool": tool_name,
            "arguments": arguments,
        }));
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("connector request to {url} failed"))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let text = response.text().await.unwrap_or_default();
            bail!("connector request failed ({status}): {text}");
        }

        let body: Value = response
            .json()
            .await
            .context("connector response was not JSON")?;

        if let Some(result) = body.get("result") {
            if result.is_object() {
                return Ok(result.clone());
            }
        }
        if body.is_object() {
            return Ok(body);
        }
        bail!("connector response did not return an object payload");
    }
}
