use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::error::{map_connector_error, ConnectorError};
use crate::transport::ConnectorTransport;

/// Typed wrappers over the broker's tool surface. Every failure comes back
/// as a mapped [`ConnectorError`].
#[derive(Clone)]
pub struct BrokerConnector {
    transport: Arc<dyn ConnectorTransport>,
}

impl BrokerConnector {
    pub fn new(transport: Arc<dyn ConnectorTransport>) -> Self {
        Self { transport }
    }

    pub async fn get_candles(
        &self,
        account_id: &str,
        symbol: &str,
        timeframe: &str,
        limit: usize,
        start_time: Option<&str>,
    ) -> Result<Value, ConnectorError> {
        let mut arguments = Map::new();
        arguments.insert("accountId".to_string(), json!(account_id));
        arguments.insert("symbol".to_string(), json!(symbol));
        arguments.insert("timeframe".to_string(), json!(timeframe));
        arguments.insert("limit".to_string(), json!(limit));
        if let Some(start_time) = start_time {
            arguments.insert("startTime".to_string(), json!(start_time));
        }
        self.call("get_candles", Value::Object(arguments)).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn place_market_order(
        &self,
        account_id: &str,
        symbol: &str,
        side: &str,
        volume: f64,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
        comment: Option<&str>,
    ) -> Result<Value, ConnectorError> {
        let mut arguments = Map::new();
        arguments.insert("accountId".to_string(), json!(account_id));
        arguments.insert("symbol".to_string(), json!(symbol));
        arguments.insert("side".to_string(), json!(side));
        arguments.insert("volume".to_string(), json!(volume));
        if let Some(stop_loss) = stop_loss {
            arguments.insert("stopLoss".to_string(), json!(stop_loss));
        }
        if let Some(take_profit) = take_profit {
            arguments.insert("takeProfit".to_string(), json!(take_profit));
        }
        if let Some(comment) = comment.filter(|c| !c.is_empty()) {
            arguments.insert("comment".to_string(), json!(comment));
        }
        self.call("place_market_order", Value::Object(arguments))
            .await
    }

    pub async fn cancel_order(
        &self,
        account_id: &str,
        order_id: &str,
    ) -> Result<Value, ConnectorError> {
        self.call(
            "cancel_order",
            json!({"accountId": account_id, "orderId": order_id}),
        )
        .await
    }

    pub async fn get_positions(&self, account_id: &str) -> Result<Value, ConnectorError> {
        self.call("get_positions", json!({"accountId": account_id}))
            .await
    }

    async fn call(&self, tool_name: &str, arguments: Value) -> Result<Value, ConnectorError> {
        self.transport
            .call_tool(tool_name, arguments)
            .await
            .map_err(|err| map_connector_error(&format!("{err:#}")))
    }
}
