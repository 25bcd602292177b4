//! aegis-execution
//!
//! Stateless trade execution service. Assigns execution ids, stamps
//! statuses, and delegates the actual broker interaction to the connector
//! when one is configured. Without a connector the service runs in
//! paper mode: every operation succeeds with synthesized provider ids.
//!
//! The broker tool surface only covers placement and cancellation, so
//! `modify` and `close_position` always synthesize their provider response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use aegis_connector::{BrokerConnector, ConnectorError};
use aegis_risk::TradeIntent;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Executed,
    Modified,
    Canceled,
    Closed,
}

/// The record returned by every execution operation. `intent_id` is only
/// populated on placement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeExecution {
    pub execution_id: String,
    pub intent_id: Option<String>,
    pub status: ExecutionStatus,
    pub provider_order_id: String,
    pub ts: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct TradeExecutionService {
    connector: Option<BrokerConnector>,
}

impl TradeExecutionService {
    /// Paper mode: no broker behind the service.
    pub fn new() -> Self {
        Self { connector: None }
    }

    pub fn with_connector(connector: BrokerConnector) -> Self {
        Self {
            connector: Some(connector),
        }
    }

    pub fn has_connector(&self) -> bool {
        self.connector.is_some()
    }

    /// Place a market order for an already risk-approved intent.
    pub async fn place(
        &self,
        intent: &TradeIntent,
        now: DateTime<Utc>,
    ) -> Result<TradeExecution, ConnectorError> {
        let provider_order_id = match self.connector {
            Some(ref connector) => {
                let result = connector
                    .place_market_order(
                        &intent.account_id,
                        &intent.symbol,
                        &intent.side,
                        intent.volume,
                        intent.stop_loss,
                        intent.take_profit,
                        None,
                    )
                    .await?;
                result
                    .get("orderId")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("order_{}", short_hex_id()))
            }
            None => format!("order_{}", short_hex_id()),
        };

        Ok(TradeExecution {
            execution_id: format!("exec_{}", short_hex_id()),
            intent_id: Some(format!("intent_{}", short_hex_id())),
            status: ExecutionStatus::Executed,
            provider_order_id,
            ts: now,
        })
    }

    pub fn modify(
        &self,
        _account_id: &str,
        order_id: &str,
        _open_price: f64,
        _stop_loss: Option<f64>,
        _take_profit: Option<f64>,
        now: DateTime<Utc>,
    ) -> TradeExecution {
        TradeExecution {
            execution_id: format!("exec_{}", short_hex_id()),
            intent_id: None,
            status: ExecutionStatus::Modified,
            provider_order_id: order_id.to_string(),
            ts: now,
        }
    }

    pub async fn cancel(
        &self,
        account_id: &str,
        order_id: &str,
        now: DateTime<Utc>,
    ) -> Result<TradeExecution, ConnectorError> {
        if let Some(ref connector) = self.connector {
            connector.cancel_order(account_id, order_id).await?;
        }
        Ok(TradeExecution {
            execution_id: format!("exec_{}", short_hex_id()),
            intent_id: None,
            status: ExecutionStatus::Canceled,
            provider_order_id: order_id.to_string(),
            ts: now,
        })
    }

    pub fn close_position(
        &self,
        _account_id: &str,
        position_id: &str,
        now: DateTime<Utc>,
    ) -> TradeExecution {
        TradeExecution {
            execution_id: format!("exec_{}", short_hex_id()),
            intent_id: None,
            status: ExecutionStatus::Closed,
            provider_order_id: position_id.to_string(),
            ts: now,
        }
    }
}

fn short_hex_id() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}
