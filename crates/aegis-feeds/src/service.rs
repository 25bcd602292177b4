use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// An entry in the static feed catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedDescriptor {
    pub feed_id: String,
    pub kind: String,
    pub topics: Vec<String>,
}

/// One operator subscription to feed topics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSubscription {
    pub subscription_id: String,
    pub topics: Vec<String>,
    pub symbols: Vec<String>,
    pub timeframes: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A single OHLC candle, 5-decimal prices.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    pub ts: DateTime<Utc>,
    pub symbol: String,
    pub timeframe: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Feed catalog + subscription registry. Subscriptions are in-memory and
/// session-independent; candles are synthesized deterministically.
#[derive(Default)]
pub struct FeedService {
    subscriptions: BTreeMap<String, FeedSubscription>,
}

impl FeedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list_feeds(&self) -> Vec<FeedDescriptor> {
        vec![
            FeedDescriptor {
                feed_id: "market.candles".to_string(),
                kind: "market".to_string(),
                topics: vec![
                    "market.candle.closed".to_string(),
                    "market.tick".to_string(),
                ],
            },
            FeedDescriptor {
                feed_id: "trading.executions".to_string(),
                kind: "trade".to_string(),
                topics: vec!["trade.executed".to_string(), "trade.rejected".to_string()],
            },
        ]
    }

    pub fn subscribe(
        &mut self,
        topics: Vec<String>,
        symbols: Vec<String>,
        timeframes: Vec<String>,
        now: DateTime<Utc>,
    ) -> FeedSubscription {
        let subscription = FeedSubscription {
            subscription_id: format!(
                "sub_{}",
                &Uuid::new_v4().simple().to_string()[..10]
            ),
            topics,
            symbols,
            timeframes,
            created_at: now,
        };
        self.subscriptions
            .insert(subscription.subscription_id.clone(), subscription.clone());
        subscription
    }

    pub fn unsubscribe(&mut self, subscription_id: &str) -> bool {
        self.subscriptions.remove(subscription_id).is_some()
    }

    pub fn list_subscriptions(&self) -> Vec<&FeedSubscription> {
        self.subscriptions.values().collect()
    }

    /// Deterministic fake candles anchored to `now`, oldest first. This is
    /// the seam for a real market-data fetch; shapes and rounding match the
    /// live path.
    pub fn get_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Vec<Candle> {
        let step_seconds = timeframe_to_seconds(timeframe);
        let now_epoch = now.timestamp();
        let base_price = 2500.0;

        let mut candles = Vec::with_capacity(limit);
        for index in 0..limit {
            let ts_epoch = now_epoch - ((limit - index) as i64 * step_seconds);
            let drift = index as f64 * 1.5;
            let open = base_price + drift;
            let close = open + if index % 2 == 0 { 0.8 } else { -0.4 };
            let high = open.max(close) + 0.6;
            let low = open.min(close) - 0.6;
            candles.push(Candle {
                ts: DateTime::from_timestamp(ts_epoch, 0).unwrap_or(now),
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
                open: round5(open),
                high: round5(high),
                low: round5(low),
                close: round5(close),
            });
        }
        candles
    }
}

fn round5(value: f64) -> f64 {
    (value * 100_000.0).round() / 100_000.0
}

/// Parse `<n><unit>` timeframes (`5m`, `1h`, `1d`). Anything unparseable
/// falls back to one minute.
pub fn timeframe_to_seconds(timeframe: &str) -> i64 {
    let unit = match timeframe.chars().last() {
        Some(unit) => unit,
        None => return 60,
    };
    let digits = &timeframe[..timeframe.len() - unit.len_utf8()];
    let value: i64 = match digits.parse() {
        Ok(value) if value > 0 => value,
        _ => return 60,
    };

    match unit {
        'm' => value * 60,
        'h' => value * 60 * 60,
        'd' => value * 60 * 60 * 24,
        _ => 60,
    }
}
