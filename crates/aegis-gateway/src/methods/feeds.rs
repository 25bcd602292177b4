use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::methods::{parse_params, Failure, MethodResult, Reply};
use crate::state::AppState;

pub(crate) async fn list(state: &AppState) -> MethodResult {
    let feeds = state.feeds.read().await;
    let catalog: Vec<Value> = feeds
        .list_feeds()
        .into_iter()
        .map(|feed| serde_json::to_value(feed).expect("feed serialization must not fail"))
        .collect();
    let subscriptions: Vec<Value> = feeds
        .list_subscriptions()
        .into_iter()
        .map(|sub| serde_json::to_value(sub).expect("subscription serialization must not fail"))
        .collect();

    Ok(
        Reply::ok(json!({"feeds": catalog, "subscriptions": subscriptions}))
            .with_audit("feeds.list", json!({})),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SubscribeParams {
    topics: Vec<String>,
    #[serde(default)]
    symbols: Vec<String>,
    #[serde(default)]
    timeframes: Vec<String>,
}

pub(crate) async fn subscribe(state: &AppState, params: &Map<String, Value>) -> MethodResult {
    let params: SubscribeParams = parse_params(params)?;
    if params.topics.is_empty() {
        return Err(Failure::invalid_params("topics must be non-empty"));
    }

    let subscription = state.feeds.write().await.subscribe(
        params.topics,
        params.symbols,
        params.timeframes,
        Utc::now(),
    );
    let subscription_value =
        serde_json::to_value(&subscription).expect("subscription serialization must not fail");

    Ok(Reply::ok(json!({"subscription": subscription_value.clone()})).with_audit(
        "feeds.subscribe",
        json!({"subscriptionId": subscription.subscription_id, "subscription": subscription_value}),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct UnsubscribeParams {
    subscription_id: String,
}

pub(crate) async fn unsubscribe(state: &AppState, params: &Map<String, Value>) -> MethodResult {
    let params: UnsubscribeParams = parse_params(params)?;
    let removed = state.feeds.write().await.unsubscribe(&params.subscription_id);

    Ok(Reply::ok(json!({"removed": removed})).with_audit(
        "feeds.unsubscribe",
        json!({"subscriptionId": params.subscription_id, "removed": removed}),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct GetCandlesParams {
    symbol: String,
    timeframe: String,
    #[serde(default)]
    limit: Option<usize>,
}

pub(crate) async fn get_candles(state: &AppState, params: &Map<String, Value>) -> MethodResult {
    let params: GetCandlesParams = parse_params(params)?;
    if params.symbol.trim().is_empty() || params.timeframe.trim().is_empty() {
        return Err(Failure::invalid_params("symbol and timeframe must be non-empty"));
    }
    let limit = params.limit.unwrap_or(50).clamp(1, 1_000);

    let candles = state
        .feeds
        .read()
        .await
        .get_candles(&params.symbol, &params.timeframe, limit, Utc::now());
    let candles: Vec<Value> = candles
        .into_iter()
        .map(|candle| serde_json::to_value(candle).expect("candle serialization must not fail"))
        .collect();

    Ok(Reply::ok(json!({"candles": candles})).with_audit(
        "feeds.getCandles",
        json!({"symbol": params.symbol, "timeframe": params.timeframe, "limit": limit}),
    ))
}
