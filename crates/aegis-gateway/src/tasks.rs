//! Background tasks: the collect-queue flusher and the synthetic feed
//! poller.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use aegis_feeds::FeedEvent;

use crate::state::AppState;

/// Periodically flush due collect buffers. Each synthesized batch is
/// admitted into its queue's run lane and announced on the bus as
/// `event.agent.status`.
pub fn spawn_collect_flusher(state: Arc<AppState>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let now_ms = Utc::now().timestamp_millis();

            let changed = {
                let mut queues = state.queues.lock().await;
                match queues.flush_due(now_ms) {
                    Ok(changed) => changed
                        .into_iter()
                        .map(|agent_id| {
                            let payload = queues.status_payload(&agent_id);
                            (agent_id, payload)
                        })
                        .collect::<Vec<_>>(),
                    Err(err) => {
                        warn!(error = %err, "collect flush persistence failed");
                        Vec::new()
                    }
                }
            };

            for (_agent_id, payload) in changed {
                state.broadcast("event.agent.status", payload);
            }
        }
    });
}

/// Poll the synthetic candle source for one timeframe and push each closed
/// candle through the hook pipeline: wake decisions become queued agent
/// requests, and every event is mirrored to sessions as
/// `event.feed.event`.
pub fn spawn_feed_poller(state: Arc<AppState>, timeframe: String, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let now = Utc::now();

            // One event per subscribed symbol on this timeframe.
            let symbols: Vec<String> = {
                let feeds = state.feeds.read().await;
                feeds
                    .list_subscriptions()
                    .iter()
                    .filter(|sub| {
                        sub.topics.iter().any(|t| t == "market.candle.closed")
                            && sub.timeframes.iter().any(|tf| tf == &timeframe)
                    })
                    .flat_map(|sub| sub.symbols.iter().cloned())
                    .collect()
            };

            for symbol in symbols {
                let candle = {
                    let feeds = state.feeds.read().await;
                    feeds.get_candles(&symbol, &timeframe, 1, now).pop()
                };
                let Some(candle) = candle else { continue };

                let mut payload = serde_json::Map::new();
                payload.insert(
                    "candle".to_string(),
                    serde_json::to_value(&candle).expect("candle serialization must not fail"),
                );

                let event = FeedEvent {
                    event_id: format!("fev_{}", &Uuid::new_v4().simple().to_string()[..10]),
                    ts: now.to_rfc3339(),
                    source: "market.candles".to_string(),
                    topic: "market.candle.closed".to_string(),
                    payload,
                    symbol: Some(symbol.clone()),
                    timeframe: Some(timeframe.clone()),
                    account_id: None,
                };

                let output = {
                    let pipeline = state.pipeline.read().await;
                    pipeline.process_event(&event, now).await
                };

                for error in &output.hook_errors {
                    warn!(error = %error, "feed hook failed");
                }

                for request in output.wake_requests {
                    let agent_id = request.agent_id.clone();
                    let status = {
                        let mut queues = state.queues.lock().await;
                        match queues.enqueue(request, now.timestamp_millis()) {
                            Ok(_) => Some(queues.status_payload(&agent_id)),
                            Err(err) => {
                                warn!(error = %err, agent_id = %agent_id, "wake enqueue failed");
                                None
                            }
                        }
                    };
                    if let Some(status) = status {
                        state.broadcast("event.agent.status", status);
                    }
                }

                state.broadcast(
                    "event.feed.event",
                    serde_json::to_value(&event).expect("feed event serialization must not fail"),
                );
            }
        }
    });
}
