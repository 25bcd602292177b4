//! aegisd entry point.
//!
//! This file is intentionally thin: it sets up tracing, loads config,
//! builds the shared state, spawns the background tasks, wires middleware,
//! and starts the HTTP server. All route handlers live in `routes.rs`;
//! shared state types live in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

use aegis_config::{default_config, load_config};
use aegis_gateway::{routes, state, tasks};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file does
    // not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let config = match std::env::var("AEGISD_CONFIG") {
        Ok(path) => load_config(&path).with_context(|| format!("load config {path}"))?,
        Err(_) => default_config(),
    };

    let bind_addr: SocketAddr = format!("{}:{}", config.gateway.host, config.gateway.port)
        .parse()
        .context("invalid gateway host/port")?;
    let candle_polls = config.feeds.candles.clone();

    let shared = state::AppState::new(
        config,
        state::data_dir_from_env(),
        state::agents_dir_from_env(),
    )
    .context("build app state")?;

    tasks::spawn_collect_flusher(Arc::clone(&shared), Duration::from_millis(100));
    if candle_polls.enabled {
        for (timeframe, poll_seconds) in candle_polls.poll_seconds_by_timeframe {
            tasks::spawn_feed_poller(
                Arc::clone(&shared),
                timeframe,
                Duration::from_secs(poll_seconds.max(1)),
            );
        }
    }

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    info!("aegisd listening on http://{bind_addr} (session endpoint at /ws)");
    axum::serve(tokio::net::TcpListener::bind(bind_addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// CORS: allow only localhost origins (operator consoles in dev).
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
