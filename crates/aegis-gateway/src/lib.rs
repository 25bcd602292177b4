//! aegis-gateway
//!
//! The control-plane gateway daemon for the Aegis Trader platform.
//! Operators hold one duplex WebSocket session each; every request frame is
//! dispatched by method name to the subsystem crates, events are emitted
//! before their response, and side-effecting methods leave an audit trail.
//!
//! Layout mirrors the rest of the workspace's daemons: `main.rs` is thin,
//! `routes.rs` owns the HTTP surface, `state.rs` the shared stores,
//! `session.rs` the per-connection state machine, and `methods/` the
//! dispatch table.

pub mod routes;
pub mod session;
pub mod state;
pub mod tasks;

mod methods;

/// The protocol version this server speaks.
pub const PROTOCOL_VERSION: u64 = 1;

/// Server identity advertised in `gateway.connect` / `gateway.status`.
pub const SERVER_NAME: &str = "mt5-claude-trader-v2";

/// Crate version advertised to clients.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
