//! aegis-connector
//!
//! Narrow adapter around the external broker RPC. The broker exposes tool
//! calls (`place_market_order`, `get_candles`, ...) behind a transport; this
//! crate owns the transport seam, the typed tool wrappers, and the mapping
//! from provider failures to the stable error codes surfaced to clients.
//! The core never panics on connector errors; everything comes back as a
//! [`ConnectorError`].

mod client;
mod error;
mod transport;

pub use client::BrokerConnector;
pub use error::{map_connector_error, ConnectorError};
pub use transport::{ConnectorTransport, HttpConnectorTransport, DEFAULT_CONNECTOR_TIMEOUT_SECS};
