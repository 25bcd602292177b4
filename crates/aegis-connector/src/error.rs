/// A broker-side failure, normalized to a stable code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectorError {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl std::fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ConnectorError {}

/// Map a raw provider failure message to a stable code.
///
/// | marker in message    | code                 | retryable |
/// |----------------------|----------------------|-----------|
/// | `MARKET_CLOSED`      | `MARKET_CLOSED`      | no        |
/// | `TRADE_CONTEXT_BUSY` | `TRADE_CONTEXT_BUSY` | yes       |
/// | `INSUFFICIENT_FUNDS` | `INSUFFICIENT_FUNDS` | no        |
/// | `INVALID_STOPS`      | `INVALID_STOPS`      | no        |
/// | anything else        | `CONNECTOR_ERROR`    | no        |
pub fn map_connector_error(message: &str) -> ConnectorError {
    const MAPPING: [(&str, bool); 4] = [
        ("MARKET_CLOSED", false),
        ("TRADE_CONTEXT_BUSY", true),
        ("INSUFFICIENT_FUNDS", false),
        ("INVALID_STOPS", false),
    ];

    for (marker, retryable) in MAPPING {
        if message.contains(marker) {
            return ConnectorError {
                code: marker.to_string(),
                message: message.to_string(),
                retryable,
            };
        }
    }

    ConnectorError {
        code: "CONNECTOR_ERROR".to_string(),
        message: message.to_string(),
        retryable: false,
    }
}
