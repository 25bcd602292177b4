use serde_json::{json, Value};

/// JSON Schema for the configuration tree, as served by `config.schema`.
///
/// Kept in lockstep with the serde types in `types.rs`; the
/// `additionalProperties: false` entries mirror their unknown-field
/// rejection.
pub fn config_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "AegisGatewayConfig",
        "type": "object",
        "additionalProperties": false,
        "required": ["gateway"],
        "properties": {
            "gateway": {
                "type": "object",
                "additionalProperties": false,
                "required": ["host", "port", "auth"],
                "properties": {
                    "host": {"type": "string", "minLength": 1},
                    "port": {"type": "integer", "minimum": 1, "maximum": 65535},
                    "auth": {
                        "type": "object",
                        "additionalProperties": false,
                        "required": ["mode", "token"],
                        "properties": {
                            "mode": {"type": "string", "minLength": 1},
                            "token": {"type": "string", "minLength": 1},
                        },
                    },
                },
            },
            "plugins": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "allow": {"type": "array", "items": {"type": "string"}},
                    "deny": {"type": "array", "items": {"type": "string"}},
                    "slots": {
                        "type": "object",
                        "additionalProperties": {"type": "string"},
                    },
                },
            },
            "accounts": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": [
                        "accountId",
                        "connectorId",
                        "providerAccountId",
                        "mode",
                        "label",
                    ],
                    "properties": {
                        "accountId": {"type": "string", "minLength": 1},
                        "connectorId": {"type": "string", "minLength": 1},
                        "providerAccountId": {"type": "string", "minLength": 1},
                        "mode": {"type": "string", "minLength": 1},
                        "label": {"type": "string", "minLength": 1},
                        "allowedSymbols": {"type": "array", "items": {"type": "string"}},
                    },
                },
            },
            "feeds": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "candles": {
                        "type": "object",
                        "additionalProperties": false,
                        "properties": {
                            "enabled": {"type": "boolean"},
                            "pollSecondsByTimeframe": {
                                "type": "object",
                                "additionalProperties": {"type": "integer", "minimum": 1},
                            },
                        },
                    },
                    "priceTicks": {
                        "type": "object",
                        "additionalProperties": false,
                        "properties": {
                            "enabled": {"type": "boolean"},
                        },
                    },
                },
            },
        },
    })
}
