use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use aegis_registry::AccountSpec;

use crate::methods::{parse_params, Failure, MethodResult, Reply};
use crate::state::AppState;

pub(crate) async fn connect(state: &AppState, params: &Map<String, Value>) -> MethodResult {
    let spec: AccountSpec = parse_params(params)?;
    for (name, value) in [
        ("accountId", &spec.account_id),
        ("connectorId", &spec.connector_id),
        ("providerAccountId", &spec.provider_account_id),
        ("mode", &spec.mode),
        ("label", &spec.label),
    ] {
        if value.trim().is_empty() {
            return Err(Failure::invalid_params(format!("{name} must be non-empty")));
        }
    }

    let account = state
        .accounts
        .write()
        .await
        .connect(spec, Utc::now())
        .map_err(|err| Failure::system(format!("account persistence failed: {err:#}")))?;

    let account_value =
        serde_json::to_value(&account).expect("account serialization must not fail");
    Ok(Reply::ok(json!({"account": account_value}))
        .with_event(
            "event.account.status",
            json!({"accountId": account.account_id, "status": account.status}),
        )
        .with_audit(
            "accounts.connect",
            json!({"accountId": account.account_id, "mode": account.mode}),
        ))
}

pub(crate) async fn list(state: &AppState) -> MethodResult {
    let accounts = state.accounts.read().await;
    let items: Vec<Value> = accounts
        .list()
        .into_iter()
        .map(|account| serde_json::to_value(account).expect("account serialization must not fail"))
        .collect();
    Ok(Reply::ok(json!({"accounts": items})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct AccountIdParams {
    account_id: String,
}

pub(crate) async fn get(state: &AppState, params: &Map<String, Value>) -> MethodResult {
    let params: AccountIdParams = parse_params(params)?;
    let accounts = state.accounts.read().await;
    match accounts.get(&params.account_id) {
        Some(account) => Ok(Reply::ok(json!({
            "account": serde_json::to_value(account).expect("account serialization must not fail"),
        }))),
        None => Err(Failure::not_found(format!(
            "unknown account: {}",
            params.account_id
        ))),
    }
}

pub(crate) async fn status(state: &AppState, params: &Map<String, Value>) -> MethodResult {
    let params: AccountIdParams = parse_params(params)?;
    let accounts = state.accounts.read().await;
    match accounts.get(&params.account_id) {
        Some(account) => Ok(Reply::ok(json!({
            "accountId": account.account_id,
            "status": account.status,
            "connectedAt": account.connected_at,
            "disconnectedAt": account.disconnected_at,
        }))),
        None => Err(Failure::not_found(format!(
            "unknown account: {}",
            params.account_id
        ))),
    }
}

pub(crate) async fn disconnect(state: &AppState, params: &Map<String, Value>) -> MethodResult {
    let params: AccountIdParams = parse_params(params)?;
    let account = state
        .accounts
        .write()
        .await
        .disconnect(&params.account_id, Utc::now())
        .map_err(|err| Failure::system(format!("account persistence failed: {err:#}")))?;

    match account {
        Some(account) => {
            let account_value =
                serde_json::to_value(&account).expect("account serialization must not fail");
            Ok(Reply::ok(json!({"account": account_value}))
                .with_event(
                    "event.account.status",
                    json!({"accountId": account.account_id, "status": account.status}),
                )
                .with_audit(
                    "accounts.disconnect",
                    json!({"accountId": account.account_id}),
                ))
        }
        None => Err(
            Failure::not_found(format!("unknown account: {}", params.account_id)).with_audit(
                "accounts.disconnect.blocked",
                json!({"accountId": params.account_id, "error": "unknown account"}),
            ),
        ),
    }
}
