use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use aegis_marketplace::example_signals;

use crate::methods::{parse_params, Failure, MethodResult, Reply};
use crate::session::Session;

pub(crate) fn signals() -> MethodResult {
    let signals: Vec<Value> = example_signals(Utc::now())
        .into_iter()
        .map(|signal| serde_json::to_value(signal).expect("signal serialization must not fail"))
        .collect();
    Ok(Reply::ok(json!({"signals": signals})).with_audit("marketplace.signals", json!({})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct FollowParams {
    account_id: String,
    strategy_id: String,
}

impl FollowParams {
    fn validate(&self) -> Result<(), Failure> {
        if self.account_id.trim().is_empty() || self.strategy_id.trim().is_empty() {
            return Err(Failure::invalid_params(
                "accountId and strategyId must be non-empty",
            ));
        }
        Ok(())
    }
}

/// Follows are session-scoped: they exist to demonstrate the follow
/// lifecycle to dashboards and die with the session.
pub(crate) fn follow(session: &mut Session, params: &Map<String, Value>) -> MethodResult {
    let params: FollowParams = parse_params(params)?;
    params.validate()?;

    let key = (params.account_id.clone(), params.strategy_id.clone());
    let follow = session.follows.entry(key).or_insert_with(|| {
        json!({
            "followId": format!("follow_{}", &Uuid::new_v4().simple().to_string()[..10]),
            "accountId": params.account_id,
            "strategyId": params.strategy_id,
            "createdAt": Utc::now(),
        })
    });
    let follow = follow.clone();

    Ok(Reply::ok(json!({"follow": follow.clone()}))
        .with_event("event.marketplace.follow", json!({"follow": follow.clone()}))
        .with_audit("marketplace.follow", json!({"follow": follow})))
}

pub(crate) fn unfollow(session: &mut Session, params: &Map<String, Value>) -> MethodResult {
    let params: FollowParams = parse_params(params)?;
    params.validate()?;

    let key = (params.account_id.clone(), params.strategy_id.clone());
    let removed = session.follows.remove(&key).is_some();

    let mut reply = Reply::ok(json!({"removed": removed})).with_audit(
        "marketplace.unfollow",
        json!({
            "accountId": params.account_id,
            "strategyId": params.strategy_id,
            "removed": removed,
        }),
    );
    if removed {
        reply = reply.with_event(
            "event.marketplace.unfollow",
            json!({"accountId": params.account_id, "strategyId": params.strategy_id}),
        );
    }
    Ok(reply)
}

pub(crate) fn my_follows(session: &Session) -> MethodResult {
    let follows: Vec<Value> = session.follows.values().cloned().collect();
    Ok(Reply::ok(json!({"follows": follows})).with_audit("marketplace.myFollows", json!({})))
}
