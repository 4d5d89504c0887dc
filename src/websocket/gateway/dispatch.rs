//! Method dispatch routing for the JSON-RPC gateway.

use baton_core::{BatchReport, Engine, ObserverSet, Selection, TEST_TOPIC};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::websocket::protocol::{RpcError, INTERNAL_ERROR};

/// Every method the gateway answers, as reported by `get_methods`.
pub const METHODS: &[&str] = &[
    "collect_all",
    "run_all",
    "run_selected",
    "list_tests",
    "subscribe",
    "unsubscribe",
    "get_topics",
    "get_methods",
    "ping",
];

/// Topics clients may subscribe to.
pub const TOPICS: &[&str] = &[TEST_TOPIC];

/// Per-connection context handed to every method call.
#[derive(Clone)]
pub struct DispatchContext {
    /// Orchestration engine
    pub engine: Arc<Engine>,
    /// Connections subscribed to the test topic
    pub observers: Arc<ObserverSet>,
    /// Calling connection
    pub conn_id: Uuid,
    /// Outbound frames of the calling connection
    pub outbound: mpsc::UnboundedSender<String>,
}

/// Route a method call to its handler.
pub async fn dispatch_method(
    method: &str,
    params: Value,
    ctx: &DispatchContext,
) -> Result<Value, RpcError> {
    debug!(conn_id = %ctx.conn_id, method = %method, "Dispatching");
    match method {
        "collect_all" => batch_result(ctx.engine.collect_all().await),
        "run_all" => batch_result(ctx.engine.run_all().await),
        "run_selected" => {
            let selection = parse_selection(params)?;
            batch_result(ctx.engine.run_selected(selection).await)
        }
        "list_tests" => {
            let snapshot = ctx.engine.registry().snapshot().await;
            serde_json::to_value(snapshot)
                .map_err(|e| RpcError::new(INTERNAL_ERROR, format!("Serialization failed: {}", e)))
        }
        "subscribe" => {
            parse_topics(params)?;
            ctx.observers.insert(ctx.conn_id, ctx.outbound.clone());
            info!(conn_id = %ctx.conn_id, observers = ctx.observers.len(), "Observer subscribed");
            Ok(Value::Bool(true))
        }
        "unsubscribe" => {
            parse_topics(params)?;
            ctx.observers.remove(ctx.conn_id);
            info!(conn_id = %ctx.conn_id, "Observer unsubscribed");
            Ok(Value::Bool(true))
        }
        "get_topics" => Ok(json!(TOPICS)),
        "get_methods" => Ok(json!(METHODS)),
        "ping" => Ok(Value::String("pong".to_string())),
        _ => Err(RpcError::method_not_found(method)),
    }
}

fn batch_result(report: BatchReport) -> Result<Value, RpcError> {
    if report.is_success() {
        Ok(Value::String("ok".to_string()))
    } else {
        Err(RpcError::suites_failed(&report))
    }
}

/// `{"suite": ["test id", ...], ...}`
fn parse_selection(params: Value) -> Result<Selection, RpcError> {
    if !params.is_object() {
        return Err(RpcError::invalid_params(
            "run_selected expects an object of suite name to test ids",
        ));
    }
    serde_json::from_value(params)
        .map_err(|e| RpcError::invalid_params(format!("Invalid selection: {}", e)))
}

/// `"test"` or `["test"]`. Unknown topics are rejected.
fn parse_topics(params: Value) -> Result<Vec<String>, RpcError> {
    let topics = match params {
        Value::String(topic) => vec![topic],
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(topic) => Ok(topic),
                other => Err(RpcError::invalid_params(format!(
                    "Topic must be a string, got {}",
                    other
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Value::Null => return Err(RpcError::invalid_params("Missing topic")),
        other => {
            return Err(RpcError::invalid_params(format!(
                "Topics must be a string or a list, got {}",
                other
            )))
        }
    };
    if let Some(unknown) = topics.iter().find(|topic| !TOPICS.contains(&topic.as_str())) {
        return Err(RpcError::invalid_params(format!("Unknown topic: {}", unknown)));
    }
    Ok(topics)
}
