use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use baton_core::{Engine, ObserverSet};

use super::dispatch::{dispatch_method, DispatchContext};
use crate::websocket::protocol::{RpcRequest, RpcResponse};

/// Max time without receiving a message before considering the connection dead.
pub const HEARTBEAT_TIMEOUT_SECS: u64 = 60;
/// How often to send server-side pings.
pub const PING_INTERVAL_SECS: u64 = 30;

/// Main gateway connection handler.
///
/// Responses and `test` notifications share one outbound queue, so a client
/// sees every notification of a batch before the batch's response.
pub async fn handle_gateway(socket: WebSocket, engine: Arc<Engine>, observers: Arc<ObserverSet>) {
    let conn_id = Uuid::new_v4();
    info!(conn_id = %conn_id, "Gateway WS connection opened");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    let ctx = DispatchContext {
        engine,
        observers: Arc::clone(&observers),
        conn_id,
        outbound,
    };

    let ping_interval = tokio::time::interval(tokio::time::Duration::from_secs(PING_INTERVAL_SECS));
    tokio::pin!(ping_interval);

    let mut last_recv = tokio::time::Instant::now();
    let heartbeat_timeout = tokio::time::Duration::from_secs(HEARTBEAT_TIMEOUT_SECS);

    loop {
        tokio::select! {
            // Client message
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        last_recv = tokio::time::Instant::now();
                        // Each request gets its own task so a long run keeps
                        // the notification stream of this connection flowing.
                        let ctx = ctx.clone();
                        tokio::spawn(async move {
                            if let Some(response) = handle_message(&text, &ctx).await {
                                let _ = ctx.outbound.send(response.to_text());
                            }
                        });
                    }
                    Some(Ok(Message::Ping(data))) => {
                        last_recv = tokio::time::Instant::now();
                        let _ = ws_tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_recv = tokio::time::Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(conn_id = %conn_id, error = %e, "Gateway WS error");
                        break;
                    }
                    _ => {}
                }
            }
            // Responses and notifications → forward to client
            frame = outbound_rx.recv() => {
                let Some(frame) = frame else { break };
                if ws_tx.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }
            // Server ping (WS protocol level)
            _ = ping_interval.tick() => {
                if last_recv.elapsed() > heartbeat_timeout {
                    info!(conn_id = %conn_id, "Heartbeat timeout, closing");
                    break;
                }
                if ws_tx.send(Message::Ping(vec![])).await.is_err() {
                    break;
                }
            }
        }
    }

    observers.remove(conn_id);
    info!(conn_id = %conn_id, observers = observers.len(), "Gateway WS connection closed");
}

/// Handle one text frame. Returns the response to send, if any.
///
/// Requests without an id are JSON-RPC notifications: they are executed but
/// never answered.
pub async fn handle_message(text: &str, ctx: &DispatchContext) -> Option<RpcResponse> {
    let request = match RpcRequest::parse(text) {
        Ok(request) => request,
        Err(error) => {
            debug!(conn_id = %ctx.conn_id, error = %error.message, "Rejecting frame");
            return Some(RpcResponse::err(Value::Null, error));
        }
    };

    let result = dispatch_method(&request.method, request.params, ctx).await;
    if let Err(error) = &result {
        debug!(
            conn_id = %ctx.conn_id,
            method = %request.method,
            code = error.code,
            "Method returned an error"
        );
    }
    let id = request.id?;
    Some(RpcResponse::from_result(id, result))
}
