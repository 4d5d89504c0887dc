//! JSON-RPC gateway WebSocket handler.
//!
//! Flow:
//! 1. Client connects to `/` and sends JSON-RPC requests
//! 2. Each request is dispatched in its own task (collect_all, run_all, ...)
//! 3. After `subscribe("test")` the connection joins the observer set and
//!    receives every `test` notification

pub mod connection;
pub mod dispatch;


pub use connection::handle_message;
pub use dispatch::{dispatch_method, DispatchContext, METHODS, TOPICS};

use axum::{extract::ws::WebSocketUpgrade, response::IntoResponse, Extension};
use baton_core::{Engine, ObserverSet};
use connection::handle_gateway;
use std::sync::Arc;

/// Maximum size of a single WS text message (1 MB).
const MAX_MESSAGE_BYTES: usize = 1_048_576;

/// WebSocket upgrade handler for `/`.
pub async fn gateway_handler(
    ws: WebSocketUpgrade,
    Extension(engine): Extension<Arc<Engine>>,
    Extension(observers): Extension<Arc<ObserverSet>>,
) -> impl IntoResponse {
    ws.max_message_size(MAX_MESSAGE_BYTES)
        .on_upgrade(move |socket| handle_gateway(socket, engine, observers))
}
