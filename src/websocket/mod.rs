//! WebSocket module for Baton
//!
//! Provides the JSON-RPC endpoint at `/`: method calls plus the `test`
//! notification stream for subscribed observers.

pub mod gateway;
pub mod protocol;

pub use gateway::gateway_handler;

use axum::{routing::get, Router};

/// Create the WebSocket router
pub fn websocket_router() -> Router {
    Router::new().route("/", get(gateway_handler))
}
