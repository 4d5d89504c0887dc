//! Baton - language independent test orchestrator
//!
//! Library half of the `baton` binary: CLI, configuration, server wiring and
//! the JSON-RPC WebSocket gateway.

#![forbid(unsafe_code)]

pub mod cli;
pub mod server;
pub mod websocket;
