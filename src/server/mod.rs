//! Server module for Baton
//!
//! # Module Structure
//!
//! - `config`: Configuration structures for the server and runners
//! - `loader`: Configuration loading from files and environment
//! - `shutdown`: Ctrl+C / SIGTERM handling
//! - `init`: Main server initialization and run loop

pub mod config;
mod init;
mod loader;
mod shutdown;

// Re-export public API
pub use init::{build_router, build_state, run, AppState};
pub use loader::{load_config, DEFAULT_CONFIG};
