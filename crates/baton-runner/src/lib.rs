//! Baton Runner - process-backed test runners
//!
//! This crate provides the [`baton_core::Runner`] implementations used in
//! production:
//! - Subprocess runner (adapter runs on the host)
//! - Docker runner (adapter runs in a throwaway container)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod runner;

pub use error::{Error, Result};
pub use runner::{build_runner, CommandRunner, RunnerConfig, RunnerKind};
