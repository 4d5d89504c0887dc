//! Baton Core - Test Orchestration Engine
//!
//! This crate provides the orchestration core of the Baton test orchestrator:
//! - Model: tests, statuses and the normalized notification message
//! - Registry: the fixed set of suites and their tests
//! - Event bus: ordered publish/subscribe with per-subscriber queues
//! - Engine: concurrent collect/run fan-out with per-suite outcomes
//! - Gateway: registry updates and observer broadcast as bus subscribers
//! - Runner: the trait test backends implement, and the event sink they emit to
//! - Config: `.baton.json` suite declarations

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod event_bus;
pub mod gateway;
pub mod model;
pub mod registry;
pub mod runner;

pub use config::{load_suites, parse_suites, SuiteConfig, CONFIG_FILE_NAME};
pub use engine::{BatchReport, Engine, Operation, Selection, SuiteOutcome};
pub use error::{Error, Result};
pub use event_bus::{EventBus, Subscriber, SubscriptionId};
pub use gateway::{
    notification_envelope, Broadcaster, ObserverSet, StateUpdater, JSONRPC_VERSION, TEST_TOPIC,
};
pub use model::{InboundEvent, NotificationKind, NotificationMessage, Test, TestStatus};
pub use registry::{Suite, SuiteRegistry, SuiteSnapshot};
pub use runner::{EventSink, RunContext, Runner};

#[cfg(test)]
pub(crate) mod testing;
