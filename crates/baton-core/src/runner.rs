//! Runner abstraction.
//!
//! A runner drives the test tool of one suite. It never returns result sets:
//! everything it learns is streamed through the [`EventSink`] of its
//! [`RunContext`] so observers see progress live.

use crate::event_bus::EventBus;
use crate::model::{InboundEvent, NotificationMessage};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything a runner needs for one collect or launch.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Suite being collected or run
    pub suite_name: String,
    /// Test tool configured for the suite (e.g. "pytest")
    pub tool: String,
    /// Project directory the tool runs in
    pub directory: PathBuf,
    /// Launch identifier, `None` for collections
    pub run_id: Option<String>,
    /// Where raw events go
    pub sink: EventSink,
}

/// Executes the tests of a suite.
#[async_trait::async_trait]
pub trait Runner: Send + Sync {
    /// Runner name used in logs
    fn name(&self) -> &str;

    /// Enumerate every test of the suite, emitting `test_collection` events.
    async fn collect_all(&self, ctx: &RunContext) -> crate::Result<()>;

    /// Run every test of the suite, emitting `test_result` events.
    async fn launch_all(&self, ctx: &RunContext) -> crate::Result<()>;

    /// Run only `test_ids`, emitting `test_result` events for them.
    async fn launch_tests(&self, ctx: &RunContext, test_ids: &[String]) -> crate::Result<()>;
}

/// Normalizes raw runner events and publishes them on the bus.
///
/// Bound to one suite (and one launch for runs): events that omit
/// `suite_name` or `run_id` get the sink's values.
#[derive(Debug, Clone)]
pub struct EventSink {
    bus: Arc<EventBus>,
    suite_name: String,
    run_id: Option<String>,
}

impl EventSink {
    /// Create a sink for a suite.
    pub fn new(bus: Arc<EventBus>, suite_name: impl Into<String>) -> Self {
        Self {
            bus,
            suite_name: suite_name.into(),
            run_id: None,
        }
    }

    /// Tag every event passing through with a launch id.
    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Suite the sink is bound to.
    #[must_use]
    pub fn suite_name(&self) -> &str {
        &self.suite_name
    }

    /// Normalize and publish a raw event.
    ///
    /// Unknown event kinds and malformed events are logged and dropped.
    /// Returns true when the event was published.
    pub fn emit(&self, mut raw: Value) -> bool {
        if let Value::Object(fields) = &mut raw {
            fields
                .entry("suite_name")
                .or_insert_with(|| Value::String(self.suite_name.clone()));
            if let Some(run_id) = &self.run_id {
                fields
                    .entry("run_id")
                    .or_insert_with(|| Value::String(run_id.clone()));
            }
        }

        match InboundEvent::parse(raw) {
            Ok(InboundEvent::Notification(message)) => {
                self.publish(message);
                true
            }
            Ok(InboundEvent::Unknown { kind }) => {
                debug!(suite = %self.suite_name, kind = %kind, "Dropping event of unhandled type");
                false
            }
            Err(e) => {
                warn!(suite = %self.suite_name, error = %e, "Dropping malformed event");
                false
            }
        }
    }

    /// Publish an already normalized message.
    pub fn publish(&self, message: NotificationMessage) -> usize {
        self.bus.publish(message)
    }
}
