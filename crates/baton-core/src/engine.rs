//! Orchestration engine.
//!
//! Fans collect/run requests out to suites concurrently and joins them all.
//! A suite that fails is reported in its own [`SuiteOutcome`]; it never stops
//! the other suites of the batch.

use crate::error::Error;
use crate::event_bus::EventBus;
use crate::model::{NotificationMessage, TestStatus};
use crate::registry::{Suite, SuiteRegistry};
use crate::runner::{EventSink, RunContext};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Tests to run, by suite name.
pub type Selection = BTreeMap<String, Vec<String>>;

/// Batch operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Enumerate every suite
    CollectAll,
    /// Run every suite
    RunAll,
    /// Run selected tests
    RunSelected,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CollectAll => write!(f, "collect_all"),
            Self::RunAll => write!(f, "run_all"),
            Self::RunSelected => write!(f, "run_selected"),
        }
    }
}

/// Outcome of one suite within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteOutcome {
    /// Suite name as requested
    pub suite: String,
    /// Failure description, `None` on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SuiteOutcome {
    fn ok(suite: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            error: None,
        }
    }

    fn failed(suite: impl Into<String>, error: &Error) -> Self {
        Self {
            suite: suite.into(),
            error: Some(error.to_string()),
        }
    }

    /// Whether the suite operation succeeded
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-suite outcomes of a settled batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Operation that produced the report
    pub operation: Operation,
    /// One outcome per targeted suite
    pub outcomes: Vec<SuiteOutcome>,
}

impl BatchReport {
    /// Whether every suite succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(SuiteOutcome::is_ok)
    }

    /// Failed suites only
    pub fn failures(&self) -> impl Iterator<Item = &SuiteOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_ok())
    }

    /// Outcome for a suite
    #[must_use]
    pub fn outcome(&self, suite: &str) -> Option<&SuiteOutcome> {
        self.outcomes.iter().find(|outcome| outcome.suite == suite)
    }
}

/// Dispatches collect and run operations to the suites of a registry.
#[derive(Debug, Clone)]
pub struct Engine {
    registry: Arc<SuiteRegistry>,
    bus: Arc<EventBus>,
    directory: PathBuf,
}

impl Engine {
    /// Create an engine for the project in `directory`.
    pub fn new(registry: Arc<SuiteRegistry>, bus: Arc<EventBus>, directory: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            bus,
            directory: directory.into(),
        }
    }

    /// Suite registry
    #[must_use]
    pub fn registry(&self) -> &Arc<SuiteRegistry> {
        &self.registry
    }

    /// Project directory
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Collect every suite. Returns once all of them settled.
    pub async fn collect_all(&self) -> BatchReport {
        info!(suites = self.registry.len(), "Collect all");
        let futures = self
            .registry
            .suites()
            .into_iter()
            .map(|suite| self.collect_suite(suite));
        self.settle(Operation::CollectAll, join_all(futures).await)
            .await
    }

    /// Run every suite. Returns once all of them settled.
    pub async fn run_all(&self) -> BatchReport {
        info!(suites = self.registry.len(), "Run all");
        let futures = self
            .registry
            .suites()
            .into_iter()
            .map(|suite| self.run_suite(suite, None));
        self.settle(Operation::RunAll, join_all(futures).await).await
    }

    /// Run the selected tests of each named suite. An unknown suite fails
    /// its own entry only.
    pub async fn run_selected(&self, selection: Selection) -> BatchReport {
        info!(selection = ?selection, "Run selected");
        let futures = selection.into_iter().map(|(name, test_ids)| async move {
            match self.registry.get(&name) {
                Ok(suite) => self.run_suite(suite, Some(test_ids)).await,
                Err(e) => {
                    warn!(suite = %name, error = %e, "Cannot run selection");
                    SuiteOutcome::failed(name, &e)
                }
            }
        });
        self.settle(Operation::RunSelected, join_all(futures).await)
            .await
    }

    /// Wait until the notifications of the batch reached every subscriber.
    async fn settle(&self, operation: Operation, outcomes: Vec<SuiteOutcome>) -> BatchReport {
        self.bus.flush().await;
        let report = BatchReport {
            operation,
            outcomes,
        };
        let failed = report.failures().count();
        info!(
            operation = %operation,
            suites = report.outcomes.len(),
            failed,
            "Batch settled"
        );
        report
    }

    async fn collect_suite(&self, suite: Arc<Suite>) -> SuiteOutcome {
        let ctx = self.context(&suite, None);
        debug!(suite = %suite.name(), runner = suite.runner().name(), "Collecting");
        match suite.runner().collect_all(&ctx).await {
            Ok(()) => SuiteOutcome::ok(suite.name()),
            Err(e) => {
                warn!(suite = %suite.name(), error = %e, "Collection failed");
                SuiteOutcome::failed(suite.name(), &e)
            }
        }
    }

    /// Run a whole suite (`test_ids == None`) or a subset of it.
    async fn run_suite(&self, suite: Arc<Suite>, test_ids: Option<Vec<String>>) -> SuiteOutcome {
        if matches!(&test_ids, Some(ids) if ids.is_empty()) {
            debug!(suite = %suite.name(), "Empty selection, nothing to run");
            return SuiteOutcome::ok(suite.name());
        }

        let run_id = Uuid::new_v4().to_string();
        let ctx = self.context(&suite, Some(run_id.clone()));
        debug!(suite = %suite.name(), run_id = %run_id, "Launching");

        let result = match &test_ids {
            None => suite.runner().launch_all(&ctx).await,
            Some(ids) => suite.runner().launch_tests(&ctx, ids).await,
        };
        let Err(e) = result else {
            return SuiteOutcome::ok(suite.name());
        };

        warn!(suite = %suite.name(), run_id = %run_id, error = %e, "Run failed");
        // Registry must reflect everything the runner streamed before it failed.
        self.bus.flush().await;
        let targets = match test_ids {
            Some(ids) => ids,
            None => suite.test_ids().await,
        };
        for test_id in targets {
            if settled_in_run(&suite, &test_id, &run_id).await {
                continue;
            }
            ctx.sink.publish(
                NotificationMessage::result(suite.name(), test_id, TestStatus::Errored)
                    .with_run_id(run_id.as_str())
                    .with_field("error", serde_json::Value::String(e.to_string())),
            );
        }
        SuiteOutcome::failed(suite.name(), &e)
    }

    fn context(&self, suite: &Suite, run_id: Option<String>) -> RunContext {
        let mut sink = EventSink::new(Arc::clone(&self.bus), suite.name());
        if let Some(run_id) = &run_id {
            sink = sink.with_run_id(run_id.as_str());
        }
        RunContext {
            suite_name: suite.name().to_string(),
            tool: suite.tool().to_string(),
            directory: self.directory.clone(),
            run_id,
            sink,
        }
    }
}

/// Whether the test already reported a final result in this launch.
async fn settled_in_run(suite: &Suite, test_id: &str, run_id: &str) -> bool {
    suite
        .test(test_id)
        .await
        .is_some_and(|t| t.run_id.as_deref() == Some(run_id) && t.status.is_terminal())
}
