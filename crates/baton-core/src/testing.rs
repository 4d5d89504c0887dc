//! Test doubles shared by the unit tests of this crate.

use crate::error::{Error, Result};
use crate::model::TestStatus;
use crate::runner::{RunContext, Runner};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Collect,
    LaunchAll,
    LaunchTests(Vec<String>),
}

/// Runner that streams a fixed list of tests through the sink.
pub(crate) struct ScriptedRunner {
    tests: Vec<String>,
    status: TestStatus,
    failure: Option<String>,
    partial: Vec<String>,
    delay: Duration,
    noise: bool,
    calls: Mutex<Vec<Call>>,
    finished: AtomicUsize,
}

impl ScriptedRunner {
    pub(crate) fn new(tests: &[&str]) -> Self {
        Self {
            tests: tests.iter().map(|t| t.to_string()).collect(),
            status: TestStatus::Passed,
            failure: None,
            partial: Vec::new(),
            delay: Duration::ZERO,
            noise: false,
            calls: Mutex::new(Vec::new()),
            finished: AtomicUsize::new(0),
        }
    }

    /// Status reported for every executed test.
    pub(crate) fn with_status(mut self, status: TestStatus) -> Self {
        self.status = status;
        self
    }

    /// Fail every operation without emitting anything.
    pub(crate) fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Report results for `tests` before the launch fails.
    pub(crate) fn failing_after(mut self, tests: &[&str], message: &str) -> Self {
        self.partial = tests.iter().map(|t| t.to_string()).collect();
        self.failing(message)
    }

    /// Sleep before finishing each operation.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Emit an event of an unhandled type before the real ones.
    pub(crate) fn with_noise(mut self) -> Self {
        self.noise = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    async fn finish(&self, ctx: &RunContext, call: Call) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.noise {
            ctx.sink.emit(json!({"_type": "session_start", "total_tests": self.tests.len()}));
        }
        tokio::time::sleep(self.delay).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(Error::runner(&ctx.suite_name, message.as_str())),
            None => Ok(()),
        }
    }

    fn emit_results(&self, ctx: &RunContext, ids: &[String]) {
        for id in ids {
            ctx.sink.emit(json!({"_type": "test_result", "id": id, "status": "running"}));
            ctx.sink.emit(json!({
                "_type": "test_result",
                "id": id,
                "status": self.status.as_str(),
                "duration": 0.01,
            }));
        }
    }
}

#[async_trait::async_trait]
impl Runner for ScriptedRunner {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn collect_all(&self, ctx: &RunContext) -> Result<()> {
        if self.failure.is_none() {
            for id in &self.tests {
                ctx.sink.emit(json!({
                    "_type": "test_collection",
                    "id": id,
                    "test_name": format!("name of {}", id),
                }));
            }
        }
        self.finish(ctx, Call::Collect).await
    }

    async fn launch_all(&self, ctx: &RunContext) -> Result<()> {
        if self.failure.is_none() {
            self.emit_results(ctx, &self.tests);
        } else {
            self.emit_results(ctx, &self.partial);
        }
        self.finish(ctx, Call::LaunchAll).await
    }

    async fn launch_tests(&self, ctx: &RunContext, test_ids: &[String]) -> Result<()> {
        if self.failure.is_none() {
            let known: Vec<String> = test_ids
                .iter()
                .filter(|id| self.tests.contains(id))
                .cloned()
                .collect();
            self.emit_results(ctx, &known);
        } else {
            self.emit_results(ctx, &self.partial);
        }
        self.finish(ctx, Call::LaunchTests(test_ids.to_vec())).await
    }
}
