//! Suite Registry: the named suites and the tests they hold.
//!
//! The set of suites is fixed when the registry is built. Tests are upserted
//! by the state updater as notifications arrive and are never removed.

use crate::error::{Error, Result};
use crate::model::{NotificationMessage, Test};
use crate::runner::Runner;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct SuiteTests {
    order: Vec<String>,
    by_id: HashMap<String, Test>,
}

/// A named group of tests sharing one runner.
pub struct Suite {
    name: String,
    tool: String,
    runner: Arc<dyn Runner>,
    tests: RwLock<SuiteTests>,
}

impl Suite {
    /// Create an empty suite.
    pub fn new(name: impl Into<String>, tool: impl Into<String>, runner: Arc<dyn Runner>) -> Self {
        Self {
            name: name.into(),
            tool: tool.into(),
            runner,
            tests: RwLock::new(SuiteTests::default()),
        }
    }

    /// Suite name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Test tool driven by the runner
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Runner bound to this suite
    #[must_use]
    pub fn runner(&self) -> &Arc<dyn Runner> {
        &self.runner
    }

    /// Upsert the test addressed by `message` and return its new state.
    ///
    /// The whole update happens under one write lock, so readers see either
    /// the previous or the new state of the test.
    pub async fn update_test(&self, message: &NotificationMessage) -> Result<Test> {
        if message.suite_name != self.name {
            return Err(Error::malformed(format!(
                "message for suite '{}' routed to suite '{}'",
                message.suite_name, self.name
            )));
        }

        let mut tests = self.tests.write().await;
        if let Some(test) = tests.by_id.get_mut(&message.test_id) {
            test.apply_update(message)?;
            return Ok(test.clone());
        }

        let test = Test::from_update(message);
        tests.order.push(message.test_id.clone());
        tests.by_id.insert(message.test_id.clone(), test.clone());
        Ok(test)
    }

    /// Snapshot of a single test.
    pub async fn test(&self, test_id: &str) -> Option<Test> {
        self.tests.read().await.by_id.get(test_id).cloned()
    }

    /// Snapshot of every test, in first-seen order.
    pub async fn tests(&self) -> Vec<Test> {
        let tests = self.tests.read().await;
        tests
            .order
            .iter()
            .filter_map(|id| tests.by_id.get(id).cloned())
            .collect()
    }

    /// Ids of every known test, in first-seen order.
    pub async fn test_ids(&self) -> Vec<String> {
        self.tests.read().await.order.clone()
    }

    /// Number of known tests.
    pub async fn len(&self) -> usize {
        self.tests.read().await.order.len()
    }

    /// Whether no test is known yet.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl std::fmt::Debug for Suite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Suite")
            .field("name", &self.name)
            .field("tool", &self.tool)
            .field("runner", &self.runner.name())
            .finish()
    }
}

/// Serializable view of a suite and its tests.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteSnapshot {
    /// Suite name
    pub name: String,
    /// Test tool
    pub tool: String,
    /// Tests in first-seen order
    pub tests: Vec<Test>,
}

/// Fixed set of suites, keyed by name.
#[derive(Debug)]
pub struct SuiteRegistry {
    order: Vec<String>,
    suites: HashMap<String, Arc<Suite>>,
}

impl SuiteRegistry {
    /// Build the registry. Duplicate suite names are a configuration error.
    pub fn new(suites: impl IntoIterator<Item = Suite>) -> Result<Self> {
        let mut order = Vec::new();
        let mut by_name = HashMap::new();
        for suite in suites {
            let name = suite.name().to_string();
            if by_name.contains_key(&name) {
                return Err(Error::Config(format!("duplicate suite name '{}'", name)));
            }
            order.push(name.clone());
            by_name.insert(name, Arc::new(suite));
        }
        Ok(Self {
            order,
            suites: by_name,
        })
    }

    /// Look up a suite. Unknown names never create a suite.
    pub fn get(&self, name: &str) -> Result<Arc<Suite>> {
        self.suites
            .get(name)
            .cloned()
            .ok_or_else(|| Error::SuiteNotFound(name.to_string()))
    }

    /// Every suite, in configuration order.
    #[must_use]
    pub fn suites(&self) -> Vec<Arc<Suite>> {
        self.order
            .iter()
            .filter_map(|name| self.suites.get(name).cloned())
            .collect()
    }

    /// Suite names, in configuration order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Number of suites
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the registry holds no suite
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Apply an update to a test of the named suite.
    pub async fn update_test(&self, suite_name: &str, message: &NotificationMessage) -> Result<Test> {
        self.get(suite_name)?.update_test(message).await
    }

    /// Snapshot of every suite with its tests.
    pub async fn snapshot(&self) -> Vec<SuiteSnapshot> {
        let mut snapshot = Vec::with_capacity(self.order.len());
        for suite in self.suites() {
            snapshot.push(SuiteSnapshot {
                name: suite.name().to_string(),
                tool: suite.tool().to_string(),
                tests: suite.tests().await,
            });
        }
        snapshot
    }
}
