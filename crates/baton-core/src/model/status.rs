use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a single test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    /// No information yet
    #[default]
    Unknown,
    /// Enumerated by a collect, not run yet
    Collected,
    /// Currently executing
    Running,
    /// Finished successfully
    Passed,
    /// Finished with a failing assertion
    Failed,
    /// Could not be executed (runner or setup error)
    Errored,
}

impl TestStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [TestStatus; 6] = [
        Self::Unknown,
        Self::Collected,
        Self::Running,
        Self::Passed,
        Self::Failed,
        Self::Errored,
    ];

    /// Wire name of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Collected => "collected",
            Self::Running => "running",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Errored => "errored",
        }
    }

    /// Whether the test has finished executing.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Errored)
    }

    /// Whether a `test_result` message may carry this status.
    #[must_use]
    pub fn is_result(&self) -> bool {
        matches!(self, Self::Running) || self.is_terminal()
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::malformed(format!("unknown test status '{}'", s)))
    }
}
