use super::status::TestStatus;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields of a raw event that map onto message attributes and never land in
/// the free-form payload.
const RESERVED_FIELDS: [&str; 8] = [
    "_type",
    "suite_name",
    "id",
    "test_id",
    "test_name",
    "status",
    "outcome",
    "run_id",
];

/// Kind of a notification message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A test was enumerated by a collect
    TestCollection,
    /// A test reported progress or a result
    TestResult,
}

impl NotificationKind {
    /// Wire name, as found in the raw `_type` field.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TestCollection => "test_collection",
            Self::TestResult => "test_result",
        }
    }
}

/// Normalized event flowing from a runner through the event bus.
///
/// Messages are shared between subscribers behind an `Arc` and never mutated
/// after publication. The serialized form keeps the raw event layout
/// (`_type`, `id`, payload fields at the top level) that dashboards consume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationMessage {
    /// Collection or result
    #[serde(rename = "_type")]
    pub kind: NotificationKind,
    /// Suite the test belongs to
    pub suite_name: String,
    /// Test identifier, unique within the suite
    #[serde(rename = "id")]
    pub test_id: String,
    /// Display name, when the runner reported one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_name: Option<String>,
    /// Status carried by the message (`collected` for collections)
    pub status: TestStatus,
    /// Launch that produced a result; always `None` for collections
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Remaining runner fields (file, line, duration, error, logs...)
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl NotificationMessage {
    /// A collection message for a test.
    pub fn collection(suite_name: impl Into<String>, test_id: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::TestCollection,
            suite_name: suite_name.into(),
            test_id: test_id.into(),
            test_name: None,
            status: TestStatus::Collected,
            run_id: None,
            payload: Map::new(),
        }
    }

    /// A result message for a test.
    pub fn result(
        suite_name: impl Into<String>,
        test_id: impl Into<String>,
        status: TestStatus,
    ) -> Self {
        Self {
            kind: NotificationKind::TestResult,
            suite_name: suite_name.into(),
            test_id: test_id.into(),
            test_name: None,
            status,
            run_id: None,
            payload: Map::new(),
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.test_name = Some(name.into());
        self
    }

    /// Set the run id. Ignored for collections.
    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        if self.kind == NotificationKind::TestResult {
            self.run_id = Some(run_id.into());
        }
        self
    }

    /// Add a payload field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }
}

/// A parsed raw runner event.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// A collection or result addressed to a test
    Notification(NotificationMessage),
    /// An event type this core does not handle (session markers, logs...)
    Unknown {
        /// The raw `_type` value
        kind: String,
    },
}

impl InboundEvent {
    /// Normalize a raw runner event.
    ///
    /// Raw events are JSON objects shaped like
    /// `{"_type": "test_result", "suite_name": "unit", "id": "t1", "status": "passed", ...}`.
    /// `id` may also be spelled `test_id` and `status` may be spelled
    /// `outcome`. Everything that is not a reserved field becomes payload.
    pub fn parse(raw: Value) -> Result<Self> {
        let Value::Object(mut fields) = raw else {
            return Err(Error::malformed("event is not a JSON object"));
        };

        let kind = match fields.remove("_type") {
            Some(Value::String(kind)) => kind,
            Some(other) => {
                return Err(Error::malformed(format!(
                    "`_type` must be a string, got {}",
                    other
                )))
            }
            None => return Err(Error::malformed("missing `_type`")),
        };
        let kind = match kind.as_str() {
            "test_collection" => NotificationKind::TestCollection,
            "test_result" => NotificationKind::TestResult,
            _ => return Ok(Self::Unknown { kind }),
        };

        let suite_name = required_string(&fields, &["suite_name"])?;
        let test_id = required_string(&fields, &["id", "test_id"])?;
        let test_name = optional_string(&fields, "test_name")?;

        let (status, run_id) = match kind {
            // The run id of a collection does not identify anything.
            NotificationKind::TestCollection => (TestStatus::Collected, None),
            NotificationKind::TestResult => {
                let raw_status = required_string(&fields, &["status", "outcome"])?;
                let status: TestStatus = raw_status.parse()?;
                if !status.is_result() {
                    return Err(Error::malformed(format!(
                        "'{}' is not a result status",
                        status
                    )));
                }
                (status, run_id_of(&fields)?)
            }
        };

        for key in RESERVED_FIELDS {
            fields.remove(key);
        }

        Ok(Self::Notification(NotificationMessage {
            kind,
            suite_name,
            test_id,
            test_name,
            status,
            run_id,
            payload: fields,
        }))
    }
}

fn required_string(fields: &Map<String, Value>, names: &[&str]) -> Result<String> {
    for name in names {
        match fields.get(*name) {
            Some(Value::String(value)) if !value.is_empty() => return Ok(value.clone()),
            Some(Value::String(_)) => {
                return Err(Error::malformed(format!("`{}` is empty", name)))
            }
            Some(_) => return Err(Error::malformed(format!("`{}` must be a string", name))),
            None => continue,
        }
    }
    Err(Error::malformed(format!("missing `{}`", names[0])))
}

fn optional_string(fields: &Map<String, Value>, name: &str) -> Result<Option<String>> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(Error::malformed(format!("`{}` must be a string", name))),
    }
}

fn run_id_of(fields: &Map<String, Value>) -> Result<Option<String>> {
    match fields.get("run_id") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) => Ok(Some(id.clone())),
        Some(Value::Number(id)) => Ok(Some(id.to_string())),
        Some(_) => Err(Error::malformed("`run_id` must be a string or number")),
    }
}
