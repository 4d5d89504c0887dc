//! Suite configuration loading.
//!
//! Suites are declared in a `.baton.json` file at the root of the project
//! directory:
//!
//! ```json
//! [
//!   {"name": "unit", "tool": "pytest"},
//!   {"name": "lint", "tool": "flake8", "runner": "docker"}
//! ]
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Name of the suite config file inside the project directory.
pub const CONFIG_FILE_NAME: &str = ".baton.json";

/// One suite entry of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Suite name, defaults to the tool name
    #[serde(default)]
    pub name: String,
    /// Test tool the runner drives
    pub tool: String,
    /// Runner override for this suite (defaults to the server-wide runner)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner: Option<String>,
}

/// Read and validate the suites declared in `directory`.
pub fn load_suites(directory: &Path) -> Result<Vec<SuiteConfig>> {
    let path = directory.join(CONFIG_FILE_NAME);
    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
    let suites = parse_suites(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    debug!(path = %path.display(), count = suites.len(), "Suite config loaded");
    Ok(suites)
}

/// Parse and validate a suite config document.
pub fn parse_suites(content: &str) -> Result<Vec<SuiteConfig>> {
    let mut suites: Vec<SuiteConfig> = serde_json::from_str(content)?;

    let mut seen = HashSet::new();
    for suite in &mut suites {
        if suite.tool.trim().is_empty() {
            return Err(Error::Config("suite with an empty tool".to_string()));
        }
        if suite.name.trim().is_empty() {
            suite.name = suite.tool.clone();
        }
        if !seen.insert(suite.name.clone()) {
            return Err(Error::Config(format!("duplicate suite name '{}'", suite.name)));
        }
    }
    Ok(suites)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults_name_to_tool() {
        let suites = parse_suites(r#"[{"tool": "pytest"}, {"name": "lint", "tool": "flake8"}]"#)
            .unwrap();
        assert_eq!(suites[0].name, "pytest");
        assert_eq!(suites[1].name, "lint");
        assert_eq!(suites[1].runner, None);
    }

    #[test]
    fn test_parse_runner_override() {
        let suites =
            parse_suites(r#"[{"name": "unit", "tool": "pytest", "runner": "docker"}]"#).unwrap();
        assert_eq!(suites[0].runner.as_deref(), Some("docker"));
    }

    #[test]
    fn test_parse_rejects_duplicates() {
        let err = parse_suites(r#"[{"name": "a", "tool": "pytest"}, {"name": "a", "tool": "nose"}]"#)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_parse_rejects_empty_tool() {
        assert!(parse_suites(r#"[{"name": "a", "tool": ""}]"#).is_err());
    }

    #[test]
    fn test_parse_rejects_malformed_json() {
        assert!(matches!(parse_suites("{not json"), Err(Error::Json(_))));
        assert!(parse_suites(r#"{"name": "a"}"#).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_suites(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"[{"name": "unit", "tool": "pytest"}]"#,
        )
        .unwrap();

        let suites = load_suites(dir.path()).unwrap();
        assert_eq!(
            suites,
            vec![SuiteConfig {
                name: "unit".to_string(),
                tool: "pytest".to_string(),
                runner: None,
            }]
        );
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[{").unwrap();
        assert!(matches!(load_suites(dir.path()), Err(Error::Config(_))));
    }
}
