//! Server configuration types

use baton_runner::{RunnerConfig, RunnerKind};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub runner: RunnerSettings,
    #[serde(default)]
    pub web: WebConfig,
}

/// Listening address of the JSON-RPC and static server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8889,
        }
    }
}

/// Runner configuration (exposed to TOML)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerSettings {
    /// Runner for suites that do not name one
    #[serde(default)]
    pub kind: RunnerKind,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_docker_image")]
    pub docker_image: String,
    #[serde(default)]
    pub launcher: Vec<String>,
}

fn default_timeout_secs() -> u64 {
    3600
}

fn default_docker_image() -> String {
    "python:3-slim".to_string()
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            kind: RunnerKind::default(),
            timeout_secs: default_timeout_secs(),
            docker_image: default_docker_image(),
            launcher: Vec::new(),
        }
    }
}

impl RunnerSettings {
    /// Settings shared by every runner the server builds.
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig::new(Duration::from_secs(self.timeout_secs))
            .with_docker_image(self.docker_image.clone())
            .with_launcher(self.launcher.clone())
    }
}

/// Static dashboard assets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Directory served under `/interface`
    pub interfaces_dir: PathBuf,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            interfaces_dir: PathBuf::from("web_interfaces"),
        }
    }
}
