//! Configuration loading
//!
//! Handles loading configuration from embedded defaults, files, and environment.

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let config = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. External overrides (optional)
        .add_source(File::with_name("config/local").required(false))
        // 3. Environment variables (highest priority), e.g. BATON_SERVER__PORT
        .add_source(
            Environment::with_prefix("BATON")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use baton_runner::RunnerKind;

    #[test]
    fn test_embedded_defaults() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8889);
        assert_eq!(config.runner.kind, RunnerKind::Subprocess);
        assert_eq!(config.runner.timeout_secs, 3600);
        assert!(config.runner.launcher.is_empty());
        assert_eq!(config.web.interfaces_dir.to_str(), Some("web_interfaces"));
    }

    #[test]
    fn test_override_layer() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from_str(
                "[runner]\nkind = \"docker\"\ndocker_image = \"python:3.12\"\n",
                FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.runner.kind, RunnerKind::Docker);
        assert_eq!(config.runner.runner_config().docker_image, "python:3.12");
        assert_eq!(config.server.port, 8889);
    }
}
