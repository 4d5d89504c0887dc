//! CLI module for Baton

use baton_runner::RunnerKind;
use clap::Parser;
use std::path::PathBuf;

use crate::server::config::AppConfig;

/// Baton language independent test orchestrator
#[derive(Parser, Debug)]
#[command(name = "baton")]
#[command(about = "Language independent test orchestrator")]
#[command(version)]
pub struct Cli {
    /// Directory holding the .baton.json suite configuration
    pub directory: PathBuf,

    /// Runner for suites that do not name one (subprocess, docker)
    #[arg(short, long)]
    pub runner: Option<RunnerKind>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Trace logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Log filter used when `RUST_LOG` is not set.
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "baton=trace,baton_core=trace,baton_runner=trace,tower_http=debug"
        } else if self.verbose {
            "baton=debug,baton_core=debug,baton_runner=debug,tower_http=debug"
        } else {
            "baton=info,baton_core=info,baton_runner=info,tower_http=info"
        }
    }

    /// Apply command line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(kind) = self.runner {
            config.runner.kind = kind;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let cli = Cli::try_parse_from(["baton", "."]).unwrap();
        assert_eq!(cli.directory, PathBuf::from("."));
        assert!(cli.runner.is_none());
        assert!(cli.log_filter().starts_with("baton=info"));
    }

    #[test]
    fn test_overrides() {
        let cli =
            Cli::try_parse_from(["baton", "proj", "--runner", "docker", "-p", "9000", "-v"]).unwrap();
        let mut config = AppConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.runner.kind, RunnerKind::Docker);
        assert_eq!(config.server.port, 9000);
        assert!(cli.log_filter().starts_with("baton=debug"));
    }

    #[test]
    fn test_unknown_runner_rejected() {
        assert!(Cli::try_parse_from(["baton", ".", "--runner", "podman"]).is_err());
    }
}
