//! Command runner - drives a suite's test tool through its LITF adapter.
//!
//! Every suite tool is expected to ship an adapter program (`<tool>-litf`)
//! that takes one JSON argument and streams line-delimited JSON events on
//! stdout:
//!
//! - `{"collect-only": true}` enumerates tests
//! - `{}` runs everything
//! - `{"nodeids": ["a", "b"]}` runs only the listed tests
//!
//! The runner forwards each event line to the suite's event sink as soon as
//! it is read, so observers see progress live.

use crate::error::{Error, Result};
use baton_core::{RunContext, Runner};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Longest stderr tail kept in an exit status error.
const STDERR_TAIL_BYTES: usize = 2048;

/// Mount point of the project directory inside docker containers.
const CONTAINER_WORKDIR: &str = "/src";

/// Exit code test tools use for "tests ran, some failed".
const TESTS_FAILED_EXIT_CODE: i32 = 1;

/// Where adapter processes run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerKind {
    /// Directly on the host
    #[default]
    #[serde(alias = "local")]
    Subprocess,
    /// Inside a throwaway docker container
    Docker,
}

impl fmt::Display for RunnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subprocess => write!(f, "subprocess"),
            Self::Docker => write!(f, "docker"),
        }
    }
}

impl FromStr for RunnerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "subprocess" | "local" => Ok(Self::Subprocess),
            "docker" => Ok(Self::Docker),
            other => Err(Error::UnknownKind(other.to_string())),
        }
    }
}

/// Configuration for command runners
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Maximum duration of one collect or launch
    pub timeout: Duration,
    /// Image used by the docker runner
    pub docker_image: String,
    /// Program and arguments placed before the adapter (e.g. `poetry run`)
    pub launcher: Vec<String>,
    /// Suffix appended to the tool name to get the adapter program
    pub adapter_suffix: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3600),
            docker_image: "python:3-slim".to_string(),
            launcher: Vec::new(),
            adapter_suffix: "-litf".to_string(),
        }
    }
}

impl RunnerConfig {
    /// Create a configuration with the given timeout
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    /// Set the docker image
    #[must_use]
    pub fn with_docker_image(mut self, image: impl Into<String>) -> Self {
        self.docker_image = image.into();
        self
    }

    /// Set the launcher prefix
    #[must_use]
    pub fn with_launcher(mut self, launcher: Vec<String>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Set the adapter suffix
    #[must_use]
    pub fn with_adapter_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.adapter_suffix = suffix.into();
        self
    }
}

/// Runner that spawns the suite's adapter and streams its stdout.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    kind: RunnerKind,
    config: RunnerConfig,
}

impl CommandRunner {
    /// Create a runner
    #[must_use]
    pub fn new(kind: RunnerKind, config: RunnerConfig) -> Self {
        Self { kind, config }
    }

    /// Runner kind
    #[must_use]
    pub fn kind(&self) -> RunnerKind {
        self.kind
    }

    /// Full command line for one invocation, program first.
    #[must_use]
    pub fn command_line(&self, ctx: &RunContext, args: &Value) -> Vec<String> {
        let mut line = Vec::new();
        if self.kind == RunnerKind::Docker {
            line.extend([
                "docker".to_string(),
                "run".to_string(),
                "--rm".to_string(),
                "-v".to_string(),
                format!("{}:{}", ctx.directory.display(), CONTAINER_WORKDIR),
                "-w".to_string(),
                CONTAINER_WORKDIR.to_string(),
                self.config.docker_image.clone(),
            ]);
        }
        line.extend(self.config.launcher.iter().cloned());
        line.push(format!("{}{}", ctx.tool, self.config.adapter_suffix));
        line.push(args.to_string());
        line
    }

    #[instrument(skip(self, ctx, args), fields(suite = %ctx.suite_name, runner = %self.kind))]
    async fn execute(&self, ctx: &RunContext, args: Value) -> Result<()> {
        let line = self.command_line(ctx, &args);
        let Some((program, rest)) = line.split_first() else {
            return Err(Error::Spawn {
                command: String::new(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
            });
        };

        let mut cmd = Command::new(program);
        cmd.args(rest)
            .current_dir(&ctx.directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(command = ?line, "Spawning adapter");
        let mut child = cmd.spawn().map_err(|source| Error::Spawn {
            command: program.clone(),
            source,
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("adapter stdout not captured"))?;
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buffer = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut buffer).await;
            }
            buffer
        });

        // Lines are decoded lossily; invalid UTF-8 is treated as non-event output.
        let mut reader = BufReader::new(stdout);
        let outcome = tokio::time::timeout(self.config.timeout, async {
            let mut published = 0usize;
            let mut buf = Vec::new();
            while reader.read_until(b'\n', &mut buf).await? > 0 {
                if forward_line(ctx, &String::from_utf8_lossy(&buf)) {
                    published += 1;
                }
                buf.clear();
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, published))
        })
        .await;

        let (status, published) = match outcome {
            Ok(result) => result?,
            Err(_) => {
                let _ = child.kill().await;
                stderr_task.abort();
                warn!(timeout_secs = self.config.timeout.as_secs(), "Adapter timed out");
                return Err(Error::Timeout(self.config.timeout.as_secs()));
            }
        };
        let stderr = stderr_task.await.unwrap_or_default();

        info!(published, exit = ?status.code(), "Adapter finished");
        if status.success() || (status.code() == Some(TESTS_FAILED_EXIT_CODE) && published > 0) {
            return Ok(());
        }

        Err(Error::ExitStatus {
            code: status
                .code()
                .map_or_else(|| "signal".to_string(), |code| code.to_string()),
            stderr: tail(&stderr, STDERR_TAIL_BYTES),
        })
    }
}

#[async_trait::async_trait]
impl Runner for CommandRunner {
    fn name(&self) -> &str {
        match self.kind {
            RunnerKind::Subprocess => "subprocess",
            RunnerKind::Docker => "docker",
        }
    }

    async fn collect_all(&self, ctx: &RunContext) -> baton_core::Result<()> {
        self.execute(ctx, json!({"collect-only": true}))
            .await
            .map_err(|e| e.into_core(&ctx.suite_name))
    }

    async fn launch_all(&self, ctx: &RunContext) -> baton_core::Result<()> {
        self.execute(ctx, json!({}))
            .await
            .map_err(|e| e.into_core(&ctx.suite_name))
    }

    async fn launch_tests(&self, ctx: &RunContext, test_ids: &[String]) -> baton_core::Result<()> {
        self.execute(ctx, json!({"nodeids": test_ids}))
            .await
            .map_err(|e| e.into_core(&ctx.suite_name))
    }
}

/// Build the runner for a kind.
pub fn build_runner(kind: RunnerKind, config: &RunnerConfig) -> Arc<dyn Runner> {
    Arc::new(CommandRunner::new(kind, config.clone()))
}

/// Forward one stdout line to the sink. Returns true if an event was published.
fn forward_line(ctx: &RunContext, line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return false;
    }
    match serde_json::from_str::<Value>(line) {
        Ok(event) => ctx.sink.emit(event),
        Err(_) => {
            debug!(suite = %ctx.suite_name, line = %line, "Ignoring non-JSON adapter output");
            false
        }
    }
}

fn tail(text: &str, max_bytes: usize) -> String {
    let text = text.trim_end();
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}
