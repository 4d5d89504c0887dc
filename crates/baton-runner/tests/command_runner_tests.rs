#![cfg(unix)]

use baton_core::{
    EventBus, EventSink, NotificationKind, NotificationMessage, RunContext, Runner, Subscriber,
    TestStatus,
};
use baton_runner::{CommandRunner, RunnerConfig, RunnerKind};
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_test::assert_ok;

const ADAPTER: &str = r#"
case "$1" in
  *collect-only*)
    echo '{"_type": "test_collection", "id": "t1", "test_name": "first"}'
    echo '{"_type": "test_collection", "id": "t2"}'
    ;;
  *nodeids*)
    echo '{"_type": "test_result", "id": "t2", "status": "passed"}'
    ;;
  *)
    echo 'plugin banner, not an event'
    echo '{"_type": "session_start"}'
    echo '{"_type": "test_result", "id": "t1", "status": "running"}'
    echo '{"_type": "test_result", "id": "t1", "status": "failed"}'
    exit 1
    ;;
esac
"#;

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<NotificationMessage>>,
}

impl Recorder {
    fn seen(&self) -> Vec<NotificationMessage> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Subscriber for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    async fn handle(&self, message: &NotificationMessage) -> baton_core::Result<()> {
        self.seen.lock().unwrap().push(message.clone());
        Ok(())
    }
}

struct Fixture {
    dir: TempDir,
    bus: Arc<EventBus>,
    recorder: Arc<Recorder>,
}

impl Fixture {
    fn new(script: &str) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("adapter.sh"), script).unwrap();
        let bus = Arc::new(EventBus::new());
        let recorder = Arc::new(Recorder::default());
        bus.register(Arc::clone(&recorder) as Arc<dyn Subscriber>);
        Self { dir, bus, recorder }
    }

    fn runner(&self, timeout: Duration) -> CommandRunner {
        let config = RunnerConfig::new(timeout)
            .with_launcher(vec!["sh".to_string()])
            .with_adapter_suffix("");
        CommandRunner::new(RunnerKind::Subprocess, config)
    }

    fn context(&self, run_id: Option<&str>) -> RunContext {
        let mut sink = EventSink::new(Arc::clone(&self.bus), "unit");
        if let Some(run_id) = run_id {
            sink = sink.with_run_id(run_id);
        }
        RunContext {
            suite_name: "unit".to_string(),
            tool: self.dir.path().join("adapter.sh").display().to_string(),
            directory: self.dir.path().to_path_buf(),
            run_id: run_id.map(str::to_string),
            sink,
        }
    }

    async fn seen(&self) -> Vec<NotificationMessage> {
        self.bus.flush().await;
        self.recorder.seen()
    }
}

#[tokio::test]
async fn test_collect_streams_collection_events() {
    let fixture = Fixture::new(ADAPTER);
    let runner = fixture.runner(Duration::from_secs(10));

    assert_ok!(runner.collect_all(&fixture.context(None)).await);

    let seen = fixture.seen().await;
    assert_eq!(seen.len(), 2);
    assert!(seen
        .iter()
        .all(|m| m.kind == NotificationKind::TestCollection && m.suite_name == "unit"));
    assert_eq!(seen[0].test_id, "t1");
    assert_eq!(seen[0].test_name.as_deref(), Some("first"));
    assert_eq!(seen[1].test_id, "t2");
}

#[tokio::test]
async fn test_launch_all_skips_noise_and_accepts_failed_tests_exit() {
    let fixture = Fixture::new(ADAPTER);
    let runner = fixture.runner(Duration::from_secs(10));

    let result = runner.launch_all(&fixture.context(Some("run-1"))).await;
    assert!(result.is_ok(), "exit 1 after results is a normal run: {:?}", result);

    let seen = fixture.seen().await;
    let statuses: Vec<_> = seen.iter().map(|m| m.status).collect();
    assert_eq!(statuses, vec![TestStatus::Running, TestStatus::Failed]);
    assert!(seen.iter().all(|m| m.run_id.as_deref() == Some("run-1")));
}

#[tokio::test]
async fn test_launch_tests_passes_node_ids() {
    let fixture = Fixture::new(ADAPTER);
    let runner = fixture.runner(Duration::from_secs(10));

    runner
        .launch_tests(&fixture.context(Some("run-2")), &["t2".to_string()])
        .await
        .unwrap();

    let seen = fixture.seen().await;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].test_id, "t2");
    assert_eq!(seen[0].status, TestStatus::Passed);
}

#[tokio::test]
async fn test_failing_exit_without_results_is_an_error() {
    let fixture = Fixture::new("echo 'boom' >&2\nexit 3\n");
    let runner = fixture.runner(Duration::from_secs(10));

    let err = runner.launch_all(&fixture.context(Some("run-3"))).await.unwrap_err();

    let message = err.to_string();
    assert!(message.contains("unit"), "{}", message);
    assert!(message.contains("3"), "{}", message);
    assert!(message.contains("boom"), "{}", message);
}

#[tokio::test]
async fn test_exit_one_without_results_is_an_error() {
    let fixture = Fixture::new("exit 1\n");
    let runner = fixture.runner(Duration::from_secs(10));

    assert!(runner.collect_all(&fixture.context(None)).await.is_err());
}

#[tokio::test]
async fn test_timeout_kills_adapter() {
    let fixture = Fixture::new(
        "echo '{\"_type\": \"test_result\", \"id\": \"t1\", \"status\": \"running\"}'\nsleep 30\n",
    );
    let runner = fixture.runner(Duration::from_millis(300));

    let started = std::time::Instant::now();
    let err = runner.launch_all(&fixture.context(Some("run-4"))).await.unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(err.to_string().contains("timeout"), "{}", err);
    // Events read before the deadline were still delivered.
    assert_eq!(fixture.seen().await.len(), 1);
}

#[tokio::test]
async fn test_crash_after_results_is_an_error_but_keeps_events() {
    let fixture = Fixture::new(
        "echo '{\"_type\": \"test_result\", \"id\": \"t1\", \"status\": \"passed\"}'\n\
         echo 'segfault' >&2\nexit 2\n",
    );
    let runner = fixture.runner(Duration::from_secs(10));

    let err = runner.launch_all(&fixture.context(Some("run-5"))).await.unwrap_err();
    assert!(err.to_string().contains("segfault"), "{}", err);

    let seen = fixture.seen().await;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].test_id, "t1");
    assert_eq!(seen[0].status, TestStatus::Passed);
}

#[tokio::test]
async fn test_non_utf8_output_is_skipped() {
    let fixture = Fixture::new(
        "printf '\\377\\376 banner\\n'\n\
         echo '{\"_type\": \"test_result\", \"id\": \"t1\", \"status\": \"passed\"}'\n",
    );
    let runner = fixture.runner(Duration::from_secs(10));

    assert_ok!(runner.launch_all(&fixture.context(Some("run-6"))).await);

    let seen = fixture.seen().await;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].test_id, "t1");
    assert_eq!(seen[0].status, TestStatus::Passed);
}

#[tokio::test]
async fn test_missing_adapter_fails_to_spawn() {
    let fixture = Fixture::new("");
    let config = RunnerConfig::new(Duration::from_secs(5));
    let runner = CommandRunner::new(RunnerKind::Subprocess, config);
    let mut ctx = fixture.context(None);
    ctx.tool = "baton-no-such-tool".to_string();

    let err = runner.collect_all(&ctx).await.unwrap_err();
    assert!(err.to_string().contains("baton-no-such-tool-litf"), "{}", err);
}

#[tokio::test]
async fn test_command_lines() {
    let fixture = Fixture::new("");
    let mut ctx = fixture.context(None);
    ctx.tool = "pytest".to_string();
    ctx.directory = Path::new("/work/project").to_path_buf();

    let local = CommandRunner::new(RunnerKind::Subprocess, RunnerConfig::default());
    assert_eq!(
        local.command_line(&ctx, &json!({"nodeids": ["a::b"]})),
        vec!["pytest-litf", r#"{"nodeids":["a::b"]}"#]
    );

    let config = RunnerConfig::default()
        .with_docker_image("python:3.12")
        .with_launcher(vec!["poetry".to_string(), "run".to_string()]);
    let docker = CommandRunner::new(RunnerKind::Docker, config);
    assert_eq!(
        docker.command_line(&ctx, &json!({})),
        vec![
            "docker",
            "run",
            "--rm",
            "-v",
            "/work/project:/src",
            "-w",
            "/src",
            "python:3.12",
            "poetry",
            "run",
            "pytest-litf",
            "{}",
        ]
    );
}
