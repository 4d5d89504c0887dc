//! Server initialization
//!
//! Contains the main `run()` function that wires suites, runners, the event
//! bus and the HTTP/WebSocket server together.

use anyhow::{Context, Result};
use axum::{Extension, Router};
use baton_core::{gateway, load_suites, Engine, EventBus, ObserverSet, Suite, SuiteRegistry};
use baton_runner::{build_runner, RunnerKind};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

use super::config::{AppConfig, WebConfig};
use super::loader::load_config;
use super::shutdown::shutdown_signal;
use crate::cli::Cli;

/// Shared state handed to request handlers through `Extension`s.
#[derive(Clone, Debug)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub observers: Arc<ObserverSet>,
}

/// Run the server
pub async fn run(cli: Cli) -> Result<()> {
    info!("Starting Baton v{}", env!("CARGO_PKG_VERSION"));

    let mut config = load_config().context("Failed to load configuration")?;
    cli.apply(&mut config);
    info!("Configuration loaded");

    let directory = cli
        .directory
        .canonicalize()
        .with_context(|| format!("Invalid project directory {}", cli.directory.display()))?;
    info!("Project directory: {}", directory.display());

    let state = build_state(&directory, &config)?;
    let app = build_router(&state, &config.web);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    info!("JSON-RPC server listening on ws://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Baton shutdown complete");
    Ok(())
}

/// Build the registry, bus and engine for the project in `directory`.
///
/// Subscribers are installed before the engine exists, so no notification
/// can be published without reaching them.
pub fn build_state(directory: &Path, config: &AppConfig) -> Result<AppState> {
    let suite_configs = load_suites(directory).context("Failed to load suite configuration")?;
    if suite_configs.is_empty() {
        warn!("No suite configured in {}", directory.display());
    }

    let runner_config = config.runner.runner_config();
    let mut suites = Vec::with_capacity(suite_configs.len());
    for suite in suite_configs {
        let kind = match &suite.runner {
            Some(kind) => kind
                .parse::<RunnerKind>()
                .with_context(|| format!("Invalid runner for suite '{}'", suite.name))?,
            None => config.runner.kind,
        };
        info!(suite = %suite.name, tool = %suite.tool, runner = %kind, "Suite registered");
        suites.push(Suite::new(suite.name, suite.tool, build_runner(kind, &runner_config)));
    }

    let registry = Arc::new(SuiteRegistry::new(suites).context("Failed to build suite registry")?);
    let bus = Arc::new(EventBus::new());
    let observers = Arc::new(ObserverSet::new());
    gateway::install(&bus, Arc::clone(&registry), Arc::clone(&observers));

    Ok(AppState {
        engine: Arc::new(Engine::new(registry, bus, directory)),
        observers,
    })
}

/// Build the main router: JSON-RPC at `/`, dashboards under `/interface`.
pub fn build_router(state: &AppState, web: &WebConfig) -> Router {
    if web.interfaces_dir.is_dir() {
        info!("Web interfaces enabled: serving from {}", web.interfaces_dir.display());
    } else {
        warn!(
            "Web interfaces directory {} not found, /interface will answer 404",
            web.interfaces_dir.display()
        );
    }
    let serve_dir = ServeDir::new(&web.interfaces_dir).append_index_html_on_directories(true);

    crate::websocket::websocket_router()
        .nest_service("/interface", serve_dir)
        .layer(Extension(Arc::clone(&state.engine)))
        .layer(Extension(Arc::clone(&state.observers)))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
