//! # driplined — dripline daemon
//!
//! Composition root that wires all adapters together and starts the engine.
//!
//! ## Responsibilities
//! - Parse configuration (TOML file, env vars)
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct repository implementations (adapters)
//! - Construct the engine (dispatcher, executor, matcher, resume worker),
//!   injecting repositories via port traits
//! - Build the axum router, injecting the bus and stores
//! - Bind to a TCP port and serve until SIGINT
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use dripline_adapter_http_axum::router;
use dripline_adapter_http_axum::state::AppState;
use dripline_adapter_storage_sqlite_sqlx::{
    Config as DbConfig, SqliteAutomationStore, SqliteExecutionLog, SqliteRunRepository,
};
use dripline_adapter_virtual::{InMemoryTagStore, LoggingWebhookSink, RecordingMailer};
use dripline_app::dispatch::ActionDispatcher;
use dripline_app::event_bus::InProcessEventBus;
use dripline_app::executor::RunExecutor;
use dripline_app::resume::ResumeWorker;
use dripline_app::trigger_matcher::TriggerMatcher;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    // Database
    let db = DbConfig {
        database_url: config.database.url.clone(),
    }
    .build()
    .await?;
    let pool = db.pool().clone();

    // Repositories
    let automations = Arc::new(SqliteAutomationStore::new(pool.clone()));
    let runs = Arc::new(SqliteRunRepository::new(pool.clone()));
    let log = Arc::new(SqliteExecutionLog::new(pool));

    // Collaborators — only the virtual set is wired so far.
    anyhow::ensure!(
        config.collaborators.virtual_enabled,
        "no non-virtual collaborators are available; enable [collaborators] virtual_enabled"
    );
    let dispatcher = ActionDispatcher::new(
        Arc::new(RecordingMailer::default()),
        Arc::new(InMemoryTagStore::default()),
        Arc::new(LoggingWebhookSink::default()),
    );

    // Engine
    let bus = Arc::new(InProcessEventBus::new(config.engine.bus_capacity));
    let executor = Arc::new(
        RunExecutor::new(
            Arc::clone(&automations),
            Arc::clone(&runs),
            Arc::clone(&log),
            dispatcher,
        )
        .with_retry_policy(config.engine.retry_policy()),
    );

    let matcher = Arc::new(TriggerMatcher::new(
        Arc::clone(&automations),
        Arc::clone(&executor),
    ));
    let _matcher_task = matcher.spawn(bus.subscribe());

    let _resume_task = ResumeWorker::new(Arc::clone(&runs), Arc::clone(&executor))
        .with_poll_interval(config.engine.resume_poll_interval())
        .spawn();

    // HTTP
    let state = AppState::new(automations, Arc::clone(&bus), log);
    let app = router::build(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("driplined listening on http://{bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}
