//! Headless host binary for stdin/stdout JSON communication.
//!
//! Loads the reminder store, starts the polling loop, and serves
//! `CommandEnvelope` messages as newline-delimited JSON on stdin. Responses
//! and events (`dispatch.report`, `alert.fired`, reminder changes) go to
//! stdout.
//!
//! All tracing output goes to stderr and a daily log file so that stdout
//! remains a clean JSON protocol channel.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use pillminder::config::EngineConfig;
use pillminder::engine::ReminderEngine;
use pillminder::hardware::HttpDispatcher;
use pillminder::host::channel::{command_channel, spawn_event_forwarder};
use pillminder::host::stdio::run_stdio_bridge;
use pillminder::notify::TimerNotificationService;
use pillminder::persistence::JsonFileStore;
use pillminder::poller::PollingLoop;
use pillminder::store::ReminderStore;

/// Request channel capacity for the host bridge.
const REQUEST_CAPACITY: usize = 64;

/// Event broadcast channel capacity for the host bridge.
const EVENT_CAPACITY: usize = 128;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = init_tracing();

    let config = load_config()?;
    tracing::info!(
        base_url = %config.hardware.base_url,
        interval_ms = config.polling.interval_ms,
        "pillminder-host starting"
    );

    let data_dir = config.storage.resolved_dir();
    tracing::info!(dir = %data_dir.display(), "using reminder store");
    let backend = Arc::new(JsonFileStore::new(data_dir));
    let store = ReminderStore::load(backend);

    let (alert_tx, alert_rx) = mpsc::unbounded_channel();
    let notifier = Arc::new(TimerNotificationService::new(alert_tx));
    let trigger = Arc::new(HttpDispatcher::new(config.hardware.clone()));
    let engine = ReminderEngine::new(store, notifier, trigger, &config);

    let (report_tx, report_rx) = mpsc::unbounded_channel();
    let poller = PollingLoop::new(
        engine.store(),
        engine.trigger(),
        config.polling.clone(),
        report_tx,
    );
    let cancel = poller.cancellation_token();
    let poller_handle = poller.run();

    let (client, server) = command_channel(REQUEST_CAPACITY, EVENT_CAPACITY, engine);
    let forwarder = spawn_event_forwarder(client.event_sender(), report_rx, alert_rx);
    let server_handle = tokio::spawn(server.run());

    let result = run_stdio_bridge(client).await;

    cancel.cancel();
    let _ = poller_handle.await;
    forwarder.abort();
    let _ = server_handle.await;

    result.map_err(|e| {
        tracing::error!(error = %e, "pillminder-host exited with error");
        anyhow::anyhow!("pillminder-host failed: {e}")
    })?;

    tracing::info!("pillminder-host shut down cleanly");
    Ok(())
}

/// Log to stderr and to a daily file under the logs directory.
///
/// The returned guard flushes the file writer on drop.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pillminder=info"));
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let logs_dir = pillminder::paths::logs_dir();
    if std::fs::create_dir_all(&logs_dir).is_err() {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .init();
        tracing::warn!(dir = %logs_dir.display(), "log directory unavailable; logging to stderr only");
        return None;
    }

    let appender = tracing_appender::rolling::daily(&logs_dir, "pillminder-host.log");
    let (file_writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Some(guard)
}

/// Load the config from `PILLMINDER_CONFIG` or the default path.
///
/// A missing file means defaults; an unreadable or invalid one is fatal.
fn load_config() -> anyhow::Result<EngineConfig> {
    let path = std::env::var_os("PILLMINDER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(EngineConfig::default_config_path);

    if !path.exists() {
        tracing::info!(path = %path.display(), "no config file; using defaults");
        return Ok(EngineConfig::default());
    }

    EngineConfig::from_file(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))
}
