//! Shared helpers for integration tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pillminder::config::{EngineConfig, HardwareConfig};
use pillminder::engine::ReminderEngine;
use pillminder::error::Result;
use pillminder::hardware::HttpDispatcher;
use pillminder::notify::NotificationService;
use pillminder::persistence::{JsonFileStore, MemoryStore, SharedKeyValueStore};
use pillminder::poller::{DispatchReport, PollingLoop};
use pillminder::store::ReminderStore;
use tokio::sync::mpsc;
use wiremock::MockServer;

/// One recorded alert request.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScheduledAlert {
    pub fire_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
}

/// Notification service that records every request.
#[derive(Debug, Default)]
pub(crate) struct AlertLog {
    alerts: Mutex<Vec<ScheduledAlert>>,
}

impl AlertLog {
    pub(crate) fn alerts(&self) -> Vec<ScheduledAlert> {
        self.alerts.lock().expect("alert log lock").clone()
    }
}

#[async_trait]
impl NotificationService for AlertLog {
    async fn schedule_one_shot(
        &self,
        fire_at: DateTime<Utc>,
        title: &str,
        body: &str,
    ) -> Result<String> {
        let mut alerts = self.alerts.lock().expect("alert log lock");
        alerts.push(ScheduledAlert {
            fire_at,
            title: title.to_owned(),
            body: body.to_owned(),
        });
        Ok(format!("alert-{}", alerts.len()))
    }
}

/// Engine wired to a wiremock box controller.
pub(crate) struct Rig {
    pub engine: ReminderEngine,
    pub alerts: Arc<AlertLog>,
    pub poller: PollingLoop,
    pub reports: mpsc::UnboundedReceiver<DispatchReport>,
}

/// Config pointing the hardware endpoint at `server` with a short timeout.
pub(crate) fn config_for(server: &MockServer, timeout: Duration) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.hardware =
        HardwareConfig::new(server.uri()).with_timeout_ms(timeout.as_millis() as u64);
    config
}

/// Build a rig over `backend` talking to `server`.
pub(crate) fn rig_with_backend(
    server: &MockServer,
    timeout: Duration,
    backend: SharedKeyValueStore,
) -> Rig {
    let config = config_for(server, timeout);
    let alerts = Arc::new(AlertLog::default());
    let trigger = Arc::new(HttpDispatcher::new(config.hardware.clone()));
    let engine = ReminderEngine::new(
        ReminderStore::load(backend),
        alerts.clone(),
        trigger,
        &config,
    );
    let (report_tx, reports) = mpsc::unbounded_channel();
    let poller = PollingLoop::new(
        engine.store(),
        engine.trigger(),
        config.polling.clone(),
        report_tx,
    );
    Rig {
        engine,
        alerts,
        poller,
        reports,
    }
}

/// Build a rig with an in-memory store.
pub(crate) fn rig(server: &MockServer) -> Rig {
    rig_with_backend(
        server,
        Duration::from_secs(10),
        Arc::new(MemoryStore::new()),
    )
}

/// Build a file-backed key/value store inside `dir`.
pub(crate) fn file_store(dir: &tempfile::TempDir) -> SharedKeyValueStore {
    Arc::new(JsonFileStore::new(dir.path().join("store")))
}

/// Wait for the next dispatch report.
pub(crate) async fn next_report(rx: &mut mpsc::UnboundedReceiver<DispatchReport>) -> DispatchReport {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("dispatch report in time")
        .expect("report channel open")
}
