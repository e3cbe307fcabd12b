//! Polling loop for hardware dispatch.
//!
//! Spawns a tokio task that re-scans the store on a fixed cadence and
//! fires one `start` per eligible occurrence. The ledger entry is written
//! before the dispatch is spawned, so overlapping ticks cannot both fire.
//! Each dispatch runs as its own task and reports on a channel; a stalled
//! box never delays the next tick.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PollingConfig;
use crate::engine::{HardwareOutcome, SharedStore, lock_store};
use crate::hardware::{SharedHardwareTrigger, TriggerAction};
use crate::ledger::{DedupLedger, within_grace_window};
use crate::reminder::Reminder;

/// Result of one dispatch started by the loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchReport {
    pub reminder_id: String,
    pub box_id: Option<u32>,
    pub action: TriggerAction,
    /// Tick instant that found the reminder eligible.
    pub scheduled_at: DateTime<Utc>,
    pub outcome: HardwareOutcome,
}

/// `true` when `reminder` should get a `start` at `now`.
///
/// Done, already processed, undated, app-only and box-less reminders are
/// skipped; the rest are eligible while `0 <= now - date <= grace_ms`.
#[must_use]
pub fn is_eligible(
    reminder: &Reminder,
    ledger: &DedupLedger,
    now: DateTime<Utc>,
    grace_ms: i64,
) -> bool {
    if reminder.done || ledger.has_processed(&reminder.id) {
        return false;
    }
    if !reminder.notify_type().includes_hardware() || reminder.box_id.is_none() {
        return false;
    }
    reminder
        .elapsed_ms(now)
        .is_some_and(|elapsed| within_grace_window(elapsed, grace_ms))
}

/// Background loop dispatching due reminders.
pub struct PollingLoop {
    store: SharedStore,
    trigger: SharedHardwareTrigger,
    config: PollingConfig,
    report_tx: mpsc::UnboundedSender<DispatchReport>,
    cancel: CancellationToken,
}

impl PollingLoop {
    /// Create a loop reporting dispatch results on `report_tx`.
    pub fn new(
        store: SharedStore,
        trigger: SharedHardwareTrigger,
        config: PollingConfig,
        report_tx: mpsc::UnboundedSender<DispatchReport>,
    ) -> Self {
        Self {
            store,
            trigger,
            config,
            report_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop the loop when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the loop.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn the loop.
    ///
    /// Runs until the cancellation token fires. In-flight dispatches keep
    /// running to completion or timeout.
    pub fn run(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_ms = self.config.interval_ms, "polling loop started");
            let mut interval =
                tokio::time::interval(Duration::from_millis(self.config.interval_ms.max(1)));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = self.cancel.cancelled() => break,
                    _ = interval.tick() => {
                        self.tick_at(Utc::now());
                    }
                }
            }
            info!("polling loop stopped");
        })
    }

    /// Run one scan at `now`. Returns the ids whose dispatch was started.
    pub fn tick_at(&self, now: DateTime<Utc>) -> Vec<String> {
        let due = self.claim_due(now);
        let mut started = Vec::with_capacity(due.len());

        for reminder in due {
            debug!(reminder_id = %reminder.id, box_id = ?reminder.box_id, "dispatching start");
            started.push(reminder.id.clone());

            let trigger = self.trigger.clone();
            let report_tx = self.report_tx.clone();
            tokio::spawn(async move {
                let result = trigger.dispatch(&reminder, TriggerAction::Start).await;
                if let Err(e) = &result {
                    warn!(reminder_id = %reminder.id, error = %e, "scheduled dispatch failed");
                }
                let report = DispatchReport {
                    reminder_id: reminder.id,
                    box_id: reminder.box_id,
                    action: TriggerAction::Start,
                    scheduled_at: now,
                    outcome: HardwareOutcome::from_result(result),
                };
                if report_tx.send(report).is_err() {
                    debug!("dispatch report channel closed");
                }
            });
        }
        started
    }

    /// Select eligible reminders and mark them processed under one lock.
    fn claim_due(&self, now: DateTime<Utc>) -> Vec<Reminder> {
        let mut store = lock_store(&self.store);
        let due: Vec<Reminder> = store
            .all()
            .iter()
            .filter(|r| is_eligible(r, store.ledger(), now, self.config.grace_window_ms))
            .cloned()
            .collect();
        for reminder in &due {
            store.mark_processed(&reminder.id);
        }
        due
    }
}
