//! Reminder engine: store mutations plus their side effects.
//!
//! [`ReminderEngine`] is a cheap-to-clone handle over the shared
//! [`ReminderStore`]. Store mutations run under a short synchronous lock;
//! notification and hardware I/O runs after the lock is released.

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::hardware::{Ack, DispatchError, SharedHardwareTrigger, TriggerAction};
use crate::ledger::DispatchState;
use crate::notify::{NotificationScheduler, ScheduleOutcome, SharedNotificationService};
use crate::reminder::Reminder;
use crate::store::ReminderStore;

/// Store handle shared between the engine and the polling loop.
pub type SharedStore = Arc<Mutex<ReminderStore>>;

/// Lock the shared store, recovering from a poisoned lock.
pub(crate) fn lock_store(store: &SharedStore) -> MutexGuard<'_, ReminderStore> {
    store.lock().unwrap_or_else(|e| e.into_inner())
}

/// Result of a hardware side effect.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum HardwareOutcome {
    /// No command was sent; `state` says why.
    Skipped { state: DispatchState },
    /// The endpoint acknowledged the command.
    Dispatched { ack: Ack },
    /// The command failed.
    Failed { kind: String, message: String },
}

impl HardwareOutcome {
    /// Build the outcome of a finished dispatch.
    pub fn from_result(result: std::result::Result<Ack, DispatchError>) -> Self {
        match result {
            Ok(ack) => Self::Dispatched { ack },
            Err(e) => Self::Failed {
                kind: e.kind().to_owned(),
                message: e.to_string(),
            },
        }
    }

    #[must_use]
    pub fn is_dispatched(&self) -> bool {
        matches!(self, Self::Dispatched { .. })
    }
}

/// What `add` did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddOutcome {
    /// The stored reminder, with its id and defaults filled in.
    pub reminder: Reminder,
    pub notification: ScheduleOutcome,
    pub hardware: HardwareOutcome,
}

/// What `mark_done` did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoneOutcome {
    pub reminder: Reminder,
    /// Present when a `stop` command was sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<HardwareOutcome>,
}

/// Cloneable engine handle.
#[derive(Clone)]
pub struct ReminderEngine {
    store: SharedStore,
    scheduler: Arc<NotificationScheduler>,
    trigger: SharedHardwareTrigger,
    grace_window_ms: i64,
}

impl ReminderEngine {
    /// Create an engine around `store`.
    pub fn new(
        store: ReminderStore,
        notifier: SharedNotificationService,
        trigger: SharedHardwareTrigger,
        config: &EngineConfig,
    ) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            scheduler: Arc::new(NotificationScheduler::new(
                notifier,
                config.notification.headline.clone(),
            )),
            trigger,
            grace_window_ms: config.polling.grace_window_ms,
        }
    }

    /// The shared store, for the polling loop.
    pub fn store(&self) -> SharedStore {
        Arc::clone(&self.store)
    }

    /// The hardware trigger used for dispatches.
    pub fn trigger(&self) -> SharedHardwareTrigger {
        Arc::clone(&self.trigger)
    }

    pub fn grace_window_ms(&self) -> i64 {
        self.grace_window_ms
    }

    /// Add a reminder and run its immediate side effects.
    ///
    /// # Errors
    ///
    /// Validation failures from the store. Side-effect failures are
    /// reported in the outcome instead.
    pub async fn add(&self, reminder: Reminder) -> Result<AddOutcome> {
        self.add_at(reminder, Utc::now()).await
    }

    /// [`add`](Self::add) evaluated at `now`.
    pub async fn add_at(&self, reminder: Reminder, now: DateTime<Utc>) -> Result<AddOutcome> {
        let reminder = lock_store(&self.store).insert(reminder)?;
        info!(reminder_id = %reminder.id, "reminder added");

        let notification = self.scheduler.schedule(&reminder, now).await;
        let hardware = self.dispatch_if_due(&reminder, now).await;

        Ok(AddOutcome {
            reminder,
            notification,
            hardware,
        })
    }

    /// Replace a reminder by id. Returns `None` for an unknown id.
    ///
    /// Clears the dedupe entry, so a new due time can trigger again.
    ///
    /// # Errors
    ///
    /// Validation failures from the store.
    pub fn edit(&self, reminder: Reminder) -> Result<Option<Reminder>> {
        let edited = lock_store(&self.store).replace(reminder)?;
        if let Some(r) = &edited {
            info!(reminder_id = %r.id, "reminder edited");
        }
        Ok(edited)
    }

    /// Delete a reminder. Returns `false` for an unknown id.
    pub fn delete(&self, id: &str) -> bool {
        let removed = lock_store(&self.store).remove(id);
        if removed {
            info!(reminder_id = %id, "reminder deleted");
        }
        removed
    }

    /// Mark a reminder done, sending `stop` when a `start` went out.
    ///
    /// The ledger is claimed before `start` is sent, so a reminder whose
    /// `start` failed still gets a `stop` here. A failed `stop` is logged
    /// and reported in the outcome. Returns `None` for an unknown id.
    pub async fn mark_done(&self, id: &str) -> Option<DoneOutcome> {
        let completion = lock_store(&self.store).mark_done(id)?;
        let reminder = completion.reminder;

        if !completion.stop_required {
            return Some(DoneOutcome {
                reminder,
                stop: None,
            });
        }

        let result = self.trigger.dispatch(&reminder, TriggerAction::Stop).await;
        if let Err(e) = &result {
            warn!(reminder_id = %reminder.id, error = %e, "stop command failed");
        } else {
            debug!(reminder_id = %reminder.id, "stop command acknowledged");
        }
        Some(DoneOutcome {
            reminder,
            stop: Some(HardwareOutcome::from_result(result)),
        })
    }

    /// Reminders due today in local time.
    pub fn today(&self) -> Vec<Reminder> {
        self.today_at(&Local::now())
    }

    /// Reminders due on the calendar day of `now`.
    pub fn today_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<Reminder> {
        lock_store(&self.store).today(now)
    }

    pub fn get(&self, id: &str) -> Option<Reminder> {
        lock_store(&self.store).get(id).cloned()
    }

    pub fn all(&self) -> Vec<Reminder> {
        lock_store(&self.store).all().to_vec()
    }

    pub fn len(&self) -> usize {
        lock_store(&self.store).len()
    }

    pub fn is_empty(&self) -> bool {
        lock_store(&self.store).is_empty()
    }

    /// `true` when an active reminder other than `exclude_id` holds `box_id`.
    pub fn box_in_use(&self, box_id: u32, exclude_id: Option<&str>) -> bool {
        lock_store(&self.store).box_in_use(box_id, exclude_id)
    }

    /// Hardware dispatch state of `id` at `now`.
    pub fn dispatch_state(&self, id: &str, now: DateTime<Utc>) -> Option<DispatchState> {
        lock_store(&self.store).dispatch_state(id, now, self.grace_window_ms)
    }

    async fn dispatch_if_due(&self, reminder: &Reminder, now: DateTime<Utc>) -> HardwareOutcome {
        {
            let mut store = lock_store(&self.store);
            let state = store
                .dispatch_state(&reminder.id, now, self.grace_window_ms)
                .unwrap_or(DispatchState::NotApplicable);
            if state != DispatchState::Eligible || !store.mark_processed(&reminder.id) {
                debug!(reminder_id = %reminder.id, ?state, "no immediate hardware dispatch");
                return HardwareOutcome::Skipped { state };
            }
        }

        HardwareOutcome::from_result(self.trigger.dispatch(reminder, TriggerAction::Start).await)
    }
}
