//! Authoritative reminder collection.
//!
//! [`ReminderStore`] owns the reminders and the [`DedupLedger`], and writes
//! the full collection to the key/value store after every mutation. Writes
//! happen inline, so they land in program order. A failed write is logged
//! and the in-memory state stays authoritative until the next save.

use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

use crate::error::{ReminderError, Result};
use crate::ledger::{DedupLedger, DispatchState, dispatch_state};
use crate::persistence::{self, SharedKeyValueStore};
use crate::reminder::Reminder;

/// Result of marking a reminder done.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// The reminder after the change.
    pub reminder: Reminder,
    /// `true` when a `start` had been dispatched and a `stop` should follow.
    pub stop_required: bool,
    /// `false` when the reminder was already done.
    pub changed: bool,
}

/// Reminder collection plus its dedupe ledger.
pub struct ReminderStore {
    reminders: Vec<Reminder>,
    ledger: DedupLedger,
    retired_ids: HashSet<String>,
    backend: SharedKeyValueStore,
}

impl ReminderStore {
    /// Create an empty store writing to `backend`.
    pub fn new(backend: SharedKeyValueStore) -> Self {
        Self {
            reminders: Vec::new(),
            ledger: DedupLedger::new(),
            retired_ids: HashSet::new(),
            backend,
        }
    }

    /// Load the persisted collection. A read or parse failure starts empty.
    pub fn load(backend: SharedKeyValueStore) -> Self {
        let mut store = Self::new(backend);
        match persistence::load_reminders(store.backend.as_ref()) {
            Ok(reminders) => {
                info!("loaded {} reminders", reminders.len());
                store.reminders = reminders;
            }
            Err(e) => {
                warn!("cannot load reminders, starting empty: {e}");
            }
        }
        store
    }

    /// Insert a new reminder and persist.
    ///
    /// Assigns an id when none is set and defaults the notify type.
    ///
    /// # Errors
    ///
    /// [`ReminderError::Validation`] when fields are missing, the id is
    /// already taken, or another active reminder holds the same box.
    pub fn insert(&mut self, mut reminder: Reminder) -> Result<Reminder> {
        reminder.normalize();
        reminder.validate()?;

        if reminder.has_id() {
            if self.position(&reminder.id).is_some() || self.retired_ids.contains(&reminder.id) {
                return Err(ReminderError::Validation(format!(
                    "reminder id '{}' is already in use",
                    reminder.id
                )));
            }
        } else {
            reminder.id = uuid::Uuid::new_v4().to_string();
        }

        self.check_box(&reminder, None)?;

        debug!(reminder_id = %reminder.id, "reminder added");
        self.reminders.push(reminder.clone());
        self.persist();
        Ok(reminder)
    }

    /// Replace the reminder with the same id, clear its ledger entry, and
    /// persist. Returns `None` when the id is unknown.
    ///
    /// # Errors
    ///
    /// [`ReminderError::Validation`] when the id is missing, fields are
    /// missing, or the box conflicts with another active reminder.
    ///
    /// A box shared by two active reminders in a loaded collection blocks
    /// every edit that keeps that box, until one of them is done, moved to
    /// another box, or deleted.
    pub fn replace(&mut self, mut reminder: Reminder) -> Result<Option<Reminder>> {
        if !reminder.has_id() {
            return Err(ReminderError::Validation(
                "edit requires a reminder id".to_owned(),
            ));
        }
        let Some(index) = self.position(&reminder.id) else {
            debug!(reminder_id = %reminder.id, "edit of unknown reminder ignored");
            return Ok(None);
        };

        reminder.normalize();
        reminder.validate()?;
        self.check_box(&reminder, Some(&reminder.id))?;

        self.ledger.clear(&reminder.id);
        self.reminders[index] = reminder.clone();
        debug!(reminder_id = %reminder.id, "reminder edited");
        self.persist();
        Ok(Some(reminder))
    }

    /// Remove a reminder and its ledger entry. Returns `false` for an unknown id.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(index) = self.position(id) else {
            debug!(reminder_id = %id, "delete of unknown reminder ignored");
            return false;
        };
        self.reminders.remove(index);
        self.ledger.clear(id);
        self.retired_ids.insert(id.to_owned());
        debug!(reminder_id = %id, "reminder deleted");
        self.persist();
        true
    }

    /// Mark a reminder done. Returns `None` for an unknown id.
    pub fn mark_done(&mut self, id: &str) -> Option<Completion> {
        let index = self.position(id)?;
        let processed = self.ledger.has_processed(id);
        let reminder = &mut self.reminders[index];

        if reminder.done {
            return Some(Completion {
                reminder: reminder.clone(),
                stop_required: false,
                changed: false,
            });
        }

        reminder.done = true;
        let completion = Completion {
            stop_required: processed && reminder.wants_hardware(),
            reminder: reminder.clone(),
            changed: true,
        };
        debug!(reminder_id = %id, stop_required = completion.stop_required, "reminder done");
        self.persist();
        Some(completion)
    }

    /// Reminders due on the calendar day of `now`, in insertion order,
    /// done or not.
    pub fn today<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<Reminder> {
        self.reminders
            .iter()
            .filter(|r| r.is_on_day_of(now))
            .cloned()
            .collect()
    }

    /// Look up a reminder by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Reminder> {
        self.reminders.iter().find(|r| r.id == id)
    }

    /// All reminders in insertion order.
    #[must_use]
    pub fn all(&self) -> &[Reminder] {
        &self.reminders
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.reminders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reminders.is_empty()
    }

    /// `true` when an active reminder other than `exclude_id` holds `box_id`.
    #[must_use]
    pub fn box_in_use(&self, box_id: u32, exclude_id: Option<&str>) -> bool {
        self.reminders.iter().any(|r| {
            r.is_active() && r.box_id == Some(box_id) && Some(r.id.as_str()) != exclude_id
        })
    }

    /// The dedupe ledger.
    #[must_use]
    pub fn ledger(&self) -> &DedupLedger {
        &self.ledger
    }

    /// Record `id` as dispatched. Returns `true` when newly recorded.
    pub fn mark_processed(&mut self, id: &str) -> bool {
        self.ledger.mark_processed(id)
    }

    /// Hardware dispatch state of `id` at `now`.
    #[must_use]
    pub fn dispatch_state(
        &self,
        id: &str,
        now: DateTime<Utc>,
        grace_ms: i64,
    ) -> Option<DispatchState> {
        self.get(id)
            .map(|r| dispatch_state(r, &self.ledger, now, grace_ms))
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.reminders.iter().position(|r| r.id == id)
    }

    fn check_box(&self, reminder: &Reminder, exclude_id: Option<&str>) -> Result<()> {
        let Some(box_id) = reminder.box_id else {
            return Ok(());
        };
        if reminder.is_active() && self.box_in_use(box_id, exclude_id) {
            return Err(ReminderError::Validation(format!(
                "box {box_id} is already used by another active reminder"
            )));
        }
        Ok(())
    }

    fn persist(&self) {
        if let Err(e) = persistence::save_reminders(self.backend.as_ref(), &self.reminders) {
            error!("cannot persist reminders: {e}");
        }
    }
}
