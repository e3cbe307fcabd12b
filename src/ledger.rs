//! Hardware dispatch dedupe ledger.
//!
//! Records reminder ids whose current occurrence already produced a
//! `start` dispatch. Keyed by id only, so any change to a reminder must
//! [`clear`](DedupLedger::clear) its entry to reopen eligibility. The
//! ledger lives in memory for the lifetime of the engine; a restart
//! starts from an empty set.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

use crate::reminder::Reminder;

/// Interval after a due time during which a hardware dispatch is still timely.
pub const GRACE_WINDOW_MS: i64 = 300_000;

/// In-memory set of processed reminder ids.
#[derive(Debug, Default, Clone)]
pub struct DedupLedger {
    processed: HashSet<String>,
}

impl DedupLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` when `id` already produced a `start` dispatch.
    #[must_use]
    pub fn has_processed(&self, id: &str) -> bool {
        self.processed.contains(id)
    }

    /// Record `id` as processed. Returns `true` when newly inserted.
    pub fn mark_processed(&mut self, id: &str) -> bool {
        if self.processed.contains(id) {
            return false;
        }
        self.processed.insert(id.to_owned())
    }

    /// Forget `id`. Returns `true` when an entry was removed.
    pub fn clear(&mut self, id: &str) -> bool {
        self.processed.remove(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.processed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }
}

/// Hardware-dispatch lifecycle of one reminder occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    /// No hardware dispatch applies (undated, no box, app-only, or done
    /// without ever dispatching).
    NotApplicable,
    /// Due time not reached yet.
    Pending,
    /// Inside the grace window and not yet dispatched.
    Eligible,
    /// `start` already issued for this due time.
    Dispatched,
    /// Dispatched, then marked done.
    Stopped,
    /// Grace window closed without a dispatch.
    GraceExpired,
}

/// `true` when `elapsed_ms` lies inside `[0, grace_ms]`.
#[must_use]
pub fn within_grace_window(elapsed_ms: i64, grace_ms: i64) -> bool {
    (0..=grace_ms).contains(&elapsed_ms)
}

/// Derive the dispatch state of `reminder` at `now`.
#[must_use]
pub fn dispatch_state(
    reminder: &Reminder,
    ledger: &DedupLedger,
    now: DateTime<Utc>,
    grace_ms: i64,
) -> DispatchState {
    let processed = ledger.has_processed(&reminder.id);
    if reminder.done {
        return if processed {
            DispatchState::Stopped
        } else {
            DispatchState::NotApplicable
        };
    }
    if !reminder.wants_hardware() {
        return DispatchState::NotApplicable;
    }
    let Some(elapsed) = reminder.elapsed_ms(now) else {
        return DispatchState::NotApplicable;
    };
    if processed {
        return DispatchState::Dispatched;
    }
    if elapsed < 0 {
        DispatchState::Pending
    } else if elapsed <= grace_ms {
        DispatchState::Eligible
    } else {
        DispatchState::GraceExpired
    }
}
