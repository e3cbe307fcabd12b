//! Pillminder: reminder scheduling and hardware dispatch engine.
//!
//! Reminders produce two kinds of side effect when they come due:
//!
//! - **Local alert**: a one-shot notification scheduled for the due time
//! - **Hardware trigger**: a `start` command sent to the reminder's pill
//!   box over HTTP, at most once per due time
//!
//! # Architecture
//!
//! - [`store::ReminderStore`] owns the reminders and the dedupe ledger and
//!   persists after every mutation
//! - [`engine::ReminderEngine`] applies mutations and runs their immediate
//!   side effects
//! - [`poller::PollingLoop`] re-scans the store on a fixed cadence and
//!   dispatches reminders that come due while the process runs
//! - [`host`] exposes the engine over a newline-delimited JSON bridge

pub mod config;
pub mod engine;
pub mod error;
pub mod hardware;
pub mod host;
pub mod ledger;
pub mod notify;
pub mod paths;
pub mod persistence;
pub mod poller;
pub mod reminder;
pub mod store;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::EngineConfig;
pub use engine::{AddOutcome, DoneOutcome, HardwareOutcome, ReminderEngine};
pub use error::{ReminderError, Result};
pub use hardware::{Ack, DispatchError, HardwareTrigger, HttpDispatcher, TriggerAction};
pub use ledger::{DedupLedger, DispatchState, GRACE_WINDOW_MS};
pub use notify::{NotificationScheduler, NotificationService, ScheduleOutcome};
pub use poller::{DispatchReport, PollingLoop};
pub use reminder::{NotifyType, Reminder, Repeat, TimeRemaining, time_remaining};
pub use store::ReminderStore;
