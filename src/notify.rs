//! Local alert scheduling.
//!
//! [`NotificationScheduler`] decides whether a reminder gets a one-shot
//! alert and asks a [`NotificationService`] to fire it at the due time.
//! Calls are not deduplicated: scheduling the same reminder twice asks the
//! service twice.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{ReminderError, Result};
use crate::reminder::Reminder;

/// OS-level facility that fires a one-shot alert at a point in time.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Schedule an alert. Returns the service's id for it.
    async fn schedule_one_shot(
        &self,
        fire_at: DateTime<Utc>,
        title: &str,
        body: &str,
    ) -> Result<String>;
}

/// Shared notification service handle.
pub type SharedNotificationService = Arc<dyn NotificationService>;

/// Why a reminder got no alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No due time.
    Undated,
    /// Due time is now or in the past.
    NotInFuture,
    /// Notify type excludes local alerts.
    AppExcluded,
    /// Reminder already done.
    Done,
}

/// Result of one scheduling decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ScheduleOutcome {
    /// The service accepted the alert.
    Scheduled {
        notification_id: String,
        fire_at: DateTime<Utc>,
    },
    /// No alert applies.
    Skipped { reason: SkipReason },
    /// The service rejected the request.
    Failed { message: String },
}

impl ScheduleOutcome {
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        matches!(self, Self::Scheduled { .. })
    }
}

/// Decides and requests local alerts for reminders.
pub struct NotificationScheduler {
    service: SharedNotificationService,
    headline: String,
}

impl NotificationScheduler {
    /// Create a scheduler. `headline` becomes the alert title.
    pub fn new(service: SharedNotificationService, headline: impl Into<String>) -> Self {
        Self {
            service,
            headline: headline.into(),
        }
    }

    /// Schedule an alert for `reminder` if its due time is after `now`.
    pub async fn schedule(&self, reminder: &Reminder, now: DateTime<Utc>) -> ScheduleOutcome {
        let fire_at = match plan(reminder, now) {
            Ok(fire_at) => fire_at,
            Err(reason) => {
                debug!(reminder_id = %reminder.id, ?reason, "no alert scheduled");
                return ScheduleOutcome::Skipped { reason };
            }
        };

        match self
            .service
            .schedule_one_shot(fire_at, &self.headline, &reminder.title)
            .await
        {
            Ok(notification_id) => {
                debug!(reminder_id = %reminder.id, %notification_id, %fire_at, "alert scheduled");
                ScheduleOutcome::Scheduled {
                    notification_id,
                    fire_at,
                }
            }
            Err(e) => {
                warn!(reminder_id = %reminder.id, error = %e, "alert scheduling failed");
                ScheduleOutcome::Failed {
                    message: e.to_string(),
                }
            }
        }
    }
}

fn plan(reminder: &Reminder, now: DateTime<Utc>) -> std::result::Result<DateTime<Utc>, SkipReason> {
    if reminder.done {
        return Err(SkipReason::Done);
    }
    if !reminder.notify_type().includes_app() {
        return Err(SkipReason::AppExcluded);
    }
    let date = reminder.date.ok_or(SkipReason::Undated)?;
    if date <= now {
        return Err(SkipReason::NotInFuture);
    }
    Ok(date)
}

/// An alert that reached its fire time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FiredAlert {
    pub notification_id: String,
    pub fire_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
}

/// In-process one-shot alerts backed by tokio timers.
///
/// Each alert is a spawned task that sleeps until its fire time and then
/// sends a [`FiredAlert`] on the channel. Alerts do not survive a restart.
pub struct TimerNotificationService {
    fired_tx: mpsc::UnboundedSender<FiredAlert>,
}

impl TimerNotificationService {
    /// Create a service delivering fired alerts on `fired_tx`.
    pub fn new(fired_tx: mpsc::UnboundedSender<FiredAlert>) -> Self {
        Self { fired_tx }
    }
}

#[async_trait]
impl NotificationService for TimerNotificationService {
    async fn schedule_one_shot(
        &self,
        fire_at: DateTime<Utc>,
        title: &str,
        body: &str,
    ) -> Result<String> {
        if self.fired_tx.is_closed() {
            return Err(ReminderError::Notification(
                "alert channel closed".to_owned(),
            ));
        }

        let notification_id = uuid::Uuid::new_v4().to_string();
        let alert = FiredAlert {
            notification_id: notification_id.clone(),
            fire_at,
            title: title.to_owned(),
            body: body.to_owned(),
        };
        let delay = (fire_at - Utc::now()).to_std().unwrap_or_default();
        let tx = self.fired_tx.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(alert).is_err() {
                debug!("alert channel closed before fire time");
            }
        });

        Ok(notification_id)
    }
}
