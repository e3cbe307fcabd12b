//! Shared test fakes for the notification service, hardware trigger and
//! persistence store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{ReminderError, Result};
use crate::hardware::{Ack, DispatchError, HardwareTrigger, TriggerAction, target_box};
use crate::persistence::KeyValueStore;
use crate::reminder::Reminder;

/// One recorded `schedule_one_shot` call.
#[derive(Debug, Clone, PartialEq)]
pub struct NotifyCall {
    pub fire_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
}

/// Notification service that records calls.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<NotifyCall>>,
    fail: bool,
}

impl RecordingNotifier {
    /// A notifier whose every call fails.
    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<NotifyCall> {
        self.calls.lock().expect("notifier lock").clone()
    }
}

#[async_trait]
impl crate::notify::NotificationService for RecordingNotifier {
    async fn schedule_one_shot(
        &self,
        fire_at: DateTime<Utc>,
        title: &str,
        body: &str,
    ) -> Result<String> {
        let mut calls = self.calls.lock().expect("notifier lock");
        calls.push(NotifyCall {
            fire_at,
            title: title.to_owned(),
            body: body.to_owned(),
        });
        if self.fail {
            return Err(ReminderError::Notification("service offline".to_owned()));
        }
        Ok(format!("n-{}", calls.len()))
    }
}

/// One recorded dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerCall {
    pub reminder_id: String,
    pub box_id: Option<u32>,
    pub action: TriggerAction,
}

/// Hardware trigger that records calls and answers with a fixed result.
#[derive(Debug, Default)]
pub struct RecordingTrigger {
    calls: Mutex<Vec<TriggerCall>>,
    failure: Option<DispatchError>,
    delay: Option<Duration>,
    slow_box: Option<u32>,
}

impl RecordingTrigger {
    /// A trigger whose every dispatch fails with `error`.
    pub fn failing(error: DispatchError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    /// A trigger that stalls for `delay` on `box_id` and then times out.
    pub fn stalling_on(box_id: u32, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            slow_box: Some(box_id),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<TriggerCall> {
        self.calls.lock().expect("trigger lock").clone()
    }

    pub fn count(&self, action: TriggerAction) -> usize {
        self.calls().iter().filter(|c| c.action == action).count()
    }
}

#[async_trait]
impl HardwareTrigger for RecordingTrigger {
    async fn dispatch(
        &self,
        reminder: &Reminder,
        action: TriggerAction,
    ) -> std::result::Result<Ack, DispatchError> {
        self.calls.lock().expect("trigger lock").push(TriggerCall {
            reminder_id: reminder.id.clone(),
            box_id: reminder.box_id,
            action,
        });

        let box_id = target_box(reminder)?;
        if self.slow_box == Some(box_id) {
            tokio::time::sleep(self.delay.unwrap_or_default()).await;
            return Err(DispatchError::Timeout);
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(Ack {
            box_id,
            action,
            status: 200,
            body: serde_json::json!({"ok": true}),
        })
    }
}

/// Key/value store whose writes fail. Reads return `initial`.
#[derive(Debug, Default)]
pub struct BrokenStore {
    pub initial: Option<String>,
    pub fail_reads: bool,
}

impl KeyValueStore for BrokenStore {
    fn get(&self, _key: &str) -> Result<Option<String>> {
        if self.fail_reads {
            return Err(ReminderError::Persistence("disk unreadable".to_owned()));
        }
        Ok(self.initial.clone())
    }

    fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(ReminderError::Persistence("disk full".to_owned()))
    }
}
