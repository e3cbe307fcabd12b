//! Reminder data model.
//!
//! A [`Reminder`] is the unit the engine schedules: an optional due time,
//! an optional hardware box, and a [`NotifyType`] saying which side effects
//! (local alert, hardware trigger) apply. Field names serialize in the
//! camelCase shape the persisted `"reminders"` blob has always used.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ReminderError, Result};

/// Which side effects a reminder produces when it comes due.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyType {
    /// Local on-device alert only.
    App,
    /// Hardware trigger only.
    Hardware,
    /// Local alert and hardware trigger.
    #[default]
    Both,
}

impl NotifyType {
    /// Returns `true` when a local alert should be scheduled.
    #[must_use]
    pub fn includes_app(self) -> bool {
        matches!(self, Self::App | Self::Both)
    }

    /// Returns `true` when a hardware trigger should be dispatched.
    #[must_use]
    pub fn includes_hardware(self) -> bool {
        matches!(self, Self::Hardware | Self::Both)
    }

    /// Wire name of the notify type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Hardware => "hardware",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for NotifyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recurrence cadence. Stored for forward compatibility; the engine never
/// expands it into extra occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Repeat {
    Daily,
    Weekly,
    Monthly,
}

/// A single reminder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    /// Opaque unique id. Empty means "not yet assigned".
    #[serde(default)]
    pub id: String,
    /// Display category.
    #[serde(default)]
    pub category: String,
    /// Display title, also the alert body.
    pub title: String,
    /// Free-form note sent along with hardware triggers.
    #[serde(default)]
    pub note: String,
    /// Due time. `None` means undated: never scheduled or dispatched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    /// Set only by explicit completion.
    #[serde(default)]
    pub done: bool,
    /// Hardware box id. `None` means no hardware dispatch applies.
    #[serde(rename = "box", default)]
    pub box_id: Option<u32>,
    /// Side effects to produce. Defaults to [`NotifyType::Both`] when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_type: Option<NotifyType>,
    /// Reserved recurrence cadence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<Repeat>,
    /// Reserved recurrence end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_end_date: Option<DateTime<Utc>>,
}

impl Reminder {
    /// Create an undated, not-done reminder with no id assigned.
    pub fn new(title: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            category: category.into(),
            title: title.into(),
            note: String::new(),
            date: None,
            done: false,
            box_id: None,
            notify_type: None,
            repeat: None,
            repeat_end_date: None,
        }
    }

    /// Set an explicit id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    /// Set the due time.
    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    /// Set the hardware box.
    pub fn with_box(mut self, box_id: u32) -> Self {
        self.box_id = Some(box_id);
        self
    }

    /// Set the notify type.
    pub fn with_notify_type(mut self, notify_type: NotifyType) -> Self {
        self.notify_type = Some(notify_type);
        self
    }

    /// Set the reserved recurrence fields.
    pub fn with_repeat(mut self, repeat: Repeat, until: Option<DateTime<Utc>>) -> Self {
        self.repeat = Some(repeat);
        self.repeat_end_date = until;
        self
    }

    /// Effective notify type, falling back to [`NotifyType::Both`].
    #[must_use]
    pub fn notify_type(&self) -> NotifyType {
        self.notify_type.unwrap_or_default()
    }

    /// `true` until the reminder is marked done.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.done
    }

    /// `true` when an id has been assigned.
    #[must_use]
    pub fn has_id(&self) -> bool {
        !self.id.trim().is_empty()
    }

    /// `true` when a hardware trigger applies to this reminder at all.
    #[must_use]
    pub fn wants_hardware(&self) -> bool {
        self.box_id.is_some() && self.notify_type().includes_hardware()
    }

    /// Milliseconds elapsed since the due time. Negative before it.
    #[must_use]
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> Option<i64> {
        self.date.map(|date| (now - date).num_milliseconds())
    }

    /// `true` when the due time falls on the same calendar day as `now`,
    /// evaluated in `now`'s time zone.
    pub fn is_on_day_of<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        self.date.is_some_and(|date| {
            date.with_timezone(&now.timezone()).date_naive() == now.date_naive()
        })
    }

    /// Trim display text and fill in the default notify type.
    pub fn normalize(&mut self) {
        let title = self.title.trim();
        if title.len() != self.title.len() {
            self.title = title.to_owned();
        }
        let note = self.note.trim();
        if note.len() != self.note.len() {
            self.note = note.to_owned();
        }
        if self.notify_type.is_none() {
            self.notify_type = Some(NotifyType::default());
        }
    }

    /// Check the fields a user must fill in.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(ReminderError::Validation(
                "reminder title must not be empty".to_owned(),
            ));
        }
        if self.category.trim().is_empty() {
            return Err(ReminderError::Validation(
                "reminder category must not be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Coarse countdown until a reminder is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRemaining {
    /// Due time reached or passed.
    Due,
    /// At least one whole day left.
    Days(i64),
    /// At least one whole hour left.
    Hours { hours: i64, minutes: i64 },
    /// At least one whole minute left.
    Minutes(i64),
    /// Under a minute left.
    Seconds(i64),
}

impl TimeRemaining {
    /// Due now or within the hour.
    #[must_use]
    pub fn is_urgent(self) -> bool {
        matches!(self, Self::Due | Self::Minutes(_) | Self::Seconds(_))
    }
}

impl fmt::Display for TimeRemaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Due => write!(f, "due now"),
            Self::Days(days) => write!(f, "{days} day(s) left"),
            Self::Hours { hours, minutes } => write!(f, "{hours}h {minutes:02}m left"),
            Self::Minutes(minutes) => write!(f, "{minutes} minute(s) left"),
            Self::Seconds(secs) => write!(f, "{secs} second(s) left"),
        }
    }
}

/// Countdown from `now` until `date`.
#[must_use]
pub fn time_remaining(date: DateTime<Utc>, now: DateTime<Utc>) -> TimeRemaining {
    let diff_ms = (date - now).num_milliseconds();
    if diff_ms <= 0 {
        return TimeRemaining::Due;
    }

    let secs = diff_ms / 1000;
    let minutes = secs / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days >= 1 {
        TimeRemaining::Days(days)
    } else if hours >= 1 {
        TimeRemaining::Hours {
            hours,
            minutes: minutes % 60,
        }
    } else if minutes >= 1 {
        TimeRemaining::Minutes(minutes)
    } else {
        TimeRemaining::Seconds(secs)
    }
}
