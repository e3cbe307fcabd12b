//! Command channel between the host bridge and the reminder engine.
//!
//! [`HostCommandClient`] sends validated envelopes to a single
//! [`HostCommandServer`], which applies them to the engine one at a time.
//! Engine activity (mutations, dispatch reports, fired alerts) is published
//! as [`EventEnvelope`]s on a broadcast channel.

use chrono::Utc;
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::engine::ReminderEngine;
use crate::error::{ReminderError, Result};
use crate::host::contract::{CommandEnvelope, CommandName, EventEnvelope, ResponseEnvelope};
use crate::notify::FiredAlert;
use crate::poller::DispatchReport;
use crate::reminder::{Reminder, time_remaining};

/// Event emitted for each polling-loop dispatch result.
pub const EVENT_DISPATCH_REPORT: &str = "dispatch.report";
/// Event emitted when a local alert reaches its fire time.
pub const EVENT_ALERT_FIRED: &str = "alert.fired";

struct HostCommandRequest {
    envelope: CommandEnvelope,
    response_tx: oneshot::Sender<ResponseEnvelope>,
}

#[derive(Clone)]
pub struct HostCommandClient {
    request_tx: mpsc::Sender<HostCommandRequest>,
    event_tx: broadcast::Sender<EventEnvelope>,
}

impl HostCommandClient {
    /// Send a command and wait for its response.
    ///
    /// # Errors
    ///
    /// Invalid envelopes are rejected before reaching the server; a closed
    /// server yields [`ReminderError::Channel`].
    pub async fn send(&self, envelope: CommandEnvelope) -> Result<ResponseEnvelope> {
        envelope.validate().map_err(|e| {
            ReminderError::Validation(format!(
                "invalid host command envelope {}: {}",
                envelope.request_id, e
            ))
        })?;

        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx
            .send(HostCommandRequest {
                envelope,
                response_tx,
            })
            .await
            .map_err(|e| {
                ReminderError::Channel(format!("failed to send host command request: {e}"))
            })?;

        response_rx
            .await
            .map_err(|e| ReminderError::Channel(format!("host command response dropped: {e}")))
    }

    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<EventEnvelope> {
        self.event_tx.subscribe()
    }

    /// Sender for publishing events from outside the server.
    #[must_use]
    pub fn event_sender(&self) -> broadcast::Sender<EventEnvelope> {
        self.event_tx.clone()
    }
}

pub struct HostCommandServer {
    request_rx: mpsc::Receiver<HostCommandRequest>,
    event_tx: broadcast::Sender<EventEnvelope>,
    engine: ReminderEngine,
}

/// Create a connected client/server pair.
#[must_use]
pub fn command_channel(
    request_capacity: usize,
    event_capacity: usize,
    engine: ReminderEngine,
) -> (HostCommandClient, HostCommandServer) {
    let (event_tx, _event_rx) = broadcast::channel(event_capacity.max(1));
    let (request_tx, request_rx) = mpsc::channel(request_capacity.max(1));

    (
        HostCommandClient {
            request_tx,
            event_tx: event_tx.clone(),
        },
        HostCommandServer {
            request_rx,
            event_tx,
            engine,
        },
    )
}

impl HostCommandServer {
    /// Serve requests until every client is dropped.
    pub async fn run(mut self) {
        while let Some(request) = self.request_rx.recv().await {
            let request_id = request.envelope.request_id.clone();
            let response = self
                .route(&request.envelope)
                .await
                .unwrap_or_else(|e| ResponseEnvelope::error(request_id, e.to_string()));
            let _ = request.response_tx.send(response);
        }
    }

    /// Route a command envelope to the engine.
    pub async fn route(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        match envelope.command {
            CommandName::HostPing => Ok(ResponseEnvelope::ok(
                envelope.request_id.clone(),
                serde_json::json!({"pong": true}),
            )),
            CommandName::HostVersion => Ok(ResponseEnvelope::ok(
                envelope.request_id.clone(),
                serde_json::json!({
                    "contract_version": crate::host::contract::EVENT_VERSION,
                    "version": env!("CARGO_PKG_VERSION"),
                }),
            )),
            CommandName::ReminderList => self.handle_list(envelope),
            CommandName::ReminderToday => self.handle_today(envelope),
            CommandName::ReminderGet => self.handle_get(envelope),
            CommandName::ReminderAdd => self.handle_add(envelope).await,
            CommandName::ReminderEdit => self.handle_edit(envelope),
            CommandName::ReminderDelete => self.handle_delete(envelope),
            CommandName::ReminderDone => self.handle_done(envelope).await,
            CommandName::ReminderState => self.handle_state(envelope),
            CommandName::RuntimeStop => {
                self.emit_event(
                    "runtime.stopping",
                    serde_json::json!({"request_id": envelope.request_id}),
                );
                Ok(ResponseEnvelope::ok(
                    envelope.request_id.clone(),
                    serde_json::json!({"accepted": true}),
                ))
            }
        }
    }

    fn handle_list(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let reminders = self.engine.all();
        Ok(ResponseEnvelope::ok(
            envelope.request_id.clone(),
            serde_json::json!({"reminders": to_json(&reminders)?}),
        ))
    }

    fn handle_today(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let now = Utc::now();
        let reminders = self.engine.today();
        let items = reminders
            .iter()
            .map(|r| {
                let remaining = r.date.map(|date| time_remaining(date, now));
                Ok(serde_json::json!({
                    "reminder": to_json(r)?,
                    "time_remaining": remaining.map(|t| t.to_string()),
                    "urgent": remaining.is_some_and(|t| t.is_urgent()),
                }))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ResponseEnvelope::ok(
            envelope.request_id.clone(),
            serde_json::json!({"reminders": items}),
        ))
    }

    fn handle_get(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let id = parse_reminder_id(&envelope.payload)?;
        let reminder = self
            .engine
            .get(&id)
            .ok_or_else(|| ReminderError::Validation(format!("unknown reminder '{id}'")))?;
        Ok(ResponseEnvelope::ok(
            envelope.request_id.clone(),
            serde_json::json!({"reminder": to_json(&reminder)?}),
        ))
    }

    async fn handle_add(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let reminder = parse_reminder(&envelope.payload)?;
        let outcome = self.engine.add(reminder).await?;
        let payload = to_json(&outcome)?;
        self.emit_event(
            "reminder.added",
            serde_json::json!({"request_id": envelope.request_id, "id": outcome.reminder.id}),
        );
        Ok(ResponseEnvelope::ok(envelope.request_id.clone(), payload))
    }

    fn handle_edit(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let reminder = parse_reminder(&envelope.payload)?;
        let id = reminder.id.clone();
        let edited = self.engine.edit(reminder)?;
        if edited.is_some() {
            self.emit_event(
                "reminder.edited",
                serde_json::json!({"request_id": envelope.request_id, "id": id}),
            );
        }
        Ok(ResponseEnvelope::ok(
            envelope.request_id.clone(),
            serde_json::json!({"updated": edited.is_some(), "reminder": to_json(&edited)?}),
        ))
    }

    fn handle_delete(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let id = parse_reminder_id(&envelope.payload)?;
        let removed = self.engine.delete(&id);
        if removed {
            self.emit_event(
                "reminder.deleted",
                serde_json::json!({"request_id": envelope.request_id, "id": id}),
            );
        }
        Ok(ResponseEnvelope::ok(
            envelope.request_id.clone(),
            serde_json::json!({"removed": removed, "id": id}),
        ))
    }

    async fn handle_done(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let id = parse_reminder_id(&envelope.payload)?;
        let Some(outcome) = self.engine.mark_done(&id).await else {
            return Ok(ResponseEnvelope::ok(
                envelope.request_id.clone(),
                serde_json::json!({"updated": false, "id": id}),
            ));
        };
        self.emit_event(
            "reminder.done",
            serde_json::json!({"request_id": envelope.request_id, "id": id}),
        );
        let mut payload = to_json(&outcome)?;
        if let Some(fields) = payload.as_object_mut() {
            fields.insert("updated".to_owned(), serde_json::Value::Bool(true));
        }
        Ok(ResponseEnvelope::ok(envelope.request_id.clone(), payload))
    }

    fn handle_state(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let id = parse_reminder_id(&envelope.payload)?;
        let state = self
            .engine
            .dispatch_state(&id, Utc::now())
            .ok_or_else(|| ReminderError::Validation(format!("unknown reminder '{id}'")))?;
        Ok(ResponseEnvelope::ok(
            envelope.request_id.clone(),
            serde_json::json!({"id": id, "state": state}),
        ))
    }

    fn emit_event(&self, event: &str, payload: serde_json::Value) {
        let _ = self.event_tx.send(EventEnvelope::new(event, payload));
    }
}

/// Publish dispatch reports and fired alerts as events until both
/// sources close.
pub fn spawn_event_forwarder(
    event_tx: broadcast::Sender<EventEnvelope>,
    mut reports: mpsc::UnboundedReceiver<DispatchReport>,
    mut alerts: mpsc::UnboundedReceiver<FiredAlert>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reports_open = true;
        let mut alerts_open = true;
        while reports_open || alerts_open {
            let event = tokio::select! {
                report = reports.recv(), if reports_open => match report {
                    Some(report) => serde_json::to_value(&report)
                        .map(|p| EventEnvelope::new(EVENT_DISPATCH_REPORT, p)),
                    None => {
                        reports_open = false;
                        continue;
                    }
                },
                alert = alerts.recv(), if alerts_open => match alert {
                    Some(alert) => serde_json::to_value(&alert)
                        .map(|p| EventEnvelope::new(EVENT_ALERT_FIRED, p)),
                    None => {
                        alerts_open = false;
                        continue;
                    }
                },
            };
            match event {
                Ok(envelope) => {
                    if event_tx.send(envelope).is_err() {
                        debug!("no event subscribers");
                    }
                }
                Err(e) => tracing::error!(error = %e, "failed to serialize event; skipping"),
            }
        }
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| ReminderError::Channel(format!("failed to serialize payload: {e}")))
}

fn parse_reminder(payload: &serde_json::Value) -> Result<Reminder> {
    Reminder::deserialize(payload)
        .map_err(|e| ReminderError::Validation(format!("invalid reminder payload: {e}")))
}

fn parse_reminder_id(payload: &serde_json::Value) -> Result<String> {
    let Some(id) = payload.get("id").and_then(serde_json::Value::as_str) else {
        return Err(ReminderError::Validation(
            "reminder command requires payload.id".to_owned(),
        ));
    };
    let id = id.trim();
    if id.is_empty() {
        return Err(ReminderError::Validation(
            "reminder command requires a non-empty payload.id".to_owned(),
        ));
    }
    Ok(id.to_owned())
}
