//! Hardware trigger dispatch.
//!
//! Sends `start`/`stop` commands to a pill box controller over HTTP:
//! `POST {base_url}/trigger/{box}` with a JSON body of
//! `{title, note, timestamp, action}`.
//!
//! # Failure Classification
//!
//! Transport failures map to [`DispatchError`], first match wins:
//!
//! - [`Timeout`](DispatchError::Timeout): no response within the bound
//! - [`NetworkUnreachable`](DispatchError::NetworkUnreachable): transport
//!   failed before any response (DNS, connection refused)
//! - [`EndpointError`](DispatchError::EndpointError): non-2xx response
//! - [`Unknown`](DispatchError::Unknown): anything else
//!
//! The dispatcher never retries.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::HardwareConfig;
use crate::reminder::Reminder;

/// Command sent to a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerAction {
    Start,
    Stop,
}

impl TriggerAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for TriggerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON body of a trigger request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPayload {
    pub title: String,
    pub note: String,
    /// ISO-8601 instant the command was issued.
    pub timestamp: String,
    pub action: TriggerAction,
}

/// Successful endpoint acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ack {
    /// Box the command went to.
    pub box_id: u32,
    /// Command that was acknowledged.
    pub action: TriggerAction,
    /// HTTP status code (2xx).
    pub status: u16,
    /// Response body: parsed JSON, raw text as a string, or null when empty.
    pub body: serde_json::Value,
}

/// Classified dispatch failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The timeout elapsed before a response arrived.
    #[error("hardware endpoint timed out")]
    Timeout,

    /// The transport failed before any response.
    #[error("hardware endpoint unreachable: {0}")]
    NetworkUnreachable(String),

    /// A response arrived with a non-success status.
    #[error("hardware endpoint returned HTTP {status}: {body}")]
    EndpointError {
        /// HTTP status code.
        status: u16,
        /// Response body, or the status reason when the body is empty.
        body: String,
    },

    /// Any other failure.
    #[error("hardware dispatch failed: {0}")]
    Unknown(String),

    /// The reminder has no box, or its notify type excludes hardware.
    /// Raised before any I/O.
    #[error("hardware dispatch not applicable: {0}")]
    NotApplicable(String),
}

impl DispatchError {
    /// Stable machine-readable name of the failure class.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::NetworkUnreachable(_) => "network_unreachable",
            Self::EndpointError { .. } => "endpoint_error",
            Self::Unknown(_) => "unknown",
            Self::NotApplicable(_) => "not_applicable",
        }
    }
}

/// Something that can fire a hardware trigger for a reminder.
#[async_trait]
pub trait HardwareTrigger: Send + Sync {
    /// Send `action` to the box of `reminder`.
    async fn dispatch(
        &self,
        reminder: &Reminder,
        action: TriggerAction,
    ) -> Result<Ack, DispatchError>;
}

/// Shared trigger handle.
pub type SharedHardwareTrigger = Arc<dyn HardwareTrigger>;

/// Check the dispatch preconditions and return the target box.
pub fn target_box(reminder: &Reminder) -> Result<u32, DispatchError> {
    if !reminder.notify_type().includes_hardware() {
        return Err(DispatchError::NotApplicable(format!(
            "notify type '{}' excludes hardware",
            reminder.notify_type()
        )));
    }
    reminder
        .box_id
        .ok_or_else(|| DispatchError::NotApplicable("reminder has no box".to_owned()))
}

/// HTTP dispatcher for box controllers.
pub struct HttpDispatcher {
    config: HardwareConfig,
    client: reqwest::Client,
}

impl HttpDispatcher {
    /// Create a dispatcher with the given endpoint configuration.
    pub fn new(config: HardwareConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_else(|e| {
                warn!("cannot build hardware client, falling back to defaults: {e}");
                reqwest::Client::default()
            });
        Self { config, client }
    }

    /// Returns a reference to the endpoint configuration.
    pub fn config(&self) -> &HardwareConfig {
        &self.config
    }

    /// Trigger URL for `box_id`.
    #[must_use]
    pub fn trigger_url(&self, box_id: u32) -> String {
        format!(
            "{}/trigger/{box_id}",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn send(&self, box_id: u32, payload: &TriggerPayload) -> Result<Ack, DispatchError> {
        let url = self.trigger_url(box_id);
        debug!(box_id, action = %payload.action, %url, "sending hardware trigger");

        let resp = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| classify_reqwest_error(&e))?;

        if !status.is_success() {
            let body = if text.trim().is_empty() {
                status.canonical_reason().unwrap_or("").to_owned()
            } else {
                text.chars().take(500).collect()
            };
            return Err(DispatchError::EndpointError {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Ack {
            box_id,
            action: payload.action,
            status: status.as_u16(),
            body: parse_ack_body(&text),
        })
    }
}

#[async_trait]
impl HardwareTrigger for HttpDispatcher {
    async fn dispatch(
        &self,
        reminder: &Reminder,
        action: TriggerAction,
    ) -> Result<Ack, DispatchError> {
        let box_id = target_box(reminder)?;
        let payload = TriggerPayload {
            title: reminder.title.clone(),
            note: reminder.note.clone(),
            timestamp: Utc::now().to_rfc3339(),
            action,
        };

        // The client timeout covers the whole exchange; the outer bound also
        // catches time spent before the request is handed to the client.
        let bound = Duration::from_millis(self.config.timeout_ms);
        let result = match tokio::time::timeout(bound, self.send(box_id, &payload)).await {
            Ok(result) => result,
            Err(_) => Err(DispatchError::Timeout),
        };

        if let Err(e) = &result {
            warn!(reminder_id = %reminder.id, box_id, %action, error = %e, "hardware trigger failed");
        }
        result
    }
}

fn classify_reqwest_error(err: &reqwest::Error) -> DispatchError {
    if err.is_timeout() {
        DispatchError::Timeout
    } else if err.is_connect() {
        DispatchError::NetworkUnreachable(err.to_string())
    } else {
        DispatchError::Unknown(err.to_string())
    }
}

fn parse_ack_body(text: &str) -> serde_json::Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| serde_json::Value::String(trimmed.to_owned()))
}
