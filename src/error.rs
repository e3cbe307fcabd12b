//! Error types for the reminder engine.

use crate::hardware::DispatchError;

/// Top-level error type for reminder storage, scheduling and dispatch.
#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    /// Reading or writing the persistence store failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A reminder passed to a store mutation is malformed.
    #[error("validation error: {0}")]
    Validation(String),

    /// The notification service rejected a schedule request.
    #[error("notification error: {0}")]
    Notification(String),

    /// Hardware trigger dispatch failed.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ReminderError>;
