//! # Error Types
//!
//! Errors are never raised across the public hub boundary. Each mutating call
//! takes an optional [`ErrorCallback`]; failures are delivered through it, or
//! logged when no callback was given.

use crate::identifiers::{EventSource, EventType};
use thiserror::Error;
use tracing::warn;

/// Receives the error of a failed hub call.
pub type ErrorCallback = Box<dyn FnOnce(ExtensionError) + Send + 'static>;

/// Categorized failures reported to modules.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtensionError {
    /// An internal failure with no better category.
    #[error("Unexpected error: {reason}")]
    Unexpected { reason: String },

    /// A required name was empty.
    #[error("Invalid {what}: name must not be empty")]
    BadName { what: &'static str },

    /// Another module already uses this name.
    #[error("A module named {name} is already registered")]
    DuplicateName { name: String },

    #[error("Event type is empty or reserved")]
    EventTypeNotSupported,

    #[error("Event source is empty or reserved")]
    EventSourceNotSupported,

    /// A listener factory returned an error or panicked.
    #[error("Listener for module {module} could not be constructed: {reason}")]
    ListenerConstructionFailed { module: String, reason: String },

    /// A module factory returned an error or panicked.
    #[error("Module could not be constructed: {reason}")]
    ModuleConstructionFailed { reason: String },

    #[error("Module {name} is not registered")]
    ModuleNotRegistered { name: String },

    #[error("No listener registered for {event_type}/{event_source}")]
    ListenerNotRegistered {
        event_type: EventType,
        event_source: EventSource,
    },

    /// Shared state cannot be created at this version.
    #[error("Shared state version {version} is not newer than the latest stored version")]
    InvalidVersion { version: u64 },

    /// Shared state at this version was already resolved.
    #[error("Shared state version {version} is not pending")]
    StateNotPending { version: u64 },

    /// The hub stopped and accepts no more work.
    #[error("Event hub has shut down")]
    HubShutdown,
}

impl ExtensionError {
    /// Stable numeric code for this error category.
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            Self::Unexpected { .. } => 0,
            Self::BadName { .. } => 1,
            Self::DuplicateName { .. } => 2,
            Self::EventTypeNotSupported => 3,
            Self::EventSourceNotSupported => 4,
            Self::ListenerConstructionFailed { .. } => 5,
            Self::ModuleConstructionFailed { .. } => 6,
            Self::ModuleNotRegistered { .. } => 7,
            Self::ListenerNotRegistered { .. } => 8,
            Self::InvalidVersion { .. } => 9,
            Self::StateNotPending { .. } => 10,
            Self::HubShutdown => 11,
        }
    }
}

/// Deliver `error` to `callback`, or log it when there is none.
pub fn report(callback: Option<ErrorCallback>, error: ExtensionError) {
    match callback {
        Some(callback) => callback(error),
        None => warn!(code = error.code(), error = %error, "Hub call failed"),
    }
}
