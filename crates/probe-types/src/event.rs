//! # Events
//!
//! An [`Event`] is an immutable unit of work. The hub assigns its sequence
//! number and timestamp when it is enqueued; after that nothing about it
//! changes, and every listener sees the same payload.

use crate::identifiers::{EventSource, EventType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Event payload.
pub type EventData = serde_json::Map<String, serde_json::Value>;

/// An immutable, numbered event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    name: String,
    event_type: EventType,
    source: EventSource,
    unique_id: Uuid,
    /// Hub-assigned sequence number; 0 until enqueued.
    number: u64,
    pair_id: Option<String>,
    response_pair_id: Option<String>,
    /// Milliseconds since the Unix epoch; 0 until stamped.
    timestamp_ms: u64,
    data: Arc<EventData>,
}

impl Event {
    /// Start building an event.
    pub fn builder(
        name: impl Into<String>,
        event_type: EventType,
        source: EventSource,
    ) -> EventBuilder {
        EventBuilder {
            name: name.into(),
            event_type,
            source,
            pair_id: None,
            response_pair_id: None,
            timestamp_ms: 0,
            data: EventData::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    #[must_use]
    pub fn source(&self) -> &EventSource {
        &self.source
    }

    #[must_use]
    pub fn unique_id(&self) -> Uuid {
        self.unique_id
    }

    /// Hub sequence number (0 if the event was never published).
    #[must_use]
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Correlation id carried by a request.
    #[must_use]
    pub fn pair_id(&self) -> Option<&str> {
        self.pair_id.as_deref()
    }

    /// Correlation id of the request this event answers.
    #[must_use]
    pub fn response_pair_id(&self) -> Option<&str> {
        self.response_pair_id.as_deref()
    }

    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    #[must_use]
    pub fn data(&self) -> &EventData {
        &self.data
    }

    /// Shared handle to the payload.
    #[must_use]
    pub fn shared_data(&self) -> Arc<EventData> {
        Arc::clone(&self.data)
    }

    /// Returns the event with a pair id, generating one if it has none.
    #[must_use]
    pub fn with_pair_id(mut self) -> Self {
        if self.pair_id.is_none() {
            self.pair_id = Some(Uuid::new_v4().to_string());
        }
        self
    }

    /// Stamp the hub sequence number. A timestamp set by the builder is kept.
    ///
    /// Called by the hub at enqueue time; publishing code never needs it.
    #[must_use]
    pub fn stamped(mut self, number: u64, now_ms: u64) -> Self {
        self.number = number;
        if self.timestamp_ms == 0 {
            self.timestamp_ms = now_ms;
        }
        self
    }
}

/// Builder for [`Event`].
#[derive(Debug, Clone)]
pub struct EventBuilder {
    name: String,
    event_type: EventType,
    source: EventSource,
    pair_id: Option<String>,
    response_pair_id: Option<String>,
    timestamp_ms: u64,
    data: EventData,
}

impl EventBuilder {
    #[must_use]
    pub fn data(mut self, data: EventData) -> Self {
        self.data = data;
        self
    }

    /// Insert a single payload entry.
    #[must_use]
    pub fn entry(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn pair_id(mut self, pair_id: impl Into<String>) -> Self {
        self.pair_id = Some(pair_id.into());
        self
    }

    /// Mark this event as the response to `request`.
    ///
    /// A request without a pair id leaves the response uncorrelated.
    #[must_use]
    pub fn response_to(mut self, request: &Event) -> Self {
        self.response_pair_id = request.pair_id.clone();
        self
    }

    #[must_use]
    pub fn response_pair_id(mut self, pair_id: impl Into<String>) -> Self {
        self.response_pair_id = Some(pair_id.into());
        self
    }

    #[must_use]
    pub fn timestamp_ms(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    #[must_use]
    pub fn build(self) -> Event {
        Event {
            name: self.name,
            event_type: self.event_type,
            source: self.source,
            unique_id: Uuid::new_v4(),
            number: 0,
            pair_id: self.pair_id,
            response_pair_id: self.response_pair_id,
            timestamp_ms: self.timestamp_ms,
            data: Arc::new(self.data),
        }
    }
}

/// Which event a shared-state read is "as of".
///
/// `Oldest` and `Newest` stand in for the pseudo-events numbered 0 and
/// `u64::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateVersion {
    Oldest,
    Newest,
    At(u64),
}

impl StateVersion {
    #[must_use]
    pub fn as_u64(self) -> u64 {
        match self {
            Self::Oldest => 0,
            Self::Newest => u64::MAX,
            Self::At(version) => version,
        }
    }
}

impl From<&Event> for StateVersion {
    fn from(event: &Event) -> Self {
        Self::At(event.number())
    }
}

impl From<u64> for StateVersion {
    fn from(version: u64) -> Self {
        Self::At(version)
    }
}
