//! # Listeners
//!
//! A listener is a small object behind [`EventListener`], built by a factory
//! closure when it is registered. Closures `FnMut(&Event)` are listeners too.

use crate::module::ModuleContext;
use probe_types::Event;
use std::any::Any;

/// Receives events delivered by the hub.
///
/// All calls happen on the hub worker, one at a time.
pub trait EventListener: Send + 'static {
    /// Handle one event.
    fn hear(&mut self, event: &Event);

    /// Called once when the listener is replaced, unregistered, or its module
    /// goes away.
    fn on_unregistered(&mut self) {}
}

impl<F> EventListener for F
where
    F: FnMut(&Event) + Send + 'static,
{
    fn hear(&mut self, event: &Event) {
        self(event);
    }
}

pub(crate) type BoxedListener = Box<dyn EventListener>;

/// Builds a listener on the hub worker.
pub type ListenerFactory =
    Box<dyn FnOnce(ModuleContext) -> anyhow::Result<BoxedListener> + Send + 'static>;

/// Called with the first event that matches a one-time registration.
pub type OneTimeCallback = Box<dyn FnOnce(&Event) + Send + 'static>;

/// What a one-time listener waits for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OneTimeKey {
    /// The first event whose `response_pair_id` equals this id.
    PairId(String),
    /// The next event dispatched, whatever it is.
    Unconditional,
}

impl OneTimeKey {
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        match self {
            Self::PairId(pair_id) => event.response_pair_id() == Some(pair_id.as_str()),
            Self::Unconditional => true,
        }
    }
}

impl From<Option<String>> for OneTimeKey {
    fn from(pair_id: Option<String>) -> Self {
        pair_id.map_or(Self::Unconditional, Self::PairId)
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
