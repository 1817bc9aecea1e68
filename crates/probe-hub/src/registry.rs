//! # Listener Slot Tables
//!
//! Owned by the dispatcher and touched only on the hub worker, so nothing here
//! locks.
//!
//! - `(module, type, source)` → at most one listener
//! - `(module)` → at most one wildcard listener
//! - one-time listeners, removed after their first match
//!
//! Delivery visits modules in registration order; within a module, typed
//! slots in creation order, then the wildcard. One-time listeners run last.

use crate::listener::{panic_message, BoxedListener, OneTimeCallback, OneTimeKey};
use probe_types::{Event, EventSource, EventType};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

/// Hub-local module identifier.
pub(crate) type ModuleId = u64;

/// Key of a typed listener slot within one module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct SlotKey {
    pub event_type: EventType,
    pub source: EventSource,
}

impl SlotKey {
    pub fn new(event_type: EventType, source: EventSource) -> Self {
        Self { event_type, source }
    }

    fn matches(&self, event: &Event) -> bool {
        self.event_type.matches(event.event_type()) && self.source.matches(event.source())
    }
}

#[derive(Default)]
struct ModuleSlots {
    listeners: Vec<(SlotKey, BoxedListener)>,
    wildcard: Option<BoxedListener>,
}

/// A listener that panicked while hearing an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeliveryFailure {
    pub module: ModuleId,
    pub reason: String,
}

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    slots: HashMap<ModuleId, ModuleSlots>,
    order: Vec<ModuleId>,
    one_time: Vec<(OneTimeKey, OneTimeCallback)>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_module(&mut self, module: ModuleId) {
        if self.slots.contains_key(&module) {
            return;
        }
        self.slots.insert(module, ModuleSlots::default());
        self.order.push(module);
    }

    pub fn contains_module(&self, module: ModuleId) -> bool {
        self.slots.contains_key(&module)
    }

    /// Modules in registration order.
    pub fn modules(&self) -> &[ModuleId] {
        &self.order
    }

    /// Drop a module's slots, returning its live listeners for retirement.
    pub fn remove_module(&mut self, module: ModuleId) -> Vec<BoxedListener> {
        self.order.retain(|id| *id != module);
        let Some(slots) = self.slots.remove(&module) else {
            return Vec::new();
        };
        slots
            .listeners
            .into_iter()
            .map(|(_, listener)| listener)
            .chain(slots.wildcard)
            .collect()
    }

    /// Activate `listener`. The slot must have been emptied with [`Self::remove`].
    pub fn insert(&mut self, module: ModuleId, key: SlotKey, listener: BoxedListener) -> bool {
        let Some(slots) = self.slots.get_mut(&module) else {
            return false;
        };
        debug_assert!(slots.listeners.iter().all(|(existing, _)| *existing != key));
        slots.listeners.push((key, listener));
        true
    }

    pub fn remove(&mut self, module: ModuleId, key: &SlotKey) -> Option<BoxedListener> {
        let slots = self.slots.get_mut(&module)?;
        let index = slots.listeners.iter().position(|(existing, _)| existing == key)?;
        Some(slots.listeners.remove(index).1)
    }

    pub fn set_wildcard(&mut self, module: ModuleId, listener: BoxedListener) -> bool {
        let Some(slots) = self.slots.get_mut(&module) else {
            return false;
        };
        slots.wildcard = Some(listener);
        true
    }

    pub fn take_wildcard(&mut self, module: ModuleId) -> Option<BoxedListener> {
        self.slots.get_mut(&module)?.wildcard.take()
    }

    pub fn add_one_time(&mut self, key: OneTimeKey, callback: OneTimeCallback) {
        self.one_time.push((key, callback));
    }

    /// Number of typed listeners plus the wildcard for `module`.
    #[cfg(test)]
    pub fn listener_count(&self, module: ModuleId) -> usize {
        self.slots.get(&module).map_or(0, |slots| {
            slots.listeners.len() + usize::from(slots.wildcard.is_some())
        })
    }

    #[cfg(test)]
    pub fn one_time_count(&self) -> usize {
        self.one_time.len()
    }

    /// Deliver `event` to every matching listener.
    ///
    /// A panicking listener is reported and delivery continues.
    pub fn deliver(&mut self, event: &Event) -> Vec<DeliveryFailure> {
        let mut failures = Vec::new();

        for module in &self.order {
            let Some(slots) = self.slots.get_mut(module) else {
                continue;
            };
            let typed = slots
                .listeners
                .iter_mut()
                .filter(|(key, _)| key.matches(event))
                .map(|(_, listener)| listener);

            for listener in typed.chain(slots.wildcard.as_mut()) {
                if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener.hear(event))) {
                    failures.push(DeliveryFailure {
                        module: *module,
                        reason: panic_message(payload.as_ref()),
                    });
                }
            }
        }

        let pending = std::mem::take(&mut self.one_time);
        let (fire, keep): (Vec<_>, Vec<_>) =
            pending.into_iter().partition(|(key, _)| key.matches(event));
        self.one_time = keep;

        for (key, callback) in fire {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(event))) {
                error!(
                    key = ?key,
                    event_number = event.number(),
                    reason = %panic_message(payload.as_ref()),
                    "One-time listener panicked"
                );
            }
        }

        failures
    }
}
