//! # Built-in Hub Module
//!
//! The hub enrolls itself as a module so it can publish its directory of
//! registered modules as ordinary Standard shared state.

use probe_state::SharedStateKind;
use probe_types::{Event, EventData, EventSource, EventType};
use serde_json::{json, Value};

/// Name of the hub's own module.
pub const EVENT_HUB_MODULE_NAME: &str = "com.probe.module.eventhub";

/// Payload key naming the module whose shared state changed.
pub const STATE_OWNER: &str = "stateowner";

/// Payload flag set on XDM shared-state change events.
pub const XDM_FLAG: &str = "xdm";

pub(crate) const SHARED_STATE_EVENT_NAME: &str = "Shared state change";
pub(crate) const BOOTED_EVENT_NAME: &str = "EventHub booted";

/// `HUB/SHARED_STATE` event announcing a change in `owner`'s `kind` ledger.
pub(crate) fn shared_state_change_event(owner: &str, kind: SharedStateKind) -> Event {
    let mut data = EventData::new();
    data.insert(STATE_OWNER.to_string(), Value::String(owner.to_string()));
    let name = match kind {
        SharedStateKind::Standard => SHARED_STATE_EVENT_NAME.to_string(),
        SharedStateKind::Xdm => {
            data.insert(XDM_FLAG.to_string(), Value::Bool(true));
            format!("{SHARED_STATE_EVENT_NAME} (XDM)")
        }
    };
    Event::builder(name, EventType::HUB, EventSource::SHARED_STATE)
        .data(data)
        .build()
}

pub(crate) fn booted_event() -> Event {
    Event::builder(BOOTED_EVENT_NAME, EventType::HUB, EventSource::BOOTED).build()
}

/// `{"version": .., "extensions": {name: {"version": ..}}}`
pub(crate) fn hub_state<'a>(
    hub_version: &str,
    modules: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> EventData {
    let extensions: serde_json::Map<String, Value> = modules
        .into_iter()
        .map(|(name, version)| (name.to_string(), json!({ "version": version })))
        .collect();

    let mut data = EventData::new();
    data.insert("version".to_string(), Value::String(hub_version.to_string()));
    data.insert("extensions".to_string(), Value::Object(extensions));
    data
}
