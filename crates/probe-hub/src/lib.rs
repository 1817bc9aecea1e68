//! # Probe Event Hub
//!
//! Serialized event dispatch between pluggable modules, plus each module's
//! versioned shared state.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐  publish / register   ┌──────────────┐
//! │  Module A  │ ────────────────────▶ │  FIFO queue  │
//! │ (context)  │                       └──────┬───────┘
//! └────────────┘                              │ one worker thread
//!       ▲                                     ▼
//!       │ hear(event)              ┌─────────────────────┐
//!       └──────────────────────────│  listener registry  │
//!                                  │  module A: slots, * │
//!                                  │  module B: slots, * │
//!                                  │  one-time listeners │
//!                                  └─────────────────────┘
//! ```
//!
//! - Events are numbered at enqueue time and delivered in that order.
//! - Each `(module, type, source)` holds at most one listener; registering
//!   again replaces it.
//! - Shared-state writes are applied immediately under a lock; their change
//!   notifications travel through the queue like any other event.
//!
//! ## Example
//!
//! ```rust,ignore
//! let hub = EventHub::new(HubConfig::default())?;
//! hub.register_module(|ctx| Ok(Analytics::new(ctx)), None);
//! hub.finish_modules_registration(|| tracing::info!("ready"));
//! hub.publish(Event::builder("track", EventType::ANALYTICS, EventSource::REQUEST_CONTENT).build(), None);
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod hub;
pub mod hub_module;
pub mod listener;
pub mod module;

mod dispatcher;
mod registry;

pub use clock::{Clock, SystemClock};
pub use config::HubConfig;
pub use error::{HubError, HubResult};
pub use hub::EventHub;
pub use hub_module::{EVENT_HUB_MODULE_NAME, STATE_OWNER, XDM_FLAG};
pub use listener::{EventListener, ListenerFactory, OneTimeCallback, OneTimeKey};
pub use module::{Module, ModuleContext, ModuleFactory};

pub use probe_state::{LedgerLink, SharedStateKind, SharedStateResult};
pub use probe_types::{
    ErrorCallback, Event, EventBuilder, EventData, EventSource, EventType, ExtensionError,
    StateVersion,
};
