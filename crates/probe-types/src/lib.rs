//! # Probe Types
//!
//! Types shared by the event hub, the shared-state ledgers and every module
//! built on top of them.
//!
//! ## Contents
//!
//! - **Identifiers**: [`EventType`] and [`EventSource`], case-insensitive
//!   namespaced strings with a reserved wildcard value
//! - **Events**: [`Event`] (immutable, hub-numbered) and [`EventBuilder`]
//! - **Versions**: [`StateVersion`], the "as of which event" selector used for
//!   shared-state reads
//! - **Errors**: [`ExtensionError`] and the [`ErrorCallback`] contract used at
//!   the public boundary

pub mod errors;
pub mod event;
pub mod identifiers;

pub use errors::{report, ErrorCallback, ExtensionError};
pub use event::{Event, EventBuilder, EventData, StateVersion};
pub use identifiers::{EventSource, EventType};
