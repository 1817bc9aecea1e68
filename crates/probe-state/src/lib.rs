//! # Probe State - Versioned Shared State
//!
//! A module publishes facts ("shared state") tagged with the event number they
//! are valid from. Readers ask for the value "as of" any event and get the same
//! answer no matter when the producer's computation finished.
//!
//! ## Ledger Timeline
//!
//! ```text
//! version:   0        3          7        9
//!          ┌────────┬──────────┬────────┬─────────┐
//!          │ A      │ Pending  │ Next   │ B       │
//!          └────────┴──────────┴────────┴─────────┘
//! resolve(5) = Pending    resolve(8) = B    resolve(1000) = B
//! ```
//!
//! - Versions are appended in strictly increasing order, never below the
//!   current maximum.
//! - `Pending` is the producer's promise that a value for that version is
//!   coming; readers get a determinate "try again" instead of a stale value.
//! - `Next`/`Prev` redirect a version to whatever resolves after/before it.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod ledger;
pub mod shared_state;

pub use ledger::{LedgerEntry, Resolved, VersionedLedger};
pub use shared_state::{LedgerLink, ModuleLedgers, SharedStateKind, SharedStateResult, WriteOutcome};
