//! # Module Shared State
//!
//! Each module owns two independent ledgers, Standard and XDM. Only the
//! owning module writes them; anyone may read. Both sit behind a short
//! `RwLock` so reads never wait on event processing.

use crate::ledger::{LedgerEntry, Resolved, VersionedLedger};
use parking_lot::RwLock;
use probe_types::{EventData, ExtensionError, StateVersion};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

type StateLedger = VersionedLedger<Arc<EventData>>;

/// Which of a module's two ledgers an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SharedStateKind {
    Standard,
    Xdm,
}

impl fmt::Display for SharedStateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Xdm => write!(f, "xdm"),
        }
    }
}

/// Outcome of a shared-state read.
#[derive(Debug, Clone, PartialEq)]
pub enum SharedStateResult {
    /// A value exists as of the requested version.
    Set(Arc<EventData>),
    /// The owner promised a value for this version but has not produced it.
    Pending,
    /// No state: unknown module, empty ledger or invalid state.
    None,
}

impl SharedStateResult {
    #[must_use]
    pub fn value(&self) -> Option<&EventData> {
        match self {
            Self::Set(value) => Some(value),
            Self::Pending | Self::None => None,
        }
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl From<Resolved<Arc<EventData>>> for SharedStateResult {
    fn from(resolved: Resolved<Arc<EventData>>) -> Self {
        match resolved {
            Resolved::Concrete(value) => Self::Set(value),
            Resolved::Pending => Self::Pending,
            Resolved::Invalid => Self::None,
        }
    }
}

/// How a pending version is redirected instead of being given a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerLink {
    /// Resolve like the next version that has a value.
    Next,
    /// Resolve like the previous version that has a value.
    Prev,
}

/// What a successful write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A new version was appended.
    Created,
    /// A pending version was filled in.
    Updated,
}

/// The Standard and XDM ledgers of one module.
#[derive(Debug, Default)]
pub struct ModuleLedgers {
    standard: RwLock<StateLedger>,
    xdm: RwLock<StateLedger>,
}

impl ModuleLedgers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn ledger(&self, kind: SharedStateKind) -> &RwLock<StateLedger> {
        match kind {
            SharedStateKind::Standard => &self.standard,
            SharedStateKind::Xdm => &self.xdm,
        }
    }

    /// Write `state` at `version`, filling the slot in place if it is pending.
    ///
    /// `None` records `Pending`: the value for this version is still being
    /// computed.
    pub fn create_or_update(
        &self,
        version: u64,
        state: Option<EventData>,
        kind: SharedStateKind,
    ) -> Result<WriteOutcome, ExtensionError> {
        let entry = state.map_or(LedgerEntry::Pending, |state| {
            LedgerEntry::Concrete(Arc::new(state))
        });
        let mut ledger = self.ledger(kind).write();

        if ledger.is_pending(version) {
            if ledger.update(version, entry) {
                debug!(version, kind = %kind, "Pending shared state resolved");
                return Ok(WriteOutcome::Updated);
            }
            // Pending over pending.
            return Err(ExtensionError::InvalidVersion { version });
        }

        if ledger.create(version, entry) {
            debug!(version, kind = %kind, "Shared state created");
            return Ok(WriteOutcome::Created);
        }

        if ledger.contains_version(version) {
            Err(ExtensionError::StateNotPending { version })
        } else {
            Err(ExtensionError::InvalidVersion { version })
        }
    }

    /// Redirect the pending slot at `version` to a neighbouring value.
    pub fn link(
        &self,
        version: u64,
        link: LedgerLink,
        kind: SharedStateKind,
    ) -> Result<(), ExtensionError> {
        let entry = match link {
            LedgerLink::Next => LedgerEntry::Next,
            LedgerLink::Prev => LedgerEntry::Prev,
        };
        if self.ledger(kind).write().update(version, entry) {
            Ok(())
        } else {
            Err(ExtensionError::StateNotPending { version })
        }
    }

    /// Value as of `version`.
    #[must_use]
    pub fn resolve(&self, version: StateVersion, kind: SharedStateKind) -> SharedStateResult {
        self.ledger(kind).read().resolve(version.as_u64()).into()
    }

    #[must_use]
    pub fn contains_valid_state(&self, kind: SharedStateKind) -> bool {
        self.ledger(kind).read().contains_valid_state()
    }

    #[must_use]
    pub fn latest_version(&self, kind: SharedStateKind) -> Option<u64> {
        self.ledger(kind).read().latest_version()
    }

    pub fn clear(&self, kind: SharedStateKind) {
        self.ledger(kind).write().clear();
    }

    /// Release both ledgers.
    pub fn clear_all(&self) {
        self.clear(SharedStateKind::Standard);
        self.clear(SharedStateKind::Xdm);
    }
}
