//! # Versioned Ledger
//!
//! Append-only, version-keyed store with sentinel indirection. One producer
//! writes; any number of readers resolve "value as of version V".
//!
//! ## Resolution Rules
//!
//! - Anchor on the entry at the greatest stored version ≤ V, or on the first
//!   entry when V precedes everything (the ledger is open at both ends).
//! - `Next` scans forward past `Next`/`Prev` to the first terminal entry,
//!   falling back to a backward scan; `Prev` is the mirror image.
//! - An empty ledger, or a chain of links with nothing terminal behind it,
//!   resolves to `Pending`.

use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

/// What a ledger stores at one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEntry<T> {
    /// A computed value.
    Concrete(T),
    /// A value for this version is coming but is not computed yet.
    Pending,
    /// The producer has no valid state at this version.
    Invalid,
    /// Same as whatever resolves at a later version. Update-only.
    Next,
    /// Same as whatever resolves at an earlier version. Update-only.
    Prev,
}

impl<T> LedgerEntry<T> {
    fn is_link(&self) -> bool {
        matches!(self, Self::Next | Self::Prev)
    }
}

impl<T: Clone> LedgerEntry<T> {
    /// The resolution of this entry, or `None` for a link.
    fn terminal(&self) -> Option<Resolved<T>> {
        match self {
            Self::Concrete(value) => Some(Resolved::Concrete(value.clone())),
            Self::Pending => Some(Resolved::Pending),
            Self::Invalid => Some(Resolved::Invalid),
            Self::Next | Self::Prev => None,
        }
    }
}

/// Result of [`VersionedLedger::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved<T> {
    Concrete(T),
    Pending,
    Invalid,
}

impl<T> Resolved<T> {
    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Concrete(value) => Some(value),
            Self::Pending | Self::Invalid => None,
        }
    }
}

/// Version-keyed ledger.
#[derive(Debug, Clone)]
pub struct VersionedLedger<T> {
    entries: BTreeMap<u64, LedgerEntry<T>>,
}

impl<T> VersionedLedger<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Append `entry` at `version`.
    ///
    /// Fails when `version` is not above every stored version, or when
    /// `entry` is a `Next`/`Prev` link.
    pub fn create(&mut self, version: u64, entry: LedgerEntry<T>) -> bool {
        if entry.is_link() {
            return false;
        }
        if self.latest_version().is_some_and(|latest| version <= latest) {
            return false;
        }
        self.entries.insert(version, entry);
        true
    }

    /// Replace the `Pending` entry at `version`.
    ///
    /// Fails when the version is absent, not pending, or `entry` is `Pending`.
    pub fn update(&mut self, version: u64, entry: LedgerEntry<T>) -> bool {
        if matches!(entry, LedgerEntry::Pending) {
            return false;
        }
        match self.entries.get_mut(&version) {
            Some(slot) if matches!(slot, LedgerEntry::Pending) => {
                *slot = entry;
                true
            }
            _ => false,
        }
    }

    /// True iff some entry is `Concrete` or `Pending`. Links never count.
    #[must_use]
    pub fn contains_valid_state(&self) -> bool {
        self.entries
            .values()
            .any(|entry| matches!(entry, LedgerEntry::Concrete(_) | LedgerEntry::Pending))
    }

    #[must_use]
    pub fn is_pending(&self, version: u64) -> bool {
        matches!(self.entries.get(&version), Some(LedgerEntry::Pending))
    }

    #[must_use]
    pub fn contains_version(&self, version: u64) -> bool {
        self.entries.contains_key(&version)
    }

    #[must_use]
    pub fn latest_version(&self) -> Option<u64> {
        self.entries.keys().next_back().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Truncate to empty.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T: Clone> VersionedLedger<T> {
    /// Resolve the value as of `version`.
    #[must_use]
    pub fn resolve(&self, version: u64) -> Resolved<T> {
        let anchor = self
            .entries
            .range(..=version)
            .next_back()
            .or_else(|| self.entries.iter().next());

        let Some((&key, entry)) = anchor else {
            return Resolved::Pending;
        };

        match entry {
            LedgerEntry::Next => self
                .scan_forward(key)
                .or_else(|| self.scan_backward(key))
                .unwrap_or(Resolved::Pending),
            LedgerEntry::Prev => self
                .scan_backward(key)
                .or_else(|| self.scan_forward(key))
                .unwrap_or(Resolved::Pending),
            terminal => terminal.terminal().unwrap_or(Resolved::Pending),
        }
    }

    fn scan_forward(&self, from: u64) -> Option<Resolved<T>> {
        self.entries
            .range((Excluded(from), Unbounded))
            .find_map(|(_, entry)| entry.terminal())
    }

    fn scan_backward(&self, from: u64) -> Option<Resolved<T>> {
        self.entries
            .range(..from)
            .rev()
            .find_map(|(_, entry)| entry.terminal())
    }
}

impl<T> Default for VersionedLedger<T> {
    fn default() -> Self {
        Self::new()
    }
}
