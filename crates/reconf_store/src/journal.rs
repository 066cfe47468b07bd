//! Commit journal and call statistics.
//!
//! Every row written by a successful store call is appended to the journal
//! with a monotonically increasing sequence number. Rows written by a
//! rejected call never appear. Statistics count calls, not rows, so a
//! batched create of fifty items is one `Create` call.

use parking_lot::Mutex;
use reconf_model::{EntityId, EntityKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Kind of store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Read call.
    Read,
    /// Row created.
    Create,
    /// Row updated.
    Update,
    /// Row deleted.
    Delete,
}

/// One written row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Commit order, starting at 1.
    pub sequence: u64,
    /// Kind of the row.
    pub kind: EntityKind,
    /// What happened to it.
    pub operation: Operation,
    /// Row id.
    pub id: EntityId,
}

/// Ordered record of written rows.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
    next_sequence: u64,
}

impl Journal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry and returns its sequence number.
    pub fn record(&mut self, kind: EntityKind, operation: Operation, id: EntityId) -> u64 {
        self.next_sequence += 1;
        self.entries.push(JournalEntry {
            sequence: self.next_sequence,
            kind,
            operation,
            id,
        });
        self.next_sequence
    }

    /// Appends all entries of `other`, renumbering them.
    pub fn extend(&mut self, other: Journal) {
        for entry in other.entries {
            self.record(entry.kind, entry.operation, entry.id);
        }
    }

    /// All entries in commit order.
    #[must_use]
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops entries after the first `len`.
    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
        self.next_sequence = self.entries.last().map_or(0, |e| e.sequence);
    }

    /// Sequence number at which `id` was created, if it was.
    #[must_use]
    pub fn created_at(&self, kind: EntityKind, id: EntityId) -> Option<u64> {
        self.entries
            .iter()
            .find(|e| e.kind == kind && e.id == id && e.operation == Operation::Create)
            .map(|e| e.sequence)
    }

    /// Number of rows of `kind` that underwent `operation`.
    #[must_use]
    pub fn count(&self, kind: EntityKind, operation: Operation) -> usize {
        self.entries
            .iter()
            .filter(|e| e.kind == kind && e.operation == operation)
            .count()
    }
}

/// Store call statistics.
///
/// Counters are atomic and may be read while calls are in progress.
#[derive(Debug, Default)]
pub struct StoreStats {
    reads: AtomicU64,
    writes: AtomicU64,
    rejected: AtomicU64,
    transactions_started: AtomicU64,
    transactions_committed: AtomicU64,
    transactions_rolled_back: AtomicU64,
    calls: Mutex<BTreeMap<(EntityKind, Operation), u64>>,
}

impl StoreStats {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_call(&self, kind: EntityKind, operation: Operation) {
        if operation == Operation::Read {
            self.reads.fetch_add(1, Ordering::Relaxed);
        } else {
            self.writes.fetch_add(1, Ordering::Relaxed);
        }
        *self.calls.lock().entry((kind, operation)).or_insert(0) += 1;
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_start(&self) {
        self.transactions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_commit(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_rollback(&self) {
        self.transactions_rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    /// Total read calls.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Total write calls, rejected ones included.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Write calls that were rejected.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Transactions started.
    pub fn transactions_started(&self) -> u64 {
        self.transactions_started.load(Ordering::Relaxed)
    }

    /// Transactions committed.
    pub fn transactions_committed(&self) -> u64 {
        self.transactions_committed.load(Ordering::Relaxed)
    }

    /// Transactions rolled back.
    pub fn transactions_rolled_back(&self) -> u64 {
        self.transactions_rolled_back.load(Ordering::Relaxed)
    }

    /// Number of calls of `operation` against `kind`.
    pub fn calls(&self, kind: EntityKind, operation: Operation) -> u64 {
        self.calls
            .lock()
            .get(&(kind, operation))
            .copied()
            .unwrap_or(0)
    }

    /// Returns a point-in-time snapshot of the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads(),
            writes: self.writes(),
            rejected: self.rejected(),
            transactions_started: self.transactions_started(),
            transactions_committed: self.transactions_committed(),
            transactions_rolled_back: self.transactions_rolled_back(),
        }
    }
}

/// Plain copy of [`StoreStats`] counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Total read calls.
    pub reads: u64,
    /// Total write calls.
    pub writes: u64,
    /// Rejected write calls.
    pub rejected: u64,
    /// Transactions started.
    pub transactions_started: u64,
    /// Transactions committed.
    pub transactions_committed: u64,
    /// Transactions rolled back.
    pub transactions_rolled_back: u64,
}
