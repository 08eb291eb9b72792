//! Per-table operation counters and timestamps.
//!
//! All counters are atomic and can be read while operations are in
//! progress. Timestamps are Unix epoch milliseconds; zero means the
//! operation has never run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Operation counters and timestamps for one table.
#[derive(Debug, Default)]
pub struct TableMetrics {
    inserts: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
    queries: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    index_lookups: AtomicU64,
    full_scans: AtomicU64,

    last_insert: AtomicU64,
    last_update: AtomicU64,
    last_delete: AtomicU64,
    last_query: AtomicU64,
}

impl TableMetrics {
    /// Creates a zeroed metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
        self.last_insert.store(now_millis(), Ordering::Relaxed);
    }

    pub(crate) fn record_update(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
        self.last_update.store(now_millis(), Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        self.last_delete.store(now_millis(), Ordering::Relaxed);
    }

    pub(crate) fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.last_query.store(now_millis(), Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_index_lookup(&self) {
        self.index_lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_full_scan(&self) {
        self.full_scans.fetch_add(1, Ordering::Relaxed);
    }

    /// Total insert operations.
    pub fn inserts(&self) -> u64 {
        self.inserts.load(Ordering::Relaxed)
    }

    /// Total update operations.
    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }

    /// Total delete operations.
    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Total query operations.
    pub fn queries(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    /// Successful cache retrievals.
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Unsuccessful cache retrievals.
    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    /// Query executions that scanned an index bucket.
    pub fn index_lookups(&self) -> u64 {
        self.index_lookups.load(Ordering::Relaxed)
    }

    /// Query executions that scanned the whole record map.
    ///
    /// A high count relative to [`index_lookups`](Self::index_lookups)
    /// means filters rarely hit an index.
    pub fn full_scans(&self) -> u64 {
        self.full_scans.load(Ordering::Relaxed)
    }

    /// Returns a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            inserts: self.inserts(),
            updates: self.updates(),
            deletes: self.deletes(),
            queries: self.queries(),
            cache_hits: self.cache_hits(),
            cache_misses: self.cache_misses(),
            index_lookups: self.index_lookups(),
            full_scans: self.full_scans(),
            last_insert: self.last_insert.load(Ordering::Relaxed),
            last_update: self.last_update.load(Ordering::Relaxed),
            last_delete: self.last_delete.load(Ordering::Relaxed),
            last_query: self.last_query.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of [`TableMetrics`].
///
/// Timestamps are Unix epoch milliseconds; zero means never.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Total insert operations.
    pub inserts: u64,
    /// Total update operations.
    pub updates: u64,
    /// Total delete operations.
    pub deletes: u64,
    /// Total query operations.
    pub queries: u64,
    /// Successful cache retrievals.
    pub cache_hits: u64,
    /// Unsuccessful cache retrievals.
    pub cache_misses: u64,
    /// Query executions that used an index bucket.
    pub index_lookups: u64,
    /// Query executions that scanned every record.
    pub full_scans: u64,
    /// Timestamp of the last insert.
    pub last_insert: u64,
    /// Timestamp of the last update.
    pub last_update: u64,
    /// Timestamp of the last delete.
    pub last_delete: u64,
    /// Timestamp of the last query.
    pub last_query: u64,
}
