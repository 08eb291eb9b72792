//! Snapshot-and-rollback around a single table mutation.
//!
//! A [`Transaction`] holds the table's write guard for its entire
//! lifetime, so nothing else can touch the table until it commits or
//! rolls back. Mutations inside the transaction go through the table's
//! `*_locked` internals rather than the public methods, which would
//! otherwise try to re-acquire the lock the transaction already holds.

use crate::error::EngineResult;
use crate::table::{Row, Table, TableState};
use dbproto_codec::{Records, Scalar};
use parking_lot::RwLockWriteGuard;
use tracing::debug;

/// An open transaction on one table.
///
/// Created by [`Table::begin`]. The borrow checker enforces the
/// single-writer discipline: while a transaction is alive, the table
/// cannot be used through any other path on this thread, and other
/// threads block on the lock.
pub struct Transaction<'t> {
    table: &'t Table,
    snapshot: Records,
    guard: RwLockWriteGuard<'t, TableState>,
}

impl Table {
    /// Begins a transaction: takes the write lock and clones the
    /// current record map as the rollback snapshot.
    pub fn begin(&self) -> Transaction<'_> {
        let guard = self.state.write();
        let snapshot = guard.records.clone();
        debug!(records = snapshot.len(), "transaction started");
        Transaction {
            table: self,
            snapshot,
            guard,
        }
    }

    /// Inserts a record, rolling back on failure.
    ///
    /// # Errors
    ///
    /// Propagates the insert error after restoring the snapshot.
    pub fn insert_with_transaction(&self, row: Row) -> EngineResult<()> {
        let mut txn = self.begin();
        match txn.insert(row) {
            Ok(()) => txn.commit(),
            Err(err) => {
                txn.rollback()?;
                Err(err)
            }
        }
    }

    /// Updates a record, rolling back on failure.
    ///
    /// # Errors
    ///
    /// Propagates the update error after restoring the snapshot.
    pub fn update_with_transaction(
        &self,
        key: impl Into<Scalar>,
        updates: Row,
    ) -> EngineResult<()> {
        let mut txn = self.begin();
        match txn.update(key, updates) {
            Ok(()) => txn.commit(),
            Err(err) => {
                txn.rollback()?;
                Err(err)
            }
        }
    }

    /// Deletes a record, rolling back on failure.
    ///
    /// # Errors
    ///
    /// Propagates the delete error after restoring the snapshot.
    pub fn delete_with_transaction(&self, key: impl Into<Scalar>) -> EngineResult<()> {
        let mut txn = self.begin();
        match txn.delete(key) {
            Ok(()) => txn.commit(),
            Err(err) => {
                txn.rollback()?;
                Err(err)
            }
        }
    }
}

impl Transaction<'_> {
    /// Inserts a record under this transaction's lock.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Table::insert`].
    pub fn insert(&mut self, row: Row) -> EngineResult<()> {
        self.table.insert_locked(&mut self.guard, row)
    }

    /// Updates a record under this transaction's lock.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Table::update`].
    pub fn update(&mut self, key: impl Into<Scalar>, updates: Row) -> EngineResult<()> {
        self.table.update_locked(&mut self.guard, key.into(), updates)
    }

    /// Deletes a record under this transaction's lock.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Table::delete`].
    pub fn delete(&mut self, key: impl Into<Scalar>) -> EngineResult<()> {
        self.table.delete_locked(&mut self.guard, key.into())
    }

    /// Commits: releases the lock. The mutation already persisted, so
    /// no write happens here.
    ///
    /// # Errors
    ///
    /// Infallible today; the `Result` keeps the contract symmetric with
    /// [`rollback`](Self::rollback).
    pub fn commit(self) -> EngineResult<()> {
        debug!("transaction committed");
        Ok(())
    }

    /// Rolls back: rewrites the file from the snapshot, restores the
    /// in-memory record map, rebuilds indexes, clears the cache, and
    /// releases the lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written back.
    pub fn rollback(mut self) -> EngineResult<()> {
        self.table.write_records(&self.snapshot)?;
        self.guard.records = std::mem::take(&mut self.snapshot);
        Table::rebuild_indexes(&mut self.guard);
        self.guard.cache.clear();
        debug!("transaction rolled back");
        Ok(())
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("snapshot_records", &self.snapshot.len())
            .finish()
    }
}
