//! The record store: CRUD, batch CRUD, filtered scans, index and cache
//! maintenance.
//!
//! All in-memory state (records, indexes, cache) lives behind one
//! `RwLock`. Public mutators take the write lock once and delegate to
//! `*_locked` internals; the transaction wrappers reuse those internals
//! under the guard they already hold, so no path ever re-acquires the
//! lock.
//!
//! Mutations follow a strict order: read-decrypt the file, mutate a
//! local copy, write-encrypt atomically, and only then apply the change
//! to the in-memory maps. An error at any step leaves both the file and
//! memory in their pre-call state.

use crate::error::{EngineError, EngineResult};
use crate::metrics::TableMetrics;
use dbproto_codec::{decode_records, encode_records, Record, Records, Scalar};
use dbproto_storage::{CryptoManager, TableFile};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A host-level record: field name to scalar.
pub type Row = HashMap<String, Scalar>;

/// The primary-key projection the source emits for absent values.
/// Rejected outright so it can never become a map key.
const NIL_KEY: &str = "<nil>";

/// In-memory state of a table, guarded by the table's lock.
#[derive(Debug, Default)]
pub(crate) struct TableState {
    /// Primary-key string to stored record. Mirrors the file exactly.
    pub(crate) records: Records,
    /// Field name to primary keys of live records holding that field.
    pub(crate) indexes: HashMap<String, Vec<String>>,
    /// Primary-key string to stored record, populated by lookups.
    pub(crate) cache: Records,
}

/// An encrypted, file-backed table of records.
#[derive(Debug)]
pub struct Table {
    primary_key: String,
    file: TableFile,
    pub(crate) state: RwLock<TableState>,
    metrics: TableMetrics,
}

impl Table {
    /// Creates a new table, ensuring its file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its parent directory cannot be
    /// created.
    pub fn create(
        primary_key: impl Into<String>,
        path: impl Into<PathBuf>,
        crypto: Arc<CryptoManager>,
    ) -> EngineResult<Self> {
        let file = TableFile::new(path, crypto);
        file.create_if_missing()?;
        Ok(Self {
            primary_key: primary_key.into(),
            file,
            state: RwLock::new(TableState::default()),
            metrics: TableMetrics::new(),
        })
    }

    /// Opens an existing table, loading records and building indexes.
    ///
    /// The cache starts empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn open(
        primary_key: impl Into<String>,
        path: impl Into<PathBuf>,
        crypto: Arc<CryptoManager>,
    ) -> EngineResult<Self> {
        let table = Self {
            primary_key: primary_key.into(),
            file: TableFile::new(path, crypto),
            state: RwLock::new(TableState::default()),
            metrics: TableMetrics::new(),
        };
        {
            let mut state = table.state.write();
            state.records = table.read_records()?;
            Self::rebuild_indexes(&mut state);
        }
        Ok(table)
    }

    /// Returns the primary-key field name.
    #[must_use]
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Returns the path of the table file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Returns the table's operation metrics.
    #[must_use]
    pub fn metrics(&self) -> &TableMetrics {
        &self.metrics
    }

    // === CRUD ===

    /// Inserts a record.
    ///
    /// # Errors
    ///
    /// Fails if the primary key is missing, empty, or already present,
    /// or if the file cannot be rewritten.
    pub fn insert(&self, row: Row) -> EngineResult<()> {
        let mut state = self.state.write();
        self.insert_locked(&mut state, row)
    }

    /// Inserts a batch of records, writing the file once.
    ///
    /// Returns one error per rejected record; records accepted before
    /// the write all land atomically. A write failure is appended to
    /// the error list and leaves every record unapplied.
    pub fn insert_many(&self, rows: Vec<Row>) -> Vec<EngineError> {
        let mut state = self.state.write();
        let mut all = match self.read_records() {
            Ok(all) => all,
            Err(err) => return vec![err],
        };

        let mut errors = Vec::new();
        let mut accepted = Vec::new();
        for row in rows {
            let (key, record) = match self.encode_row(&row) {
                Ok(pair) => pair,
                Err(err) => {
                    errors.push(err);
                    continue;
                }
            };
            if all.contains_key(&key) {
                errors.push(EngineError::duplicate_key(&key));
                continue;
            }
            all.insert(key.clone(), record.clone());
            accepted.push((key, record));
        }

        if accepted.is_empty() {
            return errors;
        }
        if let Err(err) = self.write_records(&all) {
            errors.push(err);
            return errors;
        }

        state.records = all;
        for (key, record) in accepted {
            Self::index_insert(&mut state, &key, &record);
            state.cache.insert(key, record);
            self.metrics.record_insert();
        }
        errors
    }

    /// Looks up a record by key.
    ///
    /// The key is stringified through its canonical projection, so
    /// `select(1)` and `select("1")` reach the same record. A cached
    /// record is served under the shared lock; a miss upgrades to the
    /// exclusive lock, reads the file, and populates the cache.
    ///
    /// # Errors
    ///
    /// Fails if no record has the key.
    pub fn select(&self, key: impl Into<Scalar>) -> EngineResult<Row> {
        let key = key.into().key_string();

        {
            let state = self.state.read();
            if let Some(record) = state.cache.get(&key) {
                self.metrics.record_cache_hit();
                return Ok(record.to_scalars()?);
            }
        }

        let mut state = self.state.write();
        // Re-check: another thread may have filled the cache while we
        // waited for the write lock.
        if let Some(record) = state.cache.get(&key) {
            self.metrics.record_cache_hit();
            return Ok(record.to_scalars()?);
        }

        let all = self.read_records()?;
        let record = all
            .get(&key)
            .cloned()
            .ok_or_else(|| EngineError::record_not_found(&key))?;
        let row = record.to_scalars()?;
        state.cache.insert(key, record);
        self.metrics.record_cache_miss();
        self.metrics.record_query();
        Ok(row)
    }

    /// Returns every record. Iteration order is unspecified.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn select_all(&self) -> EngineResult<Vec<Row>> {
        let _state = self.state.read();
        let all = self.read_records()?;
        self.metrics.record_query();
        all.values().map(|record| Ok(record.to_scalars()?)).collect()
    }

    /// Returns records matching every `field == value` constraint.
    ///
    /// Empty filters match every record. Comparison is like-kind only:
    /// a number never matches a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn select_with_filter(&self, filters: Row) -> EngineResult<Vec<Row>> {
        let _state = self.state.read();
        let all = self.read_records()?;
        let encoded: Vec<(String, dbproto_codec::Value)> = filters
            .into_iter()
            .map(|(field, value)| (field, value.encode()))
            .collect();

        let mut rows = Vec::new();
        for record in all.values() {
            let matches = encoded
                .iter()
                .all(|(field, value)| record.fields.get(field) == Some(value));
            if matches {
                rows.push(record.to_scalars()?);
            }
        }
        self.metrics.record_query();
        Ok(rows)
    }

    /// Updates fields of an existing record.
    ///
    /// # Errors
    ///
    /// Fails if the key is absent or the file cannot be rewritten.
    pub fn update(&self, key: impl Into<Scalar>, updates: Row) -> EngineResult<()> {
        let mut state = self.state.write();
        self.update_locked(&mut state, key.into(), updates)
    }

    /// Updates many records keyed by their primary-key string, writing
    /// the file once. Returns one error per rejected record.
    pub fn update_many(&self, updates: HashMap<String, Row>) -> Vec<EngineError> {
        let mut state = self.state.write();
        let mut all = match self.read_records() {
            Ok(all) => all,
            Err(err) => return vec![err],
        };

        let mut errors = Vec::new();
        let mut touched = Vec::new();
        for (key, fields) in updates {
            let Some(record) = all.get_mut(&key) else {
                errors.push(EngineError::record_not_found(&key));
                continue;
            };
            if let Some(field) = fields.keys().find(|field| field.is_empty()) {
                errors.push(EngineError::invalid_identifier(field.as_str()));
                continue;
            }
            for (field, value) in fields {
                record.fields.insert(field, value.encode());
            }
            touched.push((key.clone(), record.clone()));
        }

        if touched.is_empty() {
            return errors;
        }
        if let Err(err) = self.write_records(&all) {
            errors.push(err);
            return errors;
        }

        state.records = all;
        for (key, record) in touched {
            Self::index_insert(&mut state, &key, &record);
            state.cache.insert(key, record);
            self.metrics.record_update();
        }
        errors
    }

    /// Deletes a record by key.
    ///
    /// # Errors
    ///
    /// Fails if the key is absent or the file cannot be rewritten.
    pub fn delete(&self, key: impl Into<Scalar>) -> EngineResult<()> {
        let mut state = self.state.write();
        self.delete_locked(&mut state, key.into())
    }

    /// Deletes many records, writing the file once. Returns one error
    /// per missing key.
    pub fn delete_many(&self, keys: Vec<Scalar>) -> Vec<EngineError> {
        let mut state = self.state.write();
        let mut all = match self.read_records() {
            Ok(all) => all,
            Err(err) => return vec![err],
        };

        let mut errors = Vec::new();
        let mut removed = Vec::new();
        for key in keys {
            let key = key.key_string();
            match all.remove(&key) {
                Some(record) => removed.push((key, record)),
                None => errors.push(EngineError::record_not_found(&key)),
            }
        }

        if removed.is_empty() {
            return errors;
        }
        if let Err(err) = self.write_records(&all) {
            errors.push(err);
            return errors;
        }

        state.records = all;
        for (key, record) in removed {
            Self::index_remove(&mut state, &key, &record);
            state.cache.remove(&key);
            self.metrics.record_delete();
        }
        errors
    }

    // === Index maintenance ===

    /// Merges the file contents into the existing index buckets.
    ///
    /// Used at startup. Appending is idempotent: a primary key is never
    /// inserted into the same bucket twice.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn load_indexes(&self) -> EngineResult<()> {
        let mut state = self.state.write();
        let all = self.read_records()?;
        for (key, record) in &all {
            Self::index_insert(&mut state, key, record);
        }
        Ok(())
    }

    /// Clears the indexes and rebuilds them from the file.
    ///
    /// Also refreshes the in-memory record map; used before joins to
    /// undo any drift.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn reset_and_load_indexes(&self) -> EngineResult<()> {
        let mut state = self.state.write();
        state.records = self.read_records()?;
        Self::rebuild_indexes(&mut state);
        Ok(())
    }

    // === Locked internals (shared with the transaction path) ===

    pub(crate) fn insert_locked(&self, state: &mut TableState, row: Row) -> EngineResult<()> {
        let mut all = self.read_records()?;
        let (key, record) = self.encode_row(&row)?;
        if all.contains_key(&key) {
            return Err(EngineError::duplicate_key(&key));
        }
        all.insert(key.clone(), record.clone());
        self.write_records(&all)?;

        state.records = all;
        Self::index_insert(state, &key, &record);
        state.cache.insert(key.clone(), record);
        self.metrics.record_insert();
        debug!(key = %key, path = %self.file.path().display(), "inserted record");
        Ok(())
    }

    pub(crate) fn update_locked(
        &self,
        state: &mut TableState,
        key: Scalar,
        updates: Row,
    ) -> EngineResult<()> {
        let key = key.key_string();
        let mut all = self.read_records()?;
        let record = all
            .get_mut(&key)
            .ok_or_else(|| EngineError::record_not_found(&key))?;
        if let Some(field) = updates.keys().find(|field| field.is_empty()) {
            return Err(EngineError::invalid_identifier(field.as_str()));
        }
        for (field, value) in updates {
            record.fields.insert(field, value.encode());
        }
        let updated = record.clone();
        self.write_records(&all)?;

        state.records = all;
        Self::index_insert(state, &key, &updated);
        state.cache.insert(key.clone(), updated);
        self.metrics.record_update();
        debug!(key = %key, "updated record");
        Ok(())
    }

    pub(crate) fn delete_locked(&self, state: &mut TableState, key: Scalar) -> EngineResult<()> {
        let key = key.key_string();
        let mut all = self.read_records()?;
        let record = all
            .remove(&key)
            .ok_or_else(|| EngineError::record_not_found(&key))?;
        self.write_records(&all)?;

        state.records = all;
        Self::index_remove(state, &key, &record);
        state.cache.remove(&key);
        self.metrics.record_delete();
        debug!(key = %key, "deleted record");
        Ok(())
    }

    // === Helpers ===

    /// Validates a row and encodes it, returning its map key.
    fn encode_row(&self, row: &Row) -> EngineResult<(String, Record)> {
        let pk = row
            .get(&self.primary_key)
            .ok_or_else(|| EngineError::primary_key_missing(&self.primary_key))?;
        let key = pk.key_string();
        if key.is_empty() || key == NIL_KEY {
            return Err(EngineError::primary_key_empty(&self.primary_key));
        }
        if let Some(field) = row.keys().find(|field| field.is_empty()) {
            return Err(EngineError::invalid_identifier(field.as_str()));
        }
        Ok((key, Record::from_scalars(row)))
    }

    pub(crate) fn read_records(&self) -> EngineResult<Records> {
        let bytes = self.file.read()?;
        Ok(decode_records(&bytes)?)
    }

    pub(crate) fn write_records(&self, records: &Records) -> EngineResult<()> {
        self.file.write(&encode_records(records))?;
        Ok(())
    }

    /// Adds `key` to the bucket of every field on `record`, once.
    fn index_insert(state: &mut TableState, key: &str, record: &Record) {
        for field in record.fields.keys() {
            let bucket = state.indexes.entry(field.clone()).or_default();
            if !bucket.iter().any(|k| k == key) {
                bucket.push(key.to_string());
            }
        }
    }

    /// Removes `key` from the bucket of every field on `record`,
    /// dropping buckets that become empty.
    fn index_remove(state: &mut TableState, key: &str, record: &Record) {
        for field in record.fields.keys() {
            if let Some(bucket) = state.indexes.get_mut(field) {
                bucket.retain(|k| k != key);
                if bucket.is_empty() {
                    state.indexes.remove(field);
                }
            }
        }
    }

    pub(crate) fn rebuild_indexes(state: &mut TableState) {
        state.indexes.clear();
        for (key, record) in &state.records {
            for field in record.fields.keys() {
                state
                    .indexes
                    .entry(field.clone())
                    .or_default()
                    .push(key.clone());
            }
        }
    }
}
