//! A database: a named catalog of tables backed by one directory.

use crate::error::{EngineError, EngineResult};
use crate::table::Table;
use dbproto_storage::CryptoManager;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Sidecar metadata persisted next to each table file.
#[derive(Debug, Serialize, Deserialize)]
struct TableMeta {
    #[serde(rename = "PrimaryKey")]
    primary_key: String,
}

/// Returns true for identifiers matching `[A-Za-z0-9_-]+`.
///
/// Table and database names become file and directory names, so
/// anything else is rejected.
pub(crate) fn valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// A named catalog of tables.
///
/// Each table persists as two sibling files under the database
/// directory: `<table>.dat` (encrypted records) and `<table>.meta`
/// (primary-key JSON).
#[derive(Debug)]
pub struct Database {
    name: String,
    dir: PathBuf,
    crypto: Arc<CryptoManager>,
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl Database {
    pub(crate) fn new(name: String, dir: PathBuf, crypto: Arc<CryptoManager>) -> Self {
        Self {
            name,
            dir,
            crypto,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creates a new table with the given primary-key field.
    ///
    /// Writes the `.meta` sidecar, creates the `.dat` file, and
    /// registers the in-memory table.
    ///
    /// # Errors
    ///
    /// Fails if either identifier is invalid, the table already exists,
    /// or the files cannot be created.
    pub fn create_table(&self, table_name: &str, primary_key: &str) -> EngineResult<Arc<Table>> {
        if !valid_identifier(table_name) {
            return Err(EngineError::invalid_identifier(table_name));
        }
        if !valid_identifier(primary_key) {
            return Err(EngineError::invalid_identifier(primary_key));
        }

        let mut tables = self.tables.write();
        if tables.contains_key(table_name) {
            return Err(EngineError::table_exists(table_name));
        }

        fs::create_dir_all(&self.dir)?;
        let meta = serde_json::to_vec(&TableMeta {
            primary_key: primary_key.to_string(),
        })
        .map_err(|err| EngineError::metadata(err.to_string()))?;
        fs::write(self.dir.join(format!("{table_name}.meta")), meta)?;

        let table = Arc::new(Table::create(
            primary_key,
            self.dir.join(format!("{table_name}.dat")),
            Arc::clone(&self.crypto),
        )?);
        tables.insert(table_name.to_string(), Arc::clone(&table));
        info!(db = %self.name, table = table_name, primary_key, "created table");
        Ok(table)
    }

    /// Loads every `<table>.dat` + `<table>.meta` pair in `dir`.
    ///
    /// # Errors
    ///
    /// Fails if a sidecar is missing or malformed, or a table file
    /// cannot be decrypted and decoded.
    pub fn load_tables(&self, dir: &Path) -> EngineResult<()> {
        let mut tables = self.tables.write();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("dat") {
                continue;
            }
            let Some(table_name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let meta_path = dir.join(format!("{table_name}.meta"));
            let meta_bytes = fs::read(&meta_path).map_err(|err| {
                EngineError::metadata(format!("table '{table_name}': {err}"))
            })?;
            let meta: TableMeta = serde_json::from_slice(&meta_bytes).map_err(|err| {
                EngineError::metadata(format!("table '{table_name}': {err}"))
            })?;

            let table = Table::open(meta.primary_key, &path, Arc::clone(&self.crypto))?;
            tables.insert(table_name.to_string(), Arc::new(table));
        }
        info!(db = %self.name, tables = tables.len(), "loaded tables");
        Ok(())
    }

    /// Returns a sorted snapshot of the current table names.
    #[must_use]
    pub fn list_tables(&self) -> Vec<String> {
        let tables = self.tables.read();
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        names
    }

    /// Looks up a table by name.
    ///
    /// # Errors
    ///
    /// Fails if no table has the name.
    pub fn table(&self, name: &str) -> EngineResult<Arc<Table>> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::table_not_found(name))
    }

    /// Appends this database's table files to a backup archive.
    ///
    /// Each table's shared lock is held while its files are copied, so
    /// no writer can rewrite them mid-copy. Entry paths are relative to
    /// the server directory (`<db>/<table>.<ext>`).
    pub(crate) fn backup_into(
        &self,
        zip: &mut ZipWriter<File>,
        options: SimpleFileOptions,
    ) -> EngineResult<()> {
        let tables = self.tables.read();
        let mut names: Vec<&String> = tables.keys().collect();
        names.sort();

        for table_name in names {
            let table = &tables[table_name];
            let _guard = table.state.read();
            for ext in ["meta", "dat"] {
                let path = self.dir.join(format!("{table_name}.{ext}"));
                if !path.exists() {
                    continue;
                }
                zip.start_file(format!("{}/{table_name}.{ext}", self.name), options)?;
                let mut src = File::open(&path)?;
                io::copy(&mut src, zip)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbproto_codec::Scalar;
    use dbproto_storage::EncryptionKey;
    use tempfile::{tempdir, TempDir};

    fn test_db(name: &str) -> (TempDir, Database) {
        let dir = tempdir().unwrap();
        let crypto = Arc::new(CryptoManager::new(
            EncryptionKey::from_bytes(&[7u8; 32]).unwrap(),
        ));
        let db = Database::new(name.to_string(), dir.path().join(name), crypto);
        (dir, db)
    }

    #[test]
    fn create_table_writes_both_files() {
        let (dir, db) = test_db("app");
        db.create_table("users", "id").unwrap();

        assert!(dir.path().join("app/users.dat").exists());
        let meta = fs::read_to_string(dir.path().join("app/users.meta")).unwrap();
        assert_eq!(meta, r#"{"PrimaryKey":"id"}"#);
    }

    #[test]
    fn create_table_rejects_bad_identifiers() {
        let (_dir, db) = test_db("app");
        for bad in ["", "a table", "a/b", "x;y", "é"] {
            assert!(matches!(
                db.create_table(bad, "id"),
                Err(EngineError::InvalidIdentifier { .. })
            ));
            assert!(matches!(
                db.create_table("ok", bad),
                Err(EngineError::InvalidIdentifier { .. })
            ));
        }
    }

    #[test]
    fn create_table_rejects_duplicates() {
        let (_dir, db) = test_db("app");
        db.create_table("users", "id").unwrap();
        assert!(matches!(
            db.create_table("users", "id"),
            Err(EngineError::TableExists { .. })
        ));
    }

    #[test]
    fn load_tables_round_trip() {
        let (dir, db) = test_db("app");
        {
            let table = db.create_table("users", "id").unwrap();
            let mut row = crate::table::Row::new();
            row.insert("id".to_string(), Scalar::Int(1));
            row.insert("name".to_string(), Scalar::from("Ada"));
            table.insert(row).unwrap();
        }

        let crypto = Arc::new(CryptoManager::new(
            EncryptionKey::from_bytes(&[7u8; 32]).unwrap(),
        ));
        let reloaded = Database::new("app".to_string(), dir.path().join("app"), crypto);
        reloaded.load_tables(&dir.path().join("app")).unwrap();

        assert_eq!(reloaded.list_tables(), ["users"]);
        let table = reloaded.table("users").unwrap();
        assert_eq!(table.primary_key(), "id");
        assert_eq!(table.select(1).unwrap()["name"], Scalar::from("Ada"));
    }

    #[test]
    fn missing_table_lookup_fails() {
        let (_dir, db) = test_db("app");
        assert!(matches!(
            db.table("ghost"),
            Err(EngineError::TableNotFound { .. })
        ));
    }

    #[test]
    fn load_tables_requires_sidecar() {
        let (dir, db) = test_db("app");
        fs::create_dir_all(dir.path().join("app")).unwrap();
        fs::write(dir.path().join("app/orphan.dat"), b"").unwrap();

        assert!(matches!(
            db.load_tables(&dir.path().join("app")),
            Err(EngineError::Metadata { .. })
        ));
    }
}
