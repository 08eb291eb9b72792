//! The server: a catalog of databases rooted at one directory, with
//! zip backup and restore.

use crate::config::ServerConfig;
use crate::database::{valid_identifier, Database};
use crate::error::{EngineError, EngineResult};
use dbproto_storage::CryptoManager;
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Advisory lock file inside the server directory.
const LOCK_FILE: &str = "LOCK";
/// Backup archive file name.
const BACKUP_FILE: &str = "backup.zip";

/// A catalog of databases under one server directory.
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    crypto: Arc<CryptoManager>,
    databases: RwLock<HashMap<String, Arc<Database>>>,
    /// Held for the server's lifetime once `initialize` succeeds.
    lock_file: Mutex<Option<File>>,
}

impl Server {
    /// Creates a server over the given configuration.
    ///
    /// Nothing touches the filesystem until [`initialize`](Self::initialize).
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let crypto = Arc::new(CryptoManager::new(config.key.clone()));
        Self {
            config,
            crypto,
            databases: RwLock::new(HashMap::new()),
            lock_file: Mutex::new(None),
        }
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Creates the server directory, takes the process lock, and loads
    /// every subdirectory as a database.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created, another process holds
    /// the lock, or any database fails to load.
    pub fn initialize(&self) -> EngineResult<()> {
        fs::create_dir_all(&self.config.server_dir)?;

        let lock_path = self.config.server_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        if file.try_lock_exclusive().is_err() {
            return Err(EngineError::ServerLocked);
        }
        *self.lock_file.lock() = Some(file);

        self.load_databases()
    }

    /// Reloads the database catalog from the server directory.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be read or any database fails to
    /// load.
    pub fn load_databases(&self) -> EngineResult<()> {
        let fresh = self.scan_databases()?;
        let mut databases = self.databases.write();
        *databases = fresh;
        info!(count = databases.len(), dir = %self.config.server_dir.display(), "loaded databases");
        Ok(())
    }

    /// Builds a fresh catalog from the subdirectories on disk.
    fn scan_databases(&self) -> EngineResult<HashMap<String, Arc<Database>>> {
        let mut fresh = HashMap::new();
        for entry in fs::read_dir(&self.config.server_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let db = Database::new(name.clone(), entry.path(), Arc::clone(&self.crypto));
            db.load_tables(&entry.path())?;
            fresh.insert(name, Arc::new(db));
        }
        Ok(fresh)
    }

    /// Registers a new, empty database.
    ///
    /// In-memory only: no directory is created until its first
    /// `create_table`.
    ///
    /// # Errors
    ///
    /// Fails if the name is invalid or already taken.
    pub fn create_database(&self, name: &str) -> EngineResult<Arc<Database>> {
        if !valid_identifier(name) {
            return Err(EngineError::invalid_identifier(name));
        }
        let mut databases = self.databases.write();
        if databases.contains_key(name) {
            return Err(EngineError::database_exists(name));
        }
        let db = Arc::new(Database::new(
            name.to_string(),
            self.config.server_dir.join(name),
            Arc::clone(&self.crypto),
        ));
        databases.insert(name.to_string(), Arc::clone(&db));
        info!(db = name, "created database");
        Ok(db)
    }

    /// Returns a sorted snapshot of the current database names.
    #[must_use]
    pub fn list_databases(&self) -> Vec<String> {
        let databases = self.databases.read();
        let mut names: Vec<String> = databases.keys().cloned().collect();
        names.sort();
        names
    }

    /// Looks up a database by name.
    ///
    /// # Errors
    ///
    /// Fails if no database has the name.
    pub fn database(&self, name: &str) -> EngineResult<Arc<Database>> {
        self.databases
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::database_not_found(name))
    }

    /// Writes `backup.zip` containing every table file, with paths
    /// relative to the server directory. Returns the archive path.
    ///
    /// Each table's shared lock is held while its files are copied, so
    /// backups never observe a half-written table.
    ///
    /// # Errors
    ///
    /// Fails if the backup directory or archive cannot be written.
    pub fn backup_databases(&self) -> EngineResult<PathBuf> {
        fs::create_dir_all(&self.config.backup_dir)?;
        let backup_path = self.config.backup_dir.join(BACKUP_FILE);

        let file = File::create(&backup_path)?;
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default();

        let databases = self.databases.read();
        let mut names: Vec<&String> = databases.keys().collect();
        names.sort();
        for name in names {
            databases[name].backup_into(&mut zip, options)?;
        }
        zip.finish()?;

        info!(path = %backup_path.display(), "backup written");
        Ok(backup_path)
    }

    /// Restores every database from `backup.zip`, then reloads the
    /// catalog.
    ///
    /// Runs under the server's exclusive lock; the whole catalog is
    /// replaced, so `Database` and `Table` handles obtained before the
    /// restore are stale afterwards and must be looked up again.
    ///
    /// # Errors
    ///
    /// Fails if the archive is missing or malformed, an entry path
    /// escapes the server directory, or the restored catalog fails to
    /// load.
    pub fn restore_databases(&self) -> EngineResult<()> {
        let mut databases = self.databases.write();

        let backup_path = self.config.backup_dir.join(BACKUP_FILE);
        let file = File::open(&backup_path)?;
        let mut archive = ZipArchive::new(file)?;

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let Some(rel) = entry.enclosed_name() else {
                return Err(EngineError::InvalidBackupEntry {
                    name: entry.name().to_string(),
                });
            };
            let dest = self.config.server_dir.join(rel);

            if entry.is_dir() {
                fs::create_dir_all(&dest)?;
                continue;
            }
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&dest)?;
            io::copy(&mut entry, &mut out)?;
        }

        *databases = self.scan_databases()?;
        info!(count = databases.len(), "restored databases");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbproto_codec::Scalar;
    use dbproto_storage::{EncryptionKey, KEY_SIZE};
    use std::collections::HashMap;
    use tempfile::{tempdir, TempDir};

    fn test_config(root: &TempDir) -> ServerConfig {
        let key = EncryptionKey::from_bytes(&[7u8; KEY_SIZE]).unwrap();
        ServerConfig::new(key)
            .server_dir(root.path().join("databases"))
            .backup_dir(root.path().join("backups"))
    }

    fn row(pairs: &[(&str, Scalar)]) -> crate::table::Row {
        pairs
            .iter()
            .map(|(field, value)| (field.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn initialize_creates_directory_and_lock() {
        let root = tempdir().unwrap();
        let server = Server::new(test_config(&root));
        server.initialize().unwrap();

        assert!(root.path().join("databases").is_dir());
        assert!(root.path().join("databases/LOCK").exists());
    }

    #[test]
    fn second_server_is_locked_out() {
        let root = tempdir().unwrap();
        let server = Server::new(test_config(&root));
        server.initialize().unwrap();

        let second = Server::new(test_config(&root));
        assert!(matches!(
            second.initialize(),
            Err(EngineError::ServerLocked)
        ));
    }

    #[test]
    fn create_database_is_in_memory_until_first_table() {
        let root = tempdir().unwrap();
        let server = Server::new(test_config(&root));
        server.initialize().unwrap();

        let db = server.create_database("app").unwrap();
        assert!(!root.path().join("databases/app").exists());

        db.create_table("users", "id").unwrap();
        assert!(root.path().join("databases/app/users.dat").exists());
    }

    #[test]
    fn duplicate_and_invalid_database_names_fail() {
        let root = tempdir().unwrap();
        let server = Server::new(test_config(&root));
        server.initialize().unwrap();

        server.create_database("app").unwrap();
        assert!(matches!(
            server.create_database("app"),
            Err(EngineError::DatabaseExists { .. })
        ));
        assert!(matches!(
            server.create_database("../escape"),
            Err(EngineError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn reload_after_restart_sees_all_data() {
        let root = tempdir().unwrap();
        {
            let server = Server::new(test_config(&root));
            server.initialize().unwrap();
            let db = server.create_database("app").unwrap();
            let table = db.create_table("users", "id").unwrap();
            for n in 0..20i64 {
                table.insert(row(&[("id", n.into()), ("n", n.into())])).unwrap();
            }
        }

        let server = Server::new(test_config(&root));
        server.initialize().unwrap();
        assert_eq!(server.list_databases(), ["app"]);
        let table = server.database("app").unwrap().table("users").unwrap();
        assert_eq!(table.select_all().unwrap().len(), 20);
        assert_eq!(table.select(7).unwrap()["n"], Scalar::Int(7));
    }

    #[test]
    fn backup_then_restore_reproduces_catalog() {
        let root = tempdir().unwrap();
        let server = Server::new(test_config(&root));
        server.initialize().unwrap();

        let mut expected: HashMap<(String, String), usize> = HashMap::new();
        for db_name in ["alpha", "beta"] {
            let db = server.create_database(db_name).unwrap();
            for table_name in ["users", "events"] {
                let table = db.create_table(table_name, "id").unwrap();
                for n in 0..25i64 {
                    table
                        .insert(row(&[("id", n.into()), ("v", (n * 2).into())]))
                        .unwrap();
                }
                expected.insert((db_name.to_string(), table_name.to_string()), 25);
            }
        }

        let backup_path = server.backup_databases().unwrap();
        assert!(backup_path.exists());

        // Wipe the data directory, keeping only the lock file's dir.
        for db_name in ["alpha", "beta"] {
            fs::remove_dir_all(root.path().join("databases").join(db_name)).unwrap();
        }
        server.load_databases().unwrap();
        assert!(server.list_databases().is_empty());

        server.restore_databases().unwrap();
        assert_eq!(server.list_databases(), ["alpha", "beta"]);
        for ((db_name, table_name), count) in expected {
            let table = server
                .database(&db_name)
                .unwrap()
                .table(&table_name)
                .unwrap();
            let all = table.select_all().unwrap();
            assert_eq!(all.len(), count);
            assert_eq!(table.select(3).unwrap()["v"], Scalar::Int(6));
        }
    }

    #[test]
    fn missing_database_lookup_fails() {
        let root = tempdir().unwrap();
        let server = Server::new(test_config(&root));
        server.initialize().unwrap();

        assert!(matches!(
            server.database("ghost"),
            Err(EngineError::DatabaseNotFound { .. })
        ));
    }
}
