//! Server configuration.
//!
//! The engine never reads the environment on its own: construct a
//! [`ServerConfig`] (usually via [`ServerConfig::from_env`] at the
//! process edge) and hand it to `Server::new`.

use crate::error::{EngineError, EngineResult};
use dbproto_storage::{EncryptionKey, KEY_SIZE};
use std::env;
use std::path::PathBuf;

/// Environment variable holding the AES key.
const KEY_VAR: &str = "AES_KEY";
/// Fallback environment variable for the AES key.
const MASTER_KEY_VAR: &str = "MASTER_AES_KEY";

/// Configuration for a [`Server`](crate::Server).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Key every table file is encrypted under.
    pub key: EncryptionKey,

    /// Directory holding one subdirectory per database.
    pub server_dir: PathBuf,

    /// Directory holding `backup.zip`.
    pub backup_dir: PathBuf,
}

impl ServerConfig {
    /// Creates a configuration with the default on-disk layout:
    /// `<home>/DBPROTO/databases` and `<home>/DBPROTO_backups/backups`.
    #[must_use]
    pub fn new(key: EncryptionKey) -> Self {
        let base = default_base_dir();
        Self {
            key,
            server_dir: base.join("DBPROTO").join("databases"),
            backup_dir: base.join("DBPROTO_backups").join("backups"),
        }
    }

    /// Reads the key from `AES_KEY` (or `MASTER_AES_KEY`).
    ///
    /// # Errors
    ///
    /// Returns a configuration error if neither variable is set or the
    /// value is not exactly 32 bytes.
    pub fn from_env() -> EngineResult<Self> {
        let raw = env::var(KEY_VAR)
            .or_else(|_| env::var(MASTER_KEY_VAR))
            .map_err(|_| {
                EngineError::config(format!("{KEY_VAR} (or {MASTER_KEY_VAR}) is not set"))
            })?;
        if raw.len() != KEY_SIZE {
            return Err(EngineError::config(format!(
                "AES key must be exactly {KEY_SIZE} bytes, got {}",
                raw.len()
            )));
        }
        let key = EncryptionKey::from_bytes(raw.as_bytes())?;
        Ok(Self::new(key))
    }

    /// Overrides the server directory.
    #[must_use]
    pub fn server_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.server_dir = dir.into();
        self
    }

    /// Overrides the backup directory.
    #[must_use]
    pub fn backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = dir.into();
        self
    }
}

/// Resolves the per-OS base directory for the default layout.
#[cfg(windows)]
fn default_base_dir() -> PathBuf {
    env::var_os("APPDATA")
        .or_else(|| env::var_os("USERPROFILE"))
        .map_or_else(|| PathBuf::from("."), PathBuf::from)
}

/// Resolves the per-OS base directory for the default layout.
#[cfg(not(windows))]
fn default_base_dir() -> PathBuf {
    env::var_os("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from)
}
