//! Error types for the engine.

use std::io;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Storage layer error (crypto, framing, file I/O).
    #[error("storage error: {0}")]
    Storage(#[from] dbproto_storage::StorageError),

    /// Codec error (wire encode/decode, value decode).
    #[error("codec error: {0}")]
    Codec(#[from] dbproto_codec::CodecError),

    /// I/O error outside the storage layer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Backup archive error.
    #[error("backup archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Database not found.
    #[error("database '{name}' not found")]
    DatabaseNotFound {
        /// Name of the database.
        name: String,
    },

    /// Table not found.
    #[error("table '{name}' not found")]
    TableNotFound {
        /// Name of the table.
        name: String,
    },

    /// Record not found.
    #[error("record with key '{key}' not found")]
    RecordNotFound {
        /// The stringified lookup key.
        key: String,
    },

    /// Database already exists.
    #[error("database '{name}' already exists")]
    DatabaseExists {
        /// Name of the database.
        name: String,
    },

    /// Table already exists.
    #[error("table '{name}' already exists")]
    TableExists {
        /// Name of the table.
        name: String,
    },

    /// A record with the same primary key already exists.
    #[error("record with primary key '{key}' already exists")]
    DuplicateKey {
        /// The stringified primary key.
        key: String,
    },

    /// The primary-key field is absent from a record.
    #[error("primary key '{field}' not found in record")]
    PrimaryKeyMissing {
        /// The primary-key field name.
        field: String,
    },

    /// The primary-key value projects to nothing usable.
    #[error("primary key '{field}' is nil or empty")]
    PrimaryKeyEmpty {
        /// The primary-key field name.
        field: String,
    },

    /// An identifier contains characters outside `[A-Za-z0-9_-]`.
    #[error("invalid identifier: '{name}'")]
    InvalidIdentifier {
        /// The rejected identifier.
        name: String,
    },

    /// Table metadata could not be read or written.
    #[error("table metadata error: {message}")]
    Metadata {
        /// Description of the metadata failure.
        message: String,
    },

    /// Missing or malformed configuration.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration failure.
        message: String,
    },

    /// Another process holds the server directory lock.
    #[error("server directory locked: another process has exclusive access")]
    ServerLocked,

    /// A backup entry would be written outside the server directory.
    #[error("backup entry escapes the server directory: {name}")]
    InvalidBackupEntry {
        /// The offending archive entry name.
        name: String,
    },
}

impl EngineError {
    /// Creates a database not found error.
    pub fn database_not_found(name: impl Into<String>) -> Self {
        Self::DatabaseNotFound { name: name.into() }
    }

    /// Creates a table not found error.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Self::TableNotFound { name: name.into() }
    }

    /// Creates a record not found error.
    pub fn record_not_found(key: impl Into<String>) -> Self {
        Self::RecordNotFound { key: key.into() }
    }

    /// Creates a database already exists error.
    pub fn database_exists(name: impl Into<String>) -> Self {
        Self::DatabaseExists { name: name.into() }
    }

    /// Creates a table already exists error.
    pub fn table_exists(name: impl Into<String>) -> Self {
        Self::TableExists { name: name.into() }
    }

    /// Creates a duplicate primary key error.
    pub fn duplicate_key(key: impl Into<String>) -> Self {
        Self::DuplicateKey { key: key.into() }
    }

    /// Creates a missing primary key error.
    pub fn primary_key_missing(field: impl Into<String>) -> Self {
        Self::PrimaryKeyMissing {
            field: field.into(),
        }
    }

    /// Creates a nil-or-empty primary key error.
    pub fn primary_key_empty(field: impl Into<String>) -> Self {
        Self::PrimaryKeyEmpty {
            field: field.into(),
        }
    }

    /// Creates an invalid identifier error.
    pub fn invalid_identifier(name: impl Into<String>) -> Self {
        Self::InvalidIdentifier { name: name.into() }
    }

    /// Creates a table metadata error.
    pub fn metadata(message: impl Into<String>) -> Self {
        Self::Metadata {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
