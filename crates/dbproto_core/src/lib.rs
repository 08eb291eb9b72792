//! # dbproto Core
//!
//! Core engine for dbproto: an embeddable, file-backed, encrypted
//! table store with secondary indexes, per-table transactions, a
//! selectivity-driven query executor, and two-table joins.
//!
//! The object graph mirrors the on-disk layout:
//!
//! - [`Server`] - catalog of databases under one directory, with zip
//!   backup/restore
//! - [`Database`] - catalog of tables, one subdirectory per database
//! - [`Table`] - records, indexes, cache, and metrics over one
//!   encrypted file
//! - [`Transaction`] - snapshot-and-rollback around table mutations
//!
//! ## Example
//!
//! ```no_run
//! use dbproto_core::{Row, Scalar, Server, ServerConfig};
//! use dbproto_storage::EncryptionKey;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let key = EncryptionKey::from_bytes(&[0u8; 32])?;
//! let server = Server::new(ServerConfig::new(key));
//! server.initialize()?;
//!
//! let db = server.create_database("app")?;
//! let users = db.create_table("users", "id")?;
//!
//! let mut row = Row::new();
//! row.insert("id".to_string(), Scalar::Int(1));
//! row.insert("name".to_string(), Scalar::from("Ada"));
//! users.insert(row)?;
//!
//! assert_eq!(users.select(1)?["name"], Scalar::from("Ada"));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod database;
mod error;
mod join;
mod metrics;
mod query;
mod server;
mod table;
mod transaction;

pub use config::ServerConfig;
pub use database::Database;
pub use error::{EngineError, EngineResult};
pub use join::{join_tables, JoinType};
pub use metrics::{MetricsSnapshot, TableMetrics};
pub use query::{ExecutionPlan, Query};
pub use server::Server;
pub use table::{Row, Table};
pub use transaction::Transaction;

// Re-exported so callers need only this crate for everyday use.
pub use dbproto_codec::{Record, Scalar, Value};
pub use dbproto_storage::{CryptoManager, EncryptionKey};

/// Engine version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
