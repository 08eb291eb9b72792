//! # dbproto Storage
//!
//! Encrypted file storage for dbproto tables.
//!
//! This crate is the lowest layer of the engine: it knows how to turn a
//! byte payload into an encrypted file and back, and nothing about the
//! record format inside the payload.
//!
//! ## Layout
//!
//! - [`CryptoManager`] - AES-256-CTR with a random per-write IV carried
//!   as the leading 16 bytes of the ciphertext
//! - [`TableFile`] - base64 framing plus atomic write-then-rename
//!   replacement of one table file
//!
//! ## Example
//!
//! ```no_run
//! use dbproto_storage::{CryptoManager, EncryptionKey, TableFile};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let key = EncryptionKey::from_bytes(&[0u8; 32]).unwrap();
//! let crypto = Arc::new(CryptoManager::new(key));
//! let file = TableFile::new(Path::new("users.dat"), crypto);
//! file.write(b"payload").unwrap();
//! assert_eq!(file.read().unwrap(), b"payload");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod crypto;
mod error;
mod file;

pub use crypto::{CryptoManager, EncryptionKey, IV_SIZE, KEY_SIZE};
pub use error::{StorageError, StorageResult};
pub use file::TableFile;
