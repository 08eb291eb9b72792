//! Error types for the storage crate.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while reading or writing a table file.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid key size.
    #[error("invalid key size: expected {expected} bytes, got {actual}")]
    InvalidKeySize {
        /// Expected size in bytes.
        expected: usize,
        /// Actual size in bytes.
        actual: usize,
    },

    /// Ciphertext shorter than one cipher block.
    #[error("ciphertext too short: {len} bytes, need at least {min}")]
    CiphertextTooShort {
        /// Length of the rejected ciphertext.
        len: usize,
        /// Minimum acceptable length.
        min: usize,
    },

    /// Cipher initialization failed.
    #[error("cipher error: {message}")]
    Cipher {
        /// Description of the cipher failure.
        message: String,
    },

    /// Invalid base64 framing in a table file.
    #[error("invalid base64 framing: {message}")]
    Base64 {
        /// Description of the framing failure.
        message: String,
    },
}

impl StorageError {
    /// Creates an invalid key size error.
    pub fn invalid_key_size(actual: usize, expected: usize) -> Self {
        Self::InvalidKeySize { expected, actual }
    }

    /// Creates a cipher error.
    pub fn cipher(message: impl Into<String>) -> Self {
        Self::Cipher {
            message: message.into(),
        }
    }

    /// Creates a base64 framing error.
    pub fn base64(message: impl Into<String>) -> Self {
        Self::Base64 {
            message: message.into(),
        }
    }
}
