//! Encryption implementation using AES-256-CTR.
//!
//! The stored layout is `IV (16 bytes) || CTR keystream XOR plaintext`.
//! CTR mode provides confidentiality only; there is no authentication
//! tag, so a corrupted ciphertext decrypts to garbage rather than an
//! error. Every encryption draws a fresh random IV.

use crate::error::{StorageError, StorageResult};
use aes::cipher::{KeyIvInit, StreamCipher};
use aes::Aes256;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of the CTR initialization vector (one AES block).
pub const IV_SIZE: usize = 16;

/// Encryption key for AES-256-CTR.
///
/// The key is automatically zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Generates a new random encryption key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> StorageResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(StorageError::invalid_key_size(bytes.len(), KEY_SIZE));
        }

        let mut key_bytes = [0u8; KEY_SIZE];
        key_bytes.copy_from_slice(bytes);
        Ok(Self { bytes: key_bytes })
    }

    /// Returns the key as a byte slice.
    ///
    /// # Security
    ///
    /// Be careful with this method - don't log or serialize the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Manages encryption and decryption of table payloads.
pub struct CryptoManager {
    key: EncryptionKey,
}

impl CryptoManager {
    /// Creates a new crypto manager with the given key.
    #[must_use]
    pub fn new(key: EncryptionKey) -> Self {
        Self { key }
    }

    /// Encrypts data, prepending a fresh random IV.
    ///
    /// # Errors
    ///
    /// Returns an error if the cipher cannot be initialized.
    pub fn encrypt(&self, plaintext: &[u8]) -> StorageResult<Vec<u8>> {
        let mut iv = [0u8; IV_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);

        let mut out = Vec::with_capacity(IV_SIZE + plaintext.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(plaintext);

        let mut cipher = Aes256Ctr::new_from_slices(self.key.as_bytes(), &iv)
            .map_err(|err| StorageError::cipher(err.to_string()))?;
        cipher.apply_keystream(&mut out[IV_SIZE..]);

        Ok(out)
    }

    /// Decrypts data that was encrypted with [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// Returns an error if the ciphertext is shorter than one AES block.
    pub fn decrypt(&self, ciphertext: &[u8]) -> StorageResult<Vec<u8>> {
        if ciphertext.len() < IV_SIZE {
            return Err(StorageError::CiphertextTooShort {
                len: ciphertext.len(),
                min: IV_SIZE,
            });
        }

        let (iv, body) = ciphertext.split_at(IV_SIZE);
        let mut out = body.to_vec();

        let mut cipher = Aes256Ctr::new_from_slices(self.key.as_bytes(), iv)
            .map_err(|err| StorageError::cipher(err.to_string()))?;
        cipher.apply_keystream(&mut out);

        Ok(out)
    }
}

impl std::fmt::Debug for CryptoManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoManager")
            .field("cipher", &"Aes256Ctr")
            .finish()
    }
}
