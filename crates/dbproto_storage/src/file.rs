//! Atomic read/write of one encrypted table file.
//!
//! On disk a table file holds `base64( IV || AES-CTR(payload) )`. A
//! missing or zero-byte file reads as an empty payload. Writes go
//! through a sibling `.tmp` file that is fsynced and renamed into
//! place, so a crash mid-write leaves the previous contents intact.

use crate::crypto::CryptoManager;
use crate::error::{StorageError, StorageResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One encrypted table file.
///
/// `TableFile` owns no locking; callers serialize access (the table's
/// lock in the engine).
#[derive(Debug)]
pub struct TableFile {
    path: PathBuf,
    crypto: Arc<CryptoManager>,
}

impl TableFile {
    /// Creates a handle for the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, crypto: Arc<CryptoManager>) -> Self {
        Self {
            path: path.into(),
            crypto,
        }
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensures the file exists, creating an empty one if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its parent directory cannot be
    /// created.
    pub fn create_if_missing(&self) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        Ok(())
    }

    /// Reads and decrypts the file contents.
    ///
    /// A missing or zero-byte file yields an empty payload.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, invalid base64 framing, or a
    /// ciphertext shorter than one cipher block.
    pub fn read(&self) -> StorageResult<Vec<u8>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let framed = data.trim_ascii();
        if framed.is_empty() {
            return Ok(Vec::new());
        }

        let ciphertext = BASE64
            .decode(framed)
            .map_err(|err| StorageError::base64(err.to_string()))?;
        self.crypto.decrypt(&ciphertext)
    }

    /// Encrypts and writes the payload, replacing the file atomically.
    ///
    /// # Errors
    ///
    /// Returns an error on encryption or I/O failure. On failure the
    /// previous file contents are untouched.
    pub fn write(&self, payload: &[u8]) -> StorageResult<()> {
        let ciphertext = self.crypto.encrypt(payload)?;
        let framed = BASE64.encode(ciphertext);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("dat.tmp");
        let mut file = File::create(&tmp)?;
        file.write_all(framed.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, &self.path)?;
        if let Some(parent) = self.path.parent() {
            sync_dir(parent)?;
        }

        Ok(())
    }
}

/// Fsyncs a directory so a rename within it is durable.
#[cfg(unix)]
fn sync_dir(path: &Path) -> StorageResult<()> {
    let dir = File::open(path)?;
    dir.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_path: &Path) -> StorageResult<()> {
    // Windows NTFS journaling covers metadata durability; directory
    // fsync is not supported there.
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::EncryptionKey;
    use tempfile::tempdir;

    fn table_file(path: &Path) -> TableFile {
        let key = EncryptionKey::from_bytes(&[7u8; 32]).unwrap();
        TableFile::new(path, Arc::new(CryptoManager::new(key)))
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        let file = table_file(&dir.path().join("users.dat"));

        assert!(file.read().unwrap().is_empty());
    }

    #[test]
    fn empty_file_reads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.dat");
        fs::write(&path, b"").unwrap();

        assert!(table_file(&path).read().unwrap().is_empty());
    }

    #[test]
    fn write_read_roundtrip() {
        let dir = tempdir().unwrap();
        let file = table_file(&dir.path().join("users.dat"));

        file.write(b"payload bytes").unwrap();
        assert_eq!(file.read().unwrap(), b"payload bytes");
    }

    #[test]
    fn file_contents_are_base64() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.dat");
        let file = table_file(&path);

        file.write(b"secret").unwrap();
        let on_disk = fs::read_to_string(&path).unwrap();
        assert!(BASE64.decode(on_disk.trim()).is_ok());
        assert!(!on_disk.contains("secret"));
    }

    #[test]
    fn rewrites_replace_previous_contents() {
        let dir = tempdir().unwrap();
        let file = table_file(&dir.path().join("users.dat"));

        file.write(b"first").unwrap();
        file.write(b"second").unwrap();
        assert_eq!(file.read().unwrap(), b"second");
        assert!(!file.path().with_extension("dat.tmp").exists());
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.dat");
        fs::write(&path, b"!!! not base64 !!!").unwrap();

        assert!(matches!(
            table_file(&path).read(),
            Err(StorageError::Base64 { .. })
        ));
    }

    #[test]
    fn short_ciphertext_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.dat");
        fs::write(&path, BASE64.encode([1u8, 2, 3])).unwrap();

        assert!(matches!(
            table_file(&path).read(),
            Err(StorageError::CiphertextTooShort { .. })
        ));
    }

    #[test]
    fn create_if_missing_makes_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db").join("users.dat");
        let file = table_file(&path);

        file.create_if_missing().unwrap();
        assert!(path.exists());
        assert!(file.read().unwrap().is_empty());
    }
}
