//! On-disk snapshot format.
//!
//! A snapshot is a small plaintext header followed by an rmp-serde
//! payload:
//!
//! ```text
//! magic (4) | format version (1) | flags (1) | schema version (4, LE)
//! nonce (12, only when the encrypted flag is set) | payload
//! ```
//!
//! Encrypted payloads are sealed with AES-256-GCM. The authentication tag
//! doubles as the key check, so a wrong key and a tampered file are
//! indistinguishable on load.

use crate::core::{Result, StoreError};
use crate::storage::collection::Collection;
use crate::store::config::EncryptionKey;
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use chrono::{DateTime, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const MAGIC: [u8; 4] = *b"TSNP";
const FORMAT_VERSION: u8 = 1;
const FLAG_ENCRYPTED: u8 = 0b0000_0001;
const HEADER_LEN: usize = 10;
const NONCE_LEN: usize = 12;

/// Serialized store image: every collection plus bookkeeping metadata.
#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub collections: HashMap<String, Collection>,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub created_at: DateTime<Utc>,
    pub collection_count: usize,
    pub record_count: usize,
}

impl SnapshotDocument {
    pub fn new(collections: HashMap<String, Collection>) -> Self {
        let collection_count = collections.len();
        let record_count = collections.values().map(Collection::len).sum();
        Self {
            collections,
            metadata: SnapshotMetadata {
                created_at: Utc::now(),
                collection_count,
                record_count,
            },
        }
    }
}

/// Reads and writes the snapshot file of one store location.
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Writes the snapshot atomically: the image lands in a temporary file
    /// next to the target and is renamed over it.
    pub fn save(
        &self,
        document: &SnapshotDocument,
        schema_version: u32,
        key: Option<&EncryptionKey>,
    ) -> Result<()> {
        let payload = rmp_serde::to_vec(document)
            .map_err(|e| StoreError::Io(format!("failed to encode snapshot: {e}")))?;

        let mut flags = 0u8;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        let payload = match key {
            Some(key) => {
                flags |= FLAG_ENCRYPTED;
                OsRng.fill_bytes(&mut nonce_bytes);
                let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
                    .map_err(|_| StoreError::BadEncryptionKey)?;
                cipher
                    .encrypt(Nonce::from_slice(&nonce_bytes), payload.as_slice())
                    .map_err(|_| StoreError::BadEncryptionKey)?
            }
            None => payload,
        };

        let mut out = Vec::with_capacity(HEADER_LEN + NONCE_LEN + payload.len());
        out.extend_from_slice(&MAGIC);
        out.push(FORMAT_VERSION);
        out.push(flags);
        out.extend_from_slice(&schema_version.to_le_bytes());
        if flags & FLAG_ENCRYPTED != 0 {
            out.extend_from_slice(&nonce_bytes);
        }
        out.extend_from_slice(&payload);

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&out)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| StoreError::Io(format!("failed to replace snapshot: {e}")))?;

        debug!(
            path = %self.path.display(),
            bytes = out.len(),
            encrypted = key.is_some(),
            "snapshot saved"
        );
        Ok(())
    }

    /// Loads and decodes the snapshot, returning the document together
    /// with the schema version recorded in the header.
    ///
    /// An encrypted snapshot demands a key (`EncryptionKeyRequired`); a
    /// plaintext one rejects any key offered (`BadEncryptionKey`), since a
    /// configuration carrying a key promises encryption at rest.
    pub fn load(&self, key: Option<&EncryptionKey>) -> Result<(SnapshotDocument, u32)> {
        let bytes = fs::read(&self.path)?;
        if bytes.len() < HEADER_LEN {
            return Err(StoreError::Corrupt(format!(
                "snapshot {} is truncated",
                self.path.display()
            )));
        }
        if bytes[..4] != MAGIC {
            return Err(StoreError::Corrupt(format!(
                "{} is not a store snapshot",
                self.path.display()
            )));
        }
        let format = bytes[4];
        if format != FORMAT_VERSION {
            return Err(StoreError::Corrupt(format!(
                "unsupported snapshot format version {format}"
            )));
        }
        let flags = bytes[5];
        if flags & !FLAG_ENCRYPTED != 0 {
            warn!(path = %self.path.display(), flags, "snapshot carries unknown flag bits");
        }
        let mut version_bytes = [0u8; 4];
        version_bytes.copy_from_slice(&bytes[6..HEADER_LEN]);
        let schema_version = u32::from_le_bytes(version_bytes);

        let payload = if flags & FLAG_ENCRYPTED != 0 {
            let Some(key) = key else {
                return Err(StoreError::EncryptionKeyRequired);
            };
            if bytes.len() < HEADER_LEN + NONCE_LEN {
                return Err(StoreError::Corrupt(format!(
                    "snapshot {} is truncated",
                    self.path.display()
                )));
            }
            let nonce = Nonce::from_slice(&bytes[HEADER_LEN..HEADER_LEN + NONCE_LEN]);
            let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
                .map_err(|_| StoreError::BadEncryptionKey)?;
            cipher
                .decrypt(nonce, &bytes[HEADER_LEN + NONCE_LEN..])
                .map_err(|_| StoreError::BadEncryptionKey)?
        } else {
            if key.is_some() {
                return Err(StoreError::BadEncryptionKey);
            }
            bytes[HEADER_LEN..].to_vec()
        };

        let document: SnapshotDocument = rmp_serde::from_slice(&payload)
            .map_err(|e| StoreError::Corrupt(format!("failed to decode snapshot: {e}")))?;
        debug!(
            path = %self.path.display(),
            collections = document.metadata.collection_count,
            records = document.metadata.record_count,
            "snapshot loaded"
        );
        Ok((document, schema_version))
    }
}
