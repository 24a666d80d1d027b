use crate::core::{Result, StoreError};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Schema version stamped on stores whose configuration does not set one.
pub const DEFAULT_SCHEMA_VERSION: u32 = 1;

/// Where a store keeps its data: a snapshot file on disk, or a named
/// in-memory instance shared process-wide by identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreLocation {
    File(PathBuf),
    InMemory(String),
}

impl StoreLocation {
    pub fn is_in_memory(&self) -> bool {
        matches!(self, Self::InMemory(_))
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "file:{}", path.display()),
            Self::InMemory(id) => write!(f, "mem:{id}"),
        }
    }
}

/// A 256-bit key for snapshot encryption at rest.
///
/// `Debug` never prints key material.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    pub const LEN: usize = 32;

    pub fn new(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    /// Builds a key from a slice, rejecting any length other than 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; Self::LEN] = bytes.try_into().map_err(|_| {
            StoreError::InvalidConfig(format!(
                "encryption key must be {} bytes, got {}",
                Self::LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Generates a random key from the operating system's RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; Self::LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(****)")
    }
}

/// Everything needed to open (or re-open) a store from any thread.
///
/// A configuration is inert data: it can be cloned, sent across threads,
/// and serialized. Nothing is opened until it is handed to
/// [`Store::open`](crate::store::Store::open).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    location: StoreLocation,
    encryption_key: Option<EncryptionKey>,
    read_only: bool,
    schema_version: u32,
}

impl StoreConfig {
    /// Configuration for a file-backed store at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: StoreLocation::File(path.into()),
            encryption_key: None,
            read_only: false,
            schema_version: DEFAULT_SCHEMA_VERSION,
        }
    }

    /// Configuration for a shared in-memory store under `id`.
    pub fn in_memory(id: impl Into<String>) -> Self {
        Self {
            location: StoreLocation::InMemory(id.into()),
            encryption_key: None,
            read_only: false,
            schema_version: DEFAULT_SCHEMA_VERSION,
        }
    }

    /// Configuration for a private in-memory store under a random
    /// identifier.
    pub fn in_memory_auto() -> Self {
        Self::in_memory(Uuid::new_v4().to_string())
    }

    /// Encrypt snapshots at rest with `key`.
    pub fn encryption_key(mut self, key: EncryptionKey) -> Self {
        self.encryption_key = Some(key);
        self
    }

    /// Reject every mutation made through stores opened from this
    /// configuration.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Schema version this configuration expects the store to carry.
    pub fn schema_version(mut self, version: u32) -> Self {
        self.schema_version = version;
        self
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    pub fn encryption(&self) -> Option<&EncryptionKey> {
        self.encryption_key.as_ref()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn version(&self) -> u32 {
        self.schema_version
    }

    pub fn validate(&self) -> Result<()> {
        match &self.location {
            StoreLocation::File(path) => {
                if path.as_os_str().is_empty() {
                    return Err(StoreError::InvalidConfig("store file path is empty".into()));
                }
            }
            StoreLocation::InMemory(id) => {
                if id.trim().is_empty() {
                    return Err(StoreError::InvalidConfig(
                        "in-memory store identifier is empty".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::in_memory_auto()
    }
}
