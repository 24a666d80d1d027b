use crate::core::key::RecordKey;
use thiserror::Error;

/// Every failure the store surfaces.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record type '{record_type}' declares no primary key")]
    NoPrimaryKey { record_type: String },

    #[error("record '{record_type}' with key {key} not found")]
    RecordNotFound {
        record_type: String,
        key: RecordKey,
    },

    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("record '{record_type}' with key {key} already exists")]
    DuplicateKey {
        record_type: String,
        key: RecordKey,
    },

    #[error("record type '{0}' is not registered in this store")]
    CollectionNotFound(String),

    #[error("store is read-only")]
    ReadOnly,

    #[error("handle belongs to store '{expected}', got '{found}'")]
    StoreMismatch { expected: String, found: String },

    #[error("schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch { expected: u32, found: u32 },

    #[error("store is encrypted and requires a key to open")]
    EncryptionKeyRequired,

    #[error("encryption key rejected: wrong key, or store is not encrypted")]
    BadEncryptionKey,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("corrupt store data: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("lock error: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}
