pub mod config;

use crate::core::{Record, RecordKey, RecordState, Result, StoreError};
use crate::storage::catalog::Catalog;
use crate::storage::collection::Collection;
use crate::storage::registry;
use crate::storage::snapshot::{SnapshotDocument, SnapshotFile};
use config::EncryptionKey;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::{Arc, RwLock};
use tracing::debug;

pub use config::{DEFAULT_SCHEMA_VERSION, StoreConfig, StoreLocation};

/// In-memory image of one store location, shared by every connection open
/// on it.
#[derive(Debug)]
pub(crate) struct StoreData {
    catalog: Catalog,
    collections: HashMap<String, Collection>,
    schema_version: u32,
    encryption: Option<EncryptionKey>,
}

impl StoreData {
    fn empty(schema_version: u32, encryption: Option<EncryptionKey>) -> Self {
        Self {
            catalog: Catalog::new(),
            collections: HashMap::new(),
            schema_version,
            encryption,
        }
    }

    fn from_document(
        document: SnapshotDocument,
        schema_version: u32,
        encryption: Option<EncryptionKey>,
    ) -> Result<Self> {
        // The catalog is not serialized; collections carry their schemas.
        let mut catalog = Catalog::new();
        for collection in document.collections.values() {
            catalog = catalog.with_schema(collection.schema().clone())?;
        }
        Ok(Self {
            catalog,
            collections: document.collections,
            schema_version,
            encryption,
        })
    }
}

/// A connection to a store, confined to the thread that opened it.
///
/// Connections on the same location share their data. Dropping the last
/// connection to an in-memory store discards its contents; file-backed
/// stores write through to their snapshot on every mutation. To reference
/// a record from another thread, capture a
/// [`SafeHandle`](crate::handle::SafeHandle) and move that instead.
#[derive(Debug)]
pub struct Store {
    data: Arc<RwLock<StoreData>>,
    config: StoreConfig,
    // Connections never cross threads; only configs and handles do.
    _thread_confined: PhantomData<*const ()>,
}

impl Store {
    /// Opens a store described by `config`.
    ///
    /// File-backed stores load their snapshot (decrypting it when the
    /// configuration carries a key) or start empty; in-memory stores
    /// attach to the live instance registered under their identifier, or
    /// register a fresh one. Attaching to a live instance re-checks the
    /// schema version and the encryption key against it.
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let (data, attached) =
            registry::attach_or_init(config.location(), || Self::init_data(&config))?;

        if attached {
            let guard = data.read()?;
            if guard.schema_version != config.version() {
                return Err(StoreError::SchemaVersionMismatch {
                    expected: config.version(),
                    found: guard.schema_version,
                });
            }
            match (&guard.encryption, config.encryption()) {
                (Some(_), None) => return Err(StoreError::EncryptionKeyRequired),
                (None, Some(_)) => return Err(StoreError::BadEncryptionKey),
                (Some(held), Some(offered)) if held != offered => {
                    return Err(StoreError::BadEncryptionKey);
                }
                _ => {}
            }
        }

        debug!(
            location = %config.location(),
            attached,
            read_only = config.is_read_only(),
            "store opened"
        );
        Ok(Self {
            data,
            config,
            _thread_confined: PhantomData,
        })
    }

    fn init_data(config: &StoreConfig) -> Result<StoreData> {
        match config.location() {
            StoreLocation::InMemory(id) => {
                if config.is_read_only() {
                    return Err(StoreError::InvalidConfig(format!(
                        "read-only in-memory store '{id}' is not open"
                    )));
                }
                Ok(StoreData::empty(
                    config.version(),
                    config.encryption().cloned(),
                ))
            }
            StoreLocation::File(path) => {
                let snapshot = SnapshotFile::new(path.clone());
                if snapshot.exists() {
                    let (document, found) = snapshot.load(config.encryption())?;
                    if found != config.version() {
                        return Err(StoreError::SchemaVersionMismatch {
                            expected: config.version(),
                            found,
                        });
                    }
                    StoreData::from_document(document, found, config.encryption().cloned())
                } else {
                    if config.is_read_only() {
                        return Err(StoreError::Io(format!(
                            "read-only store has no snapshot at {}",
                            path.display()
                        )));
                    }
                    let data =
                        StoreData::empty(config.version(), config.encryption().cloned());
                    // Fresh file stores are stamped at open, not on first write.
                    snapshot.save(
                        &SnapshotDocument::new(data.collections.clone()),
                        data.schema_version,
                        config.encryption(),
                    )?;
                    Ok(data)
                }
            }
        }
    }

    /// The configuration this connection was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Registers `R`'s schema with the store. Idempotent when the schema
    /// is unchanged; a conflicting redefinition fails, as does first-time
    /// registration through a read-only connection.
    pub fn register<R: Record>(&self) -> Result<()> {
        let schema = R::schema();
        schema.validate()?;
        if schema.name() != R::record_type() {
            return Err(StoreError::SchemaViolation(format!(
                "record type '{}' declares a schema named '{}'",
                R::record_type(),
                schema.name()
            )));
        }

        let mut data = self.data.write()?;
        if data.catalog.contains(R::record_type()) {
            let existing = data.catalog.get(R::record_type())?;
            if *existing == schema {
                return Ok(());
            }
            return Err(StoreError::SchemaViolation(format!(
                "record type '{}' is already registered with a different schema",
                R::record_type()
            )));
        }
        if self.config.is_read_only() {
            return Err(StoreError::ReadOnly);
        }

        data.catalog = data.catalog.clone().with_schema(schema.clone())?;
        data.collections
            .insert(R::record_type().to_string(), Collection::new(schema));
        self.persist(&data)?;
        debug!(
            record_type = R::record_type(),
            location = %self.config.location(),
            "record type registered"
        );
        Ok(())
    }

    /// Inserts a new record, failing on a duplicate primary key.
    pub fn insert<R: Record>(&self, record: &R) -> Result<Live<'_, R>> {
        self.reject_read_only()?;
        let state = record.to_state()?;
        {
            let mut data = self.data.write()?;
            let collection = data
                .collections
                .get_mut(R::record_type())
                .ok_or_else(|| StoreError::CollectionNotFound(R::record_type().to_string()))?;
            collection.insert(state.clone())?;
            self.persist(&data)?;
        }
        self.live_from_state(state)
    }

    /// Inserts or replaces by primary key. Requires `R` to declare one.
    pub fn save<R: Record>(&self, record: &R) -> Result<Live<'_, R>> {
        self.reject_read_only()?;
        let state = record.to_state()?;
        {
            let mut data = self.data.write()?;
            let collection = data
                .collections
                .get_mut(R::record_type())
                .ok_or_else(|| StoreError::CollectionNotFound(R::record_type().to_string()))?;
            collection.upsert(state.clone())?;
            self.persist(&data)?;
        }
        self.live_from_state(state)
    }

    /// Fetches the record of type `R` under `key`, if present.
    pub fn get<R: Record>(&self, key: impl Into<RecordKey>) -> Result<Option<Live<'_, R>>> {
        let key = key.into();
        let state = {
            let data = self.data.read()?;
            let collection = data
                .collections
                .get(R::record_type())
                .ok_or_else(|| StoreError::CollectionNotFound(R::record_type().to_string()))?;
            collection.get(&key)?.cloned()
        };
        match state {
            Some(state) => Ok(Some(self.live_from_state(state)?)),
            None => Ok(None),
        }
    }

    /// Deletes by primary key; returns whether a record was removed.
    pub fn delete<R: Record>(&self, key: impl Into<RecordKey>) -> Result<bool> {
        self.reject_read_only()?;
        let key = key.into();
        let mut data = self.data.write()?;
        let collection = data
            .collections
            .get_mut(R::record_type())
            .ok_or_else(|| StoreError::CollectionNotFound(R::record_type().to_string()))?;
        let removed = collection.remove(&key)?;
        if removed {
            self.persist(&data)?;
            debug!(record_type = R::record_type(), key = %key, "record deleted");
        }
        Ok(removed)
    }

    /// Materializes every record of type `R`, in insertion order.
    pub fn scan<R: Record>(&self) -> Result<Vec<R>> {
        let data = self.data.read()?;
        let collection = data
            .collections
            .get(R::record_type())
            .ok_or_else(|| StoreError::CollectionNotFound(R::record_type().to_string()))?;
        collection.scan().map(R::from_state).collect()
    }

    pub fn count<R: Record>(&self) -> Result<usize> {
        let data = self.data.read()?;
        let collection = data
            .collections
            .get(R::record_type())
            .ok_or_else(|| StoreError::CollectionNotFound(R::record_type().to_string()))?;
        Ok(collection.len())
    }

    pub fn contains<R: Record>(&self, key: impl Into<RecordKey>) -> Result<bool> {
        let key = key.into();
        let data = self.data.read()?;
        let collection = data
            .collections
            .get(R::record_type())
            .ok_or_else(|| StoreError::CollectionNotFound(R::record_type().to_string()))?;
        collection.contains(&key)
    }

    /// Names of every record type registered with this store.
    pub fn record_types(&self) -> Result<Vec<String>> {
        let data = self.data.read()?;
        let mut names: Vec<String> =
            data.catalog.names().into_iter().map(String::from).collect();
        names.sort();
        Ok(names)
    }

    /// Persists the current image of a file-backed store. In-memory and
    /// read-only stores have nothing to flush.
    pub fn flush(&self) -> Result<()> {
        let data = self.data.read()?;
        self.persist(&data)
    }

    fn persist(&self, data: &StoreData) -> Result<()> {
        if self.config.is_read_only() {
            return Ok(());
        }
        let StoreLocation::File(path) = self.config.location() else {
            return Ok(());
        };
        let document = SnapshotDocument::new(data.collections.clone());
        SnapshotFile::new(path.clone()).save(
            &document,
            data.schema_version,
            self.config.encryption(),
        )
    }

    fn reject_read_only(&self) -> Result<()> {
        if self.config.is_read_only() {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }

    fn live_from_state<R: Record>(&self, state: RecordState) -> Result<Live<'_, R>> {
        let key = R::schema()
            .primary_key()
            .and_then(|field| state.get(&field.name).cloned())
            .map(RecordKey::from_value);
        let record = R::from_state(&state)?;
        Ok(Live {
            store: self,
            record,
            key,
        })
    }
}

/// A record materialized from a store, bound to the connection that
/// produced it.
///
/// `Live` dereferences to the record itself. Borrowing a thread-confined
/// [`Store`] keeps live records on their thread; [`Live::store`] reaches
/// back to the owning connection, which is how a
/// [`SafeHandle`](crate::handle::SafeHandle) captures the originating
/// configuration.
#[derive(Debug)]
pub struct Live<'s, R: Record> {
    store: &'s Store,
    record: R,
    key: Option<RecordKey>,
}

impl<'s, R: Record> Live<'s, R> {
    /// The connection this record was resolved through.
    pub fn store(&self) -> &'s Store {
        self.store
    }

    /// This record's primary key, when its type declares one.
    pub fn key(&self) -> Option<&RecordKey> {
        self.key.as_ref()
    }

    /// Unwraps the record value.
    pub fn into_record(self) -> R {
        self.record
    }

    /// Re-reads the record's current persisted state.
    pub fn refresh(&mut self) -> Result<()> {
        let key = self.key.clone().ok_or_else(|| StoreError::NoPrimaryKey {
            record_type: R::record_type().to_string(),
        })?;
        match self.store.get::<R>(key.clone())? {
            Some(live) => {
                self.record = live.record;
                Ok(())
            }
            None => Err(StoreError::RecordNotFound {
                record_type: R::record_type().to_string(),
                key,
            }),
        }
    }
}

impl<R: Record> Deref for Live<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.record
    }
}
