//! Thread-transportable record handles.

use crate::core::{Record, RecordKey, Result, StoreError};
use crate::store::{Live, Store, StoreConfig};
use std::fmt;
use std::marker::PhantomData;

/// An immutable, thread-safe reference to one record: the record's type
/// name, its primary key, and the configuration of the store that owns it.
///
/// A store connection and the records resolved through it are confined to
/// one thread. A `SafeHandle` is the value that may leave: it captures
/// identity rather than state, and can later be resolved back into a live
/// record on whichever thread asks, through a store opened right there.
///
/// # Examples
///
/// ```
/// use threadstore::{Record, SafeHandle, Store, StoreConfig};
///
/// #[derive(Record)]
/// struct User {
///     #[record(primary_key)]
///     id: i64,
///     name: String,
/// }
///
/// # fn main() -> threadstore::Result<()> {
/// let store = Store::open(StoreConfig::in_memory("handle-docs"))?;
/// store.register::<User>()?;
/// let alice = store.insert(&User { id: 7, name: "Alice".into() })?;
///
/// let handle = SafeHandle::new(&alice)?;
/// let worker = std::thread::spawn(move || -> threadstore::Result<String> {
///     Ok(handle.resolve()?.name)
/// });
/// assert_eq!(worker.join().unwrap()?, "Alice");
/// # Ok(())
/// # }
/// ```
pub struct SafeHandle<T> {
    record_type: String,
    key: RecordKey,
    config: StoreConfig,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> SafeHandle<T> {
    /// Captures a handle from a live record.
    ///
    /// Copies the record's type name, its primary key, and the owning
    /// store's configuration. Fails with [`StoreError::NoPrimaryKey`] when
    /// `T` declares no primary key; such records have no identity a handle
    /// could carry.
    pub fn new(live: &Live<'_, T>) -> Result<Self> {
        let key = live.key().cloned().ok_or_else(|| StoreError::NoPrimaryKey {
            record_type: T::record_type().to_string(),
        })?;
        Ok(Self {
            record_type: T::record_type().to_string(),
            key,
            config: live.store().config().clone(),
            _record: PhantomData,
        })
    }

    /// Resolves the handle into the record's current persisted state.
    ///
    /// Opens a store from the held configuration on the calling thread
    /// (attaching to the live shared instance when one is open) and looks
    /// the record up by key. A record deleted since the handle was
    /// captured surfaces as [`StoreError::RecordNotFound`]. Resolution has
    /// no side effects beyond opening the store.
    pub fn resolve(&self) -> Result<T> {
        let store = self.store()?;
        let live = self.resolve_in(&store)?;
        Ok(live.into_record())
    }

    /// Resolves against an already-open store connection.
    ///
    /// The connection must be open on the location this handle was
    /// captured from; anything else is a [`StoreError::StoreMismatch`].
    pub fn resolve_in<'s>(&self, store: &'s Store) -> Result<Live<'s, T>> {
        if store.config().location() != self.config.location() {
            return Err(StoreError::StoreMismatch {
                expected: self.config.location().to_string(),
                found: store.config().location().to_string(),
            });
        }
        store
            .get::<T>(self.key.clone())?
            .ok_or_else(|| StoreError::RecordNotFound {
                record_type: self.record_type.clone(),
                key: self.key.clone(),
            })
    }

    /// Opens a store connection from the held configuration.
    ///
    /// A connection is opened anew on every call and never cached, which
    /// is what keeps the accessor safe from any thread.
    pub fn store(&self) -> Result<Store> {
        Store::open(self.config.clone())
    }

    /// Schema name of the record this handle points at.
    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// The captured primary key.
    pub fn key(&self) -> &RecordKey {
        &self.key
    }

    /// The captured store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

impl<T> Clone for SafeHandle<T> {
    fn clone(&self) -> Self {
        Self {
            record_type: self.record_type.clone(),
            key: self.key.clone(),
            config: self.config.clone(),
            _record: PhantomData,
        }
    }
}

impl<T> fmt::Debug for SafeHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SafeHandle")
            .field("record_type", &self.record_type)
            .field("key", &self.key)
            .field("config", &self.config)
            .finish()
    }
}

/// Handles compare by primary key alone: equal iff the key kinds match
/// and the values are equal under that kind. Record type and store
/// configuration do not participate. Keys of an unsupported kind never
/// compare equal, not even to themselves.
impl<T, U> PartialEq<SafeHandle<U>> for SafeHandle<T> {
    fn eq(&self, other: &SafeHandle<U>) -> bool {
        self.key == other.key
    }
}
