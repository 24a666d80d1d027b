//! An embedded record store with thread-confined connections, plus
//! [`SafeHandle`]: an immutable, `Send + Sync` value that captures a
//! record's identity (type name, primary key, store configuration) so the
//! record can be re-resolved on any thread.
//!
//! A [`Store`] and the [`Live`] records it returns never leave the thread
//! that opened them. To hand a record to another thread, capture a handle
//! and move that instead; resolving it opens (or joins) a store on the
//! calling thread and re-reads the record's current persisted state.
//!
//! # Examples
//!
//! ```
//! use threadstore::{Record, SafeHandle, Store, StoreConfig};
//!
//! #[derive(Record)]
//! struct Task {
//!     #[record(primary_key)]
//!     id: i64,
//!     title: String,
//!     done: bool,
//! }
//!
//! # fn main() -> threadstore::Result<()> {
//! let store = Store::open(StoreConfig::in_memory("lib-docs"))?;
//! store.register::<Task>()?;
//!
//! let task = store.insert(&Task { id: 1, title: "ship it".into(), done: false })?;
//! let handle = SafeHandle::new(&task)?;
//!
//! // The handle crosses threads; the store and live records cannot.
//! let title = std::thread::spawn(move || handle.resolve().map(|t| t.title))
//!     .join()
//!     .expect("worker panicked")?;
//! assert_eq!(title, "ship it");
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod handle;
pub mod storage;
pub mod store;

// Re-export the working surface for convenience
pub use crate::core::{
    FieldDef, FieldType, KeyType, Record, RecordKey, RecordSchema, RecordState, Result,
    StoreError, Value,
};
pub use crate::handle::SafeHandle;
pub use crate::store::config::{
    DEFAULT_SCHEMA_VERSION, EncryptionKey, StoreConfig, StoreLocation,
};
pub use crate::store::{Live, Store};

pub use threadstore_derive::Record;
