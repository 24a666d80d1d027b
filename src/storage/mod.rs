pub mod catalog;
pub mod collection;
pub(crate) mod registry;
pub mod snapshot;

pub use catalog::Catalog;
pub use collection::Collection;
pub use snapshot::{SnapshotDocument, SnapshotFile, SnapshotMetadata};
