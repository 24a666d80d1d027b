pub mod error;
pub mod key;
pub mod record;
pub mod value;

pub use error::{Result, StoreError};
pub use key::{KeyType, RecordKey};
pub use record::{FieldDef, Record, RecordSchema, RecordState};
pub use value::{FieldType, Value};
