pub mod document;
pub mod error;
pub mod value;

pub use document::{DocumentChange, DocumentSnapshot, FieldAccessor, document_id};
pub use error::{DenormError, Result, StoreError, StoreResult, TargetQueryFailure};
pub use value::{JsonMap, Value, fields_equal, get_path, is_truthy, set_path, values_equal};
