//! Directory-backed document store with schema'd fields, unique
//! constraints and exact-match lookup.

mod lock;
mod page;
mod storage;
mod types;

pub use storage::{DocStore, StorageError, DEFAULT_LOCK_TIMEOUT};
pub use types::{DocId, Document, FieldType, Hit, Schema, Value};
