//! Core types for relmap.
//!
//! This crate provides the data every other layer speaks:
//!
//! - `Value` and `Row` for native column data
//! - `Record` / `RecordRef` for shared entity instances with a stable identity
//! - `Related` for the per-record holder of loaded associations
//! - `MapperId` / `TableInfo` for mapper metadata
//! - `Error` / `Result` for every fallible operation

pub mod error;
pub mod record;
pub mod related;
pub mod row;
pub mod table;
pub mod value;

pub use error::{
    ConfigError, ConflictKind, Error, RecordError, RecordErrorKind, RelationshipError,
    RelationshipErrorKind, Result,
};
pub use record::{Record, RecordIdentity, RecordRef, WeakRecordRef};
pub use related::{Related, RelatedFields, RelatedValue};
pub use row::{ColumnInfo, Row};
pub use table::{MapperId, TableInfo};
pub use value::Value;
