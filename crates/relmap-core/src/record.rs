//! Records and shared record handles.
//!
//! A [`Record`] is one mapped entity: its native row plus its related-fields
//! holder. Records are shared through [`RecordRef`] so the same instance can
//! be reachable from several relationships at once; the allocation behind
//! the handle is the record's identity.

use crate::error::{Error, Result};
use crate::related::{Related, RelatedValue};
use crate::row::Row;
use crate::table::MapperId;
use crate::value::Value;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// A native or foreign entity instance.
#[derive(Debug, Clone)]
pub struct Record {
    mapper: MapperId,
    row: Row,
    related: Related,
}

impl Record {
    /// Create a record owned by `mapper`.
    pub fn new(mapper: MapperId, row: Row, related: Related) -> Self {
        Self {
            mapper,
            row,
            related,
        }
    }

    /// The mapper this record belongs to.
    pub fn mapper(&self) -> &MapperId {
        &self.mapper
    }

    pub fn row(&self) -> &Row {
        &self.row
    }

    pub fn row_mut(&mut self) -> &mut Row {
        &mut self.row
    }

    pub fn related(&self) -> &Related {
        &self.related
    }

    pub fn related_mut(&mut self) -> &mut Related {
        &mut self.related
    }

    /// Get a column value.
    pub fn get(&self, column: &str) -> Result<&Value> {
        self.row
            .get(column)
            .ok_or_else(|| Error::unknown_column(&self.mapper, column))
    }

    /// Set a column value.
    pub fn set(&mut self, column: &str, value: impl Into<Value>) -> Result<()> {
        if self.row.set(column, value.into()) {
            Ok(())
        } else {
            Err(Error::unknown_column(&self.mapper, column))
        }
    }

    /// Get a related slot by relationship name.
    pub fn related_value(&self, name: &str) -> Result<&RelatedValue> {
        self.related
            .get(name)
            .ok_or_else(|| Error::relationship_not_found(&self.mapper, name))
    }

    /// Values of `columns`, in order.
    pub fn values_of(&self, columns: &[String]) -> Result<Vec<Value>> {
        columns.iter().map(|c| self.get(c).cloned()).collect()
    }
}

/// Stable identity token of a shared record.
///
/// Two handles have the same identity exactly when they point at the same
/// allocation. The token is only meaningful while some handle keeps the
/// allocation alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordIdentity(usize);

impl fmt::Display for RecordIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:x}", self.0)
    }
}

/// Shared, mutable handle to a [`Record`].
///
/// Cloning the handle shares the record. Lock poisoning is recovered: a
/// panic in another holder does not make the record unreadable.
#[derive(Clone)]
pub struct RecordRef(Arc<RwLock<Record>>);

impl RecordRef {
    pub fn new(record: Record) -> Self {
        Self(Arc::new(RwLock::new(record)))
    }

    /// Lock the record for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, Record> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the record for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, Record> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// The identity of the record behind this handle.
    pub fn identity(&self) -> RecordIdentity {
        RecordIdentity(Arc::as_ptr(&self.0).cast::<()>().addr())
    }

    /// Check if two handles share the same record.
    pub fn ptr_eq(&self, other: &RecordRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// A weak handle that does not keep the record alive.
    pub fn downgrade(&self) -> WeakRecordRef {
        WeakRecordRef(Arc::downgrade(&self.0))
    }

    /// The mapper the record belongs to.
    pub fn mapper(&self) -> MapperId {
        self.read().mapper().clone()
    }

    /// Get a copy of a column value.
    pub fn get(&self, column: &str) -> Result<Value> {
        self.read().get(column).cloned()
    }

    /// Set a column value.
    pub fn set(&self, column: &str, value: impl Into<Value>) -> Result<()> {
        self.write().set(column, value)
    }

    /// Copy of a related slot.
    pub fn related_value(&self, name: &str) -> Result<RelatedValue> {
        self.read().related_value(name).cloned()
    }

    /// Replace a related slot.
    pub fn set_related(&self, name: &str, value: RelatedValue) -> Result<()> {
        let mut record = self.write();
        if record.related_mut().set(name, value) {
            Ok(())
        } else {
            Err(Error::relationship_not_found(record.mapper(), name))
        }
    }
}

impl fmt::Debug for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RecordRef").field(&self.identity()).finish()
    }
}

/// Non-owning handle to a [`Record`].
///
/// Used for back-references, so a pair of records pointing at each other
/// does not keep itself alive.
#[derive(Clone)]
pub struct WeakRecordRef(Weak<RwLock<Record>>);

impl WeakRecordRef {
    /// A strong handle, if the record is still alive.
    pub fn upgrade(&self) -> Option<RecordRef> {
        self.0.upgrade().map(RecordRef)
    }

    /// Identity of the record this handle was taken from.
    pub fn identity(&self) -> RecordIdentity {
        RecordIdentity(Weak::as_ptr(&self.0).cast::<()>().addr())
    }

    /// Check if the record has been dropped.
    pub fn is_dangling(&self) -> bool {
        self.0.strong_count() == 0
    }
}

impl fmt::Debug for WeakRecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakRecordRef")
            .field(&self.identity())
            .finish()
    }
}

impl From<&RecordRef> for WeakRecordRef {
    fn from(record: &RecordRef) -> Self {
        record.downgrade()
    }
}

impl From<Record> for RecordRef {
    fn from(record: Record) -> Self {
        Self::new(record)
    }
}

/// Serializes the row, then every related slot one level deep.
///
/// Related records contribute their rows only, so cyclic graphs (a bidi
/// pair, a self reference) serialize finitely. No lock is held on this
/// record while related records are read.
impl Serialize for RecordRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let (row, related) = {
            let record = self.read();
            (record.row().clone(), record.related().clone())
        };

        let mut map = serializer.serialize_map(Some(row.len() + related.len()))?;
        for (name, value) in row.iter() {
            map.serialize_entry(name, value)?;
        }
        for (name, value) in related.iter() {
            match value {
                RelatedValue::Null => map.serialize_entry(name, &None::<Row>)?,
                RelatedValue::One(record) => {
                    let foreign = record.read().row().clone();
                    map.serialize_entry(name, &foreign)?;
                }
                RelatedValue::Inverse(weak) => {
                    let foreign = weak.upgrade().map(|r| r.read().row().clone());
                    map.serialize_entry(name, &foreign)?;
                }
                RelatedValue::Many(records) => {
                    let rows: Vec<Row> = records.iter().map(|r| r.read().row().clone()).collect();
                    map.serialize_entry(name, &rows)?;
                }
            }
        }
        map.end()
    }
}
