//! Join keys.

use relmap_core::{RecordRef, Result, Value};
use std::hash::{Hash, Hasher};

/// A tuple of column values identifying one side of a join.
///
/// Equality and hashing follow [`Value::key_eq`], so integer widths compare
/// by value.
#[derive(Debug, Clone)]
pub struct Key(Vec<Value>);

impl Key {
    /// Build a key, or `None` if any component is NULL.
    ///
    /// A NULL component can never match, so such records are left out of
    /// lookups entirely.
    pub fn from_values(values: Vec<Value>) -> Option<Self> {
        if values.is_empty() || values.iter().any(Value::is_null) {
            None
        } else {
            Some(Self(values))
        }
    }

    /// Read the key of `record` from `columns`.
    pub fn of(record: &RecordRef, columns: &[String]) -> Result<Option<Self>> {
        let values = record.read().values_of(columns)?;
        Ok(Self::from_values(values))
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().zip(&other.0).all(|(a, b)| a.key_eq(b))
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for v in &self.0 {
            v.hash_key(state);
        }
    }
}
