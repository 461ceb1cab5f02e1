//! Related-fields holder for loaded records.
//!
//! Every record carries a [`Related`] holder shaped by its mapper's declared
//! relationships: one slot per relationship name, in declaration order. A
//! slot starts as [`RelatedValue::Null`] and is filled by stitching or by
//! the caller before a save.
//!
//! Reads never fail for a declared name: a single-valued slot that was not
//! loaded reads as `None`, a collection-valued one as an empty slice.

use crate::record::{RecordRef, WeakRecordRef};
use std::collections::HashMap;
use std::sync::Arc;

/// The ordered set of relationship names a holder is shaped from.
///
/// Built once per mapper and shared by every holder it creates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelatedFields {
    names: Vec<String>,
    name_to_index: HashMap<String, usize>,
}

impl RelatedFields {
    /// Create an empty template.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a name. Returns `false` if the name was already present.
    pub fn push(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.name_to_index.contains_key(&name) {
            return false;
        }
        self.name_to_index.insert(name.clone(), self.names.len());
        self.names.push(name);
        true
    }

    /// Get the index of a name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Check if a name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    /// All names in declaration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for RelatedFields {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut fields = Self::new();
        for name in iter {
            fields.push(name);
        }
        fields
    }
}

/// Value of one related slot.
#[derive(Debug, Clone, Default)]
pub enum RelatedValue {
    /// Not loaded, or loaded and absent (single-valued).
    #[default]
    Null,
    /// A single related record.
    One(RecordRef),
    /// An ordered collection of related records.
    Many(Vec<RecordRef>),
    /// Back-reference to the record that owns this one through a
    /// bidirectional relationship. Held weakly so the pair can be freed.
    Inverse(WeakRecordRef),
}

impl RelatedValue {
    /// Check if the slot is still the null placeholder.
    pub fn is_null(&self) -> bool {
        matches!(self, RelatedValue::Null)
    }

    /// The single related record, if any.
    ///
    /// An `Inverse` slot is upgraded; a dropped back-reference reads as `None`.
    pub fn as_one(&self) -> Option<RecordRef> {
        match self {
            RelatedValue::One(record) => Some(record.clone()),
            RelatedValue::Inverse(weak) => weak.upgrade(),
            _ => None,
        }
    }

    /// The owned related records as a slice.
    ///
    /// `Null` and `Inverse` read as empty and `One` as a one-element slice.
    pub fn as_many(&self) -> &[RecordRef] {
        match self {
            RelatedValue::Null | RelatedValue::Inverse(_) => &[],
            RelatedValue::One(record) => std::slice::from_ref(record),
            RelatedValue::Many(records) => records,
        }
    }

    /// Every record held in this slot.
    pub fn records(&self) -> impl Iterator<Item = &RecordRef> {
        self.as_many().iter()
    }
}

/// Shaped holder of related records for one native record.
#[derive(Debug, Clone, Default)]
pub struct Related {
    fields: Arc<RelatedFields>,
    values: Vec<RelatedValue>,
}

impl Related {
    /// Create a holder with one `Null` slot per field.
    pub fn new(fields: Arc<RelatedFields>) -> Self {
        let values = vec![RelatedValue::Null; fields.len()];
        Self { fields, values }
    }

    /// Get the shared field template.
    pub fn fields(&self) -> Arc<RelatedFields> {
        Arc::clone(&self.fields)
    }

    /// Check if the holder has a slot with this name.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains(name)
    }

    /// Get a slot by name.
    pub fn get(&self, name: &str) -> Option<&RelatedValue> {
        self.fields.index_of(name).map(|i| &self.values[i])
    }

    /// Get a mutable slot by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut RelatedValue> {
        self.fields.index_of(name).map(|i| &mut self.values[i])
    }

    /// Replace a slot value.
    ///
    /// Returns `false` (and changes nothing) if the name is not a slot.
    pub fn set(&mut self, name: &str, value: RelatedValue) -> bool {
        match self.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// The single record in a slot, if the slot holds one.
    pub fn one(&self, name: &str) -> Option<RecordRef> {
        self.get(name).and_then(RelatedValue::as_one)
    }

    /// The records in a slot; empty for a `Null` or unknown slot.
    pub fn many(&self, name: &str) -> &[RecordRef] {
        self.get(name).map_or(&[], RelatedValue::as_many)
    }

    /// Turn a `Null` slot into an empty collection.
    ///
    /// Used for collection-valued relationships so reads see an empty
    /// sequence rather than a placeholder.
    pub fn default_many(&mut self, name: &str) {
        if let Some(slot) = self.get_mut(name) {
            if slot.is_null() {
                *slot = RelatedValue::Many(Vec::new());
            }
        }
    }

    /// Iterate over `(name, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RelatedValue)> {
        self.fields
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
