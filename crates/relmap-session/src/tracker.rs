//! The visited-set tracker used during a cascading persist.
//!
//! Records are keyed by [`RecordIdentity`], never by primary key: a new
//! record has no key yet, and two distinct records with equal columns are
//! still two records to write.
//!
//! The tracker holds a handle to every attached record. An identity is the
//! address of a live allocation, so keeping the handle keeps the identity
//! from being reused by a later allocation within the same operation.

use relmap_core::{RecordIdentity, RecordRef};
use std::collections::HashMap;

/// Records already taken part in the current persist operation.
#[derive(Debug, Default)]
pub struct Tracker {
    seen: HashMap<RecordIdentity, usize>,
    order: Vec<RecordRef>,
}

impl Tracker {
    /// Create an empty tracker for a new operation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a record.
    ///
    /// Returns `true` if the record was not yet attached, `false` if this
    /// operation has already visited it.
    pub fn attach(&mut self, record: &RecordRef) -> bool {
        let identity = record.identity();
        if self.seen.contains_key(&identity) {
            tracing::trace!(%identity, "Record already attached");
            return false;
        }
        self.seen.insert(identity, self.order.len());
        self.order.push(record.clone());
        tracing::trace!(%identity, attached = self.order.len(), "Attached record");
        true
    }

    /// Check if a record has been attached.
    pub fn contains(&self, record: &RecordRef) -> bool {
        self.seen.contains_key(&record.identity())
    }

    /// Position of a record in attach order.
    pub fn position(&self, record: &RecordRef) -> Option<usize> {
        self.seen.get(&record.identity()).copied()
    }

    /// Number of attached records.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Attached records in attach order.
    pub fn iter(&self) -> impl Iterator<Item = &RecordRef> {
        self.order.iter()
    }

    /// Forget every attached record.
    pub fn clear(&mut self) {
        self.seen.clear();
        self.order.clear();
    }
}

impl<'a> IntoIterator for &'a Tracker {
    type Item = &'a RecordRef;
    type IntoIter = std::slice::Iter<'a, RecordRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.order.iter()
    }
}
