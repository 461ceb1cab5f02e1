//! One-to-many: the foreign key lives on every foreign row.

use super::default_many;
use super::join::{Join, JoinColumns};
use crate::config::RelationshipsConfig;
use relmap_core::{MapperId, RecordRef, RelatedValue, Result};
use relmap_query::Refinement;
use relmap_session::Tracker;

/// A native record owning a collection of foreign records.
///
/// Default join: every native primary-key column, same name on the foreign
/// rows. The slot is always a collection once loaded or fixed; a record
/// with no matches holds an empty one.
#[derive(Debug)]
pub struct OneToMany {
    name: String,
    join: Join,
}

impl OneToMany {
    pub(crate) fn new(name: impl Into<String>, join: Join) -> Self {
        Self {
            name: name.into(),
            join,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn native_mapper(&self) -> &MapperId {
        self.join.native_mapper()
    }

    pub fn foreign_mapper(&self) -> &MapperId {
        self.join.foreign_mapper()
    }

    /// Join columns, resolving the default if none were given.
    pub fn on(&self) -> Result<&JoinColumns> {
        self.join.columns(&self.name)
    }

    pub fn stitch_into_records(
        &self,
        records: &[RecordRef],
        refinement: Option<&Refinement>,
        config: &RelationshipsConfig,
    ) -> Result<()> {
        let lookup = self.join.lookup(&self.name, records, refinement, config)?;
        for (index, record) in records.iter().enumerate() {
            let value = RelatedValue::Many(lookup.matches(index).to_vec());
            record.set_related(&self.name, value)?;
        }
        Ok(())
    }

    pub fn fix_native_record(&self, record: &RecordRef) -> Result<()> {
        default_many(record, &self.name)
    }

    /// Copy the native key into every loaded foreign record.
    pub fn fix_foreign_record(&self, record: &RecordRef) -> Result<()> {
        default_many(record, &self.name)?;
        let related = record.related_value(&self.name)?;
        for foreign in related.records() {
            self.join.copy_native_key(&self.name, record, foreign)?;
        }
        Ok(())
    }

    /// Persist every loaded foreign record, in collection order.
    pub fn persist_foreign(&self, record: &RecordRef, tracker: &mut Tracker) -> Result<()> {
        let related = record.related_value(&self.name)?;
        for foreign in related.records() {
            self.join.copy_native_key(&self.name, record, foreign)?;
            self.join.cascade(&self.name, foreign, tracker)?;
        }
        Ok(())
    }
}
