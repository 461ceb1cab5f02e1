//! Many-to-one: the foreign key lives on the native row.

use super::join::{Join, JoinColumns};
use super::require_slot;
use crate::config::RelationshipsConfig;
use relmap_core::{MapperId, RecordRef, RelatedValue, Result};
use relmap_query::Refinement;
use relmap_session::Tracker;

/// A native record referencing at most one foreign record.
///
/// Default join: every foreign primary-key column, same name on the native
/// row.
#[derive(Debug)]
pub struct ManyToOne {
    name: String,
    join: Join,
}

impl ManyToOne {
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
            let value = lookup
                .matches(index)
                .first()
                .map_or(RelatedValue::Null, |foreign| {
                    RelatedValue::One(foreign.clone())
                });
            record.set_related(&self.name, value)?;
        }
        Ok(())
    }

    /// Copy the loaded foreign record's key into the native foreign-key
    /// columns.
    pub fn fix_native_record(&self, record: &RecordRef) -> Result<()> {
        if let Some(foreign) = record.related_value(&self.name)?.as_one() {
            self.join.copy_foreign_key(&self.name, record, &foreign)?;
        }
        Ok(())
    }

    pub fn fix_foreign_record(&self, record: &RecordRef) -> Result<()> {
        require_slot(record, &self.name)
    }

    /// Persist the referenced foreign record, if loaded.
    pub fn persist_foreign(&self, record: &RecordRef, tracker: &mut Tracker) -> Result<()> {
        match record.related_value(&self.name)?.as_one() {
            Some(foreign) => self.join.cascade(&self.name, &foreign, tracker),
            None => Ok(()),
        }
    }
}
