//! Bidirectional one-to-one.

use super::join::JoinColumns;
use super::one_to_one::OneToOne;
use crate::config::RelationshipsConfig;
use relmap_core::{MapperId, RecordRef, RelatedValue, Result};
use relmap_query::Refinement;
use relmap_session::Tracker;

/// A one-to-one whose foreign record points back at the native record.
///
/// With an inverse name set, loading or fixing the relationship also fills
/// the foreign record's inverse slot with a weak back-reference to the
/// native record.
#[derive(Debug)]
pub struct OneToOneBidi {
    inner: OneToOne,
    inverse: Option<String>,
}

impl OneToOneBidi {
    pub(crate) fn new(inner: OneToOne) -> Self {
        Self {
            inner,
            inverse: None,
        }
    }

    /// Name of the relationship on the foreign mapper that points back.
    pub fn inverse(&mut self, name: impl Into<String>) -> &mut Self {
        self.inverse = Some(name.into());
        self
    }

    pub fn inverse_name(&self) -> Option<&str> {
        self.inverse.as_deref()
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn native_mapper(&self) -> &MapperId {
        self.inner.native_mapper()
    }

    pub fn foreign_mapper(&self) -> &MapperId {
        self.inner.foreign_mapper()
    }

    pub fn on(&self) -> Result<&JoinColumns> {
        self.inner.on()
    }

    pub fn stitch_into_records(
        &self,
        records: &[RecordRef],
        refinement: Option<&Refinement>,
        config: &RelationshipsConfig,
    ) -> Result<()> {
        self.inner.stitch_into_records(records, refinement, config)?;
        for record in records {
            self.link_inverse(record)?;
        }
        Ok(())
    }

    pub fn fix_native_record(&self, record: &RecordRef) -> Result<()> {
        self.inner.fix_native_record(record)
    }

    pub fn fix_foreign_record(&self, record: &RecordRef) -> Result<()> {
        self.inner.fix_foreign_record(record)?;
        self.link_inverse(record)
    }

    pub fn persist_foreign(&self, record: &RecordRef, tracker: &mut Tracker) -> Result<()> {
        self.inner.persist_foreign(record, tracker)
    }

    fn link_inverse(&self, record: &RecordRef) -> Result<()> {
        let Some(inverse) = &self.inverse else {
            return Ok(());
        };
        if let Some(foreign) = record.related_value(self.inner.name())?.as_one() {
            foreign.set_related(inverse, RelatedValue::Inverse(record.downgrade()))?;
        }
        Ok(())
    }
}
