//! Relationship kinds.
//!
//! Every kind offers the same four operations:
//!
//! - `stitch_into_records`: load the foreign side for a batch of native
//!   records and fill their related slots
//! - `fix_native_record`: default the slot and copy foreign keys into the
//!   native row (many-to-one kinds)
//! - `fix_foreign_record`: default the slot and copy the native key into
//!   the foreign rows (one-to-* kinds)
//! - `persist_foreign`: cascade a save to the loaded foreign records
//!
//! [`Relationship`] is the closed set of kinds a mapper can declare.

mod join;
mod many_to_one;
mod many_to_one_variant;
mod one_to_many;
mod one_to_one;
mod one_to_one_bidi;

pub(crate) use join::{Join, KeySide};
pub use join::JoinColumns;
pub use many_to_one::ManyToOne;
pub use many_to_one_variant::{ManyToOneVariant, VariantType};
pub use one_to_many::OneToMany;
pub use one_to_one::OneToOne;
pub use one_to_one_bidi::OneToOneBidi;

use crate::config::RelationshipsConfig;
use relmap_core::{Error, MapperId, RecordRef, Result};
use relmap_query::Refinement;
use relmap_session::Tracker;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    OneToOne,
    OneToOneBidi,
    OneToMany,
    ManyToOne,
    ManyToOneVariant,
}

impl RelationshipKind {
    /// When the foreign side is persisted relative to the native row.
    ///
    /// Decided by kind alone: an explicit join mapping never moves a
    /// relationship between buckets.
    pub const fn priority(self) -> PersistPriority {
        match self {
            RelationshipKind::ManyToOne | RelationshipKind::ManyToOneVariant => {
                PersistPriority::BeforeNative
            }
            RelationshipKind::OneToOne
            | RelationshipKind::OneToOneBidi
            | RelationshipKind::OneToMany => PersistPriority::AfterNative,
        }
    }

    /// Check if the slot holds a collection.
    pub const fn is_collection(self) -> bool {
        matches!(self, RelationshipKind::OneToMany)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            RelationshipKind::OneToOne => "one_to_one",
            RelationshipKind::OneToOneBidi => "one_to_one_bidi",
            RelationshipKind::OneToMany => "one_to_many",
            RelationshipKind::ManyToOne => "many_to_one",
            RelationshipKind::ManyToOneVariant => "many_to_one_variant",
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistence bucket of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistPriority {
    /// The foreign key lives on the native row; persist the foreign record
    /// first.
    BeforeNative,
    /// The foreign key lives on the foreign row; persist the foreign record
    /// once the native key exists.
    AfterNative,
}

/// A declared relationship.
#[derive(Debug)]
pub enum Relationship {
    OneToOne(OneToOne),
    OneToOneBidi(OneToOneBidi),
    OneToMany(OneToMany),
    ManyToOne(ManyToOne),
    ManyToOneVariant(ManyToOneVariant),
}

impl Relationship {
    pub fn name(&self) -> &str {
        match self {
            Relationship::OneToOne(r) => r.name(),
            Relationship::OneToOneBidi(r) => r.name(),
            Relationship::OneToMany(r) => r.name(),
            Relationship::ManyToOne(r) => r.name(),
            Relationship::ManyToOneVariant(r) => r.name(),
        }
    }

    pub fn kind(&self) -> RelationshipKind {
        match self {
            Relationship::OneToOne(_) => RelationshipKind::OneToOne,
            Relationship::OneToOneBidi(_) => RelationshipKind::OneToOneBidi,
            Relationship::OneToMany(_) => RelationshipKind::OneToMany,
            Relationship::ManyToOne(_) => RelationshipKind::ManyToOne,
            Relationship::ManyToOneVariant(_) => RelationshipKind::ManyToOneVariant,
        }
    }

    pub fn priority(&self) -> PersistPriority {
        self.kind().priority()
    }

    /// The fixed foreign mapper; `None` for a variant relationship.
    pub fn foreign_mapper(&self) -> Option<&MapperId> {
        match self {
            Relationship::OneToOne(r) => Some(r.foreign_mapper()),
            Relationship::OneToOneBidi(r) => Some(r.foreign_mapper()),
            Relationship::OneToMany(r) => Some(r.foreign_mapper()),
            Relationship::ManyToOne(r) => Some(r.foreign_mapper()),
            Relationship::ManyToOneVariant(_) => None,
        }
    }

    #[tracing::instrument(
        level = "debug",
        skip(self, records, refinement, config),
        fields(relationship = %self.name(), kind = %self.kind(), records = records.len())
    )]
    pub fn stitch_into_records(
        &self,
        records: &[RecordRef],
        refinement: Option<&Refinement>,
        config: &RelationshipsConfig,
    ) -> Result<()> {
        match self {
            Relationship::OneToOne(r) => r.stitch_into_records(records, refinement, config),
            Relationship::OneToOneBidi(r) => r.stitch_into_records(records, refinement, config),
            Relationship::OneToMany(r) => r.stitch_into_records(records, refinement, config),
            Relationship::ManyToOne(r) => r.stitch_into_records(records, refinement, config),
            Relationship::ManyToOneVariant(r) => {
                r.stitch_into_records(records, refinement, config)
            }
        }
    }

    pub fn fix_native_record(&self, record: &RecordRef) -> Result<()> {
        match self {
            Relationship::OneToOne(r) => r.fix_native_record(record),
            Relationship::OneToOneBidi(r) => r.fix_native_record(record),
            Relationship::OneToMany(r) => r.fix_native_record(record),
            Relationship::ManyToOne(r) => r.fix_native_record(record),
            Relationship::ManyToOneVariant(r) => r.fix_native_record(record),
        }
    }

    pub fn fix_foreign_record(&self, record: &RecordRef) -> Result<()> {
        match self {
            Relationship::OneToOne(r) => r.fix_foreign_record(record),
            Relationship::OneToOneBidi(r) => r.fix_foreign_record(record),
            Relationship::OneToMany(r) => r.fix_foreign_record(record),
            Relationship::ManyToOne(r) => r.fix_foreign_record(record),
            Relationship::ManyToOneVariant(r) => r.fix_foreign_record(record),
        }
    }

    pub fn persist_foreign(&self, record: &RecordRef, tracker: &mut Tracker) -> Result<()> {
        match self {
            Relationship::OneToOne(r) => r.persist_foreign(record, tracker),
            Relationship::OneToOneBidi(r) => r.persist_foreign(record, tracker),
            Relationship::OneToMany(r) => r.persist_foreign(record, tracker),
            Relationship::ManyToOne(r) => r.persist_foreign(record, tracker),
            Relationship::ManyToOneVariant(r) => r.persist_foreign(record, tracker),
        }
    }
}

/// Fail unless the record's holder has a slot for `name`.
fn require_slot(record: &RecordRef, name: &str) -> Result<()> {
    let record = record.read();
    if record.related().contains(name) {
        Ok(())
    } else {
        Err(Error::relationship_not_found(record.mapper(), name))
    }
}

/// Turn an unset collection slot into an empty collection.
fn default_many(record: &RecordRef, name: &str) -> Result<()> {
    let mut record = record.write();
    if !record.related().contains(name) {
        return Err(Error::relationship_not_found(record.mapper(), name));
    }
    record.related_mut().default_many(name);
    Ok(())
}
