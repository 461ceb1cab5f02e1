//! Per-mapper relationship registry.
//!
//! [`RelationshipsBuilder`] declares relationships once, checking every new
//! name against the existing relationships and the native columns.
//! [`MapperRelationships`] is the immutable result: it shapes related
//! holders, stitches eager loads into record batches and drives cascading
//! persistence in two phases around the native row write.
//!
//! # Example
//!
//! ```ignore
//! let relationships = MapperRelationships::define(locator, "Post", |rels| {
//!     rels.many_to_one("author", "Author", &[("author_id", "id")])?;
//!     rels.one_to_many("comments", "Comment", &[("id", "post_id")])?;
//!     Ok(())
//! })?;
//!
//! relationships.stitch_into_records(&posts, &With::from(["author", "comments"]))?;
//! ```

use crate::config::RelationshipsConfig;
use crate::mapper::MapperLocator;
use crate::relationship::{
    Join, KeySide, ManyToOne, ManyToOneVariant, OneToMany, OneToOne, OneToOneBidi,
    PersistPriority, Relationship,
};
use relmap_core::{
    ConflictKind, Error, MapperId, RecordRef, Related, RelatedFields, Result, TableInfo,
};
use relmap_query::With;
use relmap_session::Tracker;
use std::fmt;
use std::sync::Arc;

/// Declares the relationships of one mapper.
pub struct RelationshipsBuilder {
    locator: Arc<dyn MapperLocator>,
    native: MapperId,
    table: Arc<TableInfo>,
    relationships: Vec<Relationship>,
    fields: RelatedFields,
    config: RelationshipsConfig,
}

impl RelationshipsBuilder {
    /// Start declaring relationships for `native`.
    ///
    /// The native table must already be known to the locator; its columns
    /// take part in name conflict checks.
    pub fn new(locator: Arc<dyn MapperLocator>, native: impl Into<MapperId>) -> Result<Self> {
        let native = native.into();
        let table = locator.table(&native)?;
        Ok(Self {
            locator,
            native,
            table,
            relationships: Vec::new(),
            fields: RelatedFields::new(),
            config: RelationshipsConfig::default(),
        })
    }

    pub fn native(&self) -> &MapperId {
        &self.native
    }

    /// Check that `name` is free for a new relationship.
    pub fn check_name(&self, name: &str) -> Result<()> {
        if self.fields.contains(name) {
            return Err(Error::name_conflict(
                &self.native,
                name,
                ConflictKind::Relationship,
            ));
        }
        if self.table.has_column(name) {
            return Err(Error::name_conflict(&self.native, name, ConflictKind::Column));
        }
        Ok(())
    }

    /// Set the layer configuration. Validated by [`build`](Self::build).
    pub fn config(&mut self, config: RelationshipsConfig) -> &mut Self {
        self.config = config;
        self
    }

    /// Declare a one-to-one; the foreign row carries the key.
    pub fn one_to_one(
        &mut self,
        name: &str,
        foreign: impl Into<MapperId>,
        on: &[(&str, &str)],
    ) -> Result<&mut OneToOne> {
        self.check_name(name)?;
        let join = self.join(foreign, on, KeySide::Native);
        self.register(Relationship::OneToOne(OneToOne::new(name, join)), |r| match r {
            Relationship::OneToOne(r) => Some(r),
            _ => None,
        })
    }

    /// Declare a bidirectional one-to-one.
    pub fn one_to_one_bidi(
        &mut self,
        name: &str,
        foreign: impl Into<MapperId>,
        on: &[(&str, &str)],
    ) -> Result<&mut OneToOneBidi> {
        self.check_name(name)?;
        let join = self.join(foreign, on, KeySide::Native);
        let relationship = OneToOneBidi::new(OneToOne::new(name, join));
        self.register(Relationship::OneToOneBidi(relationship), |r| match r {
            Relationship::OneToOneBidi(r) => Some(r),
            _ => None,
        })
    }

    /// Declare a one-to-many; every foreign row carries the key.
    pub fn one_to_many(
        &mut self,
        name: &str,
        foreign: impl Into<MapperId>,
        on: &[(&str, &str)],
    ) -> Result<&mut OneToMany> {
        self.check_name(name)?;
        let join = self.join(foreign, on, KeySide::Native);
        self.register(Relationship::OneToMany(OneToMany::new(name, join)), |r| match r {
            Relationship::OneToMany(r) => Some(r),
            _ => None,
        })
    }

    /// Declare a many-to-one; the native row carries the key.
    pub fn many_to_one(
        &mut self,
        name: &str,
        foreign: impl Into<MapperId>,
        on: &[(&str, &str)],
    ) -> Result<&mut ManyToOne> {
        self.check_name(name)?;
        let join = self.join(foreign, on, KeySide::Foreign);
        self.register(Relationship::ManyToOne(ManyToOne::new(name, join)), |r| match r {
            Relationship::ManyToOne(r) => Some(r),
            _ => None,
        })
    }

    /// Declare a polymorphic many-to-one keyed by the discriminator column
    /// `reference_column`. Add its types with
    /// [`ManyToOneVariant::variant`].
    pub fn many_to_one_variant(
        &mut self,
        name: &str,
        reference_column: &str,
    ) -> Result<&mut ManyToOneVariant> {
        self.check_name(name)?;
        let relationship = ManyToOneVariant::new(
            name,
            self.native.clone(),
            Arc::clone(&self.locator),
            reference_column,
        );
        self.register(Relationship::ManyToOneVariant(relationship), |r| match r {
            Relationship::ManyToOneVariant(r) => Some(r),
            _ => None,
        })
    }

    /// Finish the define step.
    pub fn build(self) -> Result<MapperRelationships> {
        self.config.validate()?;

        let mut before_native = Vec::new();
        let mut after_native = Vec::new();
        for (index, relationship) in self.relationships.iter().enumerate() {
            match relationship.priority() {
                PersistPriority::BeforeNative => before_native.push(index),
                PersistPriority::AfterNative => after_native.push(index),
            }
        }

        tracing::debug!(
            mapper = %self.native,
            relationships = self.relationships.len(),
            before_native = before_native.len(),
            after_native = after_native.len(),
            "Defined relationships"
        );

        Ok(MapperRelationships {
            native: self.native,
            relationships: self.relationships,
            fields: Arc::new(self.fields),
            before_native,
            after_native,
            config: self.config,
        })
    }

    fn join(&self, foreign: impl Into<MapperId>, on: &[(&str, &str)], side: KeySide) -> Join {
        Join::new(
            Arc::clone(&self.locator),
            self.native.clone(),
            foreign.into(),
            on,
            side,
        )
    }

    /// Append a declaration and hand back its typed form.
    fn register<T>(
        &mut self,
        relationship: Relationship,
        typed: impl FnOnce(&mut Relationship) -> Option<&mut T>,
    ) -> Result<&mut T> {
        tracing::trace!(
            mapper = %self.native,
            relationship = relationship.name(),
            kind = %relationship.kind(),
            "Registered relationship"
        );
        let name = relationship.name().to_string();
        self.fields.push(relationship.name());
        self.relationships.push(relationship);
        self.relationships
            .last_mut()
            .and_then(typed)
            .ok_or_else(|| {
                Error::config(format!("relationship '{name}' lost its kind on register"))
            })
    }
}

impl fmt::Debug for RelationshipsBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationshipsBuilder")
            .field("native", &self.native)
            .field("fields", &self.fields.names())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// The relationships of one mapper, fixed after the define step.
#[derive(Debug)]
pub struct MapperRelationships {
    native: MapperId,
    relationships: Vec<Relationship>,
    fields: Arc<RelatedFields>,
    before_native: Vec<usize>,
    after_native: Vec<usize>,
    config: RelationshipsConfig,
}

impl MapperRelationships {
    /// Declare the relationships of `native` inside `define`.
    pub fn define<F>(
        locator: Arc<dyn MapperLocator>,
        native: impl Into<MapperId>,
        define: F,
    ) -> Result<Self>
    where
        F: FnOnce(&mut RelationshipsBuilder) -> Result<()>,
    {
        let mut builder = RelationshipsBuilder::new(locator, native)?;
        define(&mut builder)?;
        builder.build()
    }

    /// Start a builder for `native`.
    pub fn builder(
        locator: Arc<dyn MapperLocator>,
        native: impl Into<MapperId>,
    ) -> Result<RelationshipsBuilder> {
        RelationshipsBuilder::new(locator, native)
    }

    /// The owning mapper.
    pub fn native(&self) -> &MapperId {
        &self.native
    }

    pub fn config(&self) -> &RelationshipsConfig {
        &self.config
    }

    /// Look up a relationship by name.
    pub fn get(&self, name: &str) -> Result<&Relationship> {
        self.fields
            .index_of(name)
            .map(|index| &self.relationships[index])
            .ok_or_else(|| Error::relationship_not_found(&self.native, name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains(name)
    }

    /// Relationship names in declaration order.
    pub fn fields(&self) -> &[String] {
        self.fields.names()
    }

    /// Relationships persisted before the native row, in declaration order.
    pub fn before_native(&self) -> impl Iterator<Item = &Relationship> {
        self.before_native.iter().map(|&i| &self.relationships[i])
    }

    /// Relationships persisted after the native row, in declaration order.
    pub fn after_native(&self) -> impl Iterator<Item = &Relationship> {
        self.after_native.iter().map(|&i| &self.relationships[i])
    }

    /// All relationships in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.iter()
    }

    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }

    /// A fresh related holder with one `Null` slot per relationship.
    pub fn new_related(&self) -> Related {
        Related::new(Arc::clone(&self.fields))
    }

    /// Eager-load `with` into a batch of native records.
    ///
    /// Every name is resolved before any relationship runs, so an unknown
    /// name fails without touching the records.
    #[tracing::instrument(
        level = "debug",
        skip(self, records, with),
        fields(mapper = %self.native, records = records.len())
    )]
    pub fn stitch_into_records(&self, records: &[RecordRef], with: &With) -> Result<()> {
        let plan = with.normalize();
        let mut resolved = Vec::with_capacity(plan.len());
        for (name, refinement) in plan.iter() {
            resolved.push((self.get(name)?, refinement));
        }

        if records.is_empty() {
            return Ok(());
        }

        for (relationship, refinement) in resolved {
            tracing::trace!(
                relationship = relationship.name(),
                refined = refinement.is_some(),
                "Dispatching stitch"
            );
            relationship.stitch_into_records(records, refinement, &self.config)?;
        }
        Ok(())
    }

    /// Default every slot and copy loaded foreign keys into the native row.
    pub fn fix_native_record(&self, record: &RecordRef) -> Result<()> {
        for relationship in &self.relationships {
            relationship.fix_native_record(record)?;
        }
        Ok(())
    }

    /// Default every slot and copy the native key into loaded foreign rows.
    pub fn fix_foreign_record(&self, record: &RecordRef) -> Result<()> {
        for relationship in &self.relationships {
            relationship.fix_foreign_record(record)?;
        }
        Ok(())
    }

    /// Persist the related records the native row depends on.
    #[tracing::instrument(
        level = "debug",
        skip(self, record, tracker),
        fields(mapper = %self.native, record = %record.identity())
    )]
    pub fn persist_before_native(&self, record: &RecordRef, tracker: &mut Tracker) -> Result<()> {
        if !self.config.cascade {
            return Ok(());
        }
        for relationship in self.before_native() {
            relationship.persist_foreign(record, tracker)?;
        }
        Ok(())
    }

    /// Persist the related records that depend on the native row.
    #[tracing::instrument(
        level = "debug",
        skip(self, record, tracker),
        fields(mapper = %self.native, record = %record.identity())
    )]
    pub fn persist_after_native(&self, record: &RecordRef, tracker: &mut Tracker) -> Result<()> {
        if !self.config.cascade {
            return Ok(());
        }
        for relationship in self.after_native() {
            relationship.persist_foreign(record, tracker)?;
        }
        Ok(())
    }

    /// Persist `record` with `write_row` between the two cascade phases.
    ///
    /// Order: before-native phase, [`fix_native_record`](Self::fix_native_record),
    /// `write_row`, [`fix_foreign_record`](Self::fix_foreign_record),
    /// after-native phase.
    #[tracing::instrument(
        level = "debug",
        skip(self, record, tracker, write_row),
        fields(mapper = %self.native, record = %record.identity())
    )]
    pub fn persist_with<F>(
        &self,
        record: &RecordRef,
        tracker: &mut Tracker,
        write_row: F,
    ) -> Result<()>
    where
        F: FnOnce(&RecordRef) -> Result<()>,
    {
        self.persist_before_native(record, tracker)?;
        self.fix_native_record(record)?;
        write_row(record)?;
        self.fix_foreign_record(record)?;
        self.persist_after_native(record, tracker)
    }
}
