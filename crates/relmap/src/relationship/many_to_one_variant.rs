//! Polymorphic many-to-one.

use super::join::{Join, KeySide};
use super::many_to_one::ManyToOne;
use super::require_slot;
use crate::config::RelationshipsConfig;
use crate::mapper::MapperLocator;
use relmap_core::{Error, MapperId, RecordRef, RelatedValue, Result, Value};
use relmap_query::Refinement;
use relmap_session::Tracker;
use std::fmt;
use std::sync::Arc;

/// One foreign type of a variant relationship.
#[derive(Debug)]
pub struct VariantType {
    value: Value,
    relationship: ManyToOne,
}

impl VariantType {
    /// Discriminator value that selects this type.
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn foreign_mapper(&self) -> &MapperId {
        self.relationship.foreign_mapper()
    }

    /// The many-to-one used for records of this type.
    pub fn relationship(&self) -> &ManyToOne {
        &self.relationship
    }
}

/// A many-to-one whose foreign mapper is chosen per record by a
/// discriminator column on the native row.
pub struct ManyToOneVariant {
    name: String,
    native: MapperId,
    locator: Arc<dyn MapperLocator>,
    reference_column: String,
    types: Vec<VariantType>,
}

impl fmt::Debug for ManyToOneVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManyToOneVariant")
            .field("name", &self.name)
            .field("native", &self.native)
            .field("reference_column", &self.reference_column)
            .field("types", &self.types)
            .finish_non_exhaustive()
    }
}

impl ManyToOneVariant {
    pub(crate) fn new(
        name: impl Into<String>,
        native: MapperId,
        locator: Arc<dyn MapperLocator>,
        reference_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            native,
            locator,
            reference_column: reference_column.into(),
            types: Vec::new(),
        }
    }

    /// Declare the foreign mapper for one discriminator value.
    ///
    /// Declaring a value again replaces its type.
    pub fn variant(
        &mut self,
        value: impl Into<Value>,
        foreign: impl Into<MapperId>,
        on: &[(&str, &str)],
    ) -> &mut Self {
        let value = value.into();
        let join = Join::new(
            Arc::clone(&self.locator),
            self.native.clone(),
            foreign.into(),
            on,
            KeySide::Foreign,
        );
        let ty = VariantType {
            value,
            relationship: ManyToOne::new(self.name.clone(), join),
        };
        tracing::trace!(
            relationship = %self.name,
            value = %ty.value,
            foreign = %ty.foreign_mapper(),
            "Declared variant type"
        );
        match self.types.iter_mut().find(|t| t.value.key_eq(&ty.value)) {
            Some(existing) => *existing = ty,
            None => self.types.push(ty),
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn native_mapper(&self) -> &MapperId {
        &self.native
    }

    /// Native column holding the discriminator value.
    pub fn reference_column(&self) -> &str {
        &self.reference_column
    }

    pub fn types(&self) -> &[VariantType] {
        &self.types
    }

    /// The type selected by a discriminator value.
    pub fn type_for_value(&self, value: &Value) -> Result<&VariantType> {
        self.position_for_value(value).map(|index| &self.types[index])
    }

    fn position_for_value(&self, value: &Value) -> Result<usize> {
        self.types
            .iter()
            .position(|t| t.value.key_eq(value))
            .ok_or_else(|| {
                Error::variant_not_found(
                    &self.native,
                    &self.name,
                    format_args!("{} = {}", self.reference_column, value),
                )
            })
    }

    /// The type whose foreign mapper is `mapper`.
    pub fn type_for_mapper(&self, mapper: &MapperId) -> Result<&VariantType> {
        self.types
            .iter()
            .find(|t| t.foreign_mapper() == mapper)
            .ok_or_else(|| {
                Error::variant_not_found(
                    &self.native,
                    &self.name,
                    format_args!("foreign mapper {}", mapper),
                )
            })
    }

    /// Group the batch by discriminator and stitch each group through its
    /// type. Records with a NULL discriminator get a `Null` slot.
    ///
    /// Every discriminator is checked before any lookup runs.
    pub fn stitch_into_records(
        &self,
        records: &[RecordRef],
        refinement: Option<&Refinement>,
        config: &RelationshipsConfig,
    ) -> Result<()> {
        let mut groups: Vec<(usize, Vec<RecordRef>)> = Vec::new();
        let mut untyped = Vec::new();

        for record in records {
            let value = record.get(&self.reference_column)?;
            if value.is_null() {
                untyped.push(record);
                continue;
            }
            let index = self.position_for_value(&value)?;
            match groups.iter_mut().find(|(i, _)| *i == index) {
                Some((_, group)) => group.push(record.clone()),
                None => groups.push((index, vec![record.clone()])),
            }
        }

        tracing::debug!(
            relationship = %self.name,
            groups = groups.len(),
            untyped = untyped.len(),
            "Grouped variant batch"
        );

        for record in untyped {
            record.set_related(&self.name, RelatedValue::Null)?;
        }
        for (index, group) in groups {
            self.types[index]
                .relationship
                .stitch_into_records(&group, refinement, config)?;
        }
        Ok(())
    }

    /// Write the discriminator and key of the loaded foreign record into
    /// the native row.
    pub fn fix_native_record(&self, record: &RecordRef) -> Result<()> {
        let Some(foreign) = record.related_value(&self.name)?.as_one() else {
            return Ok(());
        };
        let ty = self.type_for_mapper(&foreign.mapper())?;
        record.set(&self.reference_column, ty.value.clone())?;
        ty.relationship.fix_native_record(record)
    }

    pub fn fix_foreign_record(&self, record: &RecordRef) -> Result<()> {
        require_slot(record, &self.name)
    }

    /// Persist the referenced record through the mapper of its own type.
    pub fn persist_foreign(&self, record: &RecordRef, tracker: &mut Tracker) -> Result<()> {
        let Some(foreign) = record.related_value(&self.name)?.as_one() else {
            return Ok(());
        };
        let ty = self.type_for_mapper(&foreign.mapper())?;
        ty.relationship.persist_foreign(record, tracker)
    }
}
