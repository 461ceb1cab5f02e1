//! Mapper collaborator traits and the default locator.
//!
//! Relationships never reach for a global: every foreign mapper and table
//! is resolved through the [`MapperLocator`] handed to
//! [`MapperRelationships::define`](crate::MapperRelationships::define).

use crate::relationships::MapperRelationships;
use relmap_core::{Error, MapperId, Record, RecordRef, Result, Row, TableInfo};
use relmap_query::Select;
use relmap_session::Tracker;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// A data mapper for one entity type.
pub trait Mapper: Send + Sync {
    /// Identifier this mapper is registered under.
    fn id(&self) -> &MapperId;

    /// Table metadata of the mapped entity.
    fn table(&self) -> &TableInfo;

    /// Relationships declared for the mapped entity.
    fn relationships(&self) -> &MapperRelationships;

    /// Start a new select over this mapper's records.
    fn select(&self) -> Result<Box<dyn Select>>;

    /// Persist one record and cascade to its related records.
    ///
    /// The record is already attached to `tracker`. Implementations run
    /// [`MapperRelationships::persist_with`] (or the two persistence phases)
    /// around their own row write.
    fn persist(&self, record: &RecordRef, tracker: &mut Tracker) -> Result<()>;

    /// Build a record of this mapper with an empty related holder.
    fn new_record(&self, row: Row) -> RecordRef {
        RecordRef::new(Record::new(
            self.id().clone(),
            row,
            self.relationships().new_related(),
        ))
    }
}

/// Resolves mapper ids to tables and mappers.
pub trait MapperLocator: Send + Sync {
    /// Table metadata for `id`.
    fn table(&self, id: &MapperId) -> Result<Arc<TableInfo>>;

    /// The mapper registered for `id`.
    fn mapper(&self, id: &MapperId) -> Result<Arc<dyn Mapper>>;
}

/// In-process [`MapperLocator`].
///
/// Tables are registered first so relationships can be defined against
/// them; mappers are registered once constructed.
#[derive(Default)]
pub struct MapperRegistry {
    tables: RwLock<HashMap<MapperId, Arc<TableInfo>>>,
    mappers: RwLock<HashMap<MapperId, Arc<dyn Mapper>>>,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register table metadata, replacing any previous entry.
    pub fn register_table(&self, id: impl Into<MapperId>, table: TableInfo) {
        let id = id.into();
        tracing::debug!(mapper = %id, table = %table.name, "Registered table");
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(table));
    }

    /// Register a mapper under its own id, replacing any previous entry.
    pub fn register_mapper(&self, mapper: Arc<dyn Mapper>) {
        let id = mapper.id().clone();
        tracing::debug!(mapper = %id, "Registered mapper");
        self.mappers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, mapper);
    }

    /// Number of registered mappers.
    pub fn len(&self) -> usize {
        self.mappers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MapperLocator for MapperRegistry {
    fn table(&self, id: &MapperId) -> Result<Arc<TableInfo>> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| Error::MapperNotFound(id.clone()))
    }

    fn mapper(&self, id: &MapperId) -> Result<Arc<dyn Mapper>> {
        self.mappers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| Error::MapperNotFound(id.clone()))
    }
}

impl std::fmt::Debug for MapperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tables: Vec<MapperId> = self
            .tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        tables.sort();
        f.debug_struct("MapperRegistry")
            .field("tables", &tables)
            .field("mappers", &self.len())
            .finish()
    }
}
