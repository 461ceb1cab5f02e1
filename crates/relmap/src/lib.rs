//! relmap - relationships for data mappers.
//!
//! A mapper declares named relationships to other mappers once, when it is
//! constructed. relmap then:
//!
//! - rejects names that collide with another relationship or a native column
//! - files each relationship into a before-native or after-native bucket
//! - normalizes eager-load specs (`With`) and stitches related records into
//!   batches of loaded records with one select per key chunk
//! - cascades saves through related records in dependency order, visiting
//!   each record at most once per operation
//!
//! SQL generation and the single-row write stay with the mapper; relmap
//! reaches them through the [`Mapper`], [`MapperLocator`] and [`Select`]
//! traits.
//!
//! # Quick Start
//!
//! ```ignore
//! use relmap::prelude::*;
//!
//! let registry = Arc::new(MapperRegistry::new());
//! registry.register_table("Post", TableInfo::new("posts", ["id", "author_id"], ["id"]));
//! registry.register_table("Author", TableInfo::new("authors", ["id", "name"], ["id"]));
//!
//! let relationships = MapperRelationships::define(registry.clone(), "Post", |rels| {
//!     rels.many_to_one("author", "Author", &[("author_id", "id")])?;
//!     Ok(())
//! })?;
//!
//! // Load posts, then their authors in one select.
//! relationships.stitch_into_records(&posts, &With::from("author"))?;
//!
//! // Save a post; its author is written first.
//! let tracker = relmap::save(post_mapper.as_ref(), &post)?;
//! ```

pub mod config;
pub mod mapper;
pub mod relationship;
pub mod relationships;
mod save;

pub use config::RelationshipsConfig;
pub use mapper::{Mapper, MapperLocator, MapperRegistry};
pub use relationship::{
    JoinColumns, ManyToOne, ManyToOneVariant, OneToMany, OneToOne, OneToOneBidi,
    PersistPriority, Relationship, RelationshipKind, VariantType,
};
pub use relationships::{MapperRelationships, RelationshipsBuilder};
pub use save::save;

pub use relmap_core::{
    ConflictKind, Error, MapperId, Record, RecordIdentity, RecordRef, Related, RelatedValue,
    RelationshipErrorKind, Result, Row, TableInfo, Value, WeakRecordRef,
};
pub use relmap_query::{EagerPlan, Key, Refinement, Select, With, WithEntry};
pub use relmap_session::Tracker;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        Error, Key, Mapper, MapperId, MapperLocator, MapperRegistry, MapperRelationships,
        Record, RecordRef, Refinement, RelatedValue, Relationship, RelationshipKind,
        RelationshipsConfig, Result, Row, Select, TableInfo, Tracker, Value, With, save,
    };
}
