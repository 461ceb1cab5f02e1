//! In-memory mappers for integration tests.
//!
//! Every mapper shares one [`Store`]: rows are kept per mapper as shared
//! record handles, ids are assigned on first write, and every select and
//! write is appended to an event log the tests assert on.
//!
//! Schema:
//!
//! | Mapper  | Columns                               | Relationships |
//! |---------|---------------------------------------|---------------|
//! | Author  | id, name                              | posts (1:n Post), profile (bidi Profile, inverse author) |
//! | Profile | id, author_id, bio                    | author (n:1 Author) |
//! | Post    | id, author_id, editor_id, title       | author (n:1 Author), comments (1:n Comment), editor (n:1 Author), cover (1:1 Cover) |
//! | Cover   | id, post_id, url                      | |
//! | Comment | id, post_id, body, approved           | post (n:1 Post), replies (1:n Reply) |
//! | Reply   | id, comment_id, body                  | |
//! | Like    | id, likeable_type, likeable_id        | likeable (variant: "post" Post, "comment" Comment) |

#![allow(dead_code)]

use relmap::prelude::*;
use relmap::{RelationshipsBuilder, Related};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// One observable store operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Select {
        mapper: String,
        /// `(columns, key count)` of every key restriction, in call order.
        filters: Vec<(Vec<String>, usize)>,
        /// Relationship names eager-loaded into the result.
        with: Vec<String>,
        fetched: usize,
    },
    Write {
        mapper: String,
        id: i64,
    },
}

#[derive(Default)]
pub struct Store {
    rows: Mutex<HashMap<MapperId, Vec<RecordRef>>>,
    events: Mutex<Vec<Event>>,
    next_id: AtomicI64,
    failing: Mutex<Option<MapperId>>,
}

impl Store {
    fn log(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    fn records(&self, mapper: &MapperId) -> Vec<RecordRef> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(mapper)
            .cloned()
            .unwrap_or_default()
    }

    fn put(&self, mapper: &MapperId, record: &RecordRef) {
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let table = rows.entry(mapper.clone()).or_default();
        if !table.iter().any(|r| r.ptr_eq(record)) {
            table.push(record.clone());
        }
    }

    fn write(&self, mapper: &MapperId, record: &RecordRef) -> Result<()> {
        let failing = self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if failing.as_ref() == Some(mapper) {
            return Err(Error::Custom(format!("write to {} failed", mapper)));
        }

        let id = match record.get("id")?.as_i64() {
            Some(id) => id,
            None => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 100;
                record.set("id", id)?;
                id
            }
        };
        self.put(mapper, record);
        self.log(Event::Write {
            mapper: mapper.to_string(),
            id,
        });
        Ok(())
    }
}

pub struct MemoryMapper {
    id: MapperId,
    table: TableInfo,
    relationships: MapperRelationships,
    store: Arc<Store>,
    registry: Arc<MapperRegistry>,
}

impl Mapper for MemoryMapper {
    fn id(&self) -> &MapperId {
        &self.id
    }

    fn table(&self) -> &TableInfo {
        &self.table
    }

    fn relationships(&self) -> &MapperRelationships {
        &self.relationships
    }

    fn select(&self) -> Result<Box<dyn Select>> {
        Ok(Box::new(MemorySelect {
            mapper: self.id.clone(),
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            filters: Vec::new(),
            with: Vec::new(),
        }))
    }

    fn persist(&self, record: &RecordRef, tracker: &mut Tracker) -> Result<()> {
        self.relationships
            .persist_with(record, tracker, |r| self.store.write(&self.id, r))
    }
}

pub struct MemorySelect {
    mapper: MapperId,
    store: Arc<Store>,
    registry: Arc<MapperRegistry>,
    filters: Vec<(Vec<String>, Vec<Key>)>,
    with: Vec<With>,
}

impl MemorySelect {
    fn matches(&self, record: &RecordRef) -> Result<bool> {
        for (columns, keys) in &self.filters {
            match Key::of(record, columns)? {
                Some(key) if keys.contains(&key) => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }
}

impl Select for MemorySelect {
    fn where_keys(&mut self, columns: &[String], keys: &[Key]) -> Result<()> {
        self.filters.push((columns.to_vec(), keys.to_vec()));
        Ok(())
    }

    fn with(&mut self, with: With) -> Result<()> {
        self.with.push(with);
        Ok(())
    }

    fn fetch_records(&mut self) -> Result<Vec<RecordRef>> {
        let mut fetched = Vec::new();
        for record in self.store.records(&self.mapper) {
            if self.matches(&record)? {
                fetched.push(record);
            }
        }

        self.store.log(Event::Select {
            mapper: self.mapper.to_string(),
            filters: self
                .filters
                .iter()
                .map(|(columns, keys)| (columns.clone(), keys.len()))
                .collect(),
            with: self
                .with
                .iter()
                .flat_map(|w| w.normalize().names().map(String::from).collect::<Vec<_>>())
                .collect(),
            fetched: fetched.len(),
        });

        if !self.with.is_empty() {
            let mapper = self.registry.mapper(&self.mapper)?;
            for with in &self.with {
                mapper
                    .relationships()
                    .stitch_into_records(&fetched, with)?;
            }
        }
        Ok(fetched)
    }
}

/// A registry with the test schema, sharing one store.
pub struct Fixture {
    pub registry: Arc<MapperRegistry>,
    pub store: Arc<Store>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(RelationshipsConfig::default())
    }

    pub fn with_config(config: RelationshipsConfig) -> Self {
        let registry = Arc::new(MapperRegistry::new());
        let store = Arc::new(Store::default());

        registry.register_table("Author", TableInfo::new("authors", ["id", "name"], ["id"]));
        registry.register_table(
            "Profile",
            TableInfo::new("profiles", ["id", "author_id", "bio"], ["id"]),
        );
        registry.register_table(
            "Post",
            TableInfo::new("posts", ["id", "author_id", "editor_id", "title"], ["id"]),
        );
        registry.register_table(
            "Cover",
            TableInfo::new("covers", ["id", "post_id", "url"], ["id"]),
        );
        registry.register_table(
            "Comment",
            TableInfo::new("comments", ["id", "post_id", "body", "approved"], ["id"]),
        );
        registry.register_table(
            "Reply",
            TableInfo::new("replies", ["id", "comment_id", "body"], ["id"]),
        );
        registry.register_table(
            "Like",
            TableInfo::new("likes", ["id", "likeable_type", "likeable_id"], ["id"]),
        );

        let fixture = Self { registry, store };

        fixture.register("Author", config, |rels| {
            rels.one_to_many("posts", "Post", &[("id", "author_id")])?;
            rels.one_to_one_bidi("profile", "Profile", &[("id", "author_id")])?
                .inverse("author");
            Ok(())
        });
        fixture.register("Profile", config, |rels| {
            rels.many_to_one("author", "Author", &[("author_id", "id")])?;
            Ok(())
        });
        fixture.register("Post", config, |rels| {
            rels.many_to_one("author", "Author", &[("author_id", "id")])?;
            rels.one_to_many("comments", "Comment", &[("id", "post_id")])?;
            rels.many_to_one("editor", "Author", &[("editor_id", "id")])?;
            rels.one_to_one("cover", "Cover", &[("id", "post_id")])?;
            Ok(())
        });
        fixture.register("Cover", config, |_| Ok(()));
        fixture.register("Comment", config, |rels| {
            rels.many_to_one("post", "Post", &[("post_id", "id")])?;
            rels.one_to_many("replies", "Reply", &[("id", "comment_id")])?;
            Ok(())
        });
        fixture.register("Reply", config, |_| Ok(()));
        fixture.register("Like", config, |rels| {
            rels.many_to_one_variant("likeable", "likeable_type")?
                .variant("post", "Post", &[("likeable_id", "id")])
                .variant("comment", "Comment", &[("likeable_id", "id")]);
            Ok(())
        });

        fixture
    }

    fn register<F>(&self, id: &str, config: RelationshipsConfig, define: F)
    where
        F: FnOnce(&mut RelationshipsBuilder) -> Result<()>,
    {
        let locator: Arc<dyn MapperLocator> = self.registry.clone();
        let relationships = MapperRelationships::define(locator, id, |rels| {
            rels.config(config);
            define(rels)
        })
        .expect("test schema defines cleanly");
        let table = (*self.registry.table(&MapperId::new(id)).expect("table registered")).clone();

        self.registry.register_mapper(Arc::new(MemoryMapper {
            id: MapperId::new(id),
            table,
            relationships,
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
        }));
    }

    pub fn mapper(&self, id: &str) -> Arc<dyn Mapper> {
        self.registry
            .mapper(&MapperId::new(id))
            .expect("mapper registered")
    }

    /// A new, unsaved record with every column NULL except `values`.
    pub fn record(&self, mapper: &str, values: &[(&str, Value)]) -> RecordRef {
        let mapper = self.mapper(mapper);
        let mut row = Row::new(mapper.table().columns.clone(), Vec::new());
        for (column, value) in values {
            assert!(row.set(column, value.clone()), "unknown column {column}");
        }
        mapper.new_record(row)
    }

    /// A stored record, inserted without logging.
    pub fn insert(&self, mapper: &str, values: &[(&str, Value)]) -> RecordRef {
        let record = self.record(mapper, values);
        self.store.put(&MapperId::new(mapper), &record);
        record
    }

    /// Load every stored record of `mapper` through its select.
    pub fn load_all(&self, mapper: &str) -> Vec<RecordRef> {
        let mut select = self.mapper(mapper).select().expect("select");
        let records = select.fetch_records().expect("fetch");
        self.clear_events();
        records
    }

    pub fn fail_writes_for(&self, mapper: &str) {
        *self
            .store
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(MapperId::new(mapper));
    }

    pub fn events(&self) -> Vec<Event> {
        self.store
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear_events(&self) {
        self.store
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// `(mapper, id)` of every write, in order.
    pub fn writes(&self) -> Vec<(String, i64)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Write { mapper, id } => Some((mapper, id)),
                Event::Select { .. } => None,
            })
            .collect()
    }

    /// Every select event against `mapper`.
    pub fn selects(&self, mapper: &str) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, Event::Select { mapper: m, .. } if m == mapper))
            .collect()
    }
}

/// Read a related slot, panicking on an undeclared name.
pub fn slot(record: &RecordRef, name: &str) -> RelatedValue {
    record
        .related_value(name)
        .unwrap_or_else(|e| panic!("slot {name}: {e}"))
}

/// Identity of the single record in a slot.
pub fn one(record: &RecordRef, name: &str) -> Option<RecordRef> {
    slot(record, name).as_one()
}

/// Snapshot of a record's related holder.
pub fn related(record: &RecordRef) -> Related {
    record.read().related().clone()
}

pub fn int(record: &RecordRef, column: &str) -> Option<i64> {
    record.get(column).expect("column exists").as_i64()
}
