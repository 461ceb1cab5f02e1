//! Join columns and batched foreign lookups shared by every kind.

use crate::config::RelationshipsConfig;
use crate::mapper::{Mapper, MapperLocator};
use relmap_core::{Error, MapperId, RecordRef, Result, Value};
use relmap_query::{Key, Refinement};
use relmap_session::Tracker;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Which table's primary key the default join columns come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeySide {
    /// The native primary key, mirrored on the foreign table.
    Native,
    /// The foreign primary key, mirrored on the native table.
    Foreign,
}

/// Resolved join columns of one relationship.
///
/// `native[i]` joins to `foreign[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinColumns {
    native: Vec<String>,
    foreign: Vec<String>,
}

impl JoinColumns {
    pub fn native(&self) -> &[String] {
        &self.native
    }

    pub fn foreign(&self) -> &[String] {
        &self.foreign
    }

    /// Iterate over `(native, foreign)` column pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.native
            .iter()
            .map(String::as_str)
            .zip(self.foreign.iter().map(String::as_str))
    }
}

pub(crate) struct Join {
    locator: Arc<dyn MapperLocator>,
    native: MapperId,
    foreign: MapperId,
    explicit: Vec<(String, String)>,
    side: KeySide,
    resolved: OnceLock<JoinColumns>,
}

impl Join {
    pub(crate) fn new(
        locator: Arc<dyn MapperLocator>,
        native: MapperId,
        foreign: MapperId,
        on: &[(&str, &str)],
        side: KeySide,
    ) -> Self {
        Self {
            locator,
            native,
            foreign,
            explicit: on
                .iter()
                .map(|(n, f)| ((*n).to_string(), (*f).to_string()))
                .collect(),
            side,
            resolved: OnceLock::new(),
        }
    }

    pub(crate) fn native_mapper(&self) -> &MapperId {
        &self.native
    }

    pub(crate) fn foreign_mapper(&self) -> &MapperId {
        &self.foreign
    }

    /// Join columns, resolving the default on first use.
    ///
    /// An explicit mapping wins. Otherwise every primary-key column of the
    /// key side joins to the same-named column on the other side.
    pub(crate) fn columns(&self, relationship: &str) -> Result<&JoinColumns> {
        if let Some(columns) = self.resolved.get() {
            return Ok(columns);
        }

        let columns = if self.explicit.is_empty() {
            let key_owner = match self.side {
                KeySide::Native => &self.native,
                KeySide::Foreign => &self.foreign,
            };
            let primary_key = self.locator.table(key_owner)?.primary_key.clone();
            if primary_key.is_empty() {
                return Err(Error::config(format!(
                    "Relationship '{}' on {} has no join columns: {} has no primary key",
                    relationship, self.native, key_owner
                )));
            }
            JoinColumns {
                native: primary_key.clone(),
                foreign: primary_key,
            }
        } else {
            JoinColumns {
                native: self.explicit.iter().map(|(n, _)| n.clone()).collect(),
                foreign: self.explicit.iter().map(|(_, f)| f.clone()).collect(),
            }
        };

        tracing::trace!(
            relationship,
            native = ?columns.native,
            foreign = ?columns.foreign,
            "Resolved join columns"
        );
        Ok(self.resolved.get_or_init(|| columns))
    }

    pub(crate) fn foreign(&self) -> Result<Arc<dyn Mapper>> {
        self.locator.mapper(&self.foreign)
    }

    /// Fetch the foreign records matching a batch of native records.
    ///
    /// Distinct native keys are sent in chunks of at most
    /// `max_keys_per_select`, one select per chunk. Records with a NULL key
    /// component take no part in the lookup.
    pub(crate) fn lookup(
        &self,
        relationship: &str,
        records: &[RecordRef],
        refinement: Option<&Refinement>,
        config: &RelationshipsConfig,
    ) -> Result<Lookup> {
        let columns = self.columns(relationship)?;

        let native_keys = records
            .iter()
            .map(|record| Key::of(record, &columns.native))
            .collect::<Result<Vec<_>>>()?;

        let distinct: Vec<Key> = {
            let mut seen = HashSet::new();
            native_keys
                .iter()
                .flatten()
                .filter(|key| seen.insert(*key))
                .cloned()
                .collect()
        };

        let mut lookup = Lookup {
            native_keys,
            matches: HashMap::new(),
        };

        if distinct.is_empty() {
            if !records.is_empty() {
                tracing::warn!(
                    relationship,
                    mapper = %self.native,
                    records = records.len(),
                    "No usable join key in batch; skipping lookup"
                );
            }
            return Ok(lookup);
        }

        let mapper = self.foreign()?;
        let chunk_size = config.max_keys_per_select.max(1);
        let mut selects = 0_usize;
        let mut fetched = 0_usize;

        for chunk in distinct.chunks(chunk_size) {
            let mut select = mapper.select()?;
            select.where_keys(&columns.foreign, chunk)?;
            if let Some(refinement) = refinement {
                refinement.apply(select.as_mut())?;
            }
            let records = select.fetch_records()?;
            selects += 1;
            fetched += records.len();

            for record in records {
                if let Some(key) = Key::of(&record, &columns.foreign)? {
                    lookup.matches.entry(key).or_default().push(record);
                }
            }
        }

        tracing::debug!(
            relationship,
            foreign = %self.foreign,
            keys = distinct.len(),
            selects,
            fetched,
            "Fetched related records"
        );
        Ok(lookup)
    }

    /// Copy the native join values of `native` into the foreign join columns
    /// of `foreign`.
    pub(crate) fn copy_native_key(
        &self,
        relationship: &str,
        native: &RecordRef,
        foreign: &RecordRef,
    ) -> Result<()> {
        let columns = self.columns(relationship)?;
        let values = native.read().values_of(&columns.native)?;
        write_values(foreign, &columns.foreign, values)
    }

    /// Copy the foreign join values of `foreign` into the native join
    /// columns of `native`.
    pub(crate) fn copy_foreign_key(
        &self,
        relationship: &str,
        native: &RecordRef,
        foreign: &RecordRef,
    ) -> Result<()> {
        let columns = self.columns(relationship)?;
        let values = foreign.read().values_of(&columns.foreign)?;
        write_values(native, &columns.native, values)
    }

    /// Attach `foreign` and hand it to the foreign mapper, unless this
    /// operation already visited it.
    pub(crate) fn cascade(
        &self,
        relationship: &str,
        foreign: &RecordRef,
        tracker: &mut Tracker,
    ) -> Result<()> {
        if !tracker.attach(foreign) {
            tracing::debug!(
                relationship,
                record = %foreign.identity(),
                "Skipping already visited record"
            );
            return Ok(());
        }
        tracing::trace!(
            relationship,
            foreign = %self.foreign,
            record = %foreign.identity(),
            "Cascading persist"
        );
        self.foreign()?.persist(foreign, tracker)
    }
}

impl fmt::Debug for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Join")
            .field("native", &self.native)
            .field("foreign", &self.foreign)
            .field("explicit", &self.explicit)
            .field("side", &self.side)
            .field("resolved", &self.resolved.get())
            .finish_non_exhaustive()
    }
}

fn write_values(record: &RecordRef, columns: &[String], values: Vec<Value>) -> Result<()> {
    let mut record = record.write();
    for (column, value) in columns.iter().zip(values) {
        record.set(column, value)?;
    }
    Ok(())
}

/// Result of one batched lookup.
pub(crate) struct Lookup {
    native_keys: Vec<Option<Key>>,
    matches: HashMap<Key, Vec<RecordRef>>,
}

impl Lookup {
    /// Matches for the native record at `index`, in fetch order.
    pub(crate) fn matches(&self, index: usize) -> &[RecordRef] {
        self.native_keys
            .get(index)
            .and_then(Option::as_ref)
            .and_then(|key| self.matches.get(key))
            .map_or(&[], Vec::as_slice)
    }
}
