//! Mapper identifiers and table metadata.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identifier of a mapper (one per mapped entity type).
///
/// Cheap to clone; relationships store the ids of the mappers they connect
/// and resolve them through a locator when they need the mapper itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapperId(Arc<str>);

impl MapperId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MapperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MapperId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for MapperId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl From<&MapperId> for MapperId {
    fn from(id: &MapperId) -> Self {
        id.clone()
    }
}

/// Column metadata for the table behind a mapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Table name.
    pub name: String,
    /// Column names, in table order.
    pub columns: Vec<String>,
    /// Primary key column name(s).
    pub primary_key: Vec<String>,
}

impl TableInfo {
    /// Create table metadata from a name, its columns and its primary key.
    pub fn new<C, P>(name: impl Into<String>, columns: C, primary_key: P) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            primary_key: primary_key.into_iter().map(Into::into).collect(),
        }
    }

    /// Check if the table has a column with this name.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}
