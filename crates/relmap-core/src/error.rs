//! Error types for relmap operations.

use crate::table::MapperId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The primary error type for all relmap operations.
#[derive(Debug)]
pub enum Error {
    /// Relationship declaration or lookup errors
    Relationship(RelationshipError),
    /// A mapper identifier could not be resolved by the locator
    MapperNotFound(MapperId),
    /// Row/column access errors
    Record(RecordError),
    /// Configuration errors
    Config(ConfigError),
    /// Query failure reported by a `Select` collaborator
    Query(String),
    /// Custom error with message
    Custom(String),
}

/// Which existing name a new relationship collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictKind {
    /// Another relationship already uses the name
    Relationship,
    /// The native table has a column with the name
    Column,
}

impl ConflictKind {
    /// Lowercase label used in messages.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::Relationship => "relationship",
            ConflictKind::Column => "column",
        }
    }
}

#[derive(Debug)]
pub struct RelationshipError {
    pub kind: RelationshipErrorKind,
    /// Mapper that owns (or was asked for) the relationship.
    pub mapper: MapperId,
    /// Relationship name.
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipErrorKind {
    /// Name collides with a relationship or a native column
    NameConflict(ConflictKind),
    /// No relationship with that name was declared
    NotFound,
    /// A variant relationship has no type for a discriminator value
    VariantNotFound,
}

#[derive(Debug)]
pub struct RecordError {
    pub kind: RecordErrorKind,
    pub mapper: MapperId,
    pub column: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordErrorKind {
    /// The row has no such column
    UnknownColumn,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// A relationship name collided with an existing relationship or native column.
    pub fn name_conflict(mapper: &MapperId, name: &str, conflict: ConflictKind) -> Self {
        Error::Relationship(RelationshipError {
            kind: RelationshipErrorKind::NameConflict(conflict),
            mapper: mapper.clone(),
            name: name.to_string(),
            message: format!(
                "Relationship name '{}' on {} conflicts with an existing {} name",
                name,
                mapper,
                conflict.as_str()
            ),
        })
    }

    /// A relationship name was never declared on the mapper.
    pub fn relationship_not_found(mapper: &MapperId, name: &str) -> Self {
        Error::Relationship(RelationshipError {
            kind: RelationshipErrorKind::NotFound,
            mapper: mapper.clone(),
            name: name.to_string(),
            message: format!("Relationship '{}' does not exist on {}", name, mapper),
        })
    }

    /// A variant relationship has no foreign mapper for a discriminator value.
    pub fn variant_not_found(mapper: &MapperId, name: &str, detail: impl fmt::Display) -> Self {
        Error::Relationship(RelationshipError {
            kind: RelationshipErrorKind::VariantNotFound,
            mapper: mapper.clone(),
            name: name.to_string(),
            message: format!(
                "Variant relationship '{}' on {} has no type for {}",
                name, mapper, detail
            ),
        })
    }

    /// A row has no column with the given name.
    pub fn unknown_column(mapper: &MapperId, column: &str) -> Self {
        Error::Record(RecordError {
            kind: RecordErrorKind::UnknownColumn,
            mapper: mapper.clone(),
            column: column.to_string(),
        })
    }

    /// A configuration value is invalid.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            message: message.into(),
            source: None,
        })
    }

    /// Is this a relationship name conflict?
    pub fn is_name_conflict(&self) -> bool {
        self.conflict_kind().is_some()
    }

    /// The conflict kind, if this is a name conflict.
    pub fn conflict_kind(&self) -> Option<ConflictKind> {
        match self {
            Error::Relationship(RelationshipError {
                kind: RelationshipErrorKind::NameConflict(conflict),
                ..
            }) => Some(*conflict),
            _ => None,
        }
    }

    /// Is this an unknown relationship name?
    pub fn is_relationship_not_found(&self) -> bool {
        matches!(
            self,
            Error::Relationship(RelationshipError {
                kind: RelationshipErrorKind::NotFound,
                ..
            })
        )
    }

    /// Is this a missing variant type?
    pub fn is_variant_not_found(&self) -> bool {
        matches!(
            self,
            Error::Relationship(RelationshipError {
                kind: RelationshipErrorKind::VariantNotFound,
                ..
            })
        )
    }

    /// The relationship name this error refers to, if any.
    pub fn relationship_name(&self) -> Option<&str> {
        match self {
            Error::Relationship(e) => Some(&e.name),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Relationship(e) => write!(f, "Relationship error: {}", e.message),
            Error::MapperNotFound(id) => write!(f, "Mapper not found: {}", id),
            Error::Record(e) => write!(f, "Record error: {}", e),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Query(msg) => write!(f, "Query error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for RelationshipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RecordErrorKind::UnknownColumn => {
                write!(f, "{} has no column '{}'", self.mapper, self.column)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<RelationshipError> for Error {
    fn from(err: RelationshipError) -> Self {
        Error::Relationship(err)
    }
}

impl From<RecordError> for Error {
    fn from(err: RecordError) -> Self {
        Error::Record(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Custom(format!("Serialization error: {}", err))
    }
}

/// Result type alias for relmap operations.
pub type Result<T> = std::result::Result<T, Error>;
