//! Relationship layer configuration.

use relmap_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Tuning for stitching and cascading persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipsConfig {
    /// Maximum number of distinct keys sent in one nested select
    pub max_keys_per_select: usize,
    /// Persist related records along with the native record
    pub cascade: bool,
}

impl Default for RelationshipsConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RelationshipsConfig {
    pub const DEFAULT_MAX_KEYS_PER_SELECT: usize = 1000;

    /// Create the default configuration.
    pub const fn new() -> Self {
        Self {
            max_keys_per_select: Self::DEFAULT_MAX_KEYS_PER_SELECT,
            cascade: true,
        }
    }

    /// Set the lookup chunk size.
    pub fn max_keys_per_select(mut self, n: usize) -> Self {
        self.max_keys_per_select = n;
        self
    }

    /// Enable or disable cascading persistence.
    pub fn cascade(mut self, enabled: bool) -> Self {
        self.cascade = enabled;
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_keys_per_select == 0 {
            return Err(Error::config("max_keys_per_select must be at least 1"));
        }
        Ok(())
    }
}
