//! The nested loader contract.

use crate::key::Key;
use crate::with::With;
use relmap_core::{RecordRef, Result};

/// A pending select over one mapper's records.
///
/// Relationships build one per batched lookup: they restrict it to the
/// join keys of the batch, hand it to the caller's refinement (if any), and
/// fetch. How the restriction becomes SQL, and how a nested `with` is
/// stitched into the fetched records, is up to the implementation.
pub trait Select {
    /// Restrict the select to rows whose `columns` match one of `keys`.
    fn where_keys(&mut self, columns: &[String], keys: &[Key]) -> Result<()>;

    /// Eager-load `with` into the records this select fetches.
    fn with(&mut self, with: With) -> Result<()>;

    /// Execute the select.
    fn fetch_records(&mut self) -> Result<Vec<RecordRef>>;
}
