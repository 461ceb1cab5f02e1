//! Top-level persist entry point.

use crate::mapper::Mapper;
use relmap_core::{RecordRef, Result};
use relmap_session::Tracker;

/// Persist `record` through `mapper`, cascading to its related records.
///
/// Starts a fresh [`Tracker`] with the record attached, so every record the
/// cascade reaches is persisted at most once. Returns the tracker, which
/// lists every record the operation touched in attach order.
#[tracing::instrument(
    level = "debug",
    skip(mapper, record),
    fields(mapper = %mapper.id(), record = %record.identity())
)]
pub fn save(mapper: &dyn Mapper, record: &RecordRef) -> Result<Tracker> {
    let mut tracker = Tracker::new();
    tracker.attach(record);
    mapper.persist(record, &mut tracker)?;
    tracing::debug!(records = tracker.len(), "Save complete");
    Ok(tracker)
}
