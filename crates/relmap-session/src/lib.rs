//! Per-operation record tracking for relmap.
//!
//! A [`Tracker`] is the visited set of one cascading persist. Each record is
//! attached at most once per operation, which both dedupes records reachable
//! through several relationships and stops cycles (bidirectional pairs,
//! self references) from recursing forever.

pub mod tracker;

pub use tracker::Tracker;
