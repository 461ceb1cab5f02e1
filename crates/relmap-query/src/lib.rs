//! Eager-load specifications for relmap.
//!
//! - [`With`] is the caller-facing spec (names, nested specs, refinements)
//! - [`EagerPlan`] is its normalized form
//! - [`Select`] is the nested loader contract relationships drive
//! - [`Key`] is a join key tuple

pub mod key;
pub mod select;
pub mod with;

pub use key::Key;
pub use select::Select;
pub use with::{EagerPlan, Refinement, With, WithEntry};
