//! Eager-load specifications.
//!
//! A [`With`] says which relationships to load alongside a query and how to
//! refine each nested load. It is built from three kinds of entry:
//!
//! - a bare name: load the relationship as is
//! - a name with a nested `With`: load it, then eager-load the nested spec
//!   into the loaded records
//! - a name with a [`Refinement`]: load it, then let the callback adjust the
//!   nested select before it runs
//!
//! [`With::normalize`] turns any such spec into an [`EagerPlan`], the
//! canonical name → optional refinement mapping the stitcher executes.
//!
//! # Example
//!
//! ```
//! use relmap_query::With;
//!
//! let with = With::new()
//!     .name("author")
//!     .nested("comments", With::from(["replies"]))
//!     .path("tags.category");
//!
//! let plan = with.normalize();
//! assert_eq!(plan.names().collect::<Vec<_>>(), vec!["author", "comments", "tags"]);
//! assert!(plan.refinement("author").is_none());
//! assert!(plan.refinement("comments").is_some());
//! ```

use crate::select::Select;
use relmap_core::Result;
use std::fmt;
use std::sync::Arc;

type RefineFn = dyn Fn(&mut dyn Select) -> Result<()> + Send + Sync;

/// A callback that narrows the nested select of one relationship.
///
/// Cloning shares the callback; two refinements are equal only when they
/// share it.
#[derive(Clone)]
pub struct Refinement(Arc<RefineFn>);

impl Refinement {
    /// Wrap a callback.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut dyn Select) -> Result<()> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// A refinement that applies `nested` to the nested select.
    pub fn with(nested: With) -> Self {
        Self::new(move |select| select.with(nested.clone()))
    }

    /// Run the callback against a select.
    pub fn apply(&self, select: &mut dyn Select) -> Result<()> {
        (self.0)(select)
    }

    /// Check if two refinements share the same callback.
    pub fn ptr_eq(&self, other: &Refinement) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Refinement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Refinement(..)")
    }
}

impl PartialEq for Refinement {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

/// One entry of an eager-load specification.
#[derive(Debug, Clone, PartialEq)]
pub enum WithEntry {
    /// Load the relationship with no refinement.
    Name(String),
    /// Load the relationship, then eager-load the nested spec into it.
    Nested(String, With),
    /// Load the relationship through a custom refinement.
    Refine(String, Refinement),
}

impl WithEntry {
    /// The relationship name this entry refers to.
    pub fn name(&self) -> &str {
        match self {
            WithEntry::Name(name) | WithEntry::Nested(name, _) | WithEntry::Refine(name, _) => {
                name
            }
        }
    }

    /// The refinement this entry normalizes to.
    fn refinement(&self) -> Option<Refinement> {
        match self {
            WithEntry::Name(_) => None,
            WithEntry::Nested(_, nested) => Some(Refinement::with(nested.clone())),
            WithEntry::Refine(_, refinement) => Some(refinement.clone()),
        }
    }
}

/// An eager-load specification: an ordered list of [`WithEntry`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct With {
    entries: Vec<WithEntry>,
}

impl With {
    /// Create an empty specification.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bare relationship name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.entries.push(WithEntry::Name(name.into()));
        self
    }

    /// Add a relationship with a nested specification.
    #[must_use]
    pub fn nested(mut self, name: impl Into<String>, nested: impl Into<With>) -> Self {
        self.entries.push(WithEntry::Nested(name.into(), nested.into()));
        self
    }

    /// Add a relationship with a custom refinement callback.
    #[must_use]
    pub fn refine<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut dyn Select) -> Result<()> + Send + Sync + 'static,
    {
        self.refinement(name, Refinement::new(f))
    }

    /// Add a relationship with an existing refinement.
    #[must_use]
    pub fn refinement(mut self, name: impl Into<String>, refinement: Refinement) -> Self {
        self.entries.push(WithEntry::Refine(name.into(), refinement));
        self
    }

    /// Add a dotted relationship path such as `"comments.replies"`.
    ///
    /// Each segment after the first becomes a nested specification of the
    /// previous one. Empty segments are skipped; an empty path adds nothing.
    #[must_use]
    pub fn path(mut self, path: &str) -> Self {
        let parts: Vec<&str> = path
            .split('.')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if let Some(entry) = Self::build_path(&parts) {
            self.entries.push(entry);
        }
        self
    }

    fn build_path(parts: &[&str]) -> Option<WithEntry> {
        let (first, rest) = parts.split_first()?;
        Some(match Self::build_path(rest) {
            None => WithEntry::Name((*first).to_string()),
            Some(nested) => WithEntry::Nested((*first).to_string(), With::from(nested)),
        })
    }

    /// Append an entry.
    pub fn push(&mut self, entry: WithEntry) {
        self.entries.push(entry);
    }

    /// Get the entries in order.
    pub fn entries(&self) -> &[WithEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Normalize into the canonical name → refinement plan.
    ///
    /// A name given more than once keeps its first position and takes the
    /// refinement of its last entry.
    pub fn normalize(&self) -> EagerPlan {
        let mut plan = EagerPlan::default();
        for entry in &self.entries {
            plan.insert(entry.name(), entry.refinement());
        }
        tracing::trace!(
            entries = self.entries.len(),
            planned = plan.len(),
            "Normalized eager spec"
        );
        plan
    }
}

impl From<WithEntry> for With {
    fn from(entry: WithEntry) -> Self {
        Self {
            entries: vec![entry],
        }
    }
}

impl From<&str> for With {
    fn from(name: &str) -> Self {
        With::new().name(name)
    }
}

impl<const N: usize> From<[&str; N]> for With {
    fn from(names: [&str; N]) -> Self {
        names.into_iter().collect()
    }
}

impl From<&[&str]> for With {
    fn from(names: &[&str]) -> Self {
        names.iter().copied().collect()
    }
}

impl From<Vec<&str>> for With {
    fn from(names: Vec<&str>) -> Self {
        names.into_iter().collect()
    }
}

impl<'a> FromIterator<&'a str> for With {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|n| WithEntry::Name(n.to_string()))
                .collect(),
        }
    }
}

impl FromIterator<WithEntry> for With {
    fn from_iter<I: IntoIterator<Item = WithEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Canonical eager-load plan: relationship name → optional refinement, in
/// first-mention order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EagerPlan {
    entries: Vec<(String, Option<Refinement>)>,
}

impl EagerPlan {
    fn insert(&mut self, name: &str, refinement: Option<Refinement>) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = refinement,
            None => self.entries.push((name.to_string(), refinement)),
        }
    }

    /// Check if a relationship is part of the plan.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// The refinement planned for `name`, if any.
    ///
    /// Returns `None` both for unplanned names and for names planned without
    /// a refinement; use [`EagerPlan::contains`] to tell them apart.
    pub fn refinement(&self, name: &str) -> Option<&Refinement> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, r)| r.as_ref())
    }

    /// Planned relationship names, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Iterate over `(name, refinement)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Refinement>)> {
        self.entries.iter().map(|(n, r)| (n.as_str(), r.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Express the plan as a canonical specification of names and
    /// refinements.
    pub fn into_with(self) -> With {
        self.entries
            .into_iter()
            .map(|(name, refinement)| match refinement {
                None => WithEntry::Name(name),
                Some(r) => WithEntry::Refine(name, r),
            })
            .collect()
    }
}
