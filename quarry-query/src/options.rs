//! Option sets: the mergeable description of a query's constraints.
//!
//! An [`OptionSet`] is built either programmatically:
//!
//! ```rust
//! use quarry_query::{Filter, OptionSet, OrderByField};
//!
//! let recent = OptionSet::new()
//!     .filter(Filter::equals("published", true))
//!     .order(OrderByField::desc("created_at"))
//!     .limit(10);
//! assert_eq!(recent.limit, Some(10));
//! ```
//!
//! or from a literal JSON description (see [`crate::description`]):
//!
//! ```rust
//! use quarry_query::OptionSet;
//! use serde_json::json;
//!
//! let red = OptionSet::from_description(&json!({ "conditions": { "color": "red" } })).unwrap();
//! assert!(!red.is_empty());
//! ```
//!
//! # Merging
//!
//! [`OptionSet::merge`] never mutates its operands:
//!
//! - conditions are ANDed (both sides keep their own bindings),
//! - includes and joins are unioned in first-seen order,
//! - extensions are unioned by name; a repeated name takes the later
//!   extension and moves to the end,
//! - every scalar clause (select, order, group, having, limit, offset, from,
//!   readonly, lock) is taken from the right-hand side when it sets it.

use indexmap::IndexSet;

use crate::extension::{Extension, ExtensionSet};
use crate::filter::Filter;
use crate::types::{OrderBy, Select};

/// Structured, mergeable query constraints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionSet {
    /// Filter predicate (AND of every merged condition).
    pub filter: Filter,
    /// Associations to eager load, in first-seen order.
    pub includes: IndexSet<String>,
    /// Joins, in first-seen order.
    pub joins: IndexSet<String>,
    /// Projection.
    pub select: Option<Select>,
    /// Ordering.
    pub order: Option<OrderBy>,
    /// Grouping clause.
    pub group: Option<String>,
    /// Condition on grouped rows.
    pub having: Option<Filter>,
    /// Maximum number of rows.
    pub limit: Option<u64>,
    /// Number of rows to skip.
    pub offset: Option<u64>,
    /// Source override for the FROM clause.
    pub from: Option<String>,
    /// Whether loaded records are read-only.
    pub readonly: Option<bool>,
    /// Row lock clause (e.g. `FOR UPDATE`).
    pub lock: Option<String>,
    /// Extensions mixed into queries built from this set.
    pub extensions: ExtensionSet,
}

impl OptionSet {
    /// Create an empty option set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether this set constrains nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// AND a condition into the filter.
    pub fn filter(mut self, filter: impl Into<Filter>) -> Self {
        self.filter = std::mem::take(&mut self.filter).and_then(filter.into());
        self
    }

    /// Add an association to include.
    pub fn include(mut self, association: impl Into<String>) -> Self {
        self.includes.insert(association.into());
        self
    }

    /// Add a join.
    pub fn join(mut self, join: impl Into<String>) -> Self {
        self.joins.insert(join.into());
        self
    }

    /// Set the projection.
    pub fn select(mut self, select: Select) -> Self {
        self.select = Some(select);
        self
    }

    /// Set the ordering.
    pub fn order(mut self, order: impl Into<OrderBy>) -> Self {
        self.order = Some(order.into());
        self
    }

    /// Set the grouping clause.
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Set the condition on grouped rows.
    pub fn having(mut self, having: impl Into<Filter>) -> Self {
        self.having = Some(having.into());
        self
    }

    /// Set the row limit.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the row offset.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Override the FROM source.
    pub fn from_source(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Mark loaded records as read-only (or not).
    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = Some(readonly);
        self
    }

    /// Set the row lock clause.
    pub fn lock(mut self, lock: impl Into<String>) -> Self {
        self.lock = Some(lock.into());
        self
    }

    /// Add an extension.
    pub fn extend(mut self, extension: Extension) -> Self {
        self.extensions.insert(extension);
        self
    }

    /// Merge `other` on top of `self`, producing a new set.
    pub fn merge(&self, other: &OptionSet) -> OptionSet {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }

        tracing::trace!(
            left_terms = self.filter.terms().len(),
            right_terms = other.filter.terms().len(),
            "merging option sets"
        );

        OptionSet {
            filter: self.filter.clone().and_then(other.filter.clone()),
            includes: union(&self.includes, &other.includes),
            joins: union(&self.joins, &other.joins),
            select: pick(&self.select, &other.select),
            order: pick(&self.order, &other.order),
            group: pick(&self.group, &other.group),
            having: pick(&self.having, &other.having),
            limit: other.limit.or(self.limit),
            offset: other.offset.or(self.offset),
            from: pick(&self.from, &other.from),
            readonly: other.readonly.or(self.readonly),
            lock: pick(&self.lock, &other.lock),
            extensions: self.extensions.union(&other.extensions),
        }
    }
}

fn union(left: &IndexSet<String>, right: &IndexSet<String>) -> IndexSet<String> {
    left.iter().chain(right.iter()).cloned().collect()
}

fn pick<T: Clone>(left: &Option<T>, right: &Option<T>) -> Option<T> {
    right.as_ref().or(left.as_ref()).cloned()
}
