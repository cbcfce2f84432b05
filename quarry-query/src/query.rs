//! Deferred queries.
//!
//! A [`DeferredQuery`] pairs an entity type with an accumulated
//! [`OptionSet`]. Building and chaining one never touches the engine; the
//! first materializing call (`records`, `first`, `count`, `aggregate`, ...)
//! executes and caches its result on the instance.
//!
//! ```rust
//! use std::sync::Arc;
//! use quarry_query::{EntityType, InMemoryEngine, Record};
//! use serde_json::json;
//!
//! let engine = Arc::new(InMemoryEngine::new().with_row("shirts", Record::new().with("color", "red")));
//! let shirt = EntityType::builder("Shirt").engine(engine.clone()).build();
//!
//! let query = shirt.scoped().with_options(json!({ "conditions": { "color": "red" } })).unwrap();
//! assert_eq!(engine.executions(), 0);
//!
//! assert_eq!(query.records().unwrap().len(), 1);
//! assert_eq!(query.records().unwrap().len(), 1);
//! assert_eq!(engine.executions(), 1);
//! ```
//!
//! # Caching
//!
//! Each materializing kind has its own slot: records, first, count and one
//! slot per distinct aggregate. `first`, `count` and `is_empty` answer from
//! the records slot when it is already loaded. A failed execution leaves its
//! slot empty. Clones share their slots; [`DeferredQuery::reload`] returns an
//! instance with fresh ones.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::description::IntoOptionSet;
use crate::engine::{Aggregate, QueryKind, QueryOutput, QueryRequest, Record};
use crate::entity::EntityType;
use crate::error::{QueryError, QueryResult};
use crate::extension::{Extension, ExtensionSet};
use crate::filter::FilterValue;
use crate::options::OptionSet;
use crate::scope::invoke::Scoped;

/// A lazy, chainable query over one entity type.
#[derive(Clone)]
pub struct DeferredQuery {
    entity: EntityType,
    options: OptionSet,
    cache: Arc<QueryCache>,
}

#[derive(Default)]
struct QueryCache {
    records: OnceCell<Vec<Record>>,
    first: OnceCell<Option<Record>>,
    count: OnceCell<u64>,
    aggregates: Mutex<HashMap<Aggregate, FilterValue>>,
}

impl DeferredQuery {
    /// Create a query over `entity` with `options`.
    pub fn new(entity: EntityType, options: OptionSet) -> Self {
        Self {
            entity,
            options,
            cache: Arc::default(),
        }
    }

    /// The entity type.
    pub fn entity(&self) -> &EntityType {
        &self.entity
    }

    /// The accumulated options.
    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    /// The attached extensions, oldest first.
    pub fn extensions(&self) -> &ExtensionSet {
        &self.options.extensions
    }

    // ============== Chaining ==============

    /// Merge options (or a literal description) into a new query.
    pub fn with_options(&self, options: impl IntoOptionSet) -> QueryResult<Self> {
        let options = options.into_option_set()?;
        Ok(Self::new(self.entity.clone(), self.options.merge(&options)))
    }

    /// A new query with `extension` attached.
    pub fn extending(&self, extension: Extension) -> Self {
        let mut options = self.options.clone();
        options.extensions.insert(extension);
        Self::new(self.entity.clone(), options)
    }

    /// Merge another query over the same entity type into a new query.
    pub fn merge(&self, other: &DeferredQuery) -> QueryResult<Self> {
        if self.entity != other.entity {
            return Err(QueryError::type_mismatch(self.entity.name(), other.entity.name()));
        }
        Ok(Self::new(self.entity.clone(), self.options.merge(&other.options)))
    }

    /// A new query with the same options and empty caches.
    pub fn reload(&self) -> Self {
        Self::new(self.entity.clone(), self.options.clone())
    }

    /// Call a method of an attached extension.
    ///
    /// The most recently attached extension defining `method` wins.
    pub fn call(&self, method: &str, args: &[FilterValue]) -> QueryResult<FilterValue> {
        let f = self
            .options
            .extensions
            .find_method(method)
            .ok_or_else(|| QueryError::unknown_method(self.entity.name(), method))?;
        f(self, args)
    }

    // ============== Materializing ==============

    /// The request this query sends to the engine for `kind`.
    pub fn request(&self, kind: QueryKind) -> QueryRequest {
        QueryRequest {
            entity: self.entity.name().into(),
            table: self.entity.table().to_string(),
            options: self.options.clone(),
            kind,
        }
    }

    fn execute(&self, kind: QueryKind) -> QueryResult<QueryOutput> {
        let request = self.request(kind);
        tracing::debug!(
            entity = %request.entity,
            kind = %request.kind,
            "executing deferred query"
        );
        self.entity.engine().execute(&request)
    }

    /// Every matching record.
    pub fn records(&self) -> QueryResult<&[Record]> {
        self.cache
            .records
            .get_or_try_init(|| self.execute(QueryKind::Select)?.into_records())
            .map(Vec::as_slice)
    }

    /// Iterate over the matching records.
    pub fn iter(&self) -> QueryResult<std::slice::Iter<'_, Record>> {
        Ok(self.records()?.iter())
    }

    /// Check whether the records have been loaded.
    pub fn is_loaded(&self) -> bool {
        self.cache.records.get().is_some()
    }

    /// The first matching record.
    pub fn first(&self) -> QueryResult<Option<&Record>> {
        if let Some(records) = self.cache.records.get() {
            return Ok(records.first());
        }
        self.cache
            .first
            .get_or_try_init(|| -> QueryResult<_> {
                let records = self.execute(QueryKind::First)?.into_records()?;
                Ok(records.into_iter().next())
            })
            .map(Option::as_ref)
    }

    /// The first matching record, or a not-found error.
    pub fn first_or_fail(&self) -> QueryResult<&Record> {
        self.first()?.ok_or_else(|| QueryError::not_found(self.entity.name()))
    }

    /// The number of matching records.
    pub fn count(&self) -> QueryResult<u64> {
        if let Some(records) = self.cache.records.get() {
            return Ok(records.len() as u64);
        }
        self.cache
            .count
            .get_or_try_init(|| -> QueryResult<_> {
                let value = self.execute(QueryKind::Count)?.into_scalar()?;
                value
                    .as_i64()
                    .and_then(|n| u64::try_from(n).ok())
                    .ok_or_else(|| QueryError::unexpected_output("a non-negative integer count"))
            })
            .copied()
    }

    /// Check whether no record matches.
    pub fn is_empty(&self) -> QueryResult<bool> {
        Ok(self.count()? == 0)
    }

    /// An aggregate over the matching records.
    pub fn aggregate(&self, aggregate: Aggregate) -> QueryResult<FilterValue> {
        if let Some(value) = self.cache.aggregates.lock().get(&aggregate) {
            return Ok(value.clone());
        }

        // The lock is not held while the engine runs.
        let value = self
            .execute(QueryKind::Aggregate(aggregate.clone()))?
            .into_scalar()?;
        Ok(self
            .cache
            .aggregates
            .lock()
            .entry(aggregate)
            .or_insert(value)
            .clone())
    }
}

impl Scoped for DeferredQuery {
    fn entity(&self) -> &EntityType {
        &self.entity
    }

    fn scoped(&self) -> DeferredQuery {
        self.clone()
    }
}

impl fmt::Debug for DeferredQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredQuery")
            .field("entity", &self.entity.name())
            .field("options", &self.options)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
