//! # quarry-query
//!
//! Lazy, composable named query scopes.
//!
//! This crate provides:
//! - Option sets: mergeable query constraints built programmatically or from
//!   literal JSON descriptions
//! - Deferred queries that execute only when their results are consumed, and
//!   cache what they load
//! - Named scopes declared on entity types, inherited by subtypes and
//!   chainable in any order
//! - Extensions: named bundles of extra methods attached to queries
//! - Ambient default scopes with RAII guards
//! - A synchronous execution-engine seam with an in-memory engine
//!
//! ## Declaring and chaining scopes
//!
//! ```rust
//! use std::sync::Arc;
//! use quarry_query::{EntityType, FilterValue, InMemoryEngine, Record, ScopeBody, Scoped};
//! use serde_json::json;
//!
//! let engine = Arc::new(
//!     InMemoryEngine::new()
//!         .with_row("shirts", Record::new().with("color", "red").with("dry_clean", true))
//!         .with_row("shirts", Record::new().with("color", "red").with("dry_clean", false))
//!         .with_row("shirts", Record::new().with("color", "puce").with("dry_clean", true)),
//! );
//! let shirt = EntityType::builder("Shirt").engine(engine.clone()).build();
//!
//! shirt.scope("red", json!({ "conditions": { "color": "red" } })).unwrap();
//! shirt.scope("dryCleanOnly", json!({ "conditions": { "dry_clean": true } })).unwrap();
//! shirt
//!     .scope(
//!         "colored",
//!         ScopeBody::resolver(|_query, args| match args {
//!             [color] => Ok(json!({ "conditions": { "color": color } }).into()),
//!             _ => Err(quarry_query::QueryError::configuration("colored takes one color")),
//!         }),
//!     )
//!     .unwrap();
//!
//! let red_dry = shirt.invoke("red", &[]).unwrap().invoke("dry_clean_only", &[]).unwrap();
//! assert_eq!(red_dry.count().unwrap(), 1);
//!
//! let puce = shirt.invoke("colored", &[FilterValue::from("puce")]).unwrap();
//! assert_eq!(puce.records().unwrap().len(), 1);
//! assert_eq!(engine.executions(), 2);
//! ```
//!
//! ## Merging options
//!
//! ```rust
//! use quarry_query::{Filter, OptionSet};
//!
//! let a = OptionSet::new().filter(Filter::equals("color", "red")).include("buttons").limit(10);
//! let b = OptionSet::new().filter(Filter::equals("size", "L")).include("collar").limit(5);
//!
//! let merged = a.merge(&b);
//! assert_eq!(merged.filter.terms().len(), 2);
//! assert_eq!(merged.includes.len(), 2);
//! assert_eq!(merged.limit, Some(5));
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use quarry_query::{EntityType, ErrorCode, Scoped};
//!
//! let shirt = EntityType::new("Shirt");
//! let err = shirt.invoke("missing", &[]).unwrap_err();
//! assert_eq!(err.code, ErrorCode::UnknownScope);
//! ```

pub mod ambient;
pub mod config;
pub mod description;
pub mod engine;
pub mod entity;
pub mod error;
pub mod extension;
pub mod filter;
pub mod logging;
pub mod options;
pub mod query;
pub mod scope;
pub mod types;

pub use ambient::{AmbientScopeGuard, EntityId};
pub use config::{DebugConfig, QuarryConfig, ScopeConfig};
pub use description::{IntoOptionSet, OPTION_KEYS};
pub use engine::{Aggregate, InMemoryEngine, QueryEngine, QueryKind, QueryOutput, QueryRequest, Record};
pub use entity::{EntityType, EntityTypeBuilder};
pub use error::{ErrorCode, ErrorContext, QueryError, QueryResult, Suggestion};
pub use extension::{Extension, ExtensionFn, ExtensionSet};
pub use filter::{Filter, FilterValue};
pub use options::OptionSet;
pub use query::DeferredQuery;
pub use scope::{Declared, ResolverFn, ScopeBody, ScopeDefinition, ScopeOutput, ScopeRegistry, Scoped};
pub use types::{NullsOrder, OrderBy, OrderByField, Select, SortOrder};

// Re-export logging utilities
pub use logging::{get_log_format, get_log_level, init as init_logging, is_debug_enabled};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::engine::{Aggregate, InMemoryEngine, QueryEngine, Record};
    pub use crate::entity::EntityType;
    pub use crate::error::{QueryError, QueryResult};
    pub use crate::extension::Extension;
    pub use crate::filter::{Filter, FilterValue};
    pub use crate::options::OptionSet;
    pub use crate::query::DeferredQuery;
    pub use crate::scope::{Declared, ScopeBody, ScopeOutput, Scoped};
    pub use crate::types::{OrderBy, OrderByField, Select, SortOrder};
}
