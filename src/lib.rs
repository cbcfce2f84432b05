//! # Quarry
//!
//! Lazy, composable named query scopes for Rust entity types.
//!
//! Quarry provides:
//! - Named scopes declared on entity types: literal descriptions, resolver
//!   functions or prebuilt queries
//! - Chaining of scopes and ad-hoc options into one deferred query that
//!   executes only when its results are consumed
//! - Predictable merging: conditions are ANDed, includes and joins
//!   accumulate, the last writer wins every other clause
//! - Extensions, ambient default scopes and a pluggable execution engine
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use quarry::prelude::*;
//! use serde_json::json;
//!
//! fn main() -> QueryResult<()> {
//!     let engine = Arc::new(
//!         InMemoryEngine::new()
//!             .with_row("shirts", Record::new().with("id", 1).with("color", "red"))
//!             .with_row("shirts", Record::new().with("id", 2).with("color", "puce")),
//!     );
//!     let shirt = EntityType::builder("Shirt").engine(engine.clone()).build();
//!
//!     shirt.scope("red", json!({ "conditions": { "color": "red" } }))?;
//!     shirt.scope_extended(
//!         "colored",
//!         ScopeBody::resolver(|_query, args| Ok(json!({ "conditions": { "color": &args[0] } }).into())),
//!         Extension::new("dom").method("dom_id", |query, _| {
//!             Ok(FilterValue::from(format!("{}_list", query.entity().table())))
//!         }),
//!     )?;
//!
//!     let puce = shirt.invoke("colored", &["puce".into()])?;
//!     assert_eq!(engine.executions(), 0);
//!     assert_eq!(puce.count()?, 1);
//!     assert_eq!(puce.call("dom_id", &[])?, FilterValue::from("shirts_list"));
//!     Ok(())
//! }
//! ```
//!
//! See [`quarry_query`] for the individual building blocks.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use quarry_query;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use quarry_query::prelude::*;
    pub use quarry_query::{QuarryConfig, init_logging};
}

// Re-export key types at the crate root
pub use quarry_query::{
    Aggregate, DeferredQuery, EntityType, Extension, Filter, FilterValue, InMemoryEngine, OptionSet,
    QuarryConfig, QueryEngine, QueryError, QueryResult, Record, ScopeBody, ScopeOutput, Scoped,
};
