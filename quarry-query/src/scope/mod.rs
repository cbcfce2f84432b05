//! Named scopes.
//!
//! A scope is a reusable query fragment declared on an [`EntityType`]. Its
//! [`ScopeBody`] is either a literal option description, a resolver function
//! of the invoking query and the call arguments, or a prebuilt query.
//!
//! ```rust
//! use quarry_query::{EntityType, FilterValue, ScopeBody, Scoped};
//! use serde_json::json;
//!
//! let shirt = EntityType::new("Shirt");
//! shirt.scope("red", json!({ "conditions": { "color": "red" } })).unwrap();
//! shirt
//!     .scope(
//!         "colored",
//!         ScopeBody::resolver(|_query, args| {
//!             Ok(json!({ "conditions": { "color": args.first().and_then(FilterValue::as_str) } }).into())
//!         }),
//!     )
//!     .unwrap();
//!
//! let puce = shirt.invoke("colored", &["puce".into()]).unwrap();
//! assert!(!puce.is_loaded());
//! ```
//!
//! Declarations live in a [`ScopeRegistry`] per entity type; lookups fall
//! back to the parent type, so subtypes see every scope of their ancestors,
//! including ones declared after the subtype was built.
//!
//! [`EntityType`]: crate::entity::EntityType

pub mod definition;
pub mod invoke;
pub mod registry;

pub use definition::{Declared, ResolverFn, ScopeBody, ScopeDefinition, ScopeOutput};
pub use invoke::{Scoped, dispatch};
pub use registry::{RESERVED_NAMES, ScopeRegistry};
