//! Per-type scope storage and scope name rules.

use std::sync::Arc;

use convert_case::{Case, Casing};
use indexmap::IndexMap;
use smol_str::SmolStr;

use super::definition::ScopeDefinition;
use crate::config::ScopeConfig;
use crate::error::{QueryError, QueryResult};

/// Names of built-in accessors that a scope may not take.
pub const RESERVED_NAMES: &[&str] = &[
    "aggregate",
    "call",
    "count",
    "entity",
    "extending",
    "extensions",
    "first",
    "first_or_fail",
    "has_scope",
    "invoke",
    "is_empty",
    "is_loaded",
    "iter",
    "merge",
    "name",
    "options",
    "parent",
    "push_scope",
    "records",
    "reload",
    "request",
    "scope",
    "scope_extended",
    "scope_names",
    "scoped",
    "scoped_with",
    "table",
    "with_options",
    "with_scope",
];

/// The scopes declared directly on one entity type, in declaration order.
#[derive(Debug, Default)]
pub struct ScopeRegistry {
    scopes: IndexMap<SmolStr, Arc<ScopeDefinition>>,
}

impl ScopeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a definition, returning the one it replaced.
    ///
    /// A replaced scope keeps its original position.
    pub fn insert(&mut self, definition: ScopeDefinition) -> Option<Arc<ScopeDefinition>> {
        self.scopes.insert(SmolStr::new(definition.name()), Arc::new(definition))
    }

    /// Look up a definition.
    pub fn get(&self, name: &str) -> Option<Arc<ScopeDefinition>> {
        self.scopes.get(name).cloned()
    }

    /// Check whether a scope is declared here.
    pub fn contains(&self, name: &str) -> bool {
        self.scopes.contains_key(name)
    }

    /// Declared names, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &SmolStr> {
        self.scopes.keys()
    }

    /// Number of declared scopes.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Check if nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

/// Normalize a name for declaration.
///
/// The name must be an identifier starting with a letter, both as written
/// and after it is converted to snake_case (when `normalize_names` is on).
/// It must not be reserved.
pub fn declaration_name(name: &str, config: &ScopeConfig) -> QueryResult<SmolStr> {
    const RULE: &str = "scope names must start with a letter and contain only letters, digits and underscores";
    if !is_identifier(name) {
        return Err(QueryError::invalid_scope_name(name, RULE));
    }

    let normalized = lookup_name(name, config);
    if !is_identifier(&normalized) {
        return Err(QueryError::invalid_scope_name(name, RULE));
    }
    let reserved = RESERVED_NAMES.contains(&normalized.as_str())
        || config
            .reserved_names
            .iter()
            .any(|r| lookup_name(r, config) == normalized);
    if reserved {
        return Err(QueryError::invalid_scope_name(
            normalized.as_str(),
            "the name is reserved for a built-in accessor",
        )
        .with_suggestion(format!("Pick another name, such as `{}_scope`", normalized)));
    }

    Ok(normalized)
}

/// Normalize a name for lookup, without validation.
pub fn lookup_name(name: &str, config: &ScopeConfig) -> SmolStr {
    if config.normalize_names {
        SmolStr::new(name.to_case(Case::Snake))
    } else {
        SmolStr::new(name)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
