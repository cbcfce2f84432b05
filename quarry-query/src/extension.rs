//! Extensions: named bundles of extra methods attached to deferred queries.
//!
//! A scope can be declared with an extension; every query produced by that
//! scope carries it, and its methods become callable through
//! [`DeferredQuery::call`](crate::query::DeferredQuery::call).
//!
//! ```rust
//! use quarry_query::{Extension, FilterValue};
//!
//! let ext = Extension::new("red_shirt_helpers")
//!     .method("dom_id", |_query, _args| Ok(FilterValue::from("red_shirts")));
//! assert!(ext.has_method("dom_id"));
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::error::QueryResult;
use crate::filter::FilterValue;
use crate::query::DeferredQuery;

/// Signature of an extension method.
///
/// The method receives the query it was called on and the positional
/// arguments of the call.
pub type ExtensionFn =
    Arc<dyn Fn(&DeferredQuery, &[FilterValue]) -> QueryResult<FilterValue> + Send + Sync>;

/// A named set of methods that can be mixed into a deferred query.
///
/// Extensions are compared and deduplicated by name; attaching a second
/// extension with the same name replaces the first.
#[derive(Clone)]
pub struct Extension {
    name: SmolStr,
    methods: IndexMap<SmolStr, ExtensionFn>,
}

impl Extension {
    /// Create an empty extension.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            methods: IndexMap::new(),
        }
    }

    /// Add a method. A later method with the same name replaces the earlier one.
    pub fn method<F>(mut self, name: impl Into<SmolStr>, f: F) -> Self
    where
        F: Fn(&DeferredQuery, &[FilterValue]) -> QueryResult<FilterValue> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(f));
        self
    }

    /// The extension name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check whether this extension defines a method.
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Look up a method by name.
    pub fn get(&self, name: &str) -> Option<&ExtensionFn> {
        self.methods.get(name)
    }

    /// Names of the methods, in definition order.
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(SmolStr::as_str)
    }
}

impl PartialEq for Extension {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension")
            .field("name", &self.name)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// An ordered set of extensions, unique by name, oldest attachment first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionSet {
    extensions: Vec<Extension>,
}

impl ExtensionSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Number of extensions in the set.
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Attach an extension.
    ///
    /// An extension already present under the same name is removed, so the
    /// new one becomes the most recent attachment. Returns `true` when the
    /// name was not present before.
    pub fn insert(&mut self, extension: Extension) -> bool {
        let previous = self.extensions.iter().position(|e| e.name() == extension.name());
        if let Some(index) = previous {
            self.extensions.remove(index);
        }
        self.extensions.push(extension);
        previous.is_none()
    }

    /// Check if an extension with this name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.extensions.iter().any(|e| e.name() == name)
    }

    /// Union of two sets; `other` is attached after `self`.
    pub fn union(&self, other: &ExtensionSet) -> ExtensionSet {
        let mut merged = self.clone();
        for extension in &other.extensions {
            merged.insert(extension.clone());
        }
        merged
    }

    /// Find a method, searching the most recently attached extension first.
    pub fn find_method(&self, name: &str) -> Option<&ExtensionFn> {
        self.extensions.iter().rev().find_map(|e| e.get(name))
    }

    /// Iterate over the extensions in attachment order.
    pub fn iter(&self) -> impl Iterator<Item = &Extension> {
        self.extensions.iter()
    }

    /// Names of the extensions in attachment order.
    pub fn names(&self) -> Vec<&str> {
        self.extensions.iter().map(Extension::name).collect()
    }
}

impl FromIterator<Extension> for ExtensionSet {
    fn from_iter<I: IntoIterator<Item = Extension>>(iter: I) -> Self {
        let mut set = Self::new();
        for extension in iter {
            set.insert(extension);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(name: &str, method: &str, value: i64) -> Extension {
        Extension::new(name.to_string()).method(method.to_string(), move |_, _| Ok(FilterValue::Int(value)))
    }

    fn call(set: &ExtensionSet, query: &DeferredQuery, method: &str) -> FilterValue {
        let f = set.find_method(method).unwrap();
        f(query, &[]).unwrap()
    }

    #[test]
    fn test_union_dedups_by_name() {
        let a: ExtensionSet = [constant("a", "x", 1), constant("b", "y", 2)].into_iter().collect();
        let b: ExtensionSet = [constant("b", "y", 3), constant("c", "z", 4)].into_iter().collect();

        let merged = a.union(&b);
        assert_eq!(merged.names(), vec!["a", "b", "c"]);

        let query = crate::entity::EntityType::new("Shirt").scoped();
        assert_eq!(call(&merged, &query, "y"), FilterValue::Int(3));
    }

    #[test]
    fn test_reattached_name_replaces_and_moves_last() {
        let mut set: ExtensionSet = [constant("dom", "dom_id", 1), constant("other", "dom_id", 2)]
            .into_iter()
            .collect();
        assert!(!set.insert(constant("dom", "dom_id", 3)));
        assert_eq!(set.names(), vec!["other", "dom"]);

        let query = crate::entity::EntityType::new("Shirt").scoped();
        assert_eq!(call(&set, &query, "dom_id"), FilterValue::Int(3));
    }

    #[test]
    fn test_latest_extension_wins_lookup() {
        let set: ExtensionSet = [constant("a", "value", 1), constant("b", "value", 2)].into_iter().collect();
        assert!(set.find_method("value").is_some());
        assert!(set.find_method("missing").is_none());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_method_names() {
        let ext = constant("a", "x", 1).method("y", |_, _| Ok(FilterValue::Null));
        assert_eq!(ext.method_names().collect::<Vec<_>>(), vec!["x", "y"]);
        assert!(ext.has_method("y"));
        assert_eq!(format!("{:?}", ext), "Extension { name: \"a\", methods: [\"x\", \"y\"] }");
    }
}
