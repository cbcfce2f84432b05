//! Runtime handles for persistent-entity types.
//!
//! An [`EntityType`] carries everything scopes need to know about a type:
//! its name and table, its parent type, its default options, its scope
//! registry and the engine its queries run on. Handles are cheap to clone
//! and compare by identity.
//!
//! ```rust
//! use std::sync::Arc;
//! use quarry_query::{EntityType, InMemoryEngine, Record, ScopeBody, Scoped};
//! use serde_json::json;
//!
//! let engine = Arc::new(
//!     InMemoryEngine::new()
//!         .with_row("shirts", Record::new().with("id", 1).with("color", "red"))
//!         .with_row("shirts", Record::new().with("id", 2).with("color", "blue")),
//! );
//! let shirt = EntityType::builder("Shirt").engine(engine.clone()).build();
//! shirt.scope("red", ScopeBody::literal(json!({ "conditions": { "color": "red" } }))).unwrap();
//!
//! let red = shirt.invoke("red", &[]).unwrap();
//! assert_eq!(engine.executions(), 0);
//! assert_eq!(red.count().unwrap(), 1);
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use convert_case::{Case, Casing};
use indexmap::IndexSet;
use parking_lot::RwLock;
use smol_str::SmolStr;

use crate::ambient::{self, AmbientScopeGuard, EntityId};
use crate::config::QuarryConfig;
use crate::description::IntoOptionSet;
use crate::engine::{InMemoryEngine, QueryEngine};
use crate::error::QueryResult;
use crate::extension::Extension;
use crate::options::OptionSet;
use crate::query::DeferredQuery;
use crate::scope::definition::{Declared, ScopeBody, ScopeDefinition};
use crate::scope::invoke::Scoped;
use crate::scope::registry::{self, ScopeRegistry};

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to a persistent-entity type.
#[derive(Clone)]
pub struct EntityType {
    inner: Arc<EntityInner>,
}

struct EntityInner {
    id: EntityId,
    name: SmolStr,
    table: String,
    parent: Option<EntityType>,
    default_options: OptionSet,
    class_methods: IndexSet<SmolStr>,
    engine: Arc<dyn QueryEngine>,
    config: QuarryConfig,
    scopes: RwLock<ScopeRegistry>,
}

impl EntityType {
    /// Create an entity type with default settings.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self::builder(name).build()
    }

    /// Start building an entity type.
    pub fn builder(name: impl Into<SmolStr>) -> EntityTypeBuilder {
        EntityTypeBuilder::new(name)
    }

    /// Process-unique identifier.
    pub fn id(&self) -> EntityId {
        self.inner.id
    }

    /// Type name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Table queries read from.
    pub fn table(&self) -> &str {
        &self.inner.table
    }

    /// Parent type, if any.
    pub fn parent(&self) -> Option<&EntityType> {
        self.inner.parent.as_ref()
    }

    /// Options every query on this type starts from.
    pub fn default_options(&self) -> &OptionSet {
        &self.inner.default_options
    }

    /// Engine that runs this type's queries.
    pub fn engine(&self) -> &Arc<dyn QueryEngine> {
        &self.inner.engine
    }

    /// Configuration the type was built with.
    pub fn config(&self) -> &QuarryConfig {
        &self.inner.config
    }

    /// This type followed by its ancestors, nearest first.
    pub fn ancestry(&self) -> impl Iterator<Item = &EntityType> {
        std::iter::successors(Some(self), |entity| entity.parent())
    }

    /// Check whether this type is `other` or one of its descendants.
    pub fn is_a(&self, other: &EntityType) -> bool {
        self.ancestry().any(|entity| entity == other)
    }

    /// Check whether this type or an ancestor declares a class method.
    pub fn has_class_method(&self, name: &str) -> bool {
        self.ancestry().any(|entity| entity.inner.class_methods.contains(name))
    }

    /// A fresh deferred query over this type.
    ///
    /// The query starts from the default options merged with every ambient
    /// scope pushed for this type on the current thread. Nothing executes.
    pub fn scoped(&self) -> DeferredQuery {
        let options = match ambient::current(self.id()) {
            Some(ambient) => self.inner.default_options.merge(&ambient),
            None => self.inner.default_options.clone(),
        };
        DeferredQuery::new(self.clone(), options)
    }

    /// A fresh deferred query with ad-hoc options and an optional extension.
    pub fn scoped_with(
        &self,
        options: impl IntoOptionSet,
        extension: Option<Extension>,
    ) -> QueryResult<DeferredQuery> {
        let query = self.scoped().with_options(options)?;
        Ok(match extension {
            Some(extension) => query.extending(extension),
            None => query,
        })
    }

    /// Declare a named scope.
    pub fn scope(&self, name: &str, body: impl Into<ScopeBody>) -> QueryResult<Declared> {
        self.declare(name, body.into(), None)
    }

    /// Declare a named scope whose queries carry `extension`.
    pub fn scope_extended(
        &self,
        name: &str,
        body: impl Into<ScopeBody>,
        extension: Extension,
    ) -> QueryResult<Declared> {
        self.declare(name, body.into(), Some(extension))
    }

    fn declare(&self, name: &str, body: ScopeBody, extension: Option<Extension>) -> QueryResult<Declared> {
        let name = registry::declaration_name(name, &self.config().scopes)
            .map_err(|e| e.with_entity(self.name()))?;
        body.validate()
            .map_err(|e| e.with_entity(self.name()).with_scope(name.as_str()))?;

        let shadowed = if self.parent().is_some_and(|p| p.scope_definition(&name).is_some()) {
            Some("inherited scope")
        } else if self.has_class_method(&name) {
            Some("class method")
        } else {
            None
        };

        let kind = body.kind();
        let previous = self
            .inner
            .scopes
            .write()
            .insert(ScopeDefinition::new(name.clone(), body, extension));

        let declared = match (previous, shadowed) {
            (Some(_), _) => Declared::Replaced,
            (None, Some(what)) => {
                if self.config().scopes.warn_on_shadow {
                    tracing::warn!(
                        entity = %self.name(),
                        scope = %name,
                        shadowed = what,
                        "Creating scope `{}` overwrites an existing {} on {}",
                        name,
                        what,
                        self.name()
                    );
                }
                Declared::Shadowed
            }
            (None, None) => Declared::New,
        };

        tracing::debug!(entity = %self.name(), scope = %name, body = kind, ?declared, "declared scope");
        Ok(declared)
    }

    /// Find the definition a name resolves to, searching ancestors.
    pub fn scope_definition(&self, name: &str) -> Option<Arc<ScopeDefinition>> {
        let name = registry::lookup_name(name, &self.config().scopes);
        self.ancestry().find_map(|entity| entity.inner.scopes.read().get(&name))
    }

    /// Check whether a scope name resolves on this type.
    pub fn has_scope(&self, name: &str) -> bool {
        self.scope_definition(name).is_some()
    }

    /// Every scope reachable on this type: own scopes first, then inherited
    /// ones nearest ancestor first, each in declaration order.
    pub fn scope_names(&self) -> Vec<SmolStr> {
        let mut names = IndexSet::new();
        for entity in self.ancestry() {
            names.extend(entity.inner.scopes.read().names().cloned());
        }
        names.into_iter().collect()
    }

    /// Push an ambient scope for this type on the current thread.
    ///
    /// Every `scoped()` call on this type merges `options` until the guard is
    /// dropped.
    pub fn push_scope(&self, options: OptionSet) -> AmbientScopeGuard {
        ambient::push(self.id(), options)
    }

    /// Run `f` with an ambient scope pushed for this type.
    ///
    /// The scope is released when `f` returns or unwinds.
    pub fn with_scope<T>(&self, options: OptionSet, f: impl FnOnce() -> T) -> T {
        let _guard = self.push_scope(options);
        f()
    }
}

impl Scoped for EntityType {
    fn entity(&self) -> &EntityType {
        self
    }

    fn scoped(&self) -> DeferredQuery {
        EntityType::scoped(self)
    }
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for EntityType {}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityType")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("table", &self.inner.table)
            .field("parent", &self.parent().map(EntityType::name))
            .finish_non_exhaustive()
    }
}

/// Builder for [`EntityType`].
///
/// Unset settings are inherited from the parent type when there is one:
/// table, engine and configuration are shared, default options are merged
/// under the type's own.
#[must_use]
pub struct EntityTypeBuilder {
    name: SmolStr,
    table: Option<String>,
    parent: Option<EntityType>,
    default_options: OptionSet,
    class_methods: IndexSet<SmolStr>,
    engine: Option<Arc<dyn QueryEngine>>,
    config: Option<QuarryConfig>,
}

impl EntityTypeBuilder {
    fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            table: None,
            parent: None,
            default_options: OptionSet::new(),
            class_methods: IndexSet::new(),
            engine: None,
            config: None,
        }
    }

    /// Set the table.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Set the parent type.
    pub fn parent(mut self, parent: &EntityType) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Set the default options.
    pub fn default_options(mut self, options: OptionSet) -> Self {
        self.default_options = options;
        self
    }

    /// Declare a class method name, so that scopes shadowing it are reported.
    pub fn class_method(mut self, name: impl Into<SmolStr>) -> Self {
        self.class_methods.insert(name.into());
        self
    }

    /// Set the engine.
    pub fn engine(mut self, engine: Arc<dyn QueryEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Set the configuration.
    pub fn config(mut self, config: QuarryConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the entity type.
    pub fn build(self) -> EntityType {
        let parent = self.parent;
        let table = self
            .table
            .or_else(|| parent.as_ref().map(|p| p.table().to_string()))
            .unwrap_or_else(|| format!("{}s", self.name.to_case(Case::Snake)));
        let engine = self
            .engine
            .or_else(|| parent.as_ref().map(|p| p.engine().clone()))
            .unwrap_or_else(|| Arc::new(InMemoryEngine::new()));
        let config = self
            .config
            .or_else(|| parent.as_ref().map(|p| p.config().clone()))
            .unwrap_or_default();
        let default_options = match &parent {
            Some(p) => p.default_options().merge(&self.default_options),
            None => self.default_options,
        };

        let id = NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(entity = %self.name, id, %table, "built entity type");

        EntityType {
            inner: Arc::new(EntityInner {
                id,
                name: self.name,
                table,
                parent,
                default_options,
                class_methods: self.class_methods,
                engine,
                config,
                scopes: RwLock::new(ScopeRegistry::new()),
            }),
        }
    }
}
