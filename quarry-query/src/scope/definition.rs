//! Scope bodies and definitions.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use smol_str::SmolStr;

use crate::error::{QueryError, QueryResult};
use crate::extension::Extension;
use crate::filter::FilterValue;
use crate::options::OptionSet;
use crate::query::DeferredQuery;

/// Signature of a resolver scope.
///
/// A resolver receives the query the scope was invoked on and the
/// positional arguments, and decides what to merge into that query.
pub type ResolverFn =
    Arc<dyn Fn(&DeferredQuery, &[FilterValue]) -> QueryResult<ScopeOutput> + Send + Sync>;

/// What a scope produces when invoked.
#[derive(Debug, Clone)]
pub enum ScopeOutput {
    /// A literal option description, translated on the spot.
    Description(Value),
    /// An option set.
    Options(OptionSet),
    /// A deferred query whose options are merged in.
    Query(DeferredQuery),
    /// Nothing to merge: the invoking query is returned unchanged.
    Nothing,
}

impl From<Value> for ScopeOutput {
    fn from(value: Value) -> Self {
        Self::Description(value)
    }
}

impl From<OptionSet> for ScopeOutput {
    fn from(options: OptionSet) -> Self {
        Self::Options(options)
    }
}

impl From<DeferredQuery> for ScopeOutput {
    fn from(query: DeferredQuery) -> Self {
        Self::Query(query)
    }
}

impl<T: Into<ScopeOutput>> From<Option<T>> for ScopeOutput {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Nothing, Into::into)
    }
}

/// The body of a scope declaration.
#[derive(Clone)]
pub enum ScopeBody {
    /// A fixed option description.
    ///
    /// Validated when declared and translated again on every invocation.
    Literal(Value),
    /// A function of the invoking query and the arguments.
    Resolver(ResolverFn),
    /// A query built ahead of time, merged on every invocation.
    Prebuilt(DeferredQuery),
}

impl ScopeBody {
    /// Create a literal body.
    pub fn literal(description: Value) -> Self {
        Self::Literal(description)
    }

    /// Create a resolver body.
    ///
    /// ```rust
    /// use quarry_query::{Filter, FilterValue, OptionSet, QueryError, ScopeBody};
    ///
    /// let colored = ScopeBody::resolver(|_query, args| match args {
    ///     [color] => Ok(OptionSet::new().filter(Filter::equals("color", color.clone())).into()),
    ///     _ => Err(QueryError::configuration("colored expects one argument")),
    /// });
    /// assert_eq!(colored.kind(), "resolver");
    /// ```
    pub fn resolver<F>(f: F) -> Self
    where
        F: Fn(&DeferredQuery, &[FilterValue]) -> QueryResult<ScopeOutput> + Send + Sync + 'static,
    {
        Self::Resolver(Arc::new(f))
    }

    /// Create a prebuilt body.
    pub fn prebuilt(query: DeferredQuery) -> Self {
        Self::Prebuilt(query)
    }

    /// Short name of the body kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Literal(_) => "literal",
            Self::Resolver(_) => "resolver",
            Self::Prebuilt(_) => "prebuilt",
        }
    }

    /// Check the body at declaration time.
    pub(crate) fn validate(&self) -> QueryResult<()> {
        match self {
            Self::Literal(description) => OptionSet::from_description(description).map(drop),
            Self::Resolver(_) | Self::Prebuilt(_) => Ok(()),
        }
    }

    /// Evaluate the body against the invoking query.
    ///
    /// Literal and prebuilt bodies take no arguments.
    pub fn evaluate(&self, query: &DeferredQuery, args: &[FilterValue]) -> QueryResult<ScopeOutput> {
        match self {
            Self::Literal(description) => {
                reject_arguments(self, args)?;
                Ok(ScopeOutput::Description(description.clone()))
            }
            Self::Prebuilt(prebuilt) => {
                reject_arguments(self, args)?;
                Ok(ScopeOutput::Query(prebuilt.clone()))
            }
            Self::Resolver(resolve) => resolve(query, args),
        }
    }
}

fn reject_arguments(body: &ScopeBody, args: &[FilterValue]) -> QueryResult<()> {
    if args.is_empty() {
        return Ok(());
    }
    Err(QueryError::configuration(format!(
        "A {} scope takes no arguments, {} given",
        body.kind(),
        args.len()
    ))
    .with_help("Declare the scope with ScopeBody::resolver to accept arguments"))
}

impl fmt::Debug for ScopeBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(description) => f.debug_tuple("Literal").field(description).finish(),
            Self::Resolver(_) => f.write_str("Resolver(..)"),
            Self::Prebuilt(query) => f.debug_tuple("Prebuilt").field(query).finish(),
        }
    }
}

impl From<Value> for ScopeBody {
    fn from(description: Value) -> Self {
        Self::Literal(description)
    }
}

impl From<DeferredQuery> for ScopeBody {
    fn from(query: DeferredQuery) -> Self {
        Self::Prebuilt(query)
    }
}

/// A named scope as stored in a registry.
#[derive(Debug, Clone)]
pub struct ScopeDefinition {
    name: SmolStr,
    body: ScopeBody,
    extension: Option<Extension>,
}

impl ScopeDefinition {
    /// Create a definition. The name is expected to be normalized already.
    pub fn new(name: impl Into<SmolStr>, body: ScopeBody, extension: Option<Extension>) -> Self {
        Self {
            name: name.into(),
            body,
            extension,
        }
    }

    /// The normalized scope name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The scope body.
    pub fn body(&self) -> &ScopeBody {
        &self.body
    }

    /// The extension attached to every query this scope produces.
    pub fn extension(&self) -> Option<&Extension> {
        self.extension.as_ref()
    }

    /// Apply the scope to `query`, producing a new deferred query.
    pub fn apply(&self, query: DeferredQuery, args: &[FilterValue]) -> QueryResult<DeferredQuery> {
        let scoped = match self.body.evaluate(&query, args)? {
            ScopeOutput::Description(description) => query.with_options(description)?,
            ScopeOutput::Options(options) => query.with_options(options)?,
            // A parent type's prebuilt query applies to its subtypes as plain options.
            ScopeOutput::Query(other)
                if other.entity() != query.entity() && query.entity().is_a(other.entity()) =>
            {
                query.with_options(other.options())?
            }
            ScopeOutput::Query(other) => query.merge(&other)?,
            ScopeOutput::Nothing => query,
        };

        Ok(match &self.extension {
            Some(extension) => scoped.extending(extension.clone()),
            None => scoped,
        })
    }
}

/// How a declaration changed the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Declared {
    /// The name was free.
    New,
    /// The type already declared a scope with this name.
    Replaced,
    /// The name shadows an inherited scope or a class method.
    Shadowed,
}
