//! Scope invocation shared by entity types and deferred queries.

use crate::entity::EntityType;
use crate::error::{QueryError, QueryResult};
use crate::filter::FilterValue;
use crate::query::DeferredQuery;

/// Anything scopes can be invoked on.
///
/// Entity types start a chain from their default query; deferred queries
/// continue one. Both reach the same scopes through [`Scoped::invoke`].
///
/// ```rust
/// use quarry_query::{EntityType, ScopeBody, Scoped};
/// use serde_json::json;
///
/// let shirt = EntityType::new("Shirt");
/// shirt.scope("red", ScopeBody::literal(json!({ "conditions": { "color": "red" } }))).unwrap();
/// shirt.scope("large", ScopeBody::literal(json!({ "conditions": { "size": "L" } }))).unwrap();
///
/// let query = shirt.invoke("red", &[]).unwrap().invoke("large", &[]).unwrap();
/// assert_eq!(query.options().filter.terms().len(), 2);
/// ```
pub trait Scoped {
    /// The entity type whose registry is searched.
    fn entity(&self) -> &EntityType;

    /// The query a scope is applied to.
    fn scoped(&self) -> DeferredQuery;

    /// Invoke a scope by name.
    fn invoke(&self, name: &str, args: &[FilterValue]) -> QueryResult<DeferredQuery> {
        dispatch(self, name, args)
    }
}

/// Look up `name` on the target's entity type (walking up to its ancestors)
/// and apply it to the target's current query.
pub fn dispatch<S: Scoped + ?Sized>(target: &S, name: &str, args: &[FilterValue]) -> QueryResult<DeferredQuery> {
    let entity = target.entity();
    let definition = entity
        .scope_definition(name)
        .ok_or_else(|| QueryError::unknown_scope(entity.name(), name))?;

    if entity.config().debug.log_invocations {
        tracing::debug!(
            entity = %entity.name(),
            scope = %definition.name(),
            args = args.len(),
            "invoking scope"
        );
    }

    definition
        .apply(target.scoped(), args)
        .map_err(|mut e| {
            // Innermost scope wins when resolvers invoke other scopes.
            e.context.entity.get_or_insert_with(|| entity.name().to_string());
            e.context.scope.get_or_insert_with(|| definition.name().to_string());
            e
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::definition::ScopeBody;
    use serde_json::json;

    #[test]
    fn test_unknown_scope() {
        let shirt = EntityType::new("Shirt");
        let err = shirt.invoke("missing", &[]).unwrap_err();
        assert!(err.is_unknown_scope());
        assert_eq!(err.context.entity.as_deref(), Some("Shirt"));
    }

    #[test]
    fn test_lookup_normalizes_name() {
        let shirt = EntityType::new("Shirt");
        shirt
            .scope("dryCleanOnly", ScopeBody::literal(json!({ "conditions": { "dry_clean": true } })))
            .unwrap();

        assert!(shirt.invoke("dryCleanOnly", &[]).is_ok());
        assert!(shirt.invoke("dry_clean_only", &[]).is_ok());
    }

    #[test]
    fn test_chain_and_entity_reach_the_same_scope() {
        let shirt = EntityType::new("Shirt");
        shirt.scope("red", ScopeBody::literal(json!({ "conditions": { "color": "red" } }))).unwrap();

        let from_entity = shirt.invoke("red", &[]).unwrap();
        let from_chain = shirt.scoped().invoke("red", &[]).unwrap();
        assert_eq!(from_entity.options(), from_chain.options());
    }

    #[test]
    fn test_argument_errors_carry_scope_context() {
        let shirt = EntityType::new("Shirt");
        shirt.scope("red", ScopeBody::literal(json!({ "conditions": { "color": "red" } }))).unwrap();

        let err = shirt.invoke("red", &[FilterValue::from("extra")]).unwrap_err();
        assert!(err.is_configuration_error());
        assert_eq!(err.context.scope.as_deref(), Some("red"));
    }
}
