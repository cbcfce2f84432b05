//! Integration tests for scope declaration, chaining and materialization.
//!
//! These tests drive the public API end to end against the in-memory engine:
//! - Declaring literal, resolver and prebuilt scopes
//! - Chaining scopes from entity types and from deferred queries
//! - Laziness and single execution per materializing kind
//! - Inheritance, re-declaration and shadowing

use std::io;
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use quarry::prelude::*;
use quarry::quarry_query::{Declared, ErrorCode, QueryKind, QueryOutput, QueryRequest};
use serde_json::json;

fn shirts() -> (Arc<InMemoryEngine>, EntityType) {
    let engine = Arc::new(
        InMemoryEngine::new()
            .with_row(
                "shirts",
                Record::new().with("id", 1).with("color", "red").with("dry_clean", true).with("price", 40),
            )
            .with_row(
                "shirts",
                Record::new().with("id", 2).with("color", "red").with("dry_clean", false).with("price", 25),
            )
            .with_row(
                "shirts",
                Record::new().with("id", 3).with("color", "puce").with("dry_clean", true).with("price", 30),
            ),
    );
    let shirt = EntityType::builder("Shirt").engine(engine.clone()).build();
    (engine, shirt)
}

fn ids(query: &DeferredQuery) -> Vec<i64> {
    query
        .records()
        .unwrap()
        .iter()
        .filter_map(|r| r.get("id").and_then(FilterValue::as_i64))
        .collect()
}

fn colored() -> ScopeBody {
    ScopeBody::resolver(|_query, args| match args {
        [color] => Ok(OptionSet::new().filter(Filter::equals("color", color.clone())).into()),
        _ => Err(QueryError::configuration(format!(
            "colored expects 1 argument, {} given",
            args.len()
        ))),
    })
}

// ============== Scenarios ==============

#[test]
fn test_literal_scope_filter() {
    let (_, shirt) = shirts();
    shirt.scope("red", json!({ "conditions": { "color": "red" } })).unwrap();

    let red = shirt.invoke("red", &[]).unwrap();
    assert_eq!(red.options().filter, Filter::equals("color", "red"));
}

#[test]
fn test_chained_scopes_and_their_filters() {
    let (_, shirt) = shirts();
    shirt.scope("dryCleanOnly", json!({ "conditions": { "dry_clean": true } })).unwrap();
    shirt.scope("red", json!({ "conditions": { "color": "red" } })).unwrap();

    let a = shirt.invoke("red", &[]).unwrap().invoke("dryCleanOnly", &[]).unwrap();
    let b = shirt.invoke("dry_clean_only", &[]).unwrap().invoke("red", &[]).unwrap();

    let red = Filter::equals("color", "red");
    let dry = Filter::equals("dry_clean", true);
    assert_eq!(a.options().filter.terms(), &[red.clone(), dry.clone()]);
    assert_eq!(b.options().filter.terms(), &[dry, red]);
    assert_eq!(ids(&a), vec![1]);
    assert_eq!(ids(&b), vec![1]);
}

#[test]
fn test_resolver_scope_arguments() {
    let (_, shirt) = shirts();
    shirt.scope("colored", colored()).unwrap();

    let puce = shirt.invoke("colored", &["puce".into()]).unwrap();
    let red = shirt.invoke("colored", &["red".into()]).unwrap();

    assert_eq!(puce.options().filter, Filter::equals("color", "puce"));
    assert_ne!(puce.options().filter, red.options().filter);
    assert_eq!(ids(&puce), vec![3]);

    let err = shirt.invoke("colored", &[]).unwrap_err();
    assert!(err.is_configuration_error());
    assert_eq!(err.context.scope.as_deref(), Some("colored"));
}

#[test]
fn test_extension_method_on_scope_result() {
    let (_, shirt) = shirts();
    shirt
        .scope_extended(
            "red",
            json!({ "conditions": { "color": "red" } }),
            Extension::new("red_helpers").method("dom_id", |_, _| Ok(FilterValue::from("red_shirts"))),
        )
        .unwrap();

    let red = shirt.invoke("red", &[]).unwrap();
    assert_eq!(red.call("dom_id", &[]).unwrap(), FilterValue::from("red_shirts"));

    // The extension survives further chaining.
    let limited = red.with_options(json!({ "limit": 1 })).unwrap();
    assert_eq!(limited.call("dom_id", &[]).unwrap(), FilterValue::from("red_shirts"));

    // Queries that never went through the scope lack it.
    let err = shirt.scoped().call("dom_id", &[]).unwrap_err();
    assert_eq!(err.code, ErrorCode::UnknownMethod);
}

#[test]
fn test_same_named_extensions_latest_scope_wins() {
    let (_, shirt) = shirts();
    shirt
        .scope_extended(
            "red",
            json!({ "conditions": { "color": "red" } }),
            Extension::new("dom").method("dom_id", |_, _| Ok(FilterValue::from("red_shirts"))),
        )
        .unwrap();
    shirt
        .scope_extended(
            "large",
            json!({ "conditions": { "size": "L" } }),
            Extension::new("dom").method("dom_id", |_, _| Ok(FilterValue::from("large_shirts"))),
        )
        .unwrap();

    let red_large = shirt.invoke("red", &[]).unwrap().invoke("large", &[]).unwrap();
    assert_eq!(red_large.call("dom_id", &[]).unwrap(), FilterValue::from("large_shirts"));
    assert_eq!(red_large.extensions().names(), vec!["dom"]);

    let large_red = shirt.invoke("large", &[]).unwrap().invoke("red", &[]).unwrap();
    assert_eq!(large_red.call("dom_id", &[]).unwrap(), FilterValue::from("red_shirts"));
}

#[test]
fn test_scoped_twice_without_execution() {
    let (engine, shirt) = shirts();

    let a = shirt.scoped();
    let b = shirt.scoped();

    assert!(a.options().is_empty());
    assert_eq!(a.options(), b.options());
    a.records().unwrap();
    assert!(!b.is_loaded());
    assert_eq!(engine.executions(), 1);
}

#[test]
fn test_redeclaration_replaces_body() {
    let (_, shirt) = shirts();
    shirt.scope("red", json!({ "conditions": { "color": "red" } })).unwrap();
    let declared = shirt.scope("red", json!({ "conditions": { "color": "puce" } })).unwrap();

    assert_eq!(declared, Declared::Replaced);
    let red = shirt.invoke("red", &[]).unwrap();
    assert_eq!(red.options().filter, Filter::equals("color", "puce"));
    assert_eq!(shirt.scope_names().iter().map(|n| n.as_str()).collect::<Vec<_>>(), vec!["red"]);
}

// ============== Laziness ==============

#[test]
fn test_no_execution_until_materialized() {
    let (engine, shirt) = shirts();
    shirt.scope("red", json!({ "conditions": { "color": "red" } })).unwrap();
    shirt.scope("colored", colored()).unwrap();

    let query = shirt
        .invoke("red", &[])
        .unwrap()
        .invoke("colored", &["red".into()])
        .unwrap()
        .with_options(json!({ "order": "price DESC", "include": ["buttons"] }))
        .unwrap();
    assert_eq!(engine.executions(), 0);

    assert_eq!(ids(&query), vec![1, 2]);
    assert_eq!(ids(&query), vec![1, 2]);
    assert_eq!(query.count().unwrap(), 2);
    assert_eq!(engine.executions(), 1);

    let request = &engine.requests()[0];
    assert_eq!(request.kind, QueryKind::Select);
    assert_eq!(request.options.includes.iter().collect::<Vec<_>>(), vec!["buttons"]);
}

#[test]
fn test_resolver_sees_invoking_query() {
    let (engine, shirt) = shirts();
    shirt
        .scope(
            "cheaper_page",
            ScopeBody::resolver(|query, _| {
                let limit = query.options().limit.unwrap_or(10);
                Ok(OptionSet::new().limit(limit / 2).into())
            }),
        )
        .unwrap();

    let query = shirt
        .scoped_with(json!({ "limit": 8 }), None)
        .unwrap()
        .invoke("cheaper_page", &[])
        .unwrap();
    assert_eq!(query.options().limit, Some(4));
    assert_eq!(engine.executions(), 0);
}

#[test]
fn test_prebuilt_scope_is_remerged() {
    let (_, shirt) = shirts();
    let expensive = shirt.scoped_with(json!({ "conditions": ["price > ?", 28] }), None).unwrap();
    shirt.scope("expensive", expensive).unwrap();

    let a = shirt.invoke("expensive", &[]).unwrap();
    let b = shirt.invoke("expensive", &[]).unwrap();
    assert_eq!(a.options(), b.options());
    assert!(matches!(a.options().filter, Filter::Raw { .. }));

    let (sql, params) = a.request(QueryKind::Select).to_sql();
    assert_eq!(sql, "SELECT * FROM shirts WHERE (price > $1)");
    assert_eq!(params, vec![FilterValue::Int(28)]);
}

#[test]
fn test_resolver_returning_nothing() {
    let (_, shirt) = shirts();
    shirt
        .scope(
            "maybe_color",
            ScopeBody::resolver(|_, args| {
                Ok(args
                    .first()
                    .map(|c| OptionSet::new().filter(Filter::equals("color", c.clone())))
                    .into())
            }),
        )
        .unwrap();

    let all = shirt.invoke("maybe_color", &[]).unwrap();
    assert!(all.options().is_empty());
    assert_eq!(ids(&all), vec![1, 2, 3]);

    let puce = shirt.invoke("maybe_color", &["puce".into()]).unwrap();
    assert_eq!(ids(&puce), vec![3]);
}

#[test]
fn test_aggregates() {
    let (engine, shirt) = shirts();
    shirt.scope("red", json!({ "conditions": { "color": "red" } })).unwrap();

    let red = shirt.invoke("red", &[]).unwrap();
    assert_eq!(red.aggregate(Aggregate::sum("price")).unwrap(), FilterValue::Int(65));
    assert_eq!(red.aggregate(Aggregate::max("price")).unwrap(), FilterValue::Int(40));
    assert_eq!(red.aggregate(Aggregate::sum("price")).unwrap(), FilterValue::Int(65));
    assert_eq!(engine.executions(), 2);
}

// ============== Inheritance ==============

#[test]
fn test_subtype_sees_parent_scopes_declared_later() {
    let (_, shirt) = shirts();
    let polo = EntityType::builder("Polo").parent(&shirt).build();

    // Declared after the subtype was built.
    shirt.scope("red", json!({ "conditions": { "color": "red" } })).unwrap();
    polo.scope("dry", json!({ "conditions": { "dry_clean": true } })).unwrap();

    let query = polo.invoke("red", &[]).unwrap().invoke("dry", &[]).unwrap();
    assert_eq!(query.entity(), &polo);
    assert_eq!(ids(&query), vec![1]);
    assert!(!shirt.has_scope("dry"));
}

#[test]
fn test_parent_prebuilt_scope_applies_to_subtype() {
    let (_, shirt) = shirts();
    let polo = EntityType::builder("Polo").parent(&shirt).build();
    shirt
        .scope("puce", shirt.scoped_with(json!({ "conditions": { "color": "puce" } }), None).unwrap())
        .unwrap();

    let query = polo.invoke("puce", &[]).unwrap();
    assert_eq!(query.entity(), &polo);
    assert_eq!(ids(&query), vec![3]);
}

#[test]
fn test_merge_across_entity_types_fails() {
    let (_, shirt) = shirts();
    let pants = EntityType::builder("Pants").build();
    shirt.scope("pants_only", pants.scoped()).unwrap();

    let err = shirt.invoke("pants_only", &[]).unwrap_err();
    assert!(err.is_type_mismatch());
    assert!(shirt.scoped().merge(&pants.scoped()).unwrap_err().is_type_mismatch());
}

// ============== Errors ==============

#[test]
fn test_unknown_scope_and_bad_declarations() {
    let (_, shirt) = shirts();

    assert!(shirt.invoke("red", &[]).unwrap_err().is_unknown_scope());
    assert!(shirt.scoped().invoke("red", &[]).unwrap_err().is_unknown_scope());

    assert!(shirt.scope("red", json!({ "colour": "red" })).unwrap_err().is_configuration_error());
    assert!(shirt.scope("records", json!({})).unwrap_err().is_configuration_error());
    assert!(shirt.scope("not a name", json!({})).unwrap_err().is_configuration_error());
    assert!(shirt.scope("_", json!({})).unwrap_err().is_configuration_error());
    assert!(shirt.scope("_red", json!({})).unwrap_err().is_configuration_error());
    assert!(
        shirt
            .scope("bad_binds", json!({ "conditions": ["color = ? AND size = ?", "red"] }))
            .unwrap_err()
            .is_configuration_error()
    );
    assert!(shirt.scope_names().is_empty());
}

#[test]
fn test_engine_errors_pass_through() {
    let (_, shirt) = shirts();
    shirt.scope("raw", json!({ "conditions": "price > 10" })).unwrap();

    let query = shirt.invoke("raw", &[]).unwrap();
    let err = query.count().unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidFilter);
    assert!(query.count().is_err());
}

struct UnavailableEngine;

impl QueryEngine for UnavailableEngine {
    fn execute(&self, _request: &QueryRequest) -> QueryResult<QueryOutput> {
        Err(QueryError::database("connection refused"))
    }
}

#[test]
fn test_database_errors_reach_the_caller() {
    let shirt = EntityType::builder("Shirt").engine(Arc::new(UnavailableEngine)).build();
    shirt.scope("red", json!({ "conditions": { "color": "red" } })).unwrap();

    let query = shirt.invoke("red", &[]).unwrap();
    let err = query.records().unwrap_err();
    assert_eq!(err.code, ErrorCode::DatabaseError);
    assert_eq!(err.message, "connection refused");
    assert!(!query.is_loaded());
}

// ============== Shadowing ==============

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture_warnings(f: impl FnOnce()) -> Vec<String> {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    tracing::subscriber::with_default(subscriber, f);

    let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
    output.lines().map(str::to_string).collect()
}

#[test]
fn test_shadowing_warns_once() {
    let (_, shirt) = shirts();
    let polo = EntityType::builder("Polo").parent(&shirt).class_method("bestsellers").build();
    shirt.scope("red", json!({ "conditions": { "color": "red" } })).unwrap();

    let inherited = capture_warnings(|| {
        assert_eq!(
            polo.scope("red", json!({ "conditions": { "color": "crimson" } })).unwrap(),
            Declared::Shadowed
        );
    });
    assert_eq!(inherited.len(), 1);
    assert!(inherited[0].contains("red"));
    assert!(inherited[0].contains("Polo"));

    let class_method = capture_warnings(|| {
        polo.scope("bestsellers", json!({ "order": "price DESC" })).unwrap();
    });
    assert_eq!(class_method.len(), 1);
    assert!(class_method[0].contains("class method"));

    let replaced = capture_warnings(|| {
        polo.scope("red", json!({ "conditions": { "color": "scarlet" } })).unwrap();
    });
    assert!(replaced.is_empty());

    // The shadowing declaration wins on the subtype only.
    assert_eq!(polo.invoke("red", &[]).unwrap().options().filter, Filter::equals("color", "scarlet"));
    assert_eq!(shirt.invoke("red", &[]).unwrap().options().filter, Filter::equals("color", "red"));
}

#[test]
fn test_shadow_warning_can_be_disabled() {
    let mut config = QuarryConfig::default();
    config.scopes.warn_on_shadow = false;
    let shirt = EntityType::builder("Shirt").config(config).class_method("sale").build();

    let warnings = capture_warnings(|| {
        assert_eq!(shirt.scope("sale", json!({ "limit": 1 })).unwrap(), Declared::Shadowed);
    });
    assert!(warnings.is_empty());
}
