//! Integration tests for ambient default scopes.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use quarry::prelude::*;
use serde_json::json;

fn tenants() -> (Arc<InMemoryEngine>, EntityType) {
    let engine = Arc::new(
        InMemoryEngine::new()
            .with_row("invoices", Record::new().with("id", 1).with("tenant_id", 7).with("paid", true))
            .with_row("invoices", Record::new().with("id", 2).with("tenant_id", 7).with("paid", false))
            .with_row("invoices", Record::new().with("id", 3).with("tenant_id", 8).with("paid", true)),
    );
    let invoice = EntityType::builder("Invoice")
        .engine(engine.clone())
        .default_options(OptionSet::new().order(OrderByField::asc("id")))
        .build();
    (engine, invoice)
}

fn tenant(id: i64) -> OptionSet {
    OptionSet::new().filter(Filter::equals("tenant_id", id))
}

#[test]
fn test_ambient_scope_applies_inside_guard_only() {
    let (_, invoice) = tenants();

    {
        let _guard = invoice.push_scope(tenant(7));
        assert_eq!(invoice.scoped().count().unwrap(), 2);
    }
    assert_eq!(invoice.scoped().count().unwrap(), 3);
}

#[test]
fn test_ambient_scope_reaches_scope_invocations() {
    let (_, invoice) = tenants();
    invoice.scope("paid", json!({ "conditions": { "paid": true } })).unwrap();

    let paid = invoice.with_scope(tenant(8), || invoice.invoke("paid", &[]).unwrap());
    assert_eq!(paid.count().unwrap(), 1);

    // Queries built inside keep their options after the scope is released.
    assert_eq!(paid.options().filter.terms().len(), 2);
    assert_eq!(invoice.invoke("paid", &[]).unwrap().count().unwrap(), 2);
}

#[test]
fn test_nested_ambient_scopes_stack() {
    let (_, invoice) = tenants();

    invoice.with_scope(OptionSet::new().limit(10), || {
        invoice.with_scope(tenant(7).limit(1), || {
            let options = invoice.scoped().options().clone();
            assert_eq!(options.limit, Some(1));
            assert_eq!(options.filter, Filter::equals("tenant_id", 7));
            assert!(options.order.is_some());
        });
        assert_eq!(invoice.scoped().options().limit, Some(10));
    });
    assert_eq!(invoice.scoped().options().limit, None);
}

#[test]
fn test_ambient_scope_released_on_panic() {
    let (_, invoice) = tenants();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _: () = invoice.with_scope(tenant(7), || panic!("request failed"));
    }));

    assert!(result.is_err());
    assert!(invoice.scoped().options().filter.is_none());
}

#[test]
fn test_ambient_scope_released_on_early_return() {
    let (_, invoice) = tenants();

    let lookup = |id: i64| -> QueryResult<Option<i64>> {
        let _guard = invoice.push_scope(tenant(7));
        let query = invoice.scoped().with_options(json!({ "conditions": { "id": id } }))?;
        let Some(found) = query.first()? else {
            return Ok(None);
        };
        Ok(found.get("id").and_then(FilterValue::as_i64))
    };

    assert_eq!(lookup(3).unwrap(), None);
    assert_eq!(lookup(2).unwrap(), Some(2));
    assert!(invoice.scoped().options().filter.is_none());
}

#[test]
fn test_ambient_scope_is_per_type_and_per_thread() {
    let (_, invoice) = tenants();
    let customer = EntityType::builder("Customer").build();

    let _guard = invoice.push_scope(tenant(7));
    assert!(customer.scoped().options().filter.is_none());

    let other_thread = {
        let invoice = invoice.clone();
        std::thread::spawn(move || invoice.scoped().options().filter.is_none())
            .join()
            .unwrap()
    };
    assert!(other_thread);
    assert!(!invoice.scoped().options().filter.is_none());
}
