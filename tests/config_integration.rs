//! Integration tests for configuration parsing and handling.
//!
//! These tests verify that `quarry.toml` settings reach the entity types
//! built with them.

use pretty_assertions::assert_eq;
use quarry::prelude::*;
use quarry::quarry_query::Declared;
use serde_json::json;

/// Test minimal configuration
#[test]
fn test_config_minimal() {
    let config = QuarryConfig::parse("").expect("Failed to parse config");
    assert_eq!(config, QuarryConfig::default());
}

/// Test full configuration with all options
#[test]
fn test_config_full() {
    let config = QuarryConfig::parse(
        r#"
        [scopes]
        warn_on_shadow = false
        normalize_names = false
        reserved_names = ["archive", "purge"]

        [debug]
        log_invocations = true

        [environments.production.debug]
        log_invocations = false
    "#,
    )
    .expect("Failed to parse config");

    assert!(!config.scopes.warn_on_shadow);
    assert!(!config.scopes.normalize_names);
    assert_eq!(config.scopes.reserved_names, vec!["archive", "purge"]);
    assert!(config.debug.log_invocations);

    let production = config.with_environment("production");
    assert!(!production.debug.log_invocations);
}

#[test]
fn test_config_rejects_unknown_keys() {
    let err = QuarryConfig::parse("[scope]\nwarn_on_shadow = true\n").unwrap_err();
    assert!(err.is_configuration_error());
    assert!(err.message.contains("quarry.toml"));
}

#[test]
fn test_config_from_file_drives_entity() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quarry.toml");
    std::fs::write(
        &path,
        r#"
        [scopes]
        normalize_names = false
        reserved_names = ["archive"]
    "#,
    )
    .unwrap();

    let config = QuarryConfig::from_file(&path).unwrap();
    let shirt = EntityType::builder("Shirt").config(config).build();

    assert!(shirt.scope("archive", json!({})).unwrap_err().is_configuration_error());
    assert_eq!(shirt.scope("dryCleanOnly", json!({})).unwrap(), Declared::New);
    assert!(shirt.has_scope("dryCleanOnly"));
    assert!(!shirt.has_scope("dry_clean_only"));
}

#[test]
fn test_subtype_inherits_config() {
    let config = QuarryConfig::parse("[scopes]\nreserved_names = [\"purge\"]\n").unwrap();
    let shirt = EntityType::builder("Shirt").config(config).build();
    let polo = EntityType::builder("Polo").parent(&shirt).build();

    assert!(polo.scope("purge", json!({})).is_err());
    assert_eq!(polo.config(), shirt.config());
}
