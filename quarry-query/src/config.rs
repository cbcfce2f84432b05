//! Configuration file parsing for `quarry.toml`.
//!
//! ```toml
//! [scopes]
//! warn_on_shadow = true
//! normalize_names = true
//! reserved_names = ["archive"]
//!
//! [debug]
//! log_invocations = false
//!
//! [environments.test.debug]
//! log_invocations = true
//! ```
//!
//! Values of the form `${VAR}` are replaced by the environment variable
//! `VAR` before parsing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{QueryError, QueryResult};

/// Main configuration structure for `quarry.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QuarryConfig {
    /// Scope declaration settings.
    #[serde(default)]
    pub scopes: ScopeConfig,

    /// Debug/logging settings.
    #[serde(default)]
    pub debug: DebugConfig,

    /// Environment-specific overrides.
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentOverride>,
}

impl QuarryConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> QueryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            QueryError::configuration(format!("Failed to read {}", path.display())).with_source(e)
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> QueryResult<Self> {
        let expanded = expand_env_vars(content);

        toml::from_str(&expanded).map_err(|e| {
            QueryError::configuration(format!("Invalid quarry.toml: {}", e.message())).with_source(e)
        })
    }

    /// Apply environment-specific overrides.
    pub fn with_environment(mut self, env: &str) -> Self {
        if let Some(overrides) = self.environments.remove(env) {
            if let Some(scopes) = overrides.scopes {
                if let Some(warn) = scopes.warn_on_shadow {
                    self.scopes.warn_on_shadow = warn;
                }
                if let Some(normalize) = scopes.normalize_names {
                    self.scopes.normalize_names = normalize;
                }
                if let Some(reserved) = scopes.reserved_names {
                    self.scopes.reserved_names = reserved;
                }
            }
            if let Some(debug) = overrides.debug {
                if let Some(log_invocations) = debug.log_invocations {
                    self.debug.log_invocations = log_invocations;
                }
            }
        }
        self
    }
}

/// Scope declaration settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScopeConfig {
    /// Emit a warning when a declaration shadows a reachable method.
    #[serde(default = "default_true")]
    pub warn_on_shadow: bool,

    /// Convert scope names to snake_case before registering them.
    #[serde(default = "default_true")]
    pub normalize_names: bool,

    /// Names that may not be declared, on top of the built-in accessors.
    #[serde(default)]
    pub reserved_names: Vec<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            warn_on_shadow: true,
            normalize_names: true,
            reserved_names: Vec::new(),
        }
    }
}

/// Debug/logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DebugConfig {
    /// Log every scope invocation at debug level.
    #[serde(default)]
    pub log_invocations: bool,
}

/// Environment-specific configuration overrides.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentOverride {
    /// Scope overrides.
    pub scopes: Option<ScopeOverride>,
    /// Debug overrides.
    pub debug: Option<DebugOverride>,
}

/// Scope settings that an environment may override.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScopeOverride {
    /// Override for `scopes.warn_on_shadow`.
    pub warn_on_shadow: Option<bool>,
    /// Override for `scopes.normalize_names`.
    pub normalize_names: Option<bool>,
    /// Override for `scopes.reserved_names`.
    pub reserved_names: Option<Vec<String>>,
}

/// Debug settings that an environment may override.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DebugOverride {
    /// Override for `debug.log_invocations`.
    pub log_invocations: Option<bool>,
}

fn default_true() -> bool {
    true
}

/// Expand `${VAR}` references from the process environment.
///
/// Unset variables are left untouched.
fn expand_env_vars(content: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}").expect("static pattern is valid");

    re.replace_all(content, |cap: &regex_lite::Captures<'_>| {
        std::env::var(&cap[1]).unwrap_or_else(|_| cap[0].to_string())
    })
    .into_owned()
}
