//! Error types for scope declaration, composition and execution.
//!
//! Every failure in this crate is a [`QueryError`] carrying an [`ErrorCode`],
//! a message and optional context (entity, scope, operation, suggestions).
//!
//! # Error Codes
//!
//! Error codes follow a pattern: Q{category}{number}
//! - 1xxx: Query errors (unknown scope, type mismatch, invalid filter)
//! - 5xxx: Execution errors reported by the query engine
//! - 7xxx: Configuration errors (bad descriptions, bad scope names)
//!
//! ```rust
//! use quarry_query::{ErrorCode, QueryError};
//!
//! let err = QueryError::unknown_scope("Shirt", "red");
//! assert_eq!(err.code, ErrorCode::UnknownScope);
//! assert!(err.to_string().contains("red"));
//! ```

use std::fmt;
use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Query errors (1xxx)
    /// Record not found (Q1001).
    RecordNotFound = 1001,
    /// Invalid filter or condition (Q1003).
    InvalidFilter = 1003,
    /// No scope with the requested name (Q1006).
    UnknownScope = 1006,
    /// No extension method with the requested name (Q1007).
    UnknownMethod = 1007,
    /// Two queries over different entity types were merged (Q1008).
    TypeMismatch = 1008,

    // Execution errors (5xxx)
    /// General database error (Q5005).
    DatabaseError = 5005,
    /// The engine returned an output of the wrong shape (Q5006).
    UnexpectedOutput = 5006,

    // Configuration errors (7xxx)
    /// Invalid configuration (Q7001).
    InvalidConfiguration = 7001,
}

impl ErrorCode {
    /// Get the error code string (e.g., "Q1006").
    pub fn code(&self) -> String {
        format!("Q{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::RecordNotFound => "Record not found",
            Self::InvalidFilter => "Invalid filter condition",
            Self::UnknownScope => "Unknown scope",
            Self::UnknownMethod => "Unknown extension method",
            Self::TypeMismatch => "Entity type mismatch",
            Self::DatabaseError => "Database error",
            Self::UnexpectedOutput => "Unexpected engine output",
            Self::InvalidConfiguration => "Invalid configuration",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Suggestion for fixing an error.
#[derive(Debug, Clone)]
pub struct Suggestion {
    /// The suggestion text.
    pub text: String,
    /// Optional code example.
    pub code: Option<String>,
}

impl Suggestion {
    /// Create a new suggestion.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            code: None,
        }
    }

    /// Add a code example.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation that was being performed.
    pub operation: Option<String>,
    /// The entity type involved.
    pub entity: Option<String>,
    /// The scope involved.
    pub scope: Option<String>,
    /// The option key or field involved.
    pub field: Option<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<Suggestion>,
    /// Help text.
    pub help: Option<String>,
}

/// Errors that can occur while declaring, composing or executing scopes.
#[derive(Error, Debug)]
pub struct QueryError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl QueryError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add context about the operation.
    pub fn with_context(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(Suggestion::new(suggestion));
        self
    }

    /// Add a code suggestion.
    pub fn with_code_suggestion(mut self, text: impl Into<String>, code: impl Into<String>) -> Self {
        self.context.suggestions.push(Suggestion::new(text).with_code(code));
        self
    }

    /// Add help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.context.help = Some(help.into());
        self
    }

    /// Set the entity type.
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.context.entity = Some(entity.into());
        self
    }

    /// Set the scope name.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.context.scope = Some(scope.into());
        self
    }

    /// Set the option key or field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.context.field = Some(field.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // ============== Constructor Functions ==============

    /// Create a configuration error.
    ///
    /// Raised for malformed option descriptions, unrecognized option keys,
    /// invalid scope names and unreadable config files.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, message)
    }

    /// Create an error for an option key that is not recognized.
    pub fn unknown_option(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::configuration(format!("Unknown option key `{}`", key))
            .with_field(&key)
            .with_suggestion(
                "Use one of: conditions, where, include, joins, select, order, group, having, limit, offset, from, readonly, lock",
            )
    }

    /// Create an error for a malformed option value.
    pub fn invalid_option(key: impl Into<String>, message: impl Into<String>) -> Self {
        let key = key.into();
        Self::configuration(format!("Invalid value for option `{}`: {}", key, message.into()))
            .with_field(&key)
    }

    /// Create an error for a scope name that cannot be declared.
    pub fn invalid_scope_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        let name = name.into();
        Self::configuration(format!("Invalid scope name `{}`: {}", name, reason.into()))
            .with_scope(&name)
    }

    /// Create an error for a scope that does not exist on an entity type.
    pub fn unknown_scope(entity: impl Into<String>, scope: impl Into<String>) -> Self {
        let entity = entity.into();
        let scope = scope.into();
        Self::new(
            ErrorCode::UnknownScope,
            format!("No scope named `{}` is declared on {}", scope, entity),
        )
        .with_entity(&entity)
        .with_scope(&scope)
        .with_code_suggestion(
            "Declare the scope before invoking it",
            format!("{}.scope(\"{}\", ScopeBody::literal(json!({{ ... }})))?", entity.to_lowercase(), scope),
        )
    }

    /// Create an error for an extension method that is not attached.
    pub fn unknown_method(entity: impl Into<String>, method: impl Into<String>) -> Self {
        let entity = entity.into();
        let method = method.into();
        Self::new(
            ErrorCode::UnknownMethod,
            format!("No extension method `{}` is attached to this {} query", method, entity),
        )
        .with_entity(&entity)
        .with_field(&method)
        .with_suggestion("Attach an extension with `extending` or declare the scope with `scope_extended`")
    }

    /// Create an error for merging queries over different entity types.
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        let expected = expected.into();
        let found = found.into();
        Self::new(
            ErrorCode::TypeMismatch,
            format!("Cannot merge a {} query into a {} query", found, expected),
        )
        .with_entity(&expected)
        .with_help("Both sides of a merge must target the same entity type")
    }

    /// Create a not found error.
    pub fn not_found(entity: impl Into<String>) -> Self {
        let entity = entity.into();
        Self::new(
            ErrorCode::RecordNotFound,
            format!("No {} record found matching the query", entity),
        )
        .with_entity(&entity)
    }

    /// Create an error for an engine output of the wrong shape.
    pub fn unexpected_output(expected: &str) -> Self {
        Self::new(
            ErrorCode::UnexpectedOutput,
            format!("Query engine returned an unexpected output, expected {}", expected),
        )
        .with_help("This is a bug in the query engine implementation")
    }

    /// Create a general database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message.into())
            .with_suggestion("Check the database logs for more details")
    }

    // ============== Error Checks ==============

    /// Check if this is a configuration error.
    pub fn is_configuration_error(&self) -> bool {
        self.code == ErrorCode::InvalidConfiguration
    }

    /// Check if this is a type mismatch error.
    pub fn is_type_mismatch(&self) -> bool {
        self.code == ErrorCode::TypeMismatch
    }

    /// Check if this is an unknown scope error.
    pub fn is_unknown_scope(&self) -> bool {
        self.code == ErrorCode::UnknownScope
    }

    /// Check if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::RecordNotFound
    }

    /// Get the error code.
    pub fn error_code(&self) -> &ErrorCode {
        &self.code
    }

    /// Display the full error with all context and suggestions.
    pub fn display_full(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error [{}]: {}\n", self.code.code(), self.message));

        if let Some(ref op) = self.context.operation {
            output.push_str(&format!("  → While: {}\n", op));
        }
        if let Some(ref entity) = self.context.entity {
            output.push_str(&format!("  → Entity: {}\n", entity));
        }
        if let Some(ref scope) = self.context.scope {
            output.push_str(&format!("  → Scope: {}\n", scope));
        }
        if let Some(ref field) = self.context.field {
            output.push_str(&format!("  → Field: {}\n", field));
        }

        if !self.context.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for (i, suggestion) in self.context.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion.text));
                if let Some(ref code) = suggestion.code {
                    output.push_str(&format!("     ```\n     {}\n     ```\n", code.replace('\n', "\n     ")));
                }
            }
        }

        if let Some(ref help) = self.context.help {
            output.push_str(&format!("\nHelp: {}\n", help));
        }

        output
    }
}

/// Helper for creating errors with context.
#[macro_export]
macro_rules! query_error {
    ($code:expr, $msg:expr) => {
        $crate::error::QueryError::new($code, $msg)
    };
    ($code:expr, $msg:expr, $($key:ident = $value:expr),+ $(,)?) => {{
        let mut err = $crate::error::QueryError::new($code, $msg);
        $(
            err = err.$key($value);
        )+
        err
    }};
}
