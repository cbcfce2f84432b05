//! Translation of literal option descriptions into [`OptionSet`]s.
//!
//! A description is a JSON object whose keys name query clauses:
//!
//! | key                   | accepted values                                          |
//! |-----------------------|----------------------------------------------------------|
//! | `conditions`, `where` | object of column/value pairs, SQL string, `[sql, binds..]` |
//! | `include`             | string or array of strings                               |
//! | `joins`               | string or array of strings                               |
//! | `select`              | `"*"`, `"a, b"`, an expression, or array of columns      |
//! | `order`               | `"name DESC"`, `"a, b DESC"` or array of those           |
//! | `group`               | string or array of strings                               |
//! | `having`              | same shapes as `conditions`                              |
//! | `limit`, `offset`     | non-negative integer                                     |
//! | `from`                | string                                                   |
//! | `readonly`            | boolean                                                  |
//! | `lock`                | boolean or lock clause string                            |
//!
//! Any other key is rejected with a configuration error.
//!
//! ```rust
//! use quarry_query::{Filter, OptionSet};
//! use serde_json::json;
//!
//! let options = OptionSet::from_description(&json!({
//!     "conditions": ["price > ?", 10],
//!     "include": "buttons",
//!     "limit": 5,
//! })).unwrap();
//! assert_eq!(options.limit, Some(5));
//!
//! let err = OptionSet::from_description(&json!({ "colour": "red" })).unwrap_err();
//! assert!(err.is_configuration_error());
//! ```

use serde::Deserialize;
use serde_json::Value;

use crate::error::{QueryError, QueryResult};
use crate::filter::{Filter, FilterValue};
use crate::options::OptionSet;
use crate::types::{OrderBy, Select};

/// Keys recognized in a literal description.
pub const OPTION_KEYS: &[&str] = &[
    "conditions",
    "where",
    "include",
    "joins",
    "select",
    "order",
    "group",
    "having",
    "limit",
    "offset",
    "from",
    "readonly",
    "lock",
];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Description {
    #[serde(default, alias = "where")]
    conditions: Option<Value>,
    #[serde(default)]
    include: Option<OneOrMany>,
    #[serde(default)]
    joins: Option<OneOrMany>,
    #[serde(default)]
    select: Option<OneOrMany>,
    #[serde(default)]
    order: Option<OneOrMany>,
    #[serde(default)]
    group: Option<OneOrMany>,
    #[serde(default)]
    having: Option<Value>,
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    offset: Option<u64>,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    readonly: Option<bool>,
    #[serde(default)]
    lock: Option<Lock>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Lock {
    Flag(bool),
    Clause(String),
}

impl OptionSet {
    /// Translate a literal description into an option set.
    ///
    /// This is a pure function of its input: the same description always
    /// yields an equal option set.
    pub fn from_description(description: &Value) -> QueryResult<OptionSet> {
        let object = description.as_object().ok_or_else(|| {
            QueryError::configuration(format!(
                "An option description must be an object, got {}",
                json_kind(description)
            ))
        })?;

        if let Some(key) = object.keys().find(|k| !OPTION_KEYS.contains(&k.as_str())) {
            return Err(QueryError::unknown_option(key.as_str()));
        }
        if object.contains_key("conditions") && object.contains_key("where") {
            return Err(QueryError::invalid_option(
                "where",
                "`where` is an alias of `conditions`; give only one of them",
            ));
        }

        let parsed: Description = serde_json::from_value(description.clone()).map_err(|e| {
            QueryError::configuration(format!("Malformed option description: {}", e)).with_source(e)
        })?;

        let mut options = OptionSet::new();

        if let Some(conditions) = parsed.conditions {
            options.filter = parse_conditions("conditions", &conditions)?;
        }
        if let Some(include) = parsed.include {
            options.includes = non_empty("include", include.into_vec())?.into_iter().collect();
        }
        if let Some(joins) = parsed.joins {
            options.joins = non_empty("joins", joins.into_vec())?.into_iter().collect();
        }
        if let Some(select) = parsed.select {
            options.select = Some(match select {
                OneOrMany::One(clause) => Select::parse(&clause),
                OneOrMany::Many(columns) => Select::fields(non_empty("select", columns)?),
            });
        }
        if let Some(order) = parsed.order {
            let clause = non_empty("order", order.into_vec())?.join(", ");
            options.order = Some(OrderBy::parse(&clause)?);
        }
        if let Some(group) = parsed.group {
            options.group = Some(non_empty("group", group.into_vec())?.join(", "));
        }
        if let Some(having) = parsed.having {
            let having = parse_conditions("having", &having)?;
            options.having = (!having.is_none()).then_some(having);
        }
        options.limit = parsed.limit;
        options.offset = parsed.offset;
        options.from = parsed.from;
        options.readonly = parsed.readonly;
        options.lock = match parsed.lock {
            None | Some(Lock::Flag(false)) => None,
            Some(Lock::Flag(true)) => Some("FOR UPDATE".to_string()),
            Some(Lock::Clause(clause)) => Some(clause),
        };

        Ok(options)
    }
}

fn non_empty(key: &str, values: Vec<String>) -> QueryResult<Vec<String>> {
    if values.iter().any(|v| v.trim().is_empty()) {
        return Err(QueryError::invalid_option(key, "entries must not be empty"));
    }
    Ok(values)
}

/// Translate the value of a `conditions` (or `having`) key into a filter.
fn parse_conditions(key: &str, value: &Value) -> QueryResult<Filter> {
    match value {
        Value::Null => Ok(Filter::None),
        Value::String(sql) => Ok(Filter::sql(sql.clone())),
        Value::Object(pairs) => {
            let mut terms = Vec::with_capacity(pairs.len());
            for (column, value) in pairs {
                let term = match value {
                    Value::Null => Filter::IsNull(column.clone()),
                    Value::Array(items) => {
                        Filter::In(column.clone(), items.iter().map(FilterValue::from_json).collect())
                    }
                    Value::Object(_) => {
                        return Err(QueryError::invalid_option(
                            key,
                            format!("nested object given for column `{}`", column),
                        ));
                    }
                    scalar => Filter::Equals(column.clone(), FilterValue::from_json(scalar)),
                };
                terms.push(term);
            }
            Ok(Filter::and(terms))
        }
        Value::Array(items) => {
            let (sql, binds) = items
                .split_first()
                .ok_or_else(|| QueryError::invalid_option(key, "empty condition array"))?;
            let sql = sql.as_str().ok_or_else(|| {
                QueryError::invalid_option(key, "the first element of a condition array must be SQL text")
            })?;
            let placeholders = sql.matches('?').count();
            if placeholders != binds.len() {
                return Err(QueryError::invalid_option(
                    key,
                    format!(
                        "`{}` has {} placeholder(s) but {} binding(s) were given",
                        sql,
                        placeholders,
                        binds.len()
                    ),
                ));
            }
            Ok(Filter::raw(sql, binds.iter().map(FilterValue::from_json)))
        }
        other => Err(QueryError::invalid_option(
            key,
            format!("expected an object, string or array, got {}", json_kind(other)),
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Values that can be merged into a query as options: an [`OptionSet`] or a
/// literal description.
pub trait IntoOptionSet {
    /// Convert into an option set, translating descriptions.
    fn into_option_set(self) -> QueryResult<OptionSet>;
}

impl IntoOptionSet for OptionSet {
    fn into_option_set(self) -> QueryResult<OptionSet> {
        Ok(self)
    }
}

impl IntoOptionSet for &OptionSet {
    fn into_option_set(self) -> QueryResult<OptionSet> {
        Ok(self.clone())
    }
}

impl IntoOptionSet for Value {
    fn into_option_set(self) -> QueryResult<OptionSet> {
        OptionSet::from_description(&self)
    }
}

impl IntoOptionSet for &Value {
    fn into_option_set(self) -> QueryResult<OptionSet> {
        OptionSet::from_description(self)
    }
}
