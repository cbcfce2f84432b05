//! Filter types for the conditions of an option set.
//!
//! A [`Filter`] is a tree of predicates. Each leaf owns its parameter
//! bindings, so two filters can be combined with [`Filter::and_then`] without
//! renumbering or deduplicating anything; placeholders are only assigned when
//! the tree is rendered with [`Filter::to_sql`].

use serde::{Deserialize, Serialize};

/// A filter value that can be used in comparisons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// String value.
    String(String),
    /// JSON value.
    Json(serde_json::Value),
    /// List of values.
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// Check if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the string value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer value, if this is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get a numeric view of this value (integers widen to floats).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Convert a JSON scalar into a filter value.
    ///
    /// Arrays become [`FilterValue::List`]; objects are kept as JSON.
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            Value::Object(_) => Self::Json(value.clone()),
        }
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for FilterValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

/// A complete filter that can be converted to SQL.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// No filter (always true).
    #[default]
    None,

    /// Equals comparison.
    Equals(String, FilterValue),
    /// Not equals comparison.
    NotEquals(String, FilterValue),

    /// Less than comparison.
    Lt(String, FilterValue),
    /// Less than or equal comparison.
    Lte(String, FilterValue),
    /// Greater than comparison.
    Gt(String, FilterValue),
    /// Greater than or equal comparison.
    Gte(String, FilterValue),

    /// In a list of values.
    In(String, Vec<FilterValue>),
    /// Not in a list of values.
    NotIn(String, Vec<FilterValue>),

    /// Contains (LIKE %value%).
    Contains(String, FilterValue),
    /// Starts with (LIKE value%).
    StartsWith(String, FilterValue),

    /// Is null check.
    IsNull(String),
    /// Is not null check.
    IsNotNull(String),

    /// Raw SQL fragment with `?` placeholders and their bindings.
    Raw {
        /// The SQL text.
        sql: String,
        /// Values bound to the `?` placeholders, in order.
        params: Vec<FilterValue>,
    },

    /// Logical AND of multiple filters.
    And(Vec<Filter>),
    /// Logical OR of multiple filters.
    Or(Vec<Filter>),
    /// Logical NOT of a filter.
    Not(Box<Filter>),
}

impl Filter {
    /// Create an empty filter (matches everything).
    pub fn none() -> Self {
        Self::None
    }

    /// Check if this filter is empty.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Create an equality filter.
    pub fn equals(column: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::Equals(column.into(), value.into())
    }

    /// Create a raw SQL filter without bindings.
    pub fn sql(sql: impl Into<String>) -> Self {
        Self::Raw {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Create a raw SQL filter with positional bindings.
    pub fn raw(sql: impl Into<String>, params: impl IntoIterator<Item = FilterValue>) -> Self {
        Self::Raw {
            sql: sql.into(),
            params: params.into_iter().collect(),
        }
    }

    /// Create an AND filter.
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        let mut filters: Vec<_> = filters.into_iter().filter(|f| !f.is_none()).collect();
        match filters.len() {
            0 => Self::None,
            1 => filters.remove(0),
            _ => Self::And(filters),
        }
    }

    /// Create an OR filter.
    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        let mut filters: Vec<_> = filters.into_iter().filter(|f| !f.is_none()).collect();
        match filters.len() {
            0 => Self::None,
            1 => filters.remove(0),
            _ => Self::Or(filters),
        }
    }

    /// Create a NOT filter.
    pub fn not(filter: Filter) -> Self {
        if filter.is_none() {
            return Self::None;
        }
        Self::Not(Box::new(filter))
    }

    /// Combine with another filter using AND.
    ///
    /// Terms are appended as-is: nothing is deduplicated and every term keeps
    /// its own bindings.
    pub fn and_then(self, other: Filter) -> Self {
        if self.is_none() {
            return other;
        }
        if other.is_none() {
            return self;
        }
        match (self, other) {
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), other) => {
                left.push(other);
                Self::And(left)
            }
            (this, Self::And(right)) => {
                let mut filters = Vec::with_capacity(right.len() + 1);
                filters.push(this);
                filters.extend(right);
                Self::And(filters)
            }
            (this, other) => Self::And(vec![this, other]),
        }
    }

    /// Combine with another filter using OR.
    pub fn or_else(self, other: Filter) -> Self {
        if self.is_none() {
            return other;
        }
        if other.is_none() {
            return self;
        }
        match self {
            Self::Or(mut filters) => {
                filters.push(other);
                Self::Or(filters)
            }
            _ => Self::Or(vec![self, other]),
        }
    }

    /// The top-level AND terms of this filter.
    pub fn terms(&self) -> &[Filter] {
        match self {
            Self::None => &[],
            Self::And(filters) => filters,
            other => std::slice::from_ref(other),
        }
    }

    /// Count every bound parameter in the tree.
    pub fn param_count(&self) -> usize {
        match self {
            Self::None | Self::IsNull(_) | Self::IsNotNull(_) => 0,
            Self::Equals(_, v) | Self::NotEquals(_, v) => usize::from(!v.is_null()),
            Self::Lt(..)
            | Self::Lte(..)
            | Self::Gt(..)
            | Self::Gte(..)
            | Self::Contains(..)
            | Self::StartsWith(..) => 1,
            Self::In(_, values) | Self::NotIn(_, values) => values.len(),
            Self::Raw { params, .. } => params.len(),
            Self::And(filters) | Self::Or(filters) => filters.iter().map(Self::param_count).sum(),
            Self::Not(inner) => inner.param_count(),
        }
    }

    /// Generate SQL for this filter with parameter placeholders.
    /// Returns (sql, params) where params are the values to bind.
    ///
    /// Placeholders are numbered `$offset+1`, `$offset+2`, ...
    pub fn to_sql(&self, param_offset: usize) -> (String, Vec<FilterValue>) {
        let mut params = Vec::with_capacity(self.param_count());
        let sql = self.write_sql(param_offset, &mut params);
        (sql, params)
    }

    fn bind(offset: usize, params: &mut Vec<FilterValue>, value: FilterValue) -> String {
        params.push(value);
        format!("${}", offset + params.len())
    }

    fn write_sql(&self, offset: usize, params: &mut Vec<FilterValue>) -> String {
        match self {
            Self::None => "TRUE".to_string(),

            Self::Equals(col, val) => {
                if val.is_null() {
                    format!("{} IS NULL", col)
                } else {
                    format!("{} = {}", col, Self::bind(offset, params, val.clone()))
                }
            }
            Self::NotEquals(col, val) => {
                if val.is_null() {
                    format!("{} IS NOT NULL", col)
                } else {
                    format!("{} != {}", col, Self::bind(offset, params, val.clone()))
                }
            }

            Self::Lt(col, val) => format!("{} < {}", col, Self::bind(offset, params, val.clone())),
            Self::Lte(col, val) => format!("{} <= {}", col, Self::bind(offset, params, val.clone())),
            Self::Gt(col, val) => format!("{} > {}", col, Self::bind(offset, params, val.clone())),
            Self::Gte(col, val) => format!("{} >= {}", col, Self::bind(offset, params, val.clone())),

            Self::In(col, values) => {
                if values.is_empty() {
                    return "FALSE".to_string();
                }
                let placeholders: Vec<_> = values
                    .iter()
                    .map(|v| Self::bind(offset, params, v.clone()))
                    .collect();
                format!("{} IN ({})", col, placeholders.join(", "))
            }
            Self::NotIn(col, values) => {
                if values.is_empty() {
                    return "TRUE".to_string();
                }
                let placeholders: Vec<_> = values
                    .iter()
                    .map(|v| Self::bind(offset, params, v.clone()))
                    .collect();
                format!("{} NOT IN ({})", col, placeholders.join(", "))
            }

            Self::Contains(col, val) => {
                let pattern = match val {
                    FilterValue::String(s) => FilterValue::String(format!("%{}%", s)),
                    other => other.clone(),
                };
                format!("{} LIKE {}", col, Self::bind(offset, params, pattern))
            }
            Self::StartsWith(col, val) => {
                let pattern = match val {
                    FilterValue::String(s) => FilterValue::String(format!("{}%", s)),
                    other => other.clone(),
                };
                format!("{} LIKE {}", col, Self::bind(offset, params, pattern))
            }

            Self::IsNull(col) => format!("{} IS NULL", col),
            Self::IsNotNull(col) => format!("{} IS NOT NULL", col),

            Self::Raw { sql, params: bound } => {
                let mut out = String::with_capacity(sql.len() + bound.len() * 2);
                let mut values = bound.iter();
                for ch in sql.chars() {
                    if ch == '?' {
                        if let Some(value) = values.next() {
                            out.push_str(&Self::bind(offset, params, value.clone()));
                            continue;
                        }
                    }
                    out.push(ch);
                }
                format!("({})", out)
            }

            Self::And(filters) => {
                if filters.is_empty() {
                    return "TRUE".to_string();
                }
                let parts: Vec<_> = filters.iter().map(|f| f.write_sql(offset, params)).collect();
                format!("({})", parts.join(" AND "))
            }
            Self::Or(filters) => {
                if filters.is_empty() {
                    return "FALSE".to_string();
                }
                let parts: Vec<_> = filters.iter().map(|f| f.write_sql(offset, params)).collect();
                format!("({})", parts.join(" OR "))
            }
            Self::Not(filter) => format!("NOT ({})", filter.write_sql(offset, params)),
        }
    }
}
