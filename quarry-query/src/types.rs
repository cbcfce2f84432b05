//! Ordering and projection types used by option sets.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use crate::error::{QueryError, QueryResult};

/// Sort order for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    /// Ascending order (A-Z, 0-9, oldest first).
    #[default]
    Asc,
    /// Descending order (Z-A, 9-0, newest first).
    Desc,
}

impl SortOrder {
    /// Get the SQL keyword for this sort order.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

/// Null handling in sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NullsOrder {
    /// Nulls appear first in the results.
    First,
    /// Nulls appear last in the results.
    Last,
}

impl NullsOrder {
    /// Get the SQL clause for this null order.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::First => "NULLS FIRST",
            Self::Last => "NULLS LAST",
        }
    }
}

/// Order by specification for a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByField {
    /// The column name to order by.
    pub column: Cow<'static, str>,
    /// The sort order.
    pub order: SortOrder,
    /// Null handling (optional).
    pub nulls: Option<NullsOrder>,
}

impl OrderByField {
    /// Create a new order by field.
    pub fn new(column: impl Into<Cow<'static, str>>, order: SortOrder) -> Self {
        Self {
            column: column.into(),
            order,
            nulls: None,
        }
    }

    /// Set null handling.
    pub fn nulls(mut self, nulls: NullsOrder) -> Self {
        self.nulls = Some(nulls);
        self
    }

    /// Create an ascending order.
    pub fn asc(column: impl Into<Cow<'static, str>>) -> Self {
        Self::new(column, SortOrder::Asc)
    }

    /// Create a descending order.
    pub fn desc(column: impl Into<Cow<'static, str>>) -> Self {
        Self::new(column, SortOrder::Desc)
    }

    /// Parse a single ordering term such as `name`, `name DESC` or
    /// `score DESC NULLS LAST`.
    pub fn parse(term: &str) -> QueryResult<Self> {
        let words: Vec<&str> = term.split_whitespace().collect();
        let invalid = || QueryError::invalid_option("order", format!("cannot parse `{}`", term.trim()));

        let (column, rest) = words.split_first().ok_or_else(invalid)?;
        let mut field = Self::asc(column.to_string());
        let mut rest = rest.iter().map(|w| w.to_ascii_uppercase());

        match rest.next().as_deref() {
            None => return Ok(field),
            Some("ASC") => {}
            Some("DESC") => field.order = SortOrder::Desc,
            Some(_) => return Err(invalid()),
        }
        match (rest.next().as_deref(), rest.next().as_deref(), rest.next()) {
            (None, None, None) => Ok(field),
            (Some("NULLS"), Some("FIRST"), None) => Ok(field.nulls(NullsOrder::First)),
            (Some("NULLS"), Some("LAST"), None) => Ok(field.nulls(NullsOrder::Last)),
            _ => Err(invalid()),
        }
    }

    /// Generate the SQL for this order by field.
    pub fn to_sql(&self) -> String {
        let mut sql = String::with_capacity(self.column.len() + 17);
        self.write_sql(&mut sql);
        sql
    }

    /// Write the SQL directly to a buffer.
    #[inline]
    pub fn write_sql(&self, buffer: &mut String) {
        buffer.push_str(&self.column);
        buffer.push(' ');
        buffer.push_str(self.order.as_sql());
        if let Some(nulls) = self.nulls {
            buffer.push(' ');
            buffer.push_str(nulls.as_sql());
        }
    }
}

/// Order by specification that can be a single field or multiple fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderBy {
    /// Order by a single field.
    Field(OrderByField),
    /// Order by multiple fields.
    Fields(Box<[OrderByField]>),
}

impl OrderBy {
    /// Create an empty order by (no ordering).
    pub fn none() -> Self {
        Self::Fields(Box::new([]))
    }

    /// Check if the order by is empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Field(_) => false,
            Self::Fields(fields) => fields.is_empty(),
        }
    }

    /// Add a field to the order by.
    pub fn then(self, field: OrderByField) -> Self {
        match self {
            Self::Field(existing) => Self::Fields(vec![existing, field].into_boxed_slice()),
            Self::Fields(existing) => {
                let mut fields: Vec<_> = existing.into_vec();
                fields.push(field);
                Self::from(fields)
            }
        }
    }

    /// Create an OrderBy from multiple fields.
    pub fn from_fields(fields: impl IntoIterator<Item = OrderByField>) -> Self {
        Self::from(fields.into_iter().collect::<Vec<_>>())
    }

    /// Parse a comma separated ordering clause such as `name ASC, id DESC`.
    pub fn parse(clause: &str) -> QueryResult<Self> {
        let fields = clause
            .split(',')
            .map(OrderByField::parse)
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(Self::from(fields))
    }

    /// The fields in this ordering.
    pub fn fields(&self) -> &[OrderByField] {
        match self {
            Self::Field(field) => std::slice::from_ref(field),
            Self::Fields(fields) => fields,
        }
    }

    /// Generate the SQL ORDER BY clause (without the "ORDER BY" keyword).
    pub fn to_sql(&self) -> String {
        let mut sql = String::new();
        for (i, field) in self.fields().iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            field.write_sql(&mut sql);
        }
        sql
    }
}

impl From<OrderByField> for OrderBy {
    fn from(field: OrderByField) -> Self {
        Self::Field(field)
    }
}

impl From<Vec<OrderByField>> for OrderBy {
    fn from(mut fields: Vec<OrderByField>) -> Self {
        match fields.len() {
            0 => Self::none(),
            1 => Self::Field(fields.remove(0)),
            _ => Self::Fields(fields.into_boxed_slice()),
        }
    }
}

/// Field selection for queries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Select {
    /// Select all fields.
    #[default]
    All,
    /// Select specific fields.
    Fields(Vec<String>),
    /// A raw projection expression, kept verbatim.
    Expr(String),
}

impl Select {
    /// Create a selection for all fields.
    pub fn all() -> Self {
        Self::All
    }

    /// Create a selection for specific fields.
    pub fn fields(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Fields(fields.into_iter().map(Into::into).collect())
    }

    /// Parse a projection: `*`, a comma separated column list, or anything
    /// else (function calls, aliases) as a raw expression.
    pub fn parse(clause: &str) -> Self {
        let clause = clause.trim();
        if clause == "*" {
            return Self::All;
        }
        let columns: Vec<&str> = clause.split(',').map(str::trim).collect();
        let plain = columns
            .iter()
            .all(|c| !c.is_empty() && c.chars().all(|ch| ch.is_alphanumeric() || ch == '_' || ch == '.'));
        if plain {
            Self::fields(columns)
        } else {
            Self::Expr(clause.to_string())
        }
    }

    /// Check if this selects all fields.
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Generate the SQL column list.
    pub fn to_sql(&self) -> String {
        match self {
            Self::All => "*".to_string(),
            Self::Fields(fields) => fields.join(", "),
            Self::Expr(expr) => expr.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_order_by_field() {
        let field = OrderByField::desc("created_at");
        assert_eq!(field.to_sql(), "created_at DESC");

        let field_with_nulls = OrderByField::asc("name").nulls(NullsOrder::Last);
        assert_eq!(field_with_nulls.to_sql(), "name ASC NULLS LAST");
    }

    #[test]
    fn test_order_by_parse() {
        let order = OrderBy::parse("name, created_at desc, score DESC NULLS LAST").unwrap();
        assert_eq!(order.to_sql(), "name ASC, created_at DESC, score DESC NULLS LAST");
        assert_eq!(order.fields().len(), 3);
    }

    #[test]
    fn test_order_by_parse_rejects_garbage() {
        assert!(OrderBy::parse("name SIDEWAYS").is_err());
        assert!(OrderBy::parse("name,").is_err());
        assert!(OrderBy::parse("name DESC NULLS").is_err());
    }

    #[test]
    fn test_order_by_then() {
        let order = OrderBy::Field(OrderByField::desc("created_at")).then(OrderByField::asc("name"));
        assert_eq!(order.to_sql(), "created_at DESC, name ASC");
        assert!(!order.is_empty());
        assert!(OrderBy::none().is_empty());
    }

    #[test]
    fn test_select_parse() {
        assert_eq!(Select::parse("*"), Select::All);
        assert_eq!(Select::parse("id, name"), Select::fields(["id", "name"]));
        assert_eq!(
            Select::parse("count(*) AS total"),
            Select::Expr("count(*) AS total".into())
        );
        assert_eq!(Select::fields(["id", "name"]).to_sql(), "id, name");
    }
}
