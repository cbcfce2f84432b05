//! The seam to the execution engine.
//!
//! Deferred queries never talk to storage themselves. When a materializing
//! operation runs, the query builds a [`QueryRequest`] and hands it to the
//! [`QueryEngine`] of its entity type, exactly once per cache slot.
//!
//! [`InMemoryEngine`] is a small engine that evaluates option sets against
//! rows held in memory. It records every request it receives, which makes it
//! the engine of choice for tests.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use smol_str::SmolStr;

use crate::error::{ErrorCode, QueryError, QueryResult};
use crate::filter::{Filter, FilterValue};
use crate::options::OptionSet;
use crate::types::{NullsOrder, OrderBy, Select, SortOrder};

/// One row returned by the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: IndexMap<String, FilterValue>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, returning the record.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Get a field value.
    pub fn get(&self, field: &str) -> Option<&FilterValue> {
        self.fields.get(field)
    }

    /// Field names and values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keep only the named fields.
    fn project(&self, columns: &[String]) -> Record {
        Record {
            fields: columns
                .iter()
                .filter_map(|c| self.fields.get(c).map(|v| (c.clone(), v.clone())))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<FilterValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// An aggregate computed over a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Aggregate {
    /// Sum of the column.
    Sum(String),
    /// Average of the column.
    Avg(String),
    /// Minimum of the column.
    Min(String),
    /// Maximum of the column.
    Max(String),
}

impl Aggregate {
    /// Sum of a column.
    pub fn sum(column: impl Into<String>) -> Self {
        Self::Sum(column.into())
    }

    /// Average of a column.
    pub fn avg(column: impl Into<String>) -> Self {
        Self::Avg(column.into())
    }

    /// Minimum of a column.
    pub fn min(column: impl Into<String>) -> Self {
        Self::Min(column.into())
    }

    /// Maximum of a column.
    pub fn max(column: impl Into<String>) -> Self {
        Self::Max(column.into())
    }

    /// The aggregated column.
    pub fn column(&self) -> &str {
        match self {
            Self::Sum(c) | Self::Avg(c) | Self::Min(c) | Self::Max(c) => c,
        }
    }

    /// SQL function name.
    pub fn function(&self) -> &'static str {
        match self {
            Self::Sum(_) => "SUM",
            Self::Avg(_) => "AVG",
            Self::Min(_) => "MIN",
            Self::Max(_) => "MAX",
        }
    }

    /// Generate the SQL expression.
    pub fn to_sql(&self) -> String {
        format!("{}({})", self.function(), self.column())
    }
}

/// What a request asks the engine to produce.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// Every matching record.
    Select,
    /// The first matching record.
    First,
    /// The number of matching records.
    Count,
    /// An aggregate over the matching records.
    Aggregate(Aggregate),
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "select"),
            Self::First => write!(f, "first"),
            Self::Count => write!(f, "count"),
            Self::Aggregate(agg) => write!(f, "aggregate {}", agg.to_sql()),
        }
    }
}

/// A fully accumulated request handed to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// Entity type name.
    pub entity: SmolStr,
    /// Table of the entity type.
    pub table: String,
    /// Accumulated options.
    pub options: OptionSet,
    /// What to produce.
    pub kind: QueryKind,
}

impl QueryRequest {
    /// The source the request reads from: the `from` override or the table.
    pub fn source(&self) -> &str {
        self.options.from.as_deref().unwrap_or(&self.table)
    }

    /// Build the SQL statement for SQL-speaking engines.
    ///
    /// Joins are emitted verbatim; includes are left to the engine, which
    /// loads them with separate queries. Counts and aggregates over a
    /// limited or offset query run over a subquery so they see the same rows
    /// a select would, and never carry the lock clause.
    pub fn to_sql(&self) -> (String, Vec<FilterValue>) {
        let options = &self.options;
        let mut params = Vec::new();

        let scalar = match &self.kind {
            QueryKind::Count => "COUNT(*)".to_string(),
            QueryKind::Aggregate(agg) => agg.to_sql(),
            QueryKind::Select => {
                let mut sql = self.select_sql(&self.projection(), options.limit, &mut params);
                self.push_lock(&mut sql);
                return (sql, params);
            }
            QueryKind::First => {
                let limit = options.limit.map_or(1, |l| l.min(1));
                let mut sql = self.select_sql(&self.projection(), Some(limit), &mut params);
                self.push_lock(&mut sql);
                return (sql, params);
            }
        };

        let sql = if options.limit.is_some() || options.offset.is_some() {
            let inner = self.select_sql("*", options.limit, &mut params);
            format!("SELECT {} FROM ({}) AS t", scalar, inner)
        } else {
            self.filtered_sql(&scalar, &mut params)
        };
        (sql, params)
    }

    fn projection(&self) -> String {
        self.options.select.as_ref().map_or_else(|| "*".to_string(), Select::to_sql)
    }

    /// `SELECT .. FROM .. JOIN .. WHERE .. GROUP BY .. HAVING ..`
    fn filtered_sql(&self, projection: &str, params: &mut Vec<FilterValue>) -> String {
        let options = &self.options;
        let mut sql = format!("SELECT {} FROM {}", projection, self.source());

        for join in &options.joins {
            sql.push(' ');
            sql.push_str(join);
        }

        if !options.filter.is_none() {
            let (where_sql, where_params) = options.filter.to_sql(params.len());
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            params.extend(where_params);
        }

        if let Some(ref group) = options.group {
            sql.push_str(" GROUP BY ");
            sql.push_str(group);
        }

        if let Some(ref having) = options.having {
            let (having_sql, having_params) = having.to_sql(params.len());
            sql.push_str(" HAVING ");
            sql.push_str(&having_sql);
            params.extend(having_params);
        }

        sql
    }

    /// The filtered statement plus ordering and pagination.
    fn select_sql(&self, projection: &str, limit: Option<u64>, params: &mut Vec<FilterValue>) -> String {
        let options = &self.options;
        let mut sql = self.filtered_sql(projection, params);

        if let Some(order) = options.order.as_ref().filter(|o| !o.is_empty()) {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.to_sql());
        }
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = options.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        sql
    }

    fn push_lock(&self, sql: &mut String) {
        if let Some(ref lock) = self.options.lock {
            sql.push(' ');
            sql.push_str(lock);
        }
    }
}

/// What the engine produced.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    /// A sequence of records.
    Records(Vec<Record>),
    /// A single scalar (count or aggregate).
    Scalar(FilterValue),
}

impl QueryOutput {
    /// Unwrap a records output.
    pub fn into_records(self) -> QueryResult<Vec<Record>> {
        match self {
            Self::Records(records) => Ok(records),
            Self::Scalar(_) => Err(QueryError::unexpected_output("records")),
        }
    }

    /// Unwrap a scalar output.
    pub fn into_scalar(self) -> QueryResult<FilterValue> {
        match self {
            Self::Scalar(value) => Ok(value),
            Self::Records(_) => Err(QueryError::unexpected_output("a scalar")),
        }
    }
}

/// The execution engine collaborator.
///
/// Implementations translate a [`QueryRequest`] into storage calls and run
/// them. The call is synchronous and happens at most once per cache slot of
/// a deferred query.
pub trait QueryEngine: Send + Sync {
    /// Execute a request.
    fn execute(&self, request: &QueryRequest) -> QueryResult<QueryOutput>;
}

/// An engine that evaluates requests against in-memory rows.
///
/// Raw SQL conditions cannot be evaluated and fail with an
/// [`ErrorCode::InvalidFilter`] error; every other clause is supported.
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    tables: RwLock<HashMap<String, Vec<Record>>>,
    log: Mutex<Vec<QueryRequest>>,
}

impl InMemoryEngine {
    /// Create an engine without data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row to a table.
    pub fn insert(&self, table: impl Into<String>, record: Record) {
        self.tables.write().entry(table.into()).or_default().push(record);
    }

    /// Add a row to a table, returning the engine.
    pub fn with_row(self, table: impl Into<String>, record: Record) -> Self {
        self.insert(table, record);
        self
    }

    /// Number of requests executed so far.
    pub fn executions(&self) -> usize {
        self.log.lock().len()
    }

    /// Every request executed so far, oldest first.
    pub fn requests(&self) -> Vec<QueryRequest> {
        self.log.lock().clone()
    }

    fn matching(&self, request: &QueryRequest) -> QueryResult<Vec<Record>> {
        let tables = self.tables.read();
        let rows = tables.get(request.source()).map(Vec::as_slice).unwrap_or_default();
        let options = &request.options;

        let mut matched = Vec::new();
        for row in rows {
            if matches(&options.filter, row)? {
                matched.push(row.clone());
            }
        }

        if let Some(order) = &options.order {
            sort(&mut matched, order);
        }

        let offset = options.offset.unwrap_or(0) as usize;
        let limit = options.limit.map_or(usize::MAX, |l| l as usize);
        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }
}

impl QueryEngine for InMemoryEngine {
    fn execute(&self, request: &QueryRequest) -> QueryResult<QueryOutput> {
        self.log.lock().push(request.clone());
        crate::quarry_debug!(entity = %request.entity, kind = %request.kind, "in-memory execution");

        let rows = self.matching(request)?;
        let output = match &request.kind {
            QueryKind::Select => {
                let records = match &request.options.select {
                    Some(Select::Fields(columns)) => rows.iter().map(|r| r.project(columns)).collect(),
                    _ => rows,
                };
                QueryOutput::Records(records)
            }
            QueryKind::First => QueryOutput::Records(rows.into_iter().take(1).collect()),
            QueryKind::Count => QueryOutput::Scalar(FilterValue::Int(rows.len() as i64)),
            QueryKind::Aggregate(agg) => QueryOutput::Scalar(aggregate(agg, &rows)),
        };
        Ok(output)
    }
}

fn field<'a>(row: &'a Record, column: &str) -> &'a FilterValue {
    row.get(column).unwrap_or(&FilterValue::Null)
}

fn compare(left: &FilterValue, right: &FilterValue) -> Option<Ordering> {
    match (left, right) {
        (FilterValue::String(a), FilterValue::String(b)) => Some(a.cmp(b)),
        (FilterValue::Bool(a), FilterValue::Bool(b)) => Some(a.cmp(b)),
        (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

fn equal(left: &FilterValue, right: &FilterValue) -> bool {
    match (left, right) {
        (FilterValue::Null, FilterValue::Null) => true,
        (FilterValue::Null, _) | (_, FilterValue::Null) => false,
        (a, b) => compare(a, b).map_or(a == b, Ordering::is_eq),
    }
}

fn matches(filter: &Filter, row: &Record) -> QueryResult<bool> {
    let ordered = |col: &str, value: &FilterValue, accept: fn(Ordering) -> bool| {
        compare(field(row, col), value).is_some_and(accept)
    };

    Ok(match filter {
        Filter::None => true,
        Filter::Equals(col, value) => equal(field(row, col), value),
        Filter::NotEquals(col, value) => !equal(field(row, col), value),
        Filter::Lt(col, value) => ordered(col, value, Ordering::is_lt),
        Filter::Lte(col, value) => ordered(col, value, Ordering::is_le),
        Filter::Gt(col, value) => ordered(col, value, Ordering::is_gt),
        Filter::Gte(col, value) => ordered(col, value, Ordering::is_ge),
        Filter::In(col, values) => values.iter().any(|v| equal(field(row, col), v)),
        Filter::NotIn(col, values) => !values.iter().any(|v| equal(field(row, col), v)),
        Filter::Contains(col, value) => match (field(row, col), value) {
            (FilterValue::String(s), FilterValue::String(needle)) => s.contains(needle.as_str()),
            _ => false,
        },
        Filter::StartsWith(col, value) => match (field(row, col), value) {
            (FilterValue::String(s), FilterValue::String(prefix)) => s.starts_with(prefix.as_str()),
            _ => false,
        },
        Filter::IsNull(col) => field(row, col).is_null(),
        Filter::IsNotNull(col) => !field(row, col).is_null(),
        Filter::Raw { sql, .. } => {
            return Err(QueryError::new(
                ErrorCode::InvalidFilter,
                format!("Raw SQL condition `{}` cannot be evaluated in memory", sql),
            ));
        }
        Filter::And(filters) => {
            for f in filters {
                if !matches(f, row)? {
                    return Ok(false);
                }
            }
            true
        }
        Filter::Or(filters) => {
            for f in filters {
                if matches(f, row)? {
                    return Ok(true);
                }
            }
            false
        }
        Filter::Not(inner) => !matches(inner, row)?,
    })
}

fn sort(rows: &mut [Record], order: &OrderBy) {
    rows.sort_by(|a, b| {
        for spec in order.fields() {
            let (left, right) = (field(a, &spec.column), field(b, &spec.column));
            let ordering = match (left.is_null(), right.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) | (false, true) => {
                    let nulls_first = match spec.nulls {
                        Some(NullsOrder::First) => true,
                        Some(NullsOrder::Last) => false,
                        None => spec.order == SortOrder::Desc,
                    };
                    if left.is_null() == nulls_first {
                        Ordering::Less
                    } else {
                        Ordering::Greater
                    }
                }
                (false, false) => {
                    let natural = compare(left, right).unwrap_or(Ordering::Equal);
                    match spec.order {
                        SortOrder::Asc => natural,
                        SortOrder::Desc => natural.reverse(),
                    }
                }
            };
            if ordering.is_ne() {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn aggregate(agg: &Aggregate, rows: &[Record]) -> FilterValue {
    let values: Vec<&FilterValue> = rows
        .iter()
        .map(|r| field(r, agg.column()))
        .filter(|v| !v.is_null())
        .collect();

    if values.is_empty() {
        return FilterValue::Null;
    }

    match agg {
        Aggregate::Sum(_) => {
            if values.iter().all(|v| matches!(v, FilterValue::Int(_))) {
                FilterValue::Int(values.iter().filter_map(|v| v.as_i64()).sum())
            } else {
                FilterValue::Float(values.iter().filter_map(|v| v.as_f64()).sum())
            }
        }
        Aggregate::Avg(_) => {
            let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
            if numbers.is_empty() {
                FilterValue::Null
            } else {
                FilterValue::Float(numbers.iter().sum::<f64>() / numbers.len() as f64)
            }
        }
        Aggregate::Min(_) => extreme(&values, Ordering::Less),
        Aggregate::Max(_) => extreme(&values, Ordering::Greater),
    }
}

fn extreme(values: &[&FilterValue], wanted: Ordering) -> FilterValue {
    let mut best = values[0];
    for value in &values[1..] {
        if compare(value, best) == Some(wanted) {
            best = *value;
        }
    }
    best.clone()
}
