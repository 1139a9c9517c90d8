//! In-memory backend
//!
//! Evaluates [`SelectQuery`] values against JSON rows held in memory. It follows
//! PostgreSQL semantics where they matter for grids: AND binds tighter than OR,
//! NULL never compares equal, LIKE is case-sensitive, NULLs sort last when
//! ascending. Every call is counted, which makes it the natural test double.
//!
//! Joins and raw SQL fragments cannot be evaluated and fail with
//! [`Error::Query`].

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use serde_json::Value;

use super::{QueryExecutor, SchemaIntrospector};
use crate::error::{Error, Result};
use crate::params::SortOrder;
use crate::query::{
    split_alias, Boolean, Condition, ConditionGroup, FilterCondition, FilterOperator, FilterValue,
    SelectQuery,
};
use crate::Row;

/// Number of calls made against a [`MemoryBackend`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionCounts {
    /// `fetch` calls
    pub fetches: usize,
    /// `count` calls
    pub counts: usize,
    /// `column_listing` calls
    pub introspections: usize,
}

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    columns: Vec<String>,
    rows: Vec<Row>,
}

/// Tables of JSON rows
///
/// ```rust
/// use acton_datatable::backend::MemoryBackend;
/// use serde_json::json;
///
/// let backend = MemoryBackend::new().with_table(
///     "users",
///     ["id", "name"],
///     vec![json!({ "id": 1, "name": "ana" }), json!({ "id": 2, "name": "bo" })],
/// );
/// assert_eq!(backend.execution_counts().fetches, 0);
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: HashMap<String, MemoryTable>,
    fetches: AtomicUsize,
    counts: AtomicUsize,
    introspections: AtomicUsize,
}

impl MemoryBackend {
    /// Backend with no tables
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table; non-object rows are ignored
    #[must_use]
    pub fn with_table<I, S>(mut self, name: impl Into<String>, columns: I, rows: Vec<Value>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rows = rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        self.tables.insert(
            name.into(),
            MemoryTable {
                columns: columns.into_iter().map(Into::into).collect(),
                rows,
            },
        );
        self
    }

    /// Calls made so far
    pub fn execution_counts(&self) -> ExecutionCounts {
        ExecutionCounts {
            fetches: self.fetches.load(AtomicOrdering::SeqCst),
            counts: self.counts.load(AtomicOrdering::SeqCst),
            introspections: self.introspections.load(AtomicOrdering::SeqCst),
        }
    }

    /// Zero the counters
    pub fn reset_counts(&self) {
        self.fetches.store(0, AtomicOrdering::SeqCst);
        self.counts.store(0, AtomicOrdering::SeqCst);
        self.introspections.store(0, AtomicOrdering::SeqCst);
    }

    fn table(&self, name: &str) -> Result<&MemoryTable> {
        let (name, _) = split_alias(name);
        self.tables
            .get(name)
            .or_else(|| self.tables.get(last_segment(name)))
            .ok_or_else(|| Error::Query(format!("relation \"{name}\" does not exist")))
    }

    fn matching_rows(&self, query: &SelectQuery) -> Result<Vec<&Row>> {
        if !query.joins().is_empty() {
            return Err(Error::Query(
                "joins are not supported by the in-memory backend".to_string(),
            ));
        }
        let from = query
            .from()
            .ok_or_else(|| Error::Query("query has no FROM target".to_string()))?;
        let table = self.table(from)?;

        let mut rows = Vec::new();
        for row in &table.rows {
            if matches_group(row, query.wheres())? {
                rows.push(row);
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl QueryExecutor for MemoryBackend {
    async fn fetch(&self, query: &SelectQuery) -> Result<Vec<Row>> {
        self.fetches.fetch_add(1, AtomicOrdering::SeqCst);
        let mut rows = self.matching_rows(query)?;

        // Stable sort, applied last key first
        for order in query.orders().iter().rev() {
            rows.sort_by(|a, b| {
                let ordering = compare_values(
                    field(a, &order.column).unwrap_or(&Value::Null),
                    field(b, &order.column).unwrap_or(&Value::Null),
                );
                match order.direction {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            });
        }

        let offset = usize::try_from(query.offset().unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = query
            .limit()
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));

        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| project(row, query.columns()))
            .collect())
    }

    async fn count(&self, query: &SelectQuery) -> Result<u64> {
        self.counts.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(self.matching_rows(query)?.len() as u64)
    }
}

#[async_trait]
impl SchemaIntrospector for MemoryBackend {
    async fn column_listing(&self, table: &str) -> Result<Vec<String>> {
        self.introspections.fetch_add(1, AtomicOrdering::SeqCst);
        // Unknown tables list no columns, like information_schema
        Ok(self
            .table(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }
}

fn last_segment(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

fn field<'a>(row: &'a Row, name: &str) -> Option<&'a Value> {
    row.get(name).or_else(|| row.get(last_segment(name)))
}

fn project(row: &Row, columns: &[String]) -> Row {
    if columns.is_empty() {
        return row.clone();
    }

    let mut out = Row::new();
    for column in columns {
        let (source, alias) = match split_alias(column) {
            (source, Some(alias)) => (source, alias),
            (source, None) => (source, last_segment(source)),
        };
        if last_segment(source) == "*" {
            out.extend(row.iter().map(|(k, v)| (k.clone(), v.clone())));
        } else {
            let value = field(row, source).cloned().unwrap_or(Value::Null);
            out.insert(alias.to_string(), value);
        }
    }
    out
}

/// AND runs separated by OR: `a AND b OR c` is `(a AND b) OR c`
fn matches_group(row: &Row, group: &ConditionGroup) -> Result<bool> {
    if group.is_empty() {
        return Ok(true);
    }

    let mut any_run = false;
    let mut run = true;
    for (index, (boolean, condition)) in group.conditions().iter().enumerate() {
        if index > 0 && *boolean == Boolean::Or {
            any_run |= run;
            run = true;
        }
        if run {
            run = matches_condition(row, condition)?;
        } else if let Condition::Raw { .. } = condition {
            // Still reject fragments that cannot be evaluated
            matches_condition(row, condition)?;
        }
    }
    Ok(any_run || run)
}

fn matches_condition(row: &Row, condition: &Condition) -> Result<bool> {
    match condition {
        Condition::Filter(filter) => Ok(matches_filter(row, filter)),
        Condition::Group(group) => matches_group(row, group),
        Condition::Raw { sql, .. } => Err(Error::Query(format!(
            "raw SQL is not supported by the in-memory backend: {sql}"
        ))),
    }
}

fn matches_filter(row: &Row, filter: &FilterCondition) -> bool {
    let value = field(row, &filter.field).unwrap_or(&Value::Null);

    match filter.operator {
        FilterOperator::IsNull => value.is_null(),
        FilterOperator::IsNotNull => !value.is_null(),
        FilterOperator::Like => match (as_text(value), &filter.value) {
            (Some(text), FilterValue::String(pattern)) => like(&text, pattern),
            _ => false,
        },
        FilterOperator::In => match (&filter.value, value) {
            (FilterValue::StringList(list), Value::String(s)) => list.contains(s),
            (FilterValue::IntegerList(list), Value::Number(n)) => {
                n.as_i64().is_some_and(|n| list.contains(&n))
            }
            _ => false,
        },
        operator => {
            let Some(ordering) = compare_filter(value, &filter.value) else {
                return false;
            };
            match operator {
                FilterOperator::Equal => ordering == Ordering::Equal,
                FilterOperator::NotEqual => ordering != Ordering::Equal,
                FilterOperator::GreaterThan => ordering == Ordering::Greater,
                FilterOperator::GreaterThanOrEqual => ordering != Ordering::Less,
                FilterOperator::LessThan => ordering == Ordering::Less,
                FilterOperator::LessThanOrEqual => ordering != Ordering::Greater,
                _ => false,
            }
        }
    }
}

fn compare_filter(value: &Value, filter: &FilterValue) -> Option<Ordering> {
    match (value, filter) {
        (Value::Number(n), FilterValue::Integer(i)) => n.as_f64()?.partial_cmp(&(*i as f64)),
        (Value::Number(n), FilterValue::Float(f)) => n.as_f64()?.partial_cmp(f),
        (Value::String(s), FilterValue::String(f)) => Some(s.as_str().cmp(f.as_str())),
        (Value::Bool(b), FilterValue::Boolean(f)) => Some(b.cmp(f)),
        _ => None,
    }
}

/// Text form used by `CAST(col AS TEXT)`
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// SQL LIKE: `%` matches any run, `_` one character, `\` escapes the next one
fn like(text: &str, pattern: &str) -> bool {
    #[derive(Clone, Copy)]
    enum Token {
        Any,
        One,
        Char(char),
    }

    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        tokens.push(match ch {
            '%' => Token::Any,
            '_' => Token::One,
            '\\' => Token::Char(chars.next().unwrap_or('\\')),
            c => Token::Char(c),
        });
    }

    let text: Vec<char> = text.chars().collect();
    // matched[j]: pattern prefix consumed so far matches text[..j]
    let mut matched = vec![false; text.len() + 1];
    matched[0] = true;
    for token in tokens {
        let mut next = vec![false; text.len() + 1];
        match token {
            Token::Any => {
                let mut seen = false;
                for j in 0..=text.len() {
                    seen |= matched[j];
                    next[j] = seen;
                }
            }
            Token::One => {
                for j in 1..=text.len() {
                    next[j] = matched[j - 1];
                }
            }
            Token::Char(c) => {
                for j in 1..=text.len() {
                    next[j] = matched[j - 1] && text[j - 1] == c;
                }
            }
        }
        matched = next;
    }
    matched[text.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn people() -> MemoryBackend {
        MemoryBackend::new().with_table(
            "people",
            ["id", "name", "age"],
            vec![
                json!({ "id": 1, "name": "ana", "age": 31 }),
                json!({ "id": 2, "name": "bob", "age": null }),
                json!({ "id": 3, "name": "carla", "age": 25 }),
                json!({ "id": 4, "name": "dan", "age": 40 }),
            ],
        )
    }

    fn ids(rows: &[Row]) -> Vec<i64> {
        rows.iter().filter_map(|r| r.get("id").and_then(Value::as_i64)).collect()
    }

    #[test]
    fn test_like_matching() {
        assert!(like("carla", "%ar%"));
        assert!(like("carla", "c_rla"));
        assert!(like("100%", "100\\%"));
        assert!(!like("1000", "100\\%"));
        assert!(!like("Ana", "%ana%"));
        assert!(like("", "%"));
        assert!(!like("ab", "_"));
    }

    #[tokio::test]
    async fn test_fetch_everything() {
        let backend = people();
        let rows = backend.fetch(&SelectQuery::table("people")).await.unwrap();
        assert_eq!(ids(&rows), vec![1, 2, 3, 4]);
        assert_eq!(backend.execution_counts().fetches, 1);
    }

    #[tokio::test]
    async fn test_and_binds_tighter_than_or() {
        let backend = people();
        let mut group = ConditionGroup::new();
        group
            .where_(FilterCondition::eq("name", "ana"))
            .where_(FilterCondition::gt("age", 35))
            .or_where(FilterCondition::eq("id", 3));

        let query = SelectQuery::table("people").with_group(group);
        let rows = backend.fetch(&query).await.unwrap();
        assert_eq!(ids(&rows), vec![3]);
    }

    #[tokio::test]
    async fn test_like_casts_numbers_to_text() {
        let backend = people();
        let query = SelectQuery::table("people")
            .with_condition(FilterCondition::like("people.age", "%1%"));
        let rows = backend.fetch(&query).await.unwrap();
        assert_eq!(ids(&rows), vec![1]);
    }

    #[tokio::test]
    async fn test_order_puts_nulls_last_ascending() {
        let backend = people();
        let mut query = SelectQuery::table("people");
        query.order_by("age", SortOrder::Asc);
        assert_eq!(ids(&backend.fetch(&query).await.unwrap()), vec![3, 1, 4, 2]);

        let mut query = SelectQuery::table("people");
        query.order_by("age", SortOrder::Desc);
        assert_eq!(ids(&backend.fetch(&query).await.unwrap()), vec![2, 4, 1, 3]);
    }

    #[tokio::test]
    async fn test_skip_and_take() {
        let backend = people();
        let mut query = SelectQuery::table("people");
        query.skip(1).take(Some(2));
        assert_eq!(ids(&backend.fetch(&query).await.unwrap()), vec![2, 3]);
        assert_eq!(backend.count(&query).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_projection_with_alias() {
        let backend = people();
        let query = SelectQuery::table("people").with_select(["people.name as label", "id"]);
        let rows = backend.fetch(&query).await.unwrap();
        let keys: Vec<&String> = rows[0].keys().collect();
        assert_eq!(keys, vec!["label", "id"]);
    }

    #[tokio::test]
    async fn test_null_never_equals() {
        let backend = people();
        let query = SelectQuery::table("people").with_condition(FilterCondition::ne("age", 31));
        assert_eq!(backend.count(&query).await.unwrap(), 2);

        let query = SelectQuery::table("people").with_condition(FilterCondition::is_null("age"));
        assert_eq!(backend.count(&query).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_queries_fail() {
        let backend = people();

        let joined = SelectQuery::table("people").with_join("teams", "teams.id", "=", "people.team_id");
        assert!(matches!(backend.fetch(&joined).await, Err(Error::Query(_))));

        let mut group = ConditionGroup::new();
        group.where_raw("age > ?", vec![1_i64.into()]);
        let raw = SelectQuery::table("people").with_group(group);
        assert!(matches!(backend.count(&raw).await, Err(Error::Query(_))));

        let missing = SelectQuery::table("nobody");
        assert!(matches!(backend.fetch(&missing).await, Err(Error::Query(_))));
    }

    #[tokio::test]
    async fn test_column_listing_and_counters() {
        let backend = people();
        assert_eq!(
            backend.column_listing("public.people").await.unwrap(),
            vec!["id", "name", "age"]
        );
        assert!(backend.column_listing("ghosts").await.unwrap().is_empty());
        assert_eq!(backend.execution_counts().introspections, 2);

        backend.reset_counts();
        assert_eq!(backend.execution_counts(), ExecutionCounts::default());
    }
}
