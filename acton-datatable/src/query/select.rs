//! Owned SELECT query value

use crate::params::SortOrder;

use super::condition::{ConditionGroup, FilterCondition};
use super::grammar::{self, CompiledQuery};

/// Join flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// INNER JOIN
    Inner,
    /// LEFT JOIN
    Left,
}

/// `JOIN table ON first operator second`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    /// Join flavor
    pub kind: JoinKind,
    /// Joined table
    pub table: String,
    /// Left-hand column of the ON clause
    pub first: String,
    /// Comparison operator of the ON clause
    pub operator: String,
    /// Right-hand column of the ON clause
    pub second: String,
}

/// One ORDER BY entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderClause {
    /// Column to order by
    pub column: String,
    /// Direction
    pub direction: SortOrder,
}

/// A SELECT statement under construction
///
/// Built with the consuming `with_*` methods, then adjusted in place by the
/// datatable through the `&mut self` methods.
///
/// ```rust
/// use acton_datatable::query::{FilterCondition, SelectQuery};
///
/// let query = SelectQuery::table("users")
///     .with_select(["users.id", "users.name", "teams.name as team"])
///     .with_left_join("teams", "teams.id", "=", "users.team_id")
///     .with_condition(FilterCondition::eq("users.active", true));
///
/// let compiled = query.to_sql();
/// assert!(compiled.sql.starts_with("SELECT \"users\".\"id\""));
/// assert_eq!(compiled.bindings.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectQuery {
    from: Option<String>,
    columns: Vec<String>,
    joins: Vec<Join>,
    wheres: ConditionGroup,
    orders: Vec<OrderClause>,
    offset: Option<u64>,
    limit: Option<u64>,
}

impl SelectQuery {
    /// Query without a FROM target
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `SELECT * FROM table`
    #[must_use]
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            from: Some(table.into()),
            ..Self::default()
        }
    }

    /// Set the FROM target
    #[must_use]
    pub fn with_from(mut self, table: impl Into<String>) -> Self {
        self.from = Some(table.into());
        self
    }

    /// Replace the select list; `alias` is accepted as `column as alias`
    #[must_use]
    pub fn with_select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Add an INNER JOIN
    #[must_use]
    pub fn with_join(
        self,
        table: impl Into<String>,
        first: impl Into<String>,
        operator: impl Into<String>,
        second: impl Into<String>,
    ) -> Self {
        self.with_join_kind(JoinKind::Inner, table, first, operator, second)
    }

    /// Add a LEFT JOIN
    #[must_use]
    pub fn with_left_join(
        self,
        table: impl Into<String>,
        first: impl Into<String>,
        operator: impl Into<String>,
        second: impl Into<String>,
    ) -> Self {
        self.with_join_kind(JoinKind::Left, table, first, operator, second)
    }

    fn with_join_kind(
        mut self,
        kind: JoinKind,
        table: impl Into<String>,
        first: impl Into<String>,
        operator: impl Into<String>,
        second: impl Into<String>,
    ) -> Self {
        self.joins.push(Join {
            kind,
            table: table.into(),
            first: first.into(),
            operator: operator.into(),
            second: second.into(),
        });
        self
    }

    /// AND a condition onto the WHERE clause
    #[must_use]
    pub fn with_condition(mut self, condition: FilterCondition) -> Self {
        self.wheres.where_(condition);
        self
    }

    /// AND a whole group onto the WHERE clause
    #[must_use]
    pub fn with_group(mut self, group: ConditionGroup) -> Self {
        self.wheres.where_group(group);
        self
    }

    /// AND a parenthesized group onto the WHERE clause; empty groups are ignored
    pub fn and_group(&mut self, group: ConditionGroup) -> &mut Self {
        self.wheres.where_group(group);
        self
    }

    /// Append an ORDER BY entry
    pub fn order_by(&mut self, column: impl Into<String>, direction: SortOrder) -> &mut Self {
        self.orders.push(OrderClause {
            column: column.into(),
            direction,
        });
        self
    }

    /// Set the OFFSET
    pub fn skip(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    /// Set the LIMIT; `None` removes it
    pub fn take(&mut self, limit: Option<u64>) -> &mut Self {
        self.limit = limit;
        self
    }

    /// FROM target
    pub fn from(&self) -> Option<&str> {
        self.from.as_deref()
    }

    /// Select list; empty means `*`
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Joins in declaration order
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// WHERE conditions
    pub fn wheres(&self) -> &ConditionGroup {
        &self.wheres
    }

    /// ORDER BY entries
    pub fn orders(&self) -> &[OrderClause] {
        &self.orders
    }

    /// OFFSET, if set
    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    /// LIMIT, if set
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Render the full statement
    pub fn to_sql(&self) -> CompiledQuery {
        grammar::compile_select(self)
    }

    /// Render the query as one `row_to_json` object per row, order preserved
    pub fn to_json_rows_sql(&self) -> CompiledQuery {
        grammar::compile_json_rows(self)
    }

    /// Render `SELECT COUNT(*)` over the same FROM, JOIN and WHERE
    pub fn to_count_sql(&self) -> CompiledQuery {
        grammar::compile_count(self)
    }
}
