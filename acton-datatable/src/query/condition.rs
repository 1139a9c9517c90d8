//! WHERE clause building blocks
//!
//! Conditions are collected into a [`ConditionGroup`], an ordered list of clauses
//! each joined to its predecessor with AND or OR. Groups nest, so
//! `a AND (b OR c)` is a group holding `a` and a nested group.
//!
//! # Example
//!
//! ```rust
//! use acton_datatable::query::{ConditionGroup, FilterCondition};
//!
//! let mut search = ConditionGroup::new();
//! search
//!     .or_where(FilterCondition::like("users.name", "%ana%"))
//!     .or_where(FilterCondition::like("users.email", "%ana%"));
//!
//! assert_eq!(search.len(), 2);
//! ```

use std::fmt;

/// Comparison operators for filter conditions
///
/// ```rust
/// use acton_datatable::query::FilterOperator;
///
/// assert_eq!(format!("{}", FilterOperator::Equal), "=");
/// assert_eq!(format!("{}", FilterOperator::Like), "LIKE");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Equal to (=)
    Equal,
    /// Not equal to (!=)
    NotEqual,
    /// Greater than (>)
    GreaterThan,
    /// Greater than or equal to (>=)
    GreaterThanOrEqual,
    /// Less than (<)
    LessThan,
    /// Less than or equal to (<=)
    LessThanOrEqual,
    /// Pattern matching (LIKE), `%` and `_` are wildcards
    Like,
    /// Value is in a list
    In,
    /// Value is null (IS NULL)
    IsNull,
    /// Value is not null (IS NOT NULL)
    IsNotNull,
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "="),
            Self::NotEqual => write!(f, "!="),
            Self::GreaterThan => write!(f, ">"),
            Self::GreaterThanOrEqual => write!(f, ">="),
            Self::LessThan => write!(f, "<"),
            Self::LessThanOrEqual => write!(f, "<="),
            Self::Like => write!(f, "LIKE"),
            Self::In => write!(f, "IN"),
            Self::IsNull => write!(f, "IS NULL"),
            Self::IsNotNull => write!(f, "IS NOT NULL"),
        }
    }
}

/// A value bound into a query
///
/// Values never appear in SQL text; every one of them becomes a numbered
/// placeholder and travels in the binding list.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// String value
    String(String),
    /// 64-bit integer value
    Integer(i64),
    /// 64-bit floating point value
    Float(f64),
    /// Boolean value
    Boolean(bool),
    /// List of string values (for IN)
    StringList(Vec<String>),
    /// List of integer values (for IN)
    IntegerList(Vec<i64>),
    /// Null value
    Null,
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for FilterValue {
    fn from(n: i32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<f64> for FilterValue {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(list: Vec<String>) -> Self {
        Self::StringList(list)
    }
}

impl From<Vec<i64>> for FilterValue {
    fn from(list: Vec<i64>) -> Self {
        Self::IntegerList(list)
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A single comparison against a column
///
/// `field` may be qualified (`users.name`); it is quoted segment by segment
/// when rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    /// The column to filter on
    pub field: String,
    /// The comparison operator
    pub operator: FilterOperator,
    /// The value to compare against
    pub value: FilterValue,
}

impl FilterCondition {
    /// Create a new filter condition
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: FilterValue) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Equality filter (field = value)
    pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::Equal, value.into())
    }

    /// Not-equal filter (field != value)
    pub fn ne(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::NotEqual, value.into())
    }

    /// Greater-than filter (field > value)
    pub fn gt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::GreaterThan, value.into())
    }

    /// Greater-than-or-equal filter (field >= value)
    pub fn gte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::GreaterThanOrEqual, value.into())
    }

    /// Less-than filter (field < value)
    pub fn lt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::LessThan, value.into())
    }

    /// Less-than-or-equal filter (field <= value)
    pub fn lte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::LessThanOrEqual, value.into())
    }

    /// Pattern filter (field LIKE pattern)
    ///
    /// The pattern is used as given: `%` and `_` inside it act as wildcards.
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(
            field,
            FilterOperator::Like,
            FilterValue::String(pattern.into()),
        )
    }

    /// Membership filter over strings
    pub fn in_strings(field: impl Into<String>, values: Vec<String>) -> Self {
        Self::new(field, FilterOperator::In, FilterValue::StringList(values))
    }

    /// Membership filter over integers
    pub fn in_integers(field: impl Into<String>, values: Vec<i64>) -> Self {
        Self::new(field, FilterOperator::In, FilterValue::IntegerList(values))
    }

    /// Null check (field IS NULL)
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::IsNull, FilterValue::Null)
    }

    /// Not-null check (field IS NOT NULL)
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::IsNotNull, FilterValue::Null)
    }
}

/// How a clause attaches to the clause before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boolean {
    /// Both must hold
    And,
    /// Either may hold
    Or,
}

impl Boolean {
    /// SQL keyword
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// One entry of a [`ConditionGroup`]
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// A column comparison
    Filter(FilterCondition),
    /// A parenthesized sub-group
    Group(ConditionGroup),
    /// A raw SQL fragment; each `?` is replaced by the next binding
    Raw {
        /// SQL text with `?` placeholders
        sql: String,
        /// Values for the placeholders, in order
        bindings: Vec<FilterValue>,
    },
}

/// Ordered list of conditions joined by AND/OR
///
/// The connective of the first clause is ignored when rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionGroup {
    clauses: Vec<(Boolean, Condition)>,
}

impl ConditionGroup {
    /// Create an empty group
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a condition with AND
    pub fn where_(&mut self, condition: FilterCondition) -> &mut Self {
        self.push(Boolean::And, Condition::Filter(condition))
    }

    /// Append a condition with OR
    pub fn or_where(&mut self, condition: FilterCondition) -> &mut Self {
        self.push(Boolean::Or, Condition::Filter(condition))
    }

    /// Append a nested group with AND; empty groups are skipped
    pub fn where_group(&mut self, group: ConditionGroup) -> &mut Self {
        if group.is_empty() {
            return self;
        }
        self.push(Boolean::And, Condition::Group(group))
    }

    /// Append a nested group with OR; empty groups are skipped
    pub fn or_where_group(&mut self, group: ConditionGroup) -> &mut Self {
        if group.is_empty() {
            return self;
        }
        self.push(Boolean::Or, Condition::Group(group))
    }

    /// Append a raw fragment with AND
    ///
    /// ```rust
    /// use acton_datatable::query::ConditionGroup;
    ///
    /// let mut group = ConditionGroup::new();
    /// group.where_raw("lower(name) = ?", vec!["ana".into()]);
    /// assert!(!group.is_empty());
    /// ```
    pub fn where_raw(&mut self, sql: impl Into<String>, bindings: Vec<FilterValue>) -> &mut Self {
        self.push(
            Boolean::And,
            Condition::Raw {
                sql: sql.into(),
                bindings,
            },
        )
    }

    /// Append a raw fragment with OR
    pub fn or_where_raw(
        &mut self,
        sql: impl Into<String>,
        bindings: Vec<FilterValue>,
    ) -> &mut Self {
        self.push(
            Boolean::Or,
            Condition::Raw {
                sql: sql.into(),
                bindings,
            },
        )
    }

    /// Append an already-built condition
    pub fn push(&mut self, boolean: Boolean, condition: Condition) -> &mut Self {
        self.clauses.push((boolean, condition));
        self
    }

    /// True when no clause has been added
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Number of top-level clauses
    #[must_use]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Clauses in insertion order
    pub fn conditions(&self) -> &[(Boolean, Condition)] {
        &self.clauses
    }
}
