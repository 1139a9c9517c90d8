//! Per-column render and search overrides

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::datatable::Datatable;
use crate::query::ConditionGroup;
use crate::Row;

/// Maps a raw cell value to the value sent to the client
///
/// Called with the raw value (`null` when the row lacks the column), the
/// whole raw row and the datatable.
pub type RenderFn = Arc<dyn Fn(&Value, &Row, &Datatable) -> Value + Send + Sync>;

/// Custom search hook for one column
///
/// Receives the search group under construction, the search term and the
/// datatable. Returning `Some(column)` adds `OR column LIKE '%term%'`; returning
/// `None` means the hook already added whatever it needed to the group.
pub type SearchFn =
    Arc<dyn Fn(&mut ConditionGroup, &str, &Datatable) -> Option<String> + Send + Sync>;

/// What a column is matched against during a search
#[derive(Clone)]
pub enum SearchTarget {
    /// Search this (usually qualified) column instead
    Column(String),
    /// Let a hook decide
    Callback(SearchFn),
}

impl SearchTarget {
    /// Wrap a closure as a search hook
    pub fn callback<F>(hook: F) -> Self
    where
        F: Fn(&mut ConditionGroup, &str, &Datatable) -> Option<String> + Send + Sync + 'static,
    {
        Self::Callback(Arc::new(hook))
    }
}

impl fmt::Debug for SearchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(column) => f.debug_tuple("Column").field(column).finish(),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

impl From<&str> for SearchTarget {
    fn from(column: &str) -> Self {
        Self::Column(column.to_string())
    }
}

impl From<String> for SearchTarget {
    fn from(column: String) -> Self {
        Self::Column(column)
    }
}

impl From<SearchFn> for SearchTarget {
    fn from(hook: SearchFn) -> Self {
        Self::Callback(hook)
    }
}

/// Project a raw row onto `columns`, applying render overrides
pub(crate) fn render_row(
    datatable: &Datatable,
    columns: &[String],
    renders: &HashMap<String, RenderFn>,
    row: &Row,
) -> Row {
    columns
        .iter()
        .map(|column| {
            let raw = row.get(column).unwrap_or(&Value::Null);
            let value = match renders.get(column) {
                Some(render) => render(raw, row, datatable),
                None => raw.clone(),
            };
            (column.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_target_conversions() {
        assert!(matches!(SearchTarget::from("t2.col"), SearchTarget::Column(c) if c == "t2.col"));
        let hook = SearchTarget::callback(|_, _, _| None);
        assert_eq!(format!("{hook:?}"), "Callback(..)");
    }
}
