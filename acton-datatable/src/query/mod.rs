//! Query model: conditions, SELECT builder and PostgreSQL rendering
//!
//! A [`SelectQuery`] is a plain value. Datatables clone the caller's query,
//! attach the search group, ordering and paging, and hand it to a
//! [`QueryExecutor`](crate::backend::QueryExecutor).

mod condition;
mod grammar;
mod select;

pub use condition::{
    Boolean, Condition, ConditionGroup, FilterCondition, FilterOperator, FilterValue,
};
pub use grammar::{
    compile_count, compile_json_rows, compile_select, split_alias, wrap, CompiledQuery,
    ROW_NUMBER_COLUMN,
};
pub use select::{Join, JoinKind, OrderClause, SelectQuery};
