//! Query execution and schema introspection
//!
//! A datatable never talks to a database directly. It hands finished
//! [`SelectQuery`] values to a [`QueryExecutor`] and asks a
//! [`SchemaIntrospector`] for column listings when the data source does not
//! name its columns. Anything implementing both is a [`Backend`].
//!
//! - [`MemoryBackend`]: rows held in memory, with execution counters
//! - [`PgBackend`]: PostgreSQL through sqlx (feature `database`)

use async_trait::async_trait;

use crate::error::Result;
use crate::query::SelectQuery;
use crate::Row;

mod memory;
#[cfg(feature = "database")]
mod postgres;

pub use memory::{ExecutionCounts, MemoryBackend};
#[cfg(feature = "database")]
pub use postgres::PgBackend;

/// Runs SELECT and COUNT queries
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Fetch the rows selected by the query, honoring ORDER BY, LIMIT and OFFSET
    async fn fetch(&self, query: &SelectQuery) -> Result<Vec<Row>>;

    /// Count the rows matched by the query, ignoring ORDER BY, LIMIT and OFFSET
    async fn count(&self, query: &SelectQuery) -> Result<u64>;
}

/// Lists the columns of a table
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// Column names in table order
    ///
    /// `table` may be schema-qualified (`reporting.sales`).
    async fn column_listing(&self, table: &str) -> Result<Vec<String>>;
}

/// A query executor that can also introspect its schema
pub trait Backend: QueryExecutor + SchemaIntrospector {}

impl<T: QueryExecutor + SchemaIntrospector + ?Sized> Backend for T {}
