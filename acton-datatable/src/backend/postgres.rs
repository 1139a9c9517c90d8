//! PostgreSQL backend over an sqlx pool

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgArguments, query::QueryScalar, PgPool, Postgres};

use super::{QueryExecutor, SchemaIntrospector};
use crate::error::{DatabaseError, DatabaseOperation, Result};
use crate::query::{CompiledQuery, FilterValue, SelectQuery, ROW_NUMBER_COLUMN};
use crate::Row;

type Scalar<'q, O> = QueryScalar<'q, Postgres, O, PgArguments>;

/// Runs datatable queries against PostgreSQL
///
/// Rows come back through `row_to_json`, so every column type PostgreSQL can
/// express as JSON is supported without a mapping table.
#[derive(Debug, Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    /// Wrap an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn bind_all<'q, O>(mut query: Scalar<'q, O>, bindings: &[FilterValue]) -> Scalar<'q, O>
where
    O: Send + Unpin,
{
    for value in bindings {
        query = match value {
            FilterValue::String(s) => query.bind(s.clone()),
            FilterValue::Integer(i) => query.bind(*i),
            FilterValue::Float(f) => query.bind(*f),
            FilterValue::Boolean(b) => query.bind(*b),
            FilterValue::StringList(list) => query.bind(list.clone()),
            FilterValue::IntegerList(list) => query.bind(list.clone()),
            FilterValue::Null => query.bind(None::<String>),
        };
    }
    query
}

fn failed(operation: DatabaseOperation, sql: &str) -> impl FnOnce(sqlx::Error) -> DatabaseError + '_ {
    move |err| DatabaseError::from(err).during(operation).add_context(sql.to_string())
}

#[async_trait]
impl QueryExecutor for PgBackend {
    async fn fetch(&self, query: &SelectQuery) -> Result<Vec<Row>> {
        let CompiledQuery { sql, bindings } = query.to_json_rows_sql();
        tracing::debug!(sql = %sql, bindings = bindings.len(), "Fetching datatable rows");

        let values: Vec<Value> = bind_all(sqlx::query_scalar::<_, Value>(&sql), &bindings)
            .fetch_all(&self.pool)
            .await
            .map_err(failed(DatabaseOperation::Fetch, &sql))?;

        Ok(values
            .into_iter()
            .filter_map(|value| match value {
                Value::Object(mut row) => {
                    row.shift_remove(ROW_NUMBER_COLUMN);
                    Some(row)
                }
                _ => None,
            })
            .collect())
    }

    async fn count(&self, query: &SelectQuery) -> Result<u64> {
        let CompiledQuery { sql, bindings } = query.to_count_sql();
        tracing::debug!(sql = %sql, bindings = bindings.len(), "Counting datatable rows");

        let count: i64 = bind_all(sqlx::query_scalar::<_, i64>(&sql), &bindings)
            .fetch_one(&self.pool)
            .await
            .map_err(failed(DatabaseOperation::Count, &sql))?;

        Ok(u64::try_from(count).unwrap_or(0))
    }
}

#[async_trait]
impl SchemaIntrospector for PgBackend {
    async fn column_listing(&self, table: &str) -> Result<Vec<String>> {
        const SQL: &str = "SELECT column_name::text FROM information_schema.columns \
             WHERE table_schema = COALESCE($1, current_schema()) AND table_name = $2 \
             ORDER BY ordinal_position";

        let (schema, name) = match table.rsplit_once('.') {
            Some((schema, name)) => (Some(schema.to_string()), name.to_string()),
            None => (None, table.to_string()),
        };

        let columns: Vec<String> = sqlx::query_scalar::<_, String>(SQL)
            .bind(schema)
            .bind(name)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| {
                DatabaseError::from(err)
                    .during(DatabaseOperation::Introspect)
                    .add_context(table.to_string())
            })?;

        tracing::debug!(table, columns = columns.len(), "Introspected table columns");
        Ok(columns)
    }
}
