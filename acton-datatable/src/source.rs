//! Data sources a datatable can be built over
//!
//! Every source resolves to the same three things: the base query, the table
//! name used to qualify search columns, and the columns to show when neither
//! the request nor the caller names any.
//!
//! | Source | Default columns |
//! |---|---|
//! | [`DataSource::Table`] | column listing of the table |
//! | [`DataSource::ModelType`] | serialized field names of `M::default()` |
//! | [`DataSource::ModelInstance`] | serialized field names of the instance |
//! | [`DataSource::PrebuiltQuery`] | column listing of the resolved table |

use serde::Serialize;
use serde_json::Value;

use crate::backend::SchemaIntrospector;
use crate::error::{Error, Result};
use crate::query::{split_alias, SelectQuery};

/// A row type stored in a known table
///
/// ```rust
/// use acton_datatable::source::Model;
/// use serde::Serialize;
///
/// #[derive(Default, Serialize)]
/// struct User {
///     id: i64,
///     name: String,
///     email: Option<String>,
/// }
///
/// impl Model for User {
///     const TABLE: &'static str = "users";
/// }
///
/// assert_eq!(User::default().attribute_keys(), vec!["id", "name", "email"]);
/// ```
pub trait Model: Serialize {
    /// Table the rows live in
    const TABLE: &'static str;

    /// Attribute names in field order
    fn attribute_keys(&self) -> Vec<String> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

/// What a datatable reads from
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    /// A bare table name
    Table(String),
    /// A model type, described by its table and default attributes
    ModelType {
        /// Model table
        table: String,
        /// Attribute names of a default instance
        attributes: Vec<String>,
    },
    /// A concrete model value
    ModelInstance {
        /// Model table
        table: String,
        /// Attribute names of the instance
        attributes: Vec<String>,
    },
    /// A query the caller already shaped (joins, filters, select list)
    PrebuiltQuery {
        /// The base query
        query: SelectQuery,
        /// Table of the model the query was built for, if any
        model_table: Option<String>,
    },
}

/// The normalized form of a [`DataSource`]
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSource {
    /// Base query, never mutated afterwards
    pub original_query: SelectQuery,
    /// Qualifier for default search columns: the FROM alias of a pre-built
    /// query when it has one, the table otherwise
    pub table_name: String,
    /// Columns to use when nothing else names any; empty when not requested
    pub default_columns: Vec<String>,
}

impl DataSource {
    /// Source over a table
    pub fn table(name: impl Into<String>) -> Self {
        Self::Table(name.into())
    }

    /// Source over a model type
    pub fn model<M: Model + Default>() -> Self {
        Self::ModelType {
            table: M::TABLE.to_string(),
            attributes: M::default().attribute_keys(),
        }
    }

    /// Source over the table of a model value, showing its attributes
    pub fn instance<M: Model>(model: &M) -> Self {
        Self::ModelInstance {
            table: M::TABLE.to_string(),
            attributes: model.attribute_keys(),
        }
    }

    /// Source over a pre-built query; its FROM target names the table
    pub fn query(query: SelectQuery) -> Self {
        Self::PrebuiltQuery {
            query,
            model_table: None,
        }
    }

    /// Source over a pre-built query for a model; the model names the table
    pub fn model_query<M: Model>(query: SelectQuery) -> Self {
        Self::PrebuiltQuery {
            query,
            model_table: Some(M::TABLE.to_string()),
        }
    }

    /// Normalize into query, table name and default columns
    ///
    /// The introspector is only consulted when `want_defaults` is set and the
    /// source does not carry its own attribute list.
    pub async fn resolve<I>(self, introspector: &I, want_defaults: bool) -> Result<ResolvedSource>
    where
        I: SchemaIntrospector + ?Sized,
    {
        // `table` is what gets introspected, `table_name` qualifies search columns
        let (original_query, table, table_name, attributes) = match self {
            Self::Table(table) => (SelectQuery::table(table.clone()), table.clone(), table, None),
            Self::ModelType { table, attributes } | Self::ModelInstance { table, attributes } => (
                SelectQuery::table(table.clone()),
                table.clone(),
                table,
                Some(attributes),
            ),
            Self::PrebuiltQuery { query, model_table } => {
                let from = query.from().map(split_alias);
                let alias = from.and_then(|(_, alias)| alias).map(str::to_string);
                let table = match (model_table, from) {
                    (Some(table), _) => table,
                    (None, Some((table, _))) => table.to_string(),
                    (None, None) => {
                        return Err(Error::InvalidSource("Query has no FROM target".to_string()))
                    }
                };
                let table_name = alias.unwrap_or_else(|| table.clone());
                (query, table, table_name, None)
            }
        };

        validate_table_name(&table)?;
        validate_table_name(&table_name)?;

        let default_columns = match (want_defaults, attributes) {
            (false, _) => Vec::new(),
            (true, Some(attributes)) => attributes,
            (true, None) => introspector.column_listing(&table).await?,
        };

        Ok(ResolvedSource {
            original_query,
            table_name,
            default_columns,
        })
    }
}

impl From<&str> for DataSource {
    fn from(table: &str) -> Self {
        Self::table(table)
    }
}

impl From<String> for DataSource {
    fn from(table: String) -> Self {
        Self::Table(table)
    }
}

impl From<SelectQuery> for DataSource {
    fn from(query: SelectQuery) -> Self {
        Self::query(query)
    }
}

/// `[A-Za-z_][A-Za-z0-9_.]*`
fn validate_table_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(Error::InvalidSource("Table name must not be empty".to_string()));
    };

    let valid = (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidSource(format!("Invalid table name: {name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::query::FilterCondition;
    use serde_json::json;

    #[derive(Default, Serialize)]
    struct User {
        id: i64,
        name: String,
        email: Option<String>,
    }

    impl Model for User {
        const TABLE: &'static str = "users";
    }

    fn backend() -> MemoryBackend {
        MemoryBackend::new().with_table(
            "users",
            ["id", "name", "email", "created_at"],
            vec![json!({ "id": 1, "name": "ana" })],
        )
    }

    #[tokio::test]
    async fn test_table_source_introspects() {
        let backend = backend();
        let resolved = DataSource::table("users").resolve(&backend, true).await.unwrap();

        assert_eq!(resolved.table_name, "users");
        assert_eq!(resolved.original_query, SelectQuery::table("users"));
        assert_eq!(resolved.default_columns, vec!["id", "name", "email", "created_at"]);
        assert_eq!(backend.execution_counts().introspections, 1);
    }

    #[tokio::test]
    async fn test_no_introspection_when_columns_known() {
        let backend = backend();
        let resolved = DataSource::table("users").resolve(&backend, false).await.unwrap();
        assert!(resolved.default_columns.is_empty());
        assert_eq!(backend.execution_counts().introspections, 0);
    }

    #[tokio::test]
    async fn test_model_type_uses_default_attributes() {
        let backend = backend();
        let resolved = DataSource::model::<User>().resolve(&backend, true).await.unwrap();

        assert_eq!(resolved.table_name, "users");
        assert_eq!(resolved.default_columns, vec!["id", "name", "email"]);
        assert_eq!(backend.execution_counts().introspections, 0);
    }

    #[tokio::test]
    async fn test_model_instance_uses_instance_attributes() {
        let backend = backend();
        let user = User {
            id: 9,
            name: "ana".to_string(),
            email: None,
        };
        let resolved = DataSource::instance(&user).resolve(&backend, true).await.unwrap();
        assert_eq!(resolved.table_name, "users");
        assert_eq!(resolved.original_query.from(), Some("users"));
        assert_eq!(resolved.default_columns, vec!["id", "name", "email"]);
    }

    #[tokio::test]
    async fn test_prebuilt_query_keeps_query_and_uses_from() {
        let backend = backend();
        let query = SelectQuery::table("users").with_condition(FilterCondition::eq("active", true));
        let resolved = DataSource::from(query.clone()).resolve(&backend, true).await.unwrap();

        assert_eq!(resolved.original_query, query);
        assert_eq!(resolved.table_name, "users");
        assert_eq!(resolved.default_columns.len(), 4);
    }

    #[tokio::test]
    async fn test_model_query_takes_table_from_model() {
        let backend = backend();
        let query = SelectQuery::table("users_view");
        let resolved = DataSource::model_query::<User>(query).resolve(&backend, true).await.unwrap();

        assert_eq!(resolved.table_name, "users");
        assert_eq!(resolved.original_query.from(), Some("users_view"));
        assert_eq!(backend.execution_counts().introspections, 1);
    }

    #[tokio::test]
    async fn test_invalid_sources() {
        let backend = backend();

        let empty = DataSource::table("").resolve(&backend, true).await;
        assert!(matches!(empty, Err(Error::InvalidSource(_))));

        let injected = DataSource::from("users; drop table users").resolve(&backend, true).await;
        assert!(matches!(injected, Err(Error::InvalidSource(_))));

        let no_from = DataSource::query(SelectQuery::new()).resolve(&backend, true).await;
        assert!(matches!(no_from, Err(Error::InvalidSource(_))));
    }

    #[tokio::test]
    async fn test_schema_qualified_table_is_valid() {
        let backend = backend();
        let resolved = DataSource::table("public.users").resolve(&backend, true).await.unwrap();
        assert_eq!(resolved.table_name, "public.users");
        assert_eq!(resolved.default_columns.len(), 4);
    }

    #[tokio::test]
    async fn test_aliased_prebuilt_query_qualifies_with_alias() {
        let backend = backend();
        let query = SelectQuery::table("users as u");
        let resolved = DataSource::query(query.clone()).resolve(&backend, true).await.unwrap();

        assert_eq!(resolved.table_name, "u");
        assert_eq!(resolved.original_query, query);
        assert_eq!(resolved.default_columns, vec!["id", "name", "email", "created_at"]);

        let bad_alias = DataSource::query(SelectQuery::table("users as u;x"))
            .resolve(&backend, true)
            .await;
        assert!(matches!(bad_alias, Err(Error::InvalidSource(_))));
    }
}
