//! # acton-datatable
//!
//! Server-side processing for DataTables grids. A [`Datatable`] reads the
//! paging, search and ordering fields of a grid request, applies them to a
//! base query and answers with the `{draw, recordsTotal, recordsFiltered, data}`
//! envelope the widget expects.
//!
//! ## Features
//!
//! - **Request parsing**: bracketed query keys (`columns[0][data]`) or JSON bodies, plus an axum extractor
//! - **Data sources**: table names, model types, model values or pre-built queries
//! - **Query building**: parameterized PostgreSQL with quoted identifiers
//! - **Overrides**: per-column render functions and search targets
//! - **Backends**: PostgreSQL through sqlx (feature `database`) and an in-memory backend
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use acton_datatable::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let database = config
//!         .database
//!         .clone()
//!         .ok_or_else(|| Error::Internal("database is not configured".into()))?;
//!     let backend = Arc::new(PgBackend::new(create_pool(&database).await?));
//!
//!     let app = router(AppState::new(backend, config.datatable.clone()));
//!     Server::new(config).serve(app).await
//! }
//! ```

pub mod backend;
pub mod config;
#[cfg(feature = "database")]
pub mod database;
pub mod datatable;
pub mod error;
pub mod observability;
pub mod params;
pub mod query;
pub mod render;
pub mod request;
pub mod response;
pub mod routes;
pub mod server;
pub mod source;

/// One result row, keys in select order
pub type Row = serde_json::Map<String, serde_json::Value>;

pub use datatable::Datatable;
pub use error::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backend::{
        Backend, ExecutionCounts, MemoryBackend, QueryExecutor, SchemaIntrospector,
    };
    #[cfg(feature = "database")]
    pub use crate::backend::PgBackend;

    pub use crate::config::{Config, DatabaseConfig, DatatableConfig, ServiceConfig};

    #[cfg(feature = "database")]
    pub use crate::database::create_pool;

    pub use crate::datatable::Datatable;
    pub use crate::error::{Error, Result};

    #[cfg(feature = "database")]
    pub use crate::error::{DatabaseError, DatabaseErrorKind, DatabaseOperation};

    pub use crate::observability::init_tracing;
    pub use crate::params::{ParameterResolver, RequestParameters, SortOrder};
    pub use crate::query::{ConditionGroup, FilterCondition, FilterOperator, FilterValue, SelectQuery};
    pub use crate::render::{RenderFn, SearchFn, SearchTarget};
    pub use crate::request::DatatableRequest;
    pub use crate::response::DatatableResponse;
    pub use crate::routes::{router, AppState};
    pub use crate::server::Server;
    pub use crate::source::{DataSource, Model};
    pub use crate::Row;

    pub use axum::{
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::get,
        Json, Router,
    };
    pub use serde::{Deserialize, Serialize};
    pub use tokio;
    pub use tracing::{debug, error, info, warn};
}
