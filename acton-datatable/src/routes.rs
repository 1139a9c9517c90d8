//! HTTP routes serving tables as DataTables endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};

use crate::backend::Backend;
use crate::config::DatatableConfig;
use crate::datatable::Datatable;
use crate::error::{Error, Result};
use crate::request::DatatableRequest;
use crate::response::DatatableResponse;

/// Shared state for the datatable routes
#[derive(Clone)]
pub struct AppState {
    backend: Arc<dyn Backend>,
    datatable: DatatableConfig,
}

impl AppState {
    /// State over a backend with parameter defaults from `datatable`
    pub fn new(backend: Arc<dyn Backend>, datatable: DatatableConfig) -> Self {
        Self { backend, datatable }
    }

    /// The query backend
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Parameter defaults
    pub fn datatable_config(&self) -> &DatatableConfig {
        &self.datatable
    }
}

/// `GET /datatables/{table}`
///
/// Only tables allowed by [`DatatableConfig::is_table_allowed`] are served.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/datatables/{table}", get(table_endpoint))
        .with_state(state)
}

async fn table_endpoint(
    State(state): State<AppState>,
    Path(table): Path<String>,
    request: DatatableRequest,
) -> Result<DatatableResponse> {
    if !state.datatable.is_table_allowed(&table) {
        tracing::warn!(table = %table, "Rejected request for a table outside the allowlist");
        return Err(Error::InvalidSource(format!("table `{table}` is not served")));
    }

    let mut datatable =
        Datatable::with_config(table, &request, state.backend.clone(), &state.datatable).await?;
    Ok(datatable.process().await?.clone())
}
