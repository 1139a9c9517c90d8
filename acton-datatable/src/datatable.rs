//! The datatable: request in, filtered page and envelope out
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use acton_datatable::prelude::*;
//! use serde_json::{json, Value};
//!
//! # block_on(async {
//! let backend = Arc::new(MemoryBackend::new().with_table(
//!     "users",
//!     ["id", "name"],
//!     vec![json!({ "id": 1, "name": "ana" }), json!({ "id": 2, "name": "bob" })],
//! ));
//! let request = DatatableRequest::from_query_str("draw=1&search%5Bvalue%5D=an");
//!
//! let mut datatable = Datatable::new("users", &request, backend).await?;
//! datatable.column("name", |value, _row, _dt| {
//!     Value::from(value.as_str().unwrap_or_default().to_uppercase())
//! });
//!
//! let response = datatable.process().await?;
//! assert_eq!(response.records_total, 2);
//! assert_eq!(response.records_filtered, 1);
//! assert_eq!(response.data[0]["name"], "ANA");
//! # Ok::<(), acton_datatable::Error>(())
//! # }).unwrap();
//! # fn block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::{http::StatusCode, response::Response};
use serde_json::Value;

use crate::backend::Backend;
use crate::config::DatatableConfig;
use crate::error::Result;
use crate::params::{ParameterResolver, RequestParameters, SortOrder};
use crate::query::{ConditionGroup, FilterCondition, SelectQuery};
use crate::render::{render_row, RenderFn, SearchTarget};
use crate::request::DatatableRequest;
use crate::response::DatatableResponse;
use crate::source::DataSource;
use crate::Row;

/// Server-side processing state for one grid request
pub struct Datatable {
    backend: Arc<dyn Backend>,
    draw: i64,
    search_request: bool,
    declared_columns: bool,
    request_columns: Vec<String>,
    parameters: RequestParameters,

    table_name: String,
    original_query: SelectQuery,
    query: SelectQuery,
    query_already_built: bool,

    columns: Vec<String>,
    renders: HashMap<String, RenderFn>,
    search_columns: HashMap<String, SearchTarget>,

    total_records: u64,
    records_filtered: u64,
    rows: Vec<Row>,
    data: Vec<Row>,
    response: Option<DatatableResponse>,
}

impl Datatable {
    /// Build a datatable with the default parameter configuration
    pub async fn new(
        source: impl Into<DataSource>,
        request: &DatatableRequest,
        backend: Arc<dyn Backend>,
    ) -> Result<Self> {
        Self::with_config(source, request, backend, &DatatableConfig::default()).await
    }

    /// Build a datatable, reading parameter defaults from `config`
    ///
    /// Fails with [`Error::InvalidSource`](crate::Error::InvalidSource) when the
    /// source cannot be resolved, or with the backend's error when a column
    /// listing is needed and cannot be read.
    pub async fn with_config(
        source: impl Into<DataSource>,
        request: &DatatableRequest,
        backend: Arc<dyn Backend>,
        config: &DatatableConfig,
    ) -> Result<Self> {
        let resolved = ParameterResolver::new(config).resolve(request);
        let declared_columns = !resolved.declared_columns.is_empty();

        let source = source
            .into()
            .resolve(backend.as_ref(), !declared_columns)
            .await?;

        let columns = if declared_columns {
            resolved.declared_columns
        } else {
            dedup(source.default_columns)
        };

        tracing::debug!(
            table = %source.table_name,
            columns = ?columns,
            "Datatable source resolved"
        );

        Ok(Self {
            backend,
            draw: resolved.draw,
            search_request: resolved.search_request,
            declared_columns,
            request_columns: resolved.request_columns,
            parameters: resolved.parameters,
            table_name: source.table_name,
            query: source.original_query.clone(),
            original_query: source.original_query,
            query_already_built: false,
            columns,
            renders: HashMap::new(),
            search_columns: HashMap::new(),
            total_records: 0,
            records_filtered: 0,
            rows: Vec::new(),
            data: Vec::new(),
            response: None,
        })
    }

    // ------------------------------------------------------------------
    // Column configuration
    // ------------------------------------------------------------------

    /// Register a render override, adding the column when it is missing
    pub fn column<F>(&mut self, name: impl Into<String>, render: F) -> &mut Self
    where
        F: Fn(&Value, &Row, &Datatable) -> Value + Send + Sync + 'static,
    {
        let name = name.into();
        if !self.columns.contains(&name) {
            self.columns.push(name.clone());
        }
        self.renders.insert(name, Arc::new(render));
        self
    }

    /// Search `target` instead of `table.column` for this column
    ///
    /// ```rust,ignore
    /// datatable.on_search_column("team", "teams.name");
    /// ```
    pub fn on_search_column(
        &mut self,
        column: impl Into<String>,
        target: impl Into<SearchTarget>,
    ) -> &mut Self {
        self.search_columns.insert(column.into(), target.into());
        self
    }

    /// Alias of [`on_search_column`](Self::on_search_column)
    pub fn on_search(
        &mut self,
        column: impl Into<String>,
        target: impl Into<SearchTarget>,
    ) -> &mut Self {
        self.on_search_column(column, target)
    }

    /// Hand the search for this column to a hook
    pub fn on_search_with<F>(&mut self, column: impl Into<String>, hook: F) -> &mut Self
    where
        F: Fn(&mut ConditionGroup, &str, &Datatable) -> Option<String> + Send + Sync + 'static,
    {
        self.on_search_column(column, SearchTarget::callback(hook))
    }

    /// Replace the column set; duplicates keep their first position
    pub fn set_columns<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = dedup(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Insert a column at `index` (appended when `None` or past the end)
    ///
    /// A column already in the set stays where it is.
    pub fn add_column(&mut self, name: impl Into<String>, index: Option<usize>) -> &mut Self {
        self.add_columns([name], index)
    }

    /// Insert several columns starting at `index`, skipping ones already present
    pub fn add_columns<I, S>(&mut self, names: I, index: Option<usize>) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut position = index
            .unwrap_or(self.columns.len())
            .min(self.columns.len());
        for name in names {
            let name = name.into();
            if self.columns.contains(&name) {
                continue;
            }
            self.columns.insert(position, name);
            position += 1;
        }
        self
    }

    /// Columns shown in the response, in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    // ------------------------------------------------------------------
    // Parameters
    //
    // Setters only affect a query that has not been built yet.
    // ------------------------------------------------------------------

    /// Rows skipped
    pub fn offset(&self) -> u64 {
        self.parameters.offset
    }

    /// Override the offset
    pub fn set_offset(&mut self, offset: u64) -> &mut Self {
        self.parameters.offset = offset;
        self
    }

    /// Page size; `None` means every row
    pub fn limit(&self) -> Option<u64> {
        self.parameters.limit
    }

    /// Override the page size
    pub fn set_limit(&mut self, limit: impl Into<Option<u64>>) -> &mut Self {
        self.parameters.limit = limit.into();
        self
    }

    /// Sort direction
    pub fn order(&self) -> SortOrder {
        self.parameters.order
    }

    /// Override the sort direction
    pub fn set_order(&mut self, order: SortOrder) -> &mut Self {
        self.parameters.order = order;
        self
    }

    /// Column ordered by, if any
    pub fn order_by(&self) -> Option<&str> {
        self.parameters.order_by.as_deref()
    }

    /// Order by `column`
    pub fn set_order_by(&mut self, column: impl Into<String>) -> &mut Self {
        self.parameters.order_by = Some(column.into());
        self
    }

    /// Drop any ordering
    pub fn clear_order_by(&mut self) -> &mut Self {
        self.parameters.order_by = None;
        self
    }

    /// Search term, if any
    pub fn search_value(&self) -> Option<&str> {
        self.parameters.search_value.as_deref()
    }

    /// Replace the search term
    ///
    /// Whether the request counts as a search was decided when the request was
    /// read; this only changes the term used.
    pub fn set_search_value(&mut self, value: impl Into<String>) -> &mut Self {
        self.parameters.search_value = Some(value.into());
        self
    }

    /// Whether the request carried a search term
    pub fn is_search_request(&self) -> bool {
        self.search_request
    }

    /// Column names the request scoped the search to
    pub fn request_columns(&self) -> &[String] {
        &self.request_columns
    }

    /// Echo token for the response
    pub fn draw(&self) -> i64 {
        self.draw
    }

    /// Table used to qualify default search columns
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// The unmodified base query
    pub fn original_query(&self) -> &SelectQuery {
        &self.original_query
    }

    /// Replace the base query used for the total count
    ///
    /// The working query is left untouched.
    pub fn set_original_query(&mut self, query: SelectQuery) -> &mut Self {
        self.original_query = query;
        self
    }

    /// The working query as built so far
    pub fn query(&self) -> &SelectQuery {
        &self.query
    }

    // ------------------------------------------------------------------
    // Results
    // ------------------------------------------------------------------

    /// Total rows counted when the query was built
    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    /// Rows matching the search, counted when the query was built
    pub fn records_filtered(&self) -> u64 {
        self.records_filtered
    }

    /// Raw rows of the current page
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Rendered rows of the current page
    pub fn data(&self) -> &[Row] {
        &self.data
    }

    /// The envelope, once processed
    pub fn response_data(&self) -> Option<&DatatableResponse> {
        self.response.as_ref()
    }

    /// Count the base query again
    pub async fn get_total_records(&self) -> Result<u64> {
        self.backend.count(&self.original_query).await
    }

    /// Render one cell of a raw row
    pub fn render_cell(&self, row: &Row, column: &str) -> Value {
        let raw = row.get(column).unwrap_or(&Value::Null);
        match self.renders.get(column) {
            Some(render) => render(raw, row, self),
            None => raw.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Query composition
    // ------------------------------------------------------------------

    fn is_search_eligible(&self, column: &str) -> bool {
        !self.declared_columns || self.request_columns.iter().any(|c| c == column)
    }

    fn search_group(&self) -> ConditionGroup {
        let mut group = ConditionGroup::new();
        let Some(term) = self.parameters.search_value.as_deref() else {
            return group;
        };
        let pattern = format!("%{term}%");

        for column in self.columns.iter().filter(|c| self.is_search_eligible(c)) {
            let target = match self.search_columns.get(column) {
                Some(SearchTarget::Callback(hook)) => hook(&mut group, term, self),
                Some(SearchTarget::Column(target)) => Some(target.clone()),
                None => Some(format!("{}.{}", self.table_name, column)),
            };
            if let Some(target) = target {
                group.or_where(FilterCondition::like(target, pattern.clone()));
            }
        }
        group
    }

    /// Build the working query and record the counts; later calls reuse it
    ///
    /// Runs one count for the total and, for searches, one for the filtered
    /// total. Nothing is recorded when a count fails.
    pub async fn get_query(&mut self) -> Result<&SelectQuery> {
        if self.query_already_built {
            return Ok(&self.query);
        }

        let mut query = self.query.clone();
        if self.search_request {
            query.and_group(self.search_group());
        }
        if let Some(order_by) = &self.parameters.order_by {
            query.order_by(order_by.clone(), self.parameters.order);
        }

        let total_records = self.backend.count(&self.original_query).await?;
        let records_filtered = if self.search_request {
            self.backend.count(&query).await?
        } else {
            total_records
        };

        query
            .skip(self.parameters.offset)
            .take(self.parameters.limit);

        tracing::debug!(
            sql = %query.to_sql().sql,
            total_records,
            records_filtered,
            "Datatable query built"
        );

        self.query = query;
        self.total_records = total_records;
        self.records_filtered = records_filtered;
        self.query_already_built = true;
        Ok(&self.query)
    }

    /// Run the query, render the page and assemble the envelope
    ///
    /// The envelope is computed once; later calls return it without touching
    /// the backend.
    pub async fn process(&mut self) -> Result<&DatatableResponse> {
        if let Some(response) = self.response.take() {
            return Ok(self.response.insert(response));
        }

        self.get_query().await?;
        let rows = self.backend.fetch(&self.query).await?;
        let data: Vec<Row> = rows
            .iter()
            .map(|row| render_row(self, &self.columns, &self.renders, row))
            .collect();

        let response = DatatableResponse::new(
            self.draw,
            self.total_records,
            self.records_filtered,
            data.clone(),
        );
        self.rows = rows;
        self.data = data;
        Ok(self.response.insert(response))
    }

    /// The envelope as a JSON string
    pub async fn json(&mut self) -> Result<String> {
        let response = self.process().await?;
        Ok(serde_json::to_string(response)?)
    }

    /// The envelope as an HTTP response with `status`
    pub async fn response(&mut self, status: StatusCode) -> Result<Response> {
        let response = self.process().await?.clone();
        Ok(response.with_status(status))
    }
}

impl fmt::Debug for Datatable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut renders: Vec<&String> = self.renders.keys().collect();
        renders.sort();

        f.debug_struct("Datatable")
            .field("table_name", &self.table_name)
            .field("draw", &self.draw)
            .field("search_request", &self.search_request)
            .field("parameters", &self.parameters)
            .field("columns", &self.columns)
            .field("renders", &renders)
            .field("search_columns", &self.search_columns)
            .field("query_already_built", &self.query_already_built)
            .field("total_records", &self.total_records)
            .field("records_filtered", &self.records_filtered)
            .finish_non_exhaustive()
    }
}

fn dedup(columns: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(columns.len());
    for column in columns {
        if !out.contains(&column) {
            out.push(column);
        }
    }
    out
}
