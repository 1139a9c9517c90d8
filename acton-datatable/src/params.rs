//! Paging, search and ordering parameters
//!
//! [`ParameterResolver`] reads a [`DatatableRequest`] once and produces the
//! values the query composer works with. Malformed fields never fail; they fall
//! back to the configured defaults.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::DatatableConfig;
use crate::request::DatatableRequest;

/// Sort direction
///
/// ```rust
/// use acton_datatable::params::SortOrder;
///
/// assert_eq!(SortOrder::default(), SortOrder::Desc);
/// assert_eq!(SortOrder::parse("asc"), Some(SortOrder::Asc));
/// assert_eq!(SortOrder::parse("ASC"), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Sort in ascending order (A-Z, 0-9, oldest first)
    Asc,
    /// Sort in descending order (Z-A, 9-0, newest first)
    #[default]
    Desc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

impl SortOrder {
    /// Exact match on `asc` / `desc`
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    /// Convert to SQL ORDER BY keyword
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Values derived from the request, adjustable through the datatable setters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestParameters {
    /// Rows to skip
    pub offset: u64,
    /// Page size; `None` returns every row
    pub limit: Option<u64>,
    /// Trimmed search term
    pub search_value: Option<String>,
    /// Column to order by
    pub order_by: Option<String>,
    /// Direction for `order_by`
    pub order: SortOrder,
}

impl Default for RequestParameters {
    fn default() -> Self {
        let config = DatatableConfig::default();
        Self {
            offset: config.default_offset,
            limit: Some(config.default_limit),
            search_value: None,
            order_by: None,
            order: config.default_order,
        }
    }
}

/// Everything read out of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    /// Paging, search and order values
    pub parameters: RequestParameters,
    /// Column names the request scopes to; searchable ones only in a search request
    pub request_columns: Vec<String>,
    /// Every column named by a descriptor, deduplicated, in request order
    pub declared_columns: Vec<String>,
    /// The `draw` echo token
    pub draw: i64,
    /// Whether a search term was given
    pub search_request: bool,
}

/// Turns a [`DatatableRequest`] into [`ResolvedRequest`] using configured defaults
#[derive(Debug, Clone, Copy)]
pub struct ParameterResolver<'a> {
    config: &'a DatatableConfig,
}

impl<'a> ParameterResolver<'a> {
    /// Resolver using the given defaults
    pub fn new(config: &'a DatatableConfig) -> Self {
        Self { config }
    }

    /// Read every parameter out of the request
    pub fn resolve(&self, request: &DatatableRequest) -> ResolvedRequest {
        let search_request = request.is_search_request();
        let descriptors = request.column_descriptors();

        let mut declared_columns: Vec<String> = Vec::new();
        for name in descriptors.iter().filter_map(|d| d.identifier()) {
            if !declared_columns.iter().any(|c| c == name) {
                declared_columns.push(name.to_string());
            }
        }

        let request_columns: Vec<String> = descriptors
            .iter()
            .filter(|d| !search_request || d.is_searchable())
            .filter_map(|d| d.identifier().map(str::to_string))
            .collect();

        let parameters = RequestParameters {
            offset: self.offset(request),
            limit: self.limit(request),
            search_value: request.input_str("search.value"),
            order_by: Self::order_by(request, &request_columns),
            order: request
                .input_str("order.0.dir")
                .and_then(|dir| SortOrder::parse(&dir))
                .unwrap_or(self.config.default_order),
        };

        let resolved = ResolvedRequest {
            parameters,
            request_columns,
            declared_columns,
            draw: request.input_i64("draw").unwrap_or(0),
            search_request,
        };

        tracing::debug!(
            offset = resolved.parameters.offset,
            limit = ?resolved.parameters.limit,
            order_by = ?resolved.parameters.order_by,
            order = %resolved.parameters.order,
            search = resolved.search_request,
            draw = resolved.draw,
            "Resolved datatable parameters"
        );

        resolved
    }

    fn offset(&self, request: &DatatableRequest) -> u64 {
        match request.input_i64("start") {
            Some(start) => u64::try_from(start).unwrap_or(0),
            None => self.config.default_offset,
        }
    }

    fn limit(&self, request: &DatatableRequest) -> Option<u64> {
        let limit = match request.input_i64("length") {
            // DataTables sends -1 for "show all"
            Some(length) => u64::try_from(length).ok(),
            None => Some(self.config.default_limit),
        };

        match (limit, self.config.max_limit) {
            (Some(limit), Some(max)) => Some(limit.min(max)),
            (None, Some(max)) => Some(max),
            (limit, None) => limit,
        }
    }

    fn order_by(request: &DatatableRequest, request_columns: &[String]) -> Option<String> {
        if let Some(index) = request.input_i64("order.0.column") {
            return usize::try_from(index)
                .ok()
                .and_then(|index| request.column_descriptor(index))
                .and_then(|d| d.identifier().map(str::to_string));
        }

        request
            .input_str("order.0.column")
            .filter(|column| request_columns.iter().any(|c| c == column))
    }
}
