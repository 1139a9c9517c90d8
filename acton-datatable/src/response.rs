//! The DataTables response envelope
//!
//! ```rust
//! use acton_datatable::response::DatatableResponse;
//!
//! let response = DatatableResponse::new(3, 57, 12, Vec::new());
//! let json = serde_json::to_value(&response).unwrap();
//! assert_eq!(json["recordsTotal"], 57);
//! assert_eq!(json["recordsFiltered"], 12);
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::Row;

/// `{ draw, recordsTotal, recordsFiltered, data }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatatableResponse {
    /// Echo of the request's draw counter
    pub draw: i64,
    /// Rows in the unfiltered source
    pub records_total: u64,
    /// Rows left after the search filter
    pub records_filtered: u64,
    /// Rendered rows of the current page
    pub data: Vec<Row>,
}

impl DatatableResponse {
    /// Assemble an envelope
    pub fn new(draw: i64, records_total: u64, records_filtered: u64, data: Vec<Row>) -> Self {
        Self {
            draw,
            records_total,
            records_filtered,
            data,
        }
    }

    /// Response with an explicit status code
    pub fn with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

impl IntoResponse for DatatableResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
