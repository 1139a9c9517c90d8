//! Error types and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
#[cfg(feature = "database")]
use std::fmt;
use thiserror::Error;

// ============================================================================
// Structured Database Errors
// ============================================================================

/// Database operation being performed when the error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg(feature = "database")]
pub enum DatabaseOperation {
    /// Establishing a database connection
    Connect,
    /// Fetching the rows of a page
    Fetch,
    /// Counting total or filtered rows
    Count,
    /// Reading a table's column listing
    Introspect,
    /// Acquiring a connection from the pool
    PoolAcquire,
}

#[cfg(feature = "database")]
impl fmt::Display for DatabaseOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Fetch => write!(f, "fetch"),
            Self::Count => write!(f, "count"),
            Self::Introspect => write!(f, "introspect"),
            Self::PoolAcquire => write!(f, "pool_acquire"),
        }
    }
}

/// Category of database error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg(feature = "database")]
pub enum DatabaseErrorKind {
    /// Failed to establish connection
    ConnectionFailed,
    /// Query execution failed
    QueryFailed,
    /// Type conversion error
    TypeConversion,
    /// Configuration error
    Configuration,
    /// Operation timed out
    Timeout,
    /// Permission denied
    PermissionDenied,
    /// Connection pool exhausted
    PoolExhausted,
    /// Other/unknown error
    Other,
}

#[cfg(feature = "database")]
impl fmt::Display for DatabaseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::QueryFailed => write!(f, "query_failed"),
            Self::TypeConversion => write!(f, "type_conversion"),
            Self::Configuration => write!(f, "configuration"),
            Self::Timeout => write!(f, "timeout"),
            Self::PermissionDenied => write!(f, "permission_denied"),
            Self::PoolExhausted => write!(f, "pool_exhausted"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Structured database error with operation context
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg(feature = "database")]
pub struct DatabaseError {
    /// The operation being performed when the error occurred
    pub operation: DatabaseOperation,
    /// The category of error
    pub kind: DatabaseErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Additional context (e.g., table name, SQL text)
    pub context: Option<String>,
}

#[cfg(feature = "database")]
impl DatabaseError {
    /// Create a new database error
    pub fn new(
        operation: DatabaseOperation,
        kind: DatabaseErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            context: None,
        }
    }

    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(
            DatabaseOperation::Connect,
            DatabaseErrorKind::ConnectionFailed,
            message,
        )
    }

    /// Create a query failed error
    pub fn query_failed(operation: DatabaseOperation, message: impl Into<String>) -> Self {
        Self::new(operation, DatabaseErrorKind::QueryFailed, message)
    }

    /// Create a pool exhausted error
    pub fn pool_exhausted(message: impl Into<String>) -> Self {
        Self::new(
            DatabaseOperation::PoolAcquire,
            DatabaseErrorKind::PoolExhausted,
            message,
        )
    }

    /// Check if this error is retriable (transient errors that may succeed on retry)
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            DatabaseErrorKind::ConnectionFailed
                | DatabaseErrorKind::Timeout
                | DatabaseErrorKind::PoolExhausted
        )
    }

    /// Re-tag the error with the operation that was running
    pub fn during(mut self, operation: DatabaseOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Add context to an existing error
    pub fn add_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

#[cfg(feature = "database")]
impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Database {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let Some(ref ctx) = self.context {
            write!(f, " [context: {}]", ctx)?;
        }
        Ok(())
    }
}

#[cfg(feature = "database")]
impl std::error::Error for DatabaseError {}

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for datatable processing
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// The data source handed to a datatable is not usable
    #[error("Invalid data source: {0}")]
    InvalidSource(String),

    /// A query backend rejected or failed to run a query
    #[error("Query error: {0}")]
    Query(String),

    /// Structured database error with operation context
    #[cfg(feature = "database")]
    #[error("{0}")]
    Database(DatabaseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// JSON encoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,

    /// Optional error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// HTTP status code
    pub status: u16,
}

impl ErrorResponse {
    /// Create error response with a code
    pub fn with_code(
        status: StatusCode,
        code: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            error: error.into(),
            code: Some(code.into()),
            status: status.as_u16(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            Error::InvalidSource(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::with_code(StatusCode::BAD_REQUEST, "INVALID_SOURCE", msg),
            ),

            Error::Query(msg) => {
                tracing::error!("Query error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_code(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "QUERY_ERROR",
                        "Query execution failed",
                    ),
                )
            }

            #[cfg(feature = "database")]
            Error::Database(ref e) => {
                tracing::error!(
                    operation = %e.operation,
                    kind = %e.kind,
                    context = ?e.context,
                    retriable = e.is_retriable(),
                    "Database error: {}", e.message
                );

                let status = match e.kind {
                    DatabaseErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                    DatabaseErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
                    DatabaseErrorKind::PoolExhausted | DatabaseErrorKind::ConnectionFailed => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };

                let code = format!("DATABASE_{}", e.kind.to_string().to_uppercase());

                let user_message = match e.kind {
                    DatabaseErrorKind::Timeout => "Database operation timed out",
                    DatabaseErrorKind::PermissionDenied => "Database permission denied",
                    DatabaseErrorKind::PoolExhausted | DatabaseErrorKind::ConnectionFailed => {
                        "Database unavailable"
                    }
                    _ => "Database operation failed",
                };

                (status, ErrorResponse::with_code(status, code, user_message))
            }

            Error::Config(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::with_code(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIG_ERROR",
                    e.to_string(),
                ),
            ),

            Error::Serialization(e) => {
                tracing::error!("Serialization error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_code(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "SERIALIZATION_ERROR",
                        "Failed to encode response",
                    ),
                )
            }

            Error::Io(e) => {
                tracing::error!("I/O error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_code(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "IO_ERROR",
                        "I/O operation failed",
                    ),
                )
            }

            Error::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_code(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "Internal server error",
                    ),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

// Conversion from sqlx::Error to DatabaseError
#[cfg(feature = "database")]
impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::Error as E;
        match err {
            E::PoolTimedOut => Self::pool_exhausted("Connection pool timed out"),
            E::PoolClosed => Self::connection_failed("Connection pool is closed"),
            E::Configuration(e) => Self::new(
                DatabaseOperation::Connect,
                DatabaseErrorKind::Configuration,
                e.to_string(),
            ),
            E::Io(e) => Self::new(
                DatabaseOperation::Connect,
                DatabaseErrorKind::ConnectionFailed,
                e.to_string(),
            ),
            E::Tls(e) => Self::new(
                DatabaseOperation::Connect,
                DatabaseErrorKind::ConnectionFailed,
                format!("TLS error: {}", e),
            ),
            E::ColumnDecode { index, source } => Self::new(
                DatabaseOperation::Fetch,
                DatabaseErrorKind::TypeConversion,
                format!("Failed to decode column {}: {}", index, source),
            ),
            E::Decode(e) => Self::new(
                DatabaseOperation::Fetch,
                DatabaseErrorKind::TypeConversion,
                e.to_string(),
            ),
            E::Database(db_err) => {
                // 42501 is insufficient_privilege, 57014 is query_canceled (statement timeout)
                let kind = match db_err.code().as_deref() {
                    Some("42501") => DatabaseErrorKind::PermissionDenied,
                    Some("57014") => DatabaseErrorKind::Timeout,
                    _ => DatabaseErrorKind::QueryFailed,
                };
                Self::new(DatabaseOperation::Fetch, kind, db_err.to_string())
            }
            E::WorkerCrashed => Self::connection_failed("Database worker crashed"),
            _ => Self::new(
                DatabaseOperation::Fetch,
                DatabaseErrorKind::Other,
                err.to_string(),
            ),
        }
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Database(DatabaseError::from(err))
    }
}

#[cfg(feature = "database")]
impl From<DatabaseError> for Error {
    fn from(err: DatabaseError) -> Self {
        Error::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_with_code() {
        let err = ErrorResponse::with_code(
            StatusCode::BAD_REQUEST,
            "INVALID_SOURCE",
            "Table name must not be empty",
        );
        assert_eq!(err.status, 400);
        assert_eq!(err.error, "Table name must not be empty");
        assert_eq!(err.code, Some("INVALID_SOURCE".to_string()));
    }

    #[test]
    fn test_invalid_source_maps_to_bad_request() {
        let response = Error::InvalidSource("bad".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_query_error_maps_to_internal_error() {
        let response = Error::Query("no such table".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_display() {
        let err = Error::InvalidSource("Table name must not be empty".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid data source: Table name must not be empty"
        );
    }

    #[cfg(feature = "database")]
    mod database_error_tests {
        use super::*;

        #[test]
        fn test_database_error_new() {
            let err = DatabaseError::new(
                DatabaseOperation::Count,
                DatabaseErrorKind::QueryFailed,
                "Query failed",
            );
            assert_eq!(err.operation, DatabaseOperation::Count);
            assert_eq!(err.kind, DatabaseErrorKind::QueryFailed);
            assert!(err.context.is_none());
        }

        #[test]
        fn test_is_retriable() {
            assert!(DatabaseError::connection_failed("refused").is_retriable());
            assert!(DatabaseError::pool_exhausted("exhausted").is_retriable());
            assert!(!DatabaseError::query_failed(DatabaseOperation::Fetch, "syntax").is_retriable());
        }

        #[test]
        fn test_during_and_context() {
            let err = DatabaseError::query_failed(DatabaseOperation::Fetch, "boom")
                .during(DatabaseOperation::Count)
                .add_context("SELECT COUNT(*) AS aggregate FROM \"users\"");
            assert_eq!(err.operation, DatabaseOperation::Count);
            let display = err.to_string();
            assert!(display.contains("query_failed"));
            assert!(display.contains("during count"));
            assert!(display.contains("[context: SELECT COUNT(*)"));
        }

        #[test]
        fn test_pool_timeout_conversion() {
            let err = DatabaseError::from(sqlx::Error::PoolTimedOut);
            assert_eq!(err.kind, DatabaseErrorKind::PoolExhausted);
            assert_eq!(err.operation, DatabaseOperation::PoolAcquire);
        }

        #[test]
        fn test_database_error_status_mapping() {
            let response =
                Error::Database(DatabaseError::pool_exhausted("busy")).into_response();
            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        }
    }
}
