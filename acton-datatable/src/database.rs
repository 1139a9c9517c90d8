//! PostgreSQL connection pool creation

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use crate::{
    config::DatabaseConfig,
    error::{DatabaseError, Result},
};

/// Create a PostgreSQL connection pool, retrying with exponential backoff
///
/// Gives up after `max_retries` additional attempts.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let mut attempt = 0;
    let base_delay = Duration::from_secs(config.retry_delay_secs);

    loop {
        match try_create_pool(config).await {
            Ok(pool) => {
                tracing::info!(
                    attempts = attempt + 1,
                    max_connections = config.max_connections,
                    min_connections = config.min_connections,
                    "Database connection pool created"
                );
                return Ok(pool);
            }
            Err(e) => {
                attempt += 1;

                if attempt > config.max_retries || !e.is_retriable() {
                    tracing::error!(
                        "Failed to connect to database at '{}' after {} attempt(s): {}",
                        sanitize_connection_url(&config.url),
                        attempt,
                        e
                    );
                    return Err(e.into());
                }

                let delay = retry_delay(base_delay, attempt);
                tracing::warn!(
                    "Database connection attempt {} failed: {}. Retrying in {:?}...",
                    attempt,
                    e,
                    delay
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Delay before retry number `attempt` (1-based): base, 2x base, 4x base, ...
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    let multiplier = 2_u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(multiplier)
}

async fn try_create_pool(config: &DatabaseConfig) -> std::result::Result<PgPool, DatabaseError> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(|e| {
            let kind = categorize_db_error(&e);
            DatabaseError::from(e)
                .add_context(format!("{} ({})", sanitize_connection_url(&config.url), kind))
        })
}

/// Mask the password in a connection URL for logging
fn sanitize_connection_url(url: &str) -> String {
    let (Some(scheme_end), Some(at_pos)) = (url.find("://"), url.rfind('@')) else {
        return url.to_string();
    };
    let credentials_start = scheme_end + 3;
    if at_pos < credentials_start {
        return url.to_string();
    }

    match url[credentials_start..at_pos].find(':') {
        Some(colon) => format!(
            "{}{}:***{}",
            &url[..credentials_start],
            &url[credentials_start..credentials_start + colon],
            &url[at_pos..]
        ),
        None => url.to_string(),
    }
}

/// Short hint about what went wrong while connecting
fn categorize_db_error(err: &sqlx::Error) -> &'static str {
    use sqlx::Error;
    match err {
        Error::Configuration(_) => "configuration error",
        Error::Database(_) => "rejected by server",
        Error::Io(_) => "network I/O error, check connectivity",
        Error::Tls(_) => "TLS error, check certificate configuration",
        Error::PoolTimedOut => "pool timeout, database may be overloaded",
        Error::PoolClosed => "pool closed",
        Error::WorkerCrashed => "worker crashed",
        _ => "connection error",
    }
}
