//! # Database Persistence Layer
//!
//! Postgres persistence for the CMMS records via SQLx.
//!
//! The database layer is **optional**. When `DATABASE_URL` is set the API
//! writes every change through to PostgreSQL and hydrates its in-memory
//! stores from it on startup. When absent, the API runs in-memory only.
//!
//! Referential cleanup (subtree deletes, vendor references, task and
//! schedule cascades) is declared as foreign key actions in the
//! migrations, so a single `DELETE` here matches the in-memory cascade.
//!
//! Enumerations are stored as their wire strings. An unknown string read
//! back from the database is logged and replaced with the type's default
//! instead of failing hydration.

pub mod equipment;
pub mod parts;
pub mod schedules;
pub mod tasks;
pub mod users;
pub mod vendors;

use std::str::FromStr;

use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if no URL is configured (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool(database_url: Option<&str>) -> Result<Option<PgPool>, sqlx::Error> {
    let Some(url) = database_url else {
        tracing::warn!(
            "DATABASE_URL not set, running in-memory only mode. \
             State will not survive restarts."
        );
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Parse a stored enum string, falling back to `fallback` with a warning.
pub(crate) fn parse_stored<T: FromStr>(
    table: &'static str,
    id: Uuid,
    column: &'static str,
    value: &str,
    fallback: T,
) -> T {
    value.parse().unwrap_or_else(|_| {
        tracing::warn!(
            table,
            id = %id,
            column,
            value,
            "unknown value in database, using default"
        );
        fallback
    })
}
