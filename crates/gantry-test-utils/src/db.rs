//! Database test utilities
//!
//! Provides in-memory SQLite database setup for testing.

use anyhow::Result;
use gantry_adapter::store::{setup_schema, DbPool};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

/// Create an in-memory SQLite pool with the adapter schema applied.
///
/// # Example
///
/// ```ignore
/// use gantry_test_utils::open_test_db;
///
/// #[tokio::test]
/// async fn test_database() {
///     let pool = open_test_db().await.unwrap();
///     // Tables exist; run tests...
/// }
/// ```
pub async fn open_test_db() -> Result<DbPool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1) // Single connection for in-memory to maintain state
        .connect_with(options)
        .await?;

    setup_schema(&pool).await?;

    Ok(pool)
}
