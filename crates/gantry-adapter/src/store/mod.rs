//! Local state store: database setup and schema management
//!
//! One SQLite database holds both adapter-owned tables:
//!
//! - `instances`: the instance-metadata cache written after confirmed
//!   launches and cleared after confirmed terminations
//! - `nodes`: the node registry records staged and committed per session

pub mod cache;
pub mod cli;
pub mod registry;

pub use cache::{InstanceCache, InstanceCacheEntry};
pub use registry::SqliteRegistry;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Database connection pool type alias
pub type DbPool = SqlitePool;

/// Get the adapter database path
fn get_db_path() -> Result<PathBuf> {
    let proj_dirs =
        ProjectDirs::from("", "", "gantry").context("Failed to get project directories")?;

    let state_dir = proj_dirs.data_local_dir();
    fs::create_dir_all(state_dir).context("Failed to create state directory")?;

    Ok(state_dir.join("adapter.db"))
}

/// Open the adapter database at its default location, creating it if needed
pub async fn open_db() -> Result<DbPool> {
    let path = get_db_path()?;
    open_db_at(&path).await
}

/// Open the adapter database at an explicit path, creating it if needed
pub async fn open_db_at(path: &Path) -> Result<DbPool> {
    let db_url = format!("sqlite://{}?mode=rwc", path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("Failed to open adapter database")?;

    setup_schema(&pool).await?;

    Ok(pool)
}

/// Setup database schema
///
/// Public so tests and embedders opening their own (usually in-memory)
/// pools can initialize the same tables.
pub async fn setup_schema(pool: &DbPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS instances (
            node_name TEXT PRIMARY KEY,
            instance_id TEXT NOT NULL,
            compartment_id TEXT NOT NULL,
            shape TEXT NOT NULL,
            vcpus INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            deleted_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS nodes (
            name TEXT PRIMARY KEY,
            state TEXT NOT NULL,
            hardware_profile TEXT NOT NULL,
            software_profile TEXT NOT NULL,
            nics TEXT NOT NULL,
            session_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_instances_id ON instances(instance_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_nodes_state ON nodes(state)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_nodes_session ON nodes(session_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Open an in-memory database with the schema applied, for unit tests.
///
/// A single connection is required: every new `sqlite::memory:` connection
/// would otherwise get its own empty database.
#[cfg(test)]
pub(crate) async fn open_test_db() -> Result<DbPool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .context("Failed to create in-memory test database")?;

    setup_schema(&pool).await?;

    Ok(pool)
}
