//! libsql persistence for services and check logs

pub mod migrations;
pub mod repository;

pub use repository::Repository;

use anyhow::{Result, anyhow};

use crate::{config, pool};

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}

/// Connect, migrate and wrap the pool in a repository
pub async fn open(settings: &config::Database) -> Result<Repository> {
    let pool = pool::connect(settings).await?;
    let conn = pool.get().await.map_err(|e| anyhow!("Failed to get database connection: {e}"))?;
    initialize_database(&conn).await?;
    drop(conn);

    Ok(Repository::new_from_pool(pool))
}
