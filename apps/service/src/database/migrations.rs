use anyhow::Result;
use chrono::Utc;
use libsql::Connection;

/// Schema version - increment when making schema changes
const SCHEMA_VERSION: i32 = 1;

/// Bring the schema up to `SCHEMA_VERSION`. Safe to run on every start.
pub async fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL,
            description TEXT
        )",
        (),
    )
    .await?;

    let current_version = get_current_version(conn).await?;

    if current_version >= SCHEMA_VERSION {
        tracing::info!(version = current_version, "Database schema is up to date");
        return Ok(());
    }

    tracing::info!(from = current_version, to = SCHEMA_VERSION, "Running migrations");

    if current_version < 1 {
        run_migration_v1(conn).await?;
        record_migration(conn, 1, "Services and check logs").await?;
    }

    Ok(())
}

pub async fn get_current_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn.query("SELECT MAX(version) FROM schema_migrations", ()).await?;

    if let Some(row) = rows.next().await? {
        let version: Option<i32> = row.get(0)?;
        Ok(version.unwrap_or(0))
    } else {
        Ok(0)
    }
}

async fn record_migration(conn: &Connection, version: i32, description: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?, ?, ?)",
        libsql::params![version, Utc::now().timestamp_millis(), description],
    )
    .await?;

    tracing::info!(version, description, "Applied migration");
    Ok(())
}

/// Migration v1: services and their check logs
async fn run_migration_v1(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS services (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            url TEXT NOT NULL UNIQUE,
            interval_seconds INTEGER NOT NULL CHECK (interval_seconds > 0),
            status TEXT NOT NULL DEFAULT 'UP',
            last_checked_at INTEGER,
            created_at INTEGER NOT NULL
        )",
        (),
    )
    .await?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            service_id INTEGER NOT NULL,
            status TEXT NOT NULL,
            latency_ms INTEGER,
            error_message TEXT,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (service_id) REFERENCES services(id) ON DELETE CASCADE
        )",
        (),
    )
    .await?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_logs_service_status_created ON logs(service_id, status, created_at)",
        (),
    )
    .await?;

    Ok(())
}
