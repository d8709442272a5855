use deadpool::managed::{self, Pool, PoolConfig, RecycleResult};
use libsql::{Connection, Database, Error as LibsqlError};

use crate::config;

pub struct LibsqlManager {
    database: Database,
}

impl LibsqlManager {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

impl managed::Manager for LibsqlManager {
    type Type = Connection;
    type Error = LibsqlError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        let conn = self.database.connect()?;
        // Log rows cascade with their service.
        conn.execute("PRAGMA foreign_keys = ON", ()).await?;
        Ok(conn)
    }

    async fn recycle(&self, conn: &mut Self::Type, _: &managed::Metrics) -> RecycleResult<Self::Error> {
        conn.query("SELECT 1", ()).await?.next().await?.ok_or(LibsqlError::QueryReturnedNoRows)?;
        Ok(())
    }
}

pub type LibsqlPool = Pool<LibsqlManager>;

fn is_remote(url: &str) -> bool {
    ["libsql://", "https://", "http://", "wss://", "ws://"].iter().any(|scheme| url.starts_with(scheme))
}

/// Open the configured database, local file or remote, behind a pool
pub async fn connect(settings: &config::Database) -> anyhow::Result<LibsqlPool> {
    let database = if is_remote(&settings.url) {
        let token = settings.auth_token.clone().unwrap_or_default();
        libsql::Builder::new_remote(settings.url.clone(), token).build().await?
    } else {
        libsql::Builder::new_local(&settings.url).build().await?
    };

    let pool = Pool::builder(LibsqlManager::new(database)).config(PoolConfig::default()).build()?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_detection() {
        assert!(is_remote("libsql://monitor-org.turso.io"));
        assert!(is_remote("https://db.example.com"));
        assert!(!is_remote("heartbeat.db"));
        assert!(!is_remote("/var/lib/heartbeat/heartbeat.db"));
    }
}
