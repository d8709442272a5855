use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heartbeat::{Log, LogQuery, NewLog, Service, ServiceStatus, ServiceStore, ServiceUpdate, SortOrder};
use libsql::{Row, Value, params};

use crate::pool::{LibsqlManager, LibsqlPool};

const SERVICE_COLUMNS: &str = "id, name, url, interval_seconds, status, last_checked_at";
const LOG_COLUMNS: &str = "id, service_id, status, latency_ms, error_message, created_at";

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("Timestamp out of range: {ms}"))
}

fn optional_millis(at: Option<DateTime<Utc>>) -> Value {
    at.map_or(Value::Null, |at| Value::Integer(to_millis(at)))
}

fn service_from_row(row: &Row) -> Result<Service> {
    let status: String = row.get(4)?;
    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        interval_seconds: row.get::<i64>(3)?.max(0) as u64,
        status: status.parse()?,
        last_checked_at: row.get::<Option<i64>>(5)?.map(from_millis).transpose()?,
    })
}

fn log_from_row(row: &Row) -> Result<Log> {
    let status: String = row.get(2)?;
    Ok(Log {
        id: row.get(0)?,
        service_id: row.get(1)?,
        status: status.parse()?,
        latency_ms: row.get::<Option<i64>>(3)?.map(|ms| ms.max(0) as u64),
        error_message: row.get(4)?,
        created_at: from_millis(row.get(5)?)?,
    })
}

/// libsql-backed store for services and their check logs
#[derive(Clone)]
pub struct Repository {
    pool: LibsqlPool,
}

impl Repository {
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    pub(crate) async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        self.pool.get().await.map_err(|e| anyhow!("Failed to get database connection: {e}"))
    }

    /// Register a new service, initially UP and never checked
    pub async fn insert_service(&self, name: &str, url: &str, interval_seconds: u64) -> Result<Service> {
        let conn = self.get_conn().await?;
        let interval = i64::try_from(interval_seconds).context("Interval too large")?;

        conn.execute(
            "INSERT INTO services (name, url, interval_seconds, status, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![name, url, interval, ServiceStatus::Up.as_str(), to_millis(Utc::now())],
        )
        .await
        .with_context(|| format!("Failed to add service {url}"))?;

        Ok(Service {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            url: url.to_string(),
            interval_seconds,
            status: ServiceStatus::Up,
            last_checked_at: None,
        })
    }

    /// Remove a service and its logs, returning the removed row
    pub async fn delete_service(&self, id: i64) -> Result<Option<Service>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(&format!("DELETE FROM services WHERE id = ?1 RETURNING {SERVICE_COLUMNS}"), params![id])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(service_from_row(&row)?)),
            None => Ok(None),
        }
    }

    #[cfg(test)]
    pub async fn get_service(&self, id: i64) -> Result<Option<Service>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(&format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?1"), params![id])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(service_from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Logs of a service created at or after `since`, oldest first
    pub async fn logs_since(&self, service_id: i64, since: DateTime<Utc>) -> Result<Vec<Log>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {LOG_COLUMNS} FROM logs WHERE service_id = ?1 AND created_at >= ?2 \
                     ORDER BY created_at ASC, id ASC"
                ),
                params![service_id, to_millis(since)],
            )
            .await?;

        let mut logs = Vec::new();
        while let Some(row) = rows.next().await? {
            logs.push(log_from_row(&row)?);
        }
        Ok(logs)
    }
}

#[async_trait]
impl ServiceStore for Repository {
    async fn list_services(&self) -> Result<Vec<Service>> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query(&format!("SELECT {SERVICE_COLUMNS} FROM services ORDER BY id"), ()).await?;

        let mut services = Vec::new();
        while let Some(row) = rows.next().await? {
            services.push(service_from_row(&row)?);
        }
        Ok(services)
    }

    async fn create_log(&self, entry: &NewLog) -> Result<i64> {
        let conn = self.get_conn().await?;
        let latency = entry.latency_ms.map_or(Value::Null, |ms| Value::Integer(ms.min(i64::MAX as u64) as i64));
        let error_message = entry.error_message.clone().map_or(Value::Null, Value::Text);

        conn.execute(
            "INSERT INTO logs (service_id, status, latency_ms, error_message, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![entry.service_id, entry.status.as_str(), latency, error_message, to_millis(entry.created_at)],
        )
        .await
        .with_context(|| format!("Failed to write log for service {}", entry.service_id))?;

        Ok(conn.last_insert_rowid())
    }

    async fn update_service(&self, id: i64, update: &ServiceUpdate) -> Result<()> {
        let conn = self.get_conn().await?;
        let status = update.status.map_or(Value::Null, |s| Value::Text(s.as_str().to_string()));

        let updated = conn
            .execute(
                "UPDATE services SET status = COALESCE(?1, status), \
                 last_checked_at = COALESCE(?2, last_checked_at) WHERE id = ?3",
                params![status, optional_millis(update.last_checked_at), id],
            )
            .await?;

        if updated == 0 {
            bail!("Service {id} not found");
        }
        Ok(())
    }

    async fn find_first_log(&self, query: &LogQuery) -> Result<Option<Log>> {
        let conn = self.get_conn().await?;
        let order = match query.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };

        let mut rows = conn
            .query(
                &format!(
                    "SELECT {LOG_COLUMNS} FROM logs WHERE service_id = ?1 AND status = ?2 \
                     AND (?3 IS NULL OR created_at > ?3) AND (?4 IS NULL OR created_at < ?4) \
                     ORDER BY created_at {order}, id {order} LIMIT 1"
                ),
                params![
                    query.service_id,
                    query.status.as_str(),
                    optional_millis(query.after),
                    optional_millis(query.before)
                ],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(log_from_row(&row)?)),
            None => Ok(None),
        }
    }
}
