//! Outage duration derived from log history.
//!
//! The outage window opens at the earliest DOWN log that follows the last UP
//! log preceding the current outage, so time spent verifying before the DOWN
//! log was written is not counted. A recovery UP log already appended after
//! the outage does not affect the result.

use chrono::{DateTime, Utc};

use crate::Result;
use crate::model::{Log, ServiceStatus};
use crate::store::{LogQuery, ServiceStore};

/// Whole seconds (floored) from the start of the latest outage to `now`;
/// 0 when the service has no DOWN log.
pub async fn downtime_seconds(store: &dyn ServiceStore, service_id: i64, now: DateTime<Utc>) -> Result<u64> {
    let Some(start) = outage_start(store, service_id).await? else {
        return Ok(0);
    };

    let elapsed = now.signed_duration_since(start.created_at).num_seconds();
    Ok(elapsed.max(0) as u64)
}

/// First DOWN log of the most recent outage
pub async fn outage_start(store: &dyn ServiceStore, service_id: i64) -> Result<Option<Log>> {
    let Some(latest_down) = store.find_first_log(&LogQuery::latest(service_id, ServiceStatus::Down)).await? else {
        return Ok(None);
    };

    let prior_up = store
        .find_first_log(&LogQuery::latest(service_id, ServiceStatus::Up).before(latest_down.created_at))
        .await?;

    let first_down = match prior_up {
        Some(up) => LogQuery::earliest(service_id, ServiceStatus::Down).after(up.created_at),
        // No UP before the outage: the whole history is the window.
        None => LogQuery::earliest(service_id, ServiceStatus::Down),
    };

    Ok(store.find_first_log(&first_down).await?.or(Some(latest_down)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewLog, Service};
    use crate::store::MemoryStore;
    use chrono::TimeDelta;

    fn store() -> MemoryStore {
        MemoryStore::with_services([Service {
            id: 1,
            name: "api".to_string(),
            url: "https://api.example.com".to_string(),
            interval_seconds: 10,
            status: ServiceStatus::Down,
            last_checked_at: None,
        }])
    }

    #[tokio::test]
    async fn test_no_down_log_is_zero() {
        let store = store();
        let now = Utc::now();
        store.create_log(&NewLog::up(1, 10, now - TimeDelta::seconds(30))).await.unwrap();

        assert_eq!(downtime_seconds(&store, 1, now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_whole_history_without_prior_up() {
        let store = store();
        let t0 = Utc::now();
        let t1 = t0 + TimeDelta::milliseconds(95_700);
        store.create_log(&NewLog::down(1, "refused", t0)).await.unwrap();
        store.create_log(&NewLog::up(1, 12, t1)).await.unwrap();

        assert_eq!(downtime_seconds(&store, 1, t1).await.unwrap(), 95);
    }

    #[tokio::test]
    async fn test_only_counts_from_down_after_prior_up() {
        let store = store();
        let t0 = Utc::now();
        store.create_log(&NewLog::down(1, "old outage", t0 - TimeDelta::seconds(600))).await.unwrap();
        store.create_log(&NewLog::up(1, 12, t0 - TimeDelta::seconds(1))).await.unwrap();
        store.create_log(&NewLog::down(1, "refused", t0)).await.unwrap();

        let now = t0 + TimeDelta::seconds(42);
        assert_eq!(downtime_seconds(&store, 1, now).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_recovery_log_already_appended() {
        let store = store();
        let t0 = Utc::now();
        store.create_log(&NewLog::up(1, 12, t0 - TimeDelta::seconds(10))).await.unwrap();
        store.create_log(&NewLog::down(1, "refused", t0)).await.unwrap();
        let t1 = t0 + TimeDelta::seconds(120);
        store.create_log(&NewLog::up(1, 9, t1)).await.unwrap();

        assert_eq!(downtime_seconds(&store, 1, t1).await.unwrap(), 120);
    }

    #[tokio::test]
    async fn test_clock_behind_log_clamps_to_zero() {
        let store = store();
        let t0 = Utc::now();
        store.create_log(&NewLog::down(1, "refused", t0)).await.unwrap();

        assert_eq!(downtime_seconds(&store, 1, t0 - TimeDelta::seconds(5)).await.unwrap(), 0);
    }
}
