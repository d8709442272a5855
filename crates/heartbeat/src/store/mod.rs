//! Persistence contract consumed by the engine.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::Result;
use crate::model::{Log, NewLog, Service, ServiceStatus, ServiceUpdate};

/// Ordering by `created_at` (ties broken by insertion order)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Filter for the first log matching a service, a status and an optional
/// exclusive time window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub service_id: i64,
    pub status: ServiceStatus,
    pub order: SortOrder,
    /// Only logs created strictly after this instant
    pub after: Option<DateTime<Utc>>,
    /// Only logs created strictly before this instant
    pub before: Option<DateTime<Utc>>,
}

impl LogQuery {
    pub fn earliest(service_id: i64, status: ServiceStatus) -> Self {
        Self { service_id, status, order: SortOrder::Asc, after: None, before: None }
    }

    pub fn latest(service_id: i64, status: ServiceStatus) -> Self {
        Self { order: SortOrder::Desc, ..Self::earliest(service_id, status) }
    }

    pub fn after(mut self, at: DateTime<Utc>) -> Self {
        self.after = Some(at);
        self
    }

    pub fn before(mut self, at: DateTime<Utc>) -> Self {
        self.before = Some(at);
        self
    }

    pub fn matches(&self, log: &Log) -> bool {
        log.service_id == self.service_id
            && log.status == self.status
            && self.after.is_none_or(|after| log.created_at > after)
            && self.before.is_none_or(|before| log.created_at < before)
    }
}

/// Storage for services and their append-only logs
#[async_trait]
pub trait ServiceStore: Send + Sync {
    /// All services, due or not
    async fn list_services(&self) -> Result<Vec<Service>>;

    /// Append a log; returns its id
    async fn create_log(&self, entry: &NewLog) -> Result<i64>;

    /// Apply the set fields of `update` to service `id`
    async fn update_service(&self, id: i64, update: &ServiceUpdate) -> Result<()>;

    /// First log matching `query` in its order
    async fn find_first_log(&self, query: &LogQuery) -> Result<Option<Log>>;
}
