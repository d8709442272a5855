use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{LogQuery, ServiceStore, SortOrder};
use crate::Result;
use crate::model::{Log, NewLog, Service, ServiceUpdate};

#[derive(Debug, Default)]
struct Inner {
    services: BTreeMap<i64, Service>,
    logs: Vec<Log>,
    next_log_id: i64,
}

/// In-process store, used for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_services(services: impl IntoIterator<Item = Service>) -> Self {
        let store = Self::new();
        for service in services {
            store.insert_service(service);
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a service row
    pub fn insert_service(&self, service: Service) {
        self.lock().services.insert(service.id, service);
    }

    pub fn service(&self, id: i64) -> Option<Service> {
        self.lock().services.get(&id).cloned()
    }

    /// Logs of one service in insertion order
    pub fn logs(&self, service_id: i64) -> Vec<Log> {
        self.lock().logs.iter().filter(|log| log.service_id == service_id).cloned().collect()
    }
}

#[async_trait]
impl ServiceStore for MemoryStore {
    async fn list_services(&self) -> Result<Vec<Service>> {
        Ok(self.lock().services.values().cloned().collect())
    }

    async fn create_log(&self, entry: &NewLog) -> Result<i64> {
        let mut inner = self.lock();
        if !inner.services.contains_key(&entry.service_id) {
            return Err(anyhow!("Service {} does not exist", entry.service_id));
        }

        inner.next_log_id += 1;
        let id = inner.next_log_id;
        inner.logs.push(Log {
            id,
            service_id: entry.service_id,
            status: entry.status,
            latency_ms: entry.latency_ms,
            error_message: entry.error_message.clone(),
            created_at: entry.created_at,
        });
        Ok(id)
    }

    async fn update_service(&self, id: i64, update: &ServiceUpdate) -> Result<()> {
        let mut inner = self.lock();
        let service = inner.services.get_mut(&id).ok_or_else(|| anyhow!("Service {} does not exist", id))?;

        if let Some(status) = update.status {
            service.status = status;
        }
        if let Some(at) = update.last_checked_at {
            service.last_checked_at = Some(at);
        }
        Ok(())
    }

    async fn find_first_log(&self, query: &LogQuery) -> Result<Option<Log>> {
        let inner = self.lock();
        let matching = inner.logs.iter().filter(|log| query.matches(log));

        let found = match query.order {
            SortOrder::Asc => matching.min_by_key(|log| (log.created_at, log.id)),
            SortOrder::Desc => matching.max_by_key(|log| (log.created_at, log.id)),
        };
        Ok(found.cloned())
    }
}
