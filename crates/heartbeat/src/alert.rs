use async_trait::async_trait;
use tracing::{error, info};

use crate::Result;
use crate::state::MonitorEvent;

/// Delivery of confirmed outages and recoveries to humans
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    async fn notify_down(&self, service_name: &str, url: &str, error_message: &str) -> Result<()>;

    async fn notify_recovered(&self, service_name: &str, url: &str, downtime_seconds: u64) -> Result<()>;

    async fn dispatch(&self, event: &MonitorEvent) -> Result<()> {
        match event {
            MonitorEvent::ConfirmedDown { service_name, url, error_message, .. } => {
                self.notify_down(service_name, url, error_message).await
            }
            MonitorEvent::Recovered { service_name, url, downtime_seconds, .. } => {
                self.notify_recovered(service_name, url, *downtime_seconds).await
            }
        }
    }
}

/// Dispatch `event`, logging and swallowing any delivery failure
pub async fn deliver(dispatcher: &dyn AlertDispatcher, event: &MonitorEvent) {
    match dispatcher.dispatch(event).await {
        Ok(()) => info!(service = %event.service_name(), "Alert dispatched"),
        Err(e) => error!(service = %event.service_name(), error = %e, "Failed to dispatch alert"),
    }
}
