//! Alert channels and the fan-out dispatcher handed to the engine.

pub mod discord;
pub mod email;

pub use discord::DiscordWebhook;
pub use email::EmailNotifier;

use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use heartbeat::AlertDispatcher;
use tracing::{debug, warn};

/// Calls every configured channel; one failing channel does not stop the rest
#[derive(Default)]
pub struct AlertFanout {
    channels: Vec<(&'static str, Arc<dyn AlertDispatcher>)>,
}

impl AlertFanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, name: &'static str, channel: Arc<dyn AlertDispatcher>) -> Self {
        self.channels.push((name, channel));
        self
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|(name, _)| *name).collect()
    }

    fn collect(&self, failures: Vec<(&'static str, anyhow::Error)>) -> Result<()> {
        if failures.is_empty() {
            return Ok(());
        }
        let details: Vec<String> = failures.iter().map(|(name, e)| format!("{name}: {e}")).collect();
        Err(anyhow!("{} of {} alert channels failed ({})", failures.len(), self.channels.len(), details.join("; ")))
    }
}

#[async_trait]
impl AlertDispatcher for AlertFanout {
    async fn notify_down(&self, service_name: &str, url: &str, error_message: &str) -> Result<()> {
        if self.channels.is_empty() {
            debug!(service = %service_name, "No alert channels configured");
        }
        let mut failures = Vec::new();
        for (name, channel) in &self.channels {
            if let Err(e) = channel.notify_down(service_name, url, error_message).await {
                warn!(channel = *name, error = %e, "Alert channel failed");
                failures.push((*name, e));
            }
        }
        self.collect(failures)
    }

    async fn notify_recovered(&self, service_name: &str, url: &str, downtime_seconds: u64) -> Result<()> {
        if self.channels.is_empty() {
            debug!(service = %service_name, "No alert channels configured");
        }
        let mut failures = Vec::new();
        for (name, channel) in &self.channels {
            if let Err(e) = channel.notify_recovered(service_name, url, downtime_seconds).await {
                warn!(channel = *name, error = %e, "Alert channel failed");
                failures.push((*name, e));
            }
        }
        self.collect(failures)
    }
}
