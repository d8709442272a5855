use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heartbeat::AlertDispatcher;
use serde_json::{Value, json};

use crate::config;

const COLOR_DOWN: u32 = 15158332;
const COLOR_RECOVERED: u32 = 3066993;
const FOOTER: &str = "Uptime Monitor System";

/// Posts embeds to a Discord incoming webhook
pub struct DiscordWebhook {
    client: reqwest::Client,
    webhook_url: String,
}

impl DiscordWebhook {
    pub fn new(webhook_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { client, webhook_url: webhook_url.into() })
    }

    /// `None` when no webhook URL is configured
    pub fn from_config(settings: &config::Discord) -> Result<Option<Self>> {
        match settings.webhook_url.as_deref().filter(|url| !url.trim().is_empty()) {
            Some(url) => Ok(Some(Self::new(url)?)),
            None => Ok(None),
        }
    }

    async fn post(&self, payload: &Value) -> Result<()> {
        self.client.post(&self.webhook_url).json(payload).send().await?.error_for_status()?;
        Ok(())
    }
}

fn embed(title: String, color: u32, url: &str, status: &str, message: &str, at: DateTime<Utc>) -> Value {
    let message = if message.is_empty() { "N/A" } else { message };
    json!({
        "embeds": [{
            "title": title,
            "color": color,
            "fields": [
                { "name": "URL", "value": url, "inline": true },
                { "name": "Status", "value": status, "inline": true },
                { "name": "Message", "value": message },
                { "name": "Timestamp", "value": at.to_rfc3339() },
            ],
            "footer": { "text": FOOTER },
        }]
    })
}

pub fn down_payload(service_name: &str, url: &str, error_message: &str, at: DateTime<Utc>) -> Value {
    embed(format!("Service DOWN: {service_name}"), COLOR_DOWN, url, "DOWN", error_message, at)
}

pub fn recovered_payload(service_name: &str, url: &str, downtime_seconds: u64, at: DateTime<Utc>) -> Value {
    let message = format!("Service recovered after {downtime_seconds} seconds");
    embed(format!("Service Recovered: {service_name}"), COLOR_RECOVERED, url, "UP", &message, at)
}

#[async_trait]
impl AlertDispatcher for DiscordWebhook {
    async fn notify_down(&self, service_name: &str, url: &str, error_message: &str) -> Result<()> {
        self.post(&down_payload(service_name, url, error_message, Utc::now())).await
    }

    async fn notify_recovered(&self, service_name: &str, url: &str, downtime_seconds: u64) -> Result<()> {
        self.post(&recovered_payload(service_name, url, downtime_seconds, Utc::now())).await
    }
}
