use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use heartbeat::AlertDispatcher;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config;

const SMTPS_PORT: u16 = 465;

/// Plain-text mail to a single alert recipient
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    recipient: String,
}

/// Subject and body of one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub subject: String,
    pub body: String,
}

impl EmailNotifier {
    /// `None` unless both host and recipient are configured
    pub fn from_config(settings: &config::Email) -> Result<Option<Self>> {
        let (Some(host), Some(recipient)) = (settings.host.as_deref(), settings.recipient.as_deref()) else {
            return Ok(None);
        };
        if !settings.is_configured() {
            return Ok(None);
        }

        // Implicit TLS on 465, STARTTLS on anything else.
        let relay = if settings.port == SMTPS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
        };
        let mut builder = relay.port(settings.port).timeout(Some(Duration::from_secs(10)));

        if let (Some(user), Some(pass)) = (settings.username.as_deref(), settings.password.as_deref()) {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }

        Ok(Some(Self {
            transport: builder.build(),
            from: settings.from.clone(),
            recipient: recipient.to_string(),
        }))
    }

    pub async fn send(&self, mail: &Mail) -> Result<()> {
        let message = build_message(&self.from, &self.recipient, mail)?;
        self.transport.send(message).await.map_err(|e| anyhow!("Failed to send email: {e}"))?;
        tracing::info!(subject = %mail.subject, "Email sent");
        Ok(())
    }
}

pub fn build_message(from: &str, to: &str, mail: &Mail) -> Result<Message> {
    let message = Message::builder()
        .from(from.parse()?)
        .to(to.parse()?)
        .subject(&mail.subject)
        .header(ContentType::TEXT_PLAIN)
        .body(mail.body.clone())?;
    Ok(message)
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn down_mail(service_name: &str, url: &str, error_message: &str, at: DateTime<Utc>) -> Mail {
    let error_message = if error_message.is_empty() { "Connection failure" } else { error_message };
    Mail {
        subject: format!("ALERT: {service_name} is DOWN"),
        body: format!(
            "Service: {service_name}\nURL: {url}\nError: {error_message}\nTime: {}",
            local_time(at)
        ),
    }
}

pub fn recovered_mail(service_name: &str, url: &str, downtime_seconds: u64, at: DateTime<Utc>) -> Mail {
    Mail {
        subject: format!("RECOVERED: {service_name} is back UP"),
        body: format!(
            "Service: {service_name}\nURL: {url}\nTotal Downtime: {downtime_seconds} seconds\nTime: {}",
            local_time(at)
        ),
    }
}

#[async_trait]
impl AlertDispatcher for EmailNotifier {
    async fn notify_down(&self, service_name: &str, url: &str, error_message: &str) -> Result<()> {
        self.send(&down_mail(service_name, url, error_message, Utc::now())).await
    }

    async fn notify_recovered(&self, service_name: &str, url: &str, downtime_seconds: u64) -> Result<()> {
        self.send(&recovered_mail(service_name, url, downtime_seconds, Utc::now())).await
    }
}
