use std::sync::Arc;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Datelike, Local, NaiveTime, TimeDelta, TimeZone, Utc, Weekday};
use heartbeat::{Log, Service, ServiceStatus, ServiceStore};
use tracing::{error, info};

use crate::alerts::email::{EmailNotifier, Mail};
use crate::config;
use crate::database::Repository;

pub const REPORT_SUBJECT: &str = "Weekly Service Summary";

/// Availability figures for one service over a window
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceStats {
    pub service_id: i64,
    pub service_name: String,
    pub uptime_percentage: f64,
    pub average_latency_ms: f64,
    pub total_incidents: usize,
    pub period_days: u32,
}

/// `None` when the window holds no logs
pub fn compute_stats(service: &Service, logs: &[Log], days: u32) -> Option<ServiceStats> {
    if logs.is_empty() {
        return None;
    }

    let total = logs.len() as f64;
    let up = logs.iter().filter(|log| log.status == ServiceStatus::Up).count();
    let incidents = logs.iter().filter(|log| log.status == ServiceStatus::Down).count();
    let latency_sum: u64 = logs.iter().map(|log| log.latency_ms.unwrap_or(0)).sum();

    Some(ServiceStats {
        service_id: service.id,
        service_name: service.name.clone(),
        uptime_percentage: up as f64 / total * 100.0,
        average_latency_ms: latency_sum as f64 / total,
        total_incidents: incidents,
        period_days: days,
    })
}

pub async fn service_stats(
    repo: &Repository,
    service: &Service,
    days: u32,
    now: DateTime<Utc>,
) -> Result<Option<ServiceStats>> {
    let since = now - TimeDelta::days(i64::from(days));
    let logs = repo.logs_since(service.id, since).await?;
    Ok(compute_stats(service, &logs, days))
}

pub fn render_report(stats: &[ServiceStats]) -> String {
    let mut report = String::from("Weekly Service Report\n\n");
    for entry in stats {
        report.push_str(&format!(
            "- {} (#{}, last {} days)\n   Uptime: {:.2}%\n   Avg Latency: {:.2}ms\n   Incidents: {}\n\n",
            entry.service_name,
            entry.service_id,
            entry.period_days,
            entry.uptime_percentage,
            entry.average_latency_ms,
            entry.total_incidents,
        ));
    }
    report
}

/// Next instant strictly after `now` falling on `weekday` at `hour`:00
pub fn next_run<Tz: TimeZone>(now: &DateTime<Tz>, weekday: Weekday, hour: u32) -> Option<DateTime<Tz>> {
    let time = NaiveTime::from_hms_opt(hour, 0, 0)?;
    let days_ahead = (7 + weekday.num_days_from_monday() - now.weekday().num_days_from_monday()) % 7;
    let tz = now.timezone();

    // Scan a little past a week so a skipped local hour still lands somewhere.
    (0..=14)
        .map(|offset| now.date_naive() + TimeDelta::days(i64::from(days_ahead) + offset * 7))
        .filter_map(|date| tz.from_local_datetime(&date.and_time(time)).earliest())
        .find(|candidate| candidate > now)
}

/// Weekly summary emailed to the alert recipient
pub struct WeeklyReport {
    repo: Repository,
    email: Arc<EmailNotifier>,
    weekday: Weekday,
    hour: u32,
    days: u32,
}

impl WeeklyReport {
    pub fn from_config(settings: &config::Report, repo: Repository, email: Arc<EmailNotifier>) -> Result<Self> {
        Ok(Self { repo, email, weekday: settings.weekday()?, hour: settings.hour, days: settings.days })
    }

    pub async fn build(&self, now: DateTime<Utc>) -> Result<Mail> {
        let mut stats = Vec::new();
        for service in self.repo.list_services().await? {
            if let Some(entry) = service_stats(&self.repo, &service, self.days, now).await? {
                stats.push(entry);
            }
        }
        Ok(Mail { subject: REPORT_SUBJECT.to_string(), body: render_report(&stats) })
    }

    async fn send_once(&self) -> Result<()> {
        let mail = self.build(Utc::now()).await?;
        self.email.send(&mail).await
    }

    /// Sleep until each scheduled slot and send; failures are logged.
    pub async fn run(self) -> Result<()> {
        info!(weekday = %self.weekday, hour = self.hour, "Weekly report scheduled");

        loop {
            let now = Local::now();
            let next = next_run(&now, self.weekday, self.hour)
                .ok_or_else(|| anyhow!("No valid report time for {} {:02}:00", self.weekday, self.hour))?;
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            match self.send_once().await {
                Ok(()) => info!("Weekly report sent"),
                Err(e) => error!(error = %e, "Failed to send weekly report"),
            }
        }
    }
}
