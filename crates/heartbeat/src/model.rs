use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Authoritative state of a monitored service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceStatus {
    /// Reachable, or never checked yet
    #[default]
    Up,
    Down,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Up => "UP",
            ServiceStatus::Down => "DOWN",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UP" => Ok(ServiceStatus::Up),
            "DOWN" => Ok(ServiceStatus::Down),
            other => Err(anyhow::anyhow!("Unknown service status: {}", other)),
        }
    }
}

/// A monitored service as stored by the persistence collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub url: String,
    /// Seconds between checks, always > 0
    pub interval_seconds: u64,
    pub status: ServiceStatus,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl Service {
    /// A service is due once its interval has fully elapsed since the last
    /// completed check. Never-checked services are always due; an interval
    /// too large for `TimeDelta` never comes due again.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_checked_at {
            None => true,
            Some(last) => i64::try_from(self.interval_seconds)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .is_some_and(|interval| now.signed_duration_since(last) >= interval),
        }
    }
}

/// Append-only check record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub id: i64,
    pub service_id: i64,
    pub status: ServiceStatus,
    pub latency_ms: Option<u64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Prefix carried by UP logs recorded after a failure the verifier cleared
pub const TRANSIENT_MARKER: &str = "transient";

/// Log row to append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLog {
    pub service_id: i64,
    pub status: ServiceStatus,
    pub latency_ms: Option<u64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewLog {
    pub fn up(service_id: i64, latency_ms: u64, at: DateTime<Utc>) -> Self {
        Self {
            service_id,
            status: ServiceStatus::Up,
            latency_ms: Some(latency_ms),
            error_message: None,
            created_at: at,
        }
    }

    /// UP log for a failure that did not survive verification
    pub fn transient(service_id: i64, latency_ms: Option<u64>, error: &str, at: DateTime<Utc>) -> Self {
        Self {
            service_id,
            status: ServiceStatus::Up,
            latency_ms,
            error_message: Some(format!("{TRANSIENT_MARKER}: {error}")),
            created_at: at,
        }
    }

    pub fn down(service_id: i64, error: &str, at: DateTime<Utc>) -> Self {
        Self {
            service_id,
            status: ServiceStatus::Down,
            latency_ms: None,
            error_message: Some(error.to_string()),
            created_at: at,
        }
    }
}

impl Log {
    pub fn is_transient(&self) -> bool {
        self.status == ServiceStatus::Up
            && self
                .error_message
                .as_deref()
                .is_some_and(|message| message.starts_with(TRANSIENT_MARKER))
    }
}

/// Partial update of a service row; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceUpdate {
    pub status: Option<ServiceStatus>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl ServiceUpdate {
    pub fn touched(at: DateTime<Utc>) -> Self {
        Self { status: None, last_checked_at: Some(at) }
    }

    pub fn with_status(mut self, status: ServiceStatus) -> Self {
        self.status = Some(status);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(last_checked_at: Option<DateTime<Utc>>) -> Service {
        Service {
            id: 1,
            name: "api".to_string(),
            url: "https://example.com".to_string(),
            interval_seconds: 60,
            status: ServiceStatus::Up,
            last_checked_at,
        }
    }

    #[test]
    fn test_never_checked_is_due() {
        assert!(service(None).is_due(Utc::now()));
    }

    #[test]
    fn test_due_boundary() {
        let now = Utc::now();
        assert!(service(Some(now - TimeDelta::seconds(60))).is_due(now));
        assert!(service(Some(now - TimeDelta::seconds(61))).is_due(now));
        assert!(!service(Some(now - TimeDelta::milliseconds(59_999))).is_due(now));
        assert!(!service(Some(now)).is_due(now));
    }

    #[test]
    fn test_huge_interval_is_never_due() {
        let now = Utc::now();
        for interval_seconds in [i64::MAX as u64 / 1000 + 1, i64::MAX as u64, u64::MAX] {
            let mut huge = service(Some(now - TimeDelta::days(3650)));
            huge.interval_seconds = interval_seconds;
            assert!(!huge.is_due(now));
        }

        let mut never_checked = service(None);
        never_checked.interval_seconds = u64::MAX;
        assert!(never_checked.is_due(now));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("UP".parse::<ServiceStatus>().unwrap(), ServiceStatus::Up);
        assert_eq!("down".parse::<ServiceStatus>().unwrap(), ServiceStatus::Down);
        assert!("degraded".parse::<ServiceStatus>().is_err());
        assert_eq!(ServiceStatus::default(), ServiceStatus::Up);
    }

    #[test]
    fn test_transient_log_marker() {
        let now = Utc::now();
        let new_log = NewLog::transient(1, Some(12), "connection reset", now);
        let log = Log {
            id: 1,
            service_id: new_log.service_id,
            status: new_log.status,
            latency_ms: new_log.latency_ms,
            error_message: new_log.error_message,
            created_at: now,
        };
        assert!(log.is_transient());
        assert_eq!(log.error_message.as_deref(), Some("transient: connection reset"));
    }
}
