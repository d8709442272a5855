//! Two-state UP/DOWN machine.
//!
//! `transition` is pure: it decides which log to append, which service fields
//! to write and which alert to raise. Applying those effects is the checker's
//! job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{NewLog, Service, ServiceStatus, ServiceUpdate};

/// What a check found, after verification where it applies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// The first probe succeeded
    Reachable { latency_ms: u64 },
    /// The first probe failed and every re-probe failed too
    ConfirmedDown { error: String },
    /// The first probe failed but a re-probe succeeded
    FalseAlarm { error: String, latency_ms: Option<u64> },
    /// The first probe failed while another verification of the same service
    /// was still running
    VerificationInFlight,
}

/// Alert the transition asks for; payload is completed by the checker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAlert {
    Down { error: String },
    Recovered,
}

/// Effects of applying one observation to a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: ServiceStatus,
    pub to: ServiceStatus,
    pub log: Option<NewLog>,
    pub update: Option<ServiceUpdate>,
    pub alert: Option<PendingAlert>,
}

impl Transition {
    fn stay(from: ServiceStatus) -> Self {
        Self { from, to: from, log: None, update: None, alert: None }
    }

    pub fn is_recovery(&self) -> bool {
        matches!(self.alert, Some(PendingAlert::Recovered))
    }

    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Decide the effects of `observation` for `service` at `now`
pub fn transition(service: &Service, observation: &Observation, now: DateTime<Utc>) -> Transition {
    use Observation::*;
    use ServiceStatus::*;

    let id = service.id;
    let from = service.status;

    match (from, observation) {
        (_, VerificationInFlight) => Transition::stay(from),

        (Up, Reachable { latency_ms }) => Transition {
            log: Some(NewLog::up(id, *latency_ms, now)),
            update: Some(ServiceUpdate::touched(now)),
            ..Transition::stay(Up)
        },
        (Up, FalseAlarm { error, latency_ms }) => Transition {
            log: Some(NewLog::transient(id, *latency_ms, error, now)),
            update: Some(ServiceUpdate::touched(now)),
            ..Transition::stay(Up)
        },
        (Up, ConfirmedDown { error }) => Transition {
            from: Up,
            to: Down,
            log: Some(NewLog::down(id, error, now)),
            update: Some(ServiceUpdate::touched(now).with_status(Down)),
            alert: Some(PendingAlert::Down { error: error.clone() }),
        },

        (Down, Reachable { latency_ms }) => Transition {
            from: Down,
            to: Up,
            log: Some(NewLog::up(id, *latency_ms, now)),
            update: Some(ServiceUpdate::touched(now).with_status(Up)),
            alert: Some(PendingAlert::Recovered),
        },
        // Already alerted for this outage; only the check time moves.
        (Down, ConfirmedDown { .. }) | (Down, FalseAlarm { .. }) => Transition {
            update: Some(ServiceUpdate::touched(now)),
            ..Transition::stay(Down)
        },
    }
}

/// Event handed to the alert dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MonitorEvent {
    ConfirmedDown {
        service_id: i64,
        service_name: String,
        url: String,
        error_message: String,
        at: DateTime<Utc>,
    },
    Recovered {
        service_id: i64,
        service_name: String,
        url: String,
        downtime_seconds: u64,
        at: DateTime<Utc>,
    },
}

impl MonitorEvent {
    pub fn down(service: &Service, error_message: &str, at: DateTime<Utc>) -> Self {
        MonitorEvent::ConfirmedDown {
            service_id: service.id,
            service_name: service.name.clone(),
            url: service.url.clone(),
            error_message: error_message.to_string(),
            at,
        }
    }

    pub fn recovered(service: &Service, downtime_seconds: u64, at: DateTime<Utc>) -> Self {
        MonitorEvent::Recovered {
            service_id: service.id,
            service_name: service.name.clone(),
            url: service.url.clone(),
            downtime_seconds,
            at,
        }
    }

    pub fn service_name(&self) -> &str {
        match self {
            MonitorEvent::ConfirmedDown { service_name, .. } => service_name,
            MonitorEvent::Recovered { service_name, .. } => service_name,
        }
    }
}
