use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::Result;
use crate::alert::{self, AlertDispatcher};
use crate::config::EngineConfig;
use crate::downtime::downtime_seconds;
use crate::guard::VerificationGuard;
use crate::model::{Service, ServiceStatus};
use crate::probe::{Probe, ProbeOutcome};
use crate::state::{self, MonitorEvent, Observation, PendingAlert};
use crate::store::ServiceStore;
use crate::verifier::{Verdict, Verifier};

/// Source of the current time
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Outcome of checking one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub service_id: i64,
    pub observation: Observation,
    pub from: ServiceStatus,
    pub to: ServiceStatus,
    pub event: Option<MonitorEvent>,
}

/// Probes one service, verifies failures and applies the resulting
/// transition to the store and alert dispatcher.
pub struct ServiceChecker {
    store: Arc<dyn ServiceStore>,
    probe: Arc<dyn Probe>,
    verifier: Verifier,
    alerts: Arc<dyn AlertDispatcher>,
    guard: VerificationGuard,
    clock: Clock,
}

impl ServiceChecker {
    pub fn new(
        store: Arc<dyn ServiceStore>,
        probe: Arc<dyn Probe>,
        alerts: Arc<dyn AlertDispatcher>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            verifier: Verifier::from_config(Arc::clone(&probe), config),
            store,
            probe,
            alerts,
            guard: VerificationGuard::new(),
            clock: Arc::new(Utc::now),
        }
    }

    /// Share an existing guard, e.g. between checkers in tests
    pub fn with_guard(mut self, guard: VerificationGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn guard(&self) -> &VerificationGuard {
        &self.guard
    }

    pub fn store(&self) -> &Arc<dyn ServiceStore> {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Run one check of `service` as it was read at the start of the tick
    pub async fn check(&self, service: &Service) -> Result<CheckReport> {
        let failure = match self.probe.probe(&service.url).await {
            ProbeOutcome::Up { latency_ms, .. } => {
                return self.apply(service, Observation::Reachable { latency_ms }).await;
            }
            ProbeOutcome::Down(failure) => failure,
        };

        let Some(_permit) = self.guard.try_acquire(service.id) else {
            debug!(service = %service.name, "Verification already in flight, skipping");
            return self.apply(service, Observation::VerificationInFlight).await;
        };

        // Already DOWN and alerted: re-check without per-attempt noise.
        let quiet = service.status == ServiceStatus::Down;
        let error = failure.to_string();

        let observation = match self.verifier.verify(&service.url, &service.name, quiet).await {
            Verdict::FalseAlarm { latency_ms, .. } => Observation::FalseAlarm { error, latency_ms: Some(latency_ms) },
            Verdict::ConfirmedDown { .. } => Observation::ConfirmedDown { error },
        };

        // The permit is held until the transition is persisted and released
        // on every exit path when it drops.
        self.apply(service, observation).await
    }

    async fn apply(&self, service: &Service, observation: Observation) -> Result<CheckReport> {
        let now = self.now();
        let transition = state::transition(service, &observation, now);

        let downtime = if transition.is_recovery() {
            downtime_seconds(self.store.as_ref(), service.id, now).await?
        } else {
            0
        };

        if let Some(entry) = &transition.log {
            self.store.create_log(entry).await?;
        }
        if let Some(update) = &transition.update {
            self.store.update_service(service.id, update).await?;
        }

        let event = match &transition.alert {
            Some(PendingAlert::Down { error }) => {
                warn!(service = %service.name, url = %service.url, error = %error, "Service is DOWN");
                Some(MonitorEvent::down(service, error, now))
            }
            Some(PendingAlert::Recovered) => {
                info!(service = %service.name, downtime_seconds = downtime, "Service recovered");
                Some(MonitorEvent::recovered(service, downtime, now))
            }
            None => None,
        };

        // Persistence above is complete whatever happens to delivery.
        if let Some(event) = &event {
            alert::deliver(self.alerts.as_ref(), event).await;
        }

        Ok(CheckReport {
            service_id: service.id,
            observation,
            from: transition.from,
            to: transition.to,
            event,
        })
    }
}
