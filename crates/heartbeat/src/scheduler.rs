use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use crate::alert::AlertDispatcher;
use crate::checker::ServiceChecker;
use crate::config::EngineConfig;
use crate::model::Service;
use crate::probe::Probe;
use crate::store::ServiceStore;

#[derive(Debug, Default)]
struct GateState {
    running: AtomicBool,
    overlap_logged: AtomicBool,
}

/// In-flight flag preventing two full passes from running at once
#[derive(Debug, Clone, Default)]
pub struct TickGate {
    state: Arc<GateState>,
}

impl TickGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a tick, or `None` when the previous one is still running. An
    /// overlap is warned about once until a tick is entered again.
    pub fn try_enter(&self) -> Option<TickPermit> {
        if self.state.running.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok() {
            self.state.overlap_logged.store(false, Ordering::Release);
            Some(TickPermit { state: Arc::clone(&self.state) })
        } else {
            if !self.state.overlap_logged.swap(true, Ordering::AcqRel) {
                warn!("Monitor already running, skipping ticks");
            }
            None
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }
}

/// Held for the duration of a tick
#[derive(Debug)]
pub struct TickPermit {
    state: Arc<GateState>,
}

impl Drop for TickPermit {
    fn drop(&mut self) {
        self.state.running.store(false, Ordering::Release);
    }
}

/// What one tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickReport {
    /// A previous tick was still running
    Skipped,
    /// Services could not be listed; retried next tick
    Aborted,
    Completed { due: usize, checked: usize, failed: usize },
}

/// Services whose interval has elapsed at `now`
pub fn due_services(services: Vec<Service>, now: DateTime<Utc>) -> Vec<Service> {
    services.into_iter().filter(|service| service.is_due(now)).collect()
}

/// Periodic selection-and-check loop
pub struct Scheduler {
    checker: Arc<ServiceChecker>,
    gate: TickGate,
    period: Duration,
}

impl Scheduler {
    pub fn new(checker: Arc<ServiceChecker>, period: Duration) -> Self {
        Self { checker, gate: TickGate::new(), period }
    }

    /// Wire a scheduler and its checker from collaborators
    pub fn from_parts(
        store: Arc<dyn ServiceStore>,
        probe: Arc<dyn Probe>,
        alerts: Arc<dyn AlertDispatcher>,
        config: &EngineConfig,
    ) -> Self {
        let checker = ServiceChecker::new(store, probe, alerts, config);
        Self::new(Arc::new(checker), config.tick_period)
    }

    pub fn with_gate(mut self, gate: TickGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn gate(&self) -> &TickGate {
        &self.gate
    }

    pub fn checker(&self) -> &Arc<ServiceChecker> {
        &self.checker
    }

    /// One pass over every due service, sequentially
    pub async fn tick(&self) -> TickReport {
        let Some(_permit) = self.gate.try_enter() else {
            return TickReport::Skipped;
        };

        let services = match self.checker.store().list_services().await {
            Ok(services) => services,
            Err(e) => {
                error!(error = %e, "Monitor loop failed");
                return TickReport::Aborted;
            }
        };

        let due = due_services(services, self.checker.now());
        debug!(count = due.len(), "Checking due services");

        let mut checked = 0;
        let mut failed = 0;
        for service in &due {
            match self.checker.check(service).await {
                Ok(_) => checked += 1,
                Err(e) => {
                    failed += 1;
                    error!(service = %service.name, error = %e, "Service check failed");
                }
            }
        }

        TickReport::Completed { due: due.len(), checked, failed }
    }

    /// Fire a tick every period until the task is dropped. Ticks run as
    /// their own tasks so a slow pass is observed, and skipped, by the next.
    pub async fn run(self: Arc<Self>) {
        info!(tick_secs = self.period.as_secs(), "Monitor scheduler started");

        let mut timer = interval(self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            let scheduler = Arc::clone(&self);
            tokio::spawn(async move {
                scheduler.tick().await;
            });
        }
    }
}
