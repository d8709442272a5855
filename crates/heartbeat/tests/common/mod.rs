//! Shared fixtures for engine tests

#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use heartbeat::checker::Clock;
use heartbeat::state::MonitorEvent;
use heartbeat::{
    AlertDispatcher, EngineConfig, Log, LogQuery, NewLog, Probe, ProbeFailure, ProbeOutcome, Service, ServiceStatus,
    ServiceStore, ServiceUpdate,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Formatted tracing output collected from the current thread
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Capture events until the guard drops; needs a current-thread runtime
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();
    (logs, tracing::subscriber::set_default(subscriber))
}

pub fn fast_config() -> EngineConfig {
    EngineConfig { retry_delay: Duration::ZERO, ..EngineConfig::default() }
}

pub fn service(id: i64, status: ServiceStatus) -> Service {
    Service {
        id,
        name: format!("service-{id}"),
        url: format!("https://service-{id}.example.com/health"),
        interval_seconds: 30,
        status,
        last_checked_at: None,
    }
}

pub fn up(latency_ms: u64) -> ProbeOutcome {
    ProbeOutcome::Up { latency_ms, status_code: 200 }
}

pub fn refused() -> ProbeOutcome {
    ProbeOutcome::Down(ProbeFailure::Connect("refused".to_string()))
}

/// Probe replaying a fixed sequence, then a fallback outcome
pub struct ScriptedProbe {
    outcomes: Mutex<VecDeque<ProbeOutcome>>,
    fallback: ProbeOutcome,
    calls: AtomicU32,
}

impl ScriptedProbe {
    pub fn new(outcomes: Vec<ProbeOutcome>) -> Arc<Self> {
        Self::with_fallback(outcomes, refused())
    }

    pub fn with_fallback(outcomes: Vec<ProbeOutcome>, fallback: ProbeOutcome) -> Arc<Self> {
        Arc::new(Self { outcomes: Mutex::new(outcomes.into()), fallback, calls: AtomicU32::new(0) })
    }

    pub fn push(&self, outcomes: impl IntoIterator<Item = ProbeOutcome>) {
        self.outcomes.lock().unwrap().extend(outcomes);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn probe(&self, _url: &str) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes.lock().unwrap().pop_front().unwrap_or_else(|| self.fallback.clone())
    }
}

/// Probe whose calls after the first `free_calls` wait until `release`
pub struct BlockingProbe {
    gate: Semaphore,
    free_calls: u32,
    calls: AtomicU32,
    outcome: ProbeOutcome,
}

impl BlockingProbe {
    pub fn new(free_calls: u32, outcome: ProbeOutcome) -> Arc<Self> {
        Arc::new(Self { gate: Semaphore::new(0), free_calls, calls: AtomicU32::new(0), outcome })
    }

    /// Let every waiting and future call through
    pub fn release(&self) {
        self.gate.close();
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Probe for BlockingProbe {
    async fn probe(&self, _url: &str) -> ProbeOutcome {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.free_calls {
            // Closed semaphore wakes every waiter with an error.
            let _ = self.gate.acquire().await;
        }
        self.outcome.clone()
    }
}

/// Dispatcher recording every event, optionally failing delivery
#[derive(Default)]
pub struct RecordingAlerts {
    events: Mutex<Vec<MonitorEvent>>,
    fail: AtomicBool,
}

impl RecordingAlerts {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let alerts = Self::default();
        alerts.fail.store(true, Ordering::SeqCst);
        Arc::new(alerts)
    }

    pub fn events(&self) -> Vec<MonitorEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertDispatcher for RecordingAlerts {
    async fn notify_down(&self, _service_name: &str, _url: &str, _error_message: &str) -> Result<()> {
        unreachable!("dispatch is overridden")
    }

    async fn notify_recovered(&self, _service_name: &str, _url: &str, _downtime_seconds: u64) -> Result<()> {
        unreachable!("dispatch is overridden")
    }

    async fn dispatch(&self, event: &MonitorEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("webhook unreachable"));
        }
        Ok(())
    }
}

/// Manually advanced clock
#[derive(Clone)]
pub struct TestClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl TestClock {
    pub fn new() -> Self {
        Self { now: Arc::new(Mutex::new(Utc::now())) }
    }

    pub fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    pub fn advance(&self, by: TimeDelta) {
        *self.now.lock().unwrap() += by;
    }

    pub fn as_clock(&self) -> Clock {
        let now = Arc::clone(&self.now);
        Arc::new(move || *now.lock().unwrap())
    }
}

/// Store wrapper that can fail selected operations
pub struct FlakyStore<S> {
    pub inner: S,
    pub fail_list: AtomicBool,
    pub fail_writes: AtomicBool,
}

impl<S> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, fail_list: AtomicBool::new(false), fail_writes: AtomicBool::new(false) }
    }
}

#[async_trait]
impl<S: ServiceStore> ServiceStore for FlakyStore<S> {
    async fn list_services(&self) -> Result<Vec<Service>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(anyhow!("database is locked"));
        }
        self.inner.list_services().await
    }

    async fn create_log(&self, entry: &NewLog) -> Result<i64> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("disk I/O error"));
        }
        self.inner.create_log(entry).await
    }

    async fn update_service(&self, id: i64, update: &ServiceUpdate) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("disk I/O error"));
        }
        self.inner.update_service(id, update).await
    }

    async fn find_first_log(&self, query: &LogQuery) -> Result<Option<Log>> {
        self.inner.find_first_log(query).await
    }
}
