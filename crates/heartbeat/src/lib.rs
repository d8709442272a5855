//! Heartbeat - health-monitoring engine
//!
//! Periodically probes a set of services, confirms failures before trusting
//! them, tracks each service's UP/DOWN status and reports transitions to
//! persistence and alerting collaborators.

pub mod alert;
pub mod checker;
pub mod config;
pub mod downtime;
pub mod guard;
pub mod model;
pub mod probe;
pub mod retry;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod verifier;

pub use alert::AlertDispatcher;
pub use checker::{CheckReport, ServiceChecker};
pub use config::EngineConfig;
pub use guard::VerificationGuard;
pub use model::{Log, NewLog, Service, ServiceStatus, ServiceUpdate};
pub use probe::{HttpProbe, Probe, ProbeFailure, ProbeOutcome};
pub use scheduler::{Scheduler, TickGate, TickReport};
pub use state::{MonitorEvent, Observation, Transition};
pub use store::{LogQuery, ServiceStore, SortOrder};
pub use verifier::{Verdict, Verifier};

/// Heartbeat result type using anyhow for collaborator errors
pub type Result<T> = anyhow::Result<T>;
