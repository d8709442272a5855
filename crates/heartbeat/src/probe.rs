use async_trait::async_trait;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Classified reason a probe did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeFailure {
    #[error("timeout of {0}ms exceeded")]
    Timeout(u64),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed with status code {0}")]
    Status(u16),
    #[error("request failed: {0}")]
    Request(String),
}

/// Result of one bounded-time reachability check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Up { latency_ms: u64, status_code: u16 },
    Down(ProbeFailure),
}

impl ProbeOutcome {
    pub fn is_up(&self) -> bool {
        matches!(self, ProbeOutcome::Up { .. })
    }
}

/// Single reachability check against a URL. Implementations never retry.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeOutcome;
}

/// HTTP GET probe; any 2xx final response counts as up
pub struct HttpProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("heartbeat/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, timeout })
    }

    fn classify(&self, error: reqwest::Error) -> ProbeFailure {
        if error.is_timeout() {
            ProbeFailure::Timeout(self.timeout.as_millis() as u64)
        } else if error.is_connect() {
            ProbeFailure::Connect(error.to_string())
        } else {
            ProbeFailure::Request(error.to_string())
        }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        let start = Instant::now();

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return ProbeOutcome::Down(self.classify(e)),
        };

        let latency_ms = start.elapsed().as_millis() as u64;
        let status = response.status();

        if status.is_success() {
            ProbeOutcome::Up { latency_ms, status_code: status.as_u16() }
        } else {
            ProbeOutcome::Down(ProbeFailure::Status(status.as_u16()))
        }
    }
}
