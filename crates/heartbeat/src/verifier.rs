use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::probe::{Probe, ProbeFailure, ProbeOutcome};
use crate::retry::{RetryOutcome, retry_with_delay};

/// Decision reached after an initial probe failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// A re-probe succeeded; the initial failure was a blip
    FalseAlarm { attempt: u32, latency_ms: u64 },
    /// Every re-probe failed
    ConfirmedDown { last_failure: Option<ProbeFailure> },
}

impl Verdict {
    pub fn is_confirmed_down(&self) -> bool {
        matches!(self, Verdict::ConfirmedDown { .. })
    }
}

/// Re-probes a failing URL a bounded number of times before trusting the
/// failure.
pub struct Verifier {
    probe: Arc<dyn Probe>,
    attempts: u32,
    delay: Duration,
}

impl Verifier {
    pub fn new(probe: Arc<dyn Probe>, attempts: u32, delay: Duration) -> Self {
        Self { probe, attempts, delay }
    }

    pub fn from_config(probe: Arc<dyn Probe>, config: &EngineConfig) -> Self {
        Self::new(probe, config.retry_attempts, config.retry_delay)
    }

    /// Run the retry protocol. `quiet` only silences per-attempt events.
    pub async fn verify(&self, url: &str, service_name: &str, quiet: bool) -> Verdict {
        if !quiet {
            warn!(service = %service_name, url = %url, "Initial failure detected, verifying");
        }

        let total = self.attempts;
        let outcome = retry_with_delay(self.attempts, self.delay, |attempt| {
            let probe = Arc::clone(&self.probe);
            async move {
                if !quiet {
                    info!(service = %service_name, "Retry {}/{}...", attempt, total);
                }
                match probe.probe(url).await {
                    ProbeOutcome::Up { latency_ms, .. } => Ok(latency_ms),
                    ProbeOutcome::Down(failure) => {
                        if !quiet {
                            warn!(service = %service_name, error = %failure, "Retry {} failed", attempt);
                        }
                        Err(failure)
                    }
                }
            }
        })
        .await;

        match outcome {
            RetryOutcome::Succeeded { attempt, value: latency_ms } => {
                if !quiet {
                    info!(service = %service_name, "False alarm, recovered on retry {}", attempt);
                }
                Verdict::FalseAlarm { attempt, latency_ms }
            }
            RetryOutcome::Exhausted { attempts, last_error } => {
                if !quiet {
                    warn!(service = %service_name, "Confirmed DOWN after {} retries", attempts);
                }
                Verdict::ConfirmedDown { last_failure: last_error }
            }
        }
    }

    /// `true` when the outage is confirmed
    pub async fn confirm_down(&self, url: &str, service_name: &str, quiet: bool) -> bool {
        self.verify(url, service_name, quiet).await.is_confirmed_down()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    struct SequenceProbe {
        outcomes: Mutex<VecDeque<ProbeOutcome>>,
        calls: AtomicU32,
    }

    impl SequenceProbe {
        fn new(outcomes: Vec<ProbeOutcome>) -> Arc<Self> {
            Arc::new(Self { outcomes: Mutex::new(outcomes.into()), calls: AtomicU32::new(0) })
        }
    }

    #[async_trait]
    impl Probe for SequenceProbe {
        async fn probe(&self, _url: &str) -> ProbeOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(ProbeOutcome::Down(ProbeFailure::Connect("refused".into())))
        }
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

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
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    /// Route this thread's events into a buffer until the guard drops
    fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        (logs, tracing::subscriber::set_default(subscriber))
    }

    fn down() -> ProbeOutcome {
        ProbeOutcome::Down(ProbeFailure::Status(502))
    }

    fn up() -> ProbeOutcome {
        ProbeOutcome::Up { latency_ms: 40, status_code: 200 }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_on_second_retry_stops_early() {
        let probe = SequenceProbe::new(vec![down(), up(), down()]);
        let verifier = Verifier::new(probe.clone(), 3, Duration::from_secs(5));
        let start = Instant::now();

        let verdict = verifier.verify("https://example.com", "api", false).await;

        assert_eq!(verdict, Verdict::FalseAlarm { attempt: 2, latency_ms: 40 });
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_after_exactly_three_failures() {
        let probe = SequenceProbe::new(vec![down(), down(), down(), up()]);
        let verifier = Verifier::from_config(probe.clone(), &EngineConfig::default());

        assert!(verifier.confirm_down("https://example.com", "api", false).await);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_mode_does_not_change_decision() {
        let loud = Verifier::new(SequenceProbe::new(vec![down(), down(), up()]), 3, Duration::from_secs(5));
        let quiet = Verifier::new(SequenceProbe::new(vec![down(), down(), up()]), 3, Duration::from_secs(5));

        let loud = loud.verify("https://example.com", "api", false).await;
        let quiet = quiet.verify("https://example.com", "api", true).await;

        assert_eq!(loud, quiet);
        assert_eq!(quiet, Verdict::FalseAlarm { attempt: 3, latency_ms: 40 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_mode_emits_no_attempt_events() {
        let (logs, _guard) = capture_logs();
        let verifier = Verifier::new(SequenceProbe::new(vec![down(), down(), down()]), 3, Duration::from_secs(5));

        let verdict = verifier.verify("https://example.com", "api", true).await;

        assert!(verdict.is_confirmed_down());
        let output = logs.contents();
        assert!(!output.contains("Retry"), "{output}");
        assert!(!output.contains("verifying"), "{output}");
        assert!(!output.contains("Confirmed DOWN"), "{output}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_loud_mode_reports_each_attempt() {
        let (logs, _guard) = capture_logs();
        let verifier = Verifier::new(SequenceProbe::new(vec![down(), up()]), 3, Duration::from_secs(5));

        verifier.verify("https://example.com", "api", false).await;

        let output = logs.contents();
        assert!(output.contains("Initial failure detected, verifying"), "{output}");
        assert!(output.contains("Retry 1/3..."), "{output}");
        assert!(output.contains("Retry 1 failed"), "{output}");
        assert!(output.contains("False alarm, recovered on retry 2"), "{output}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_carries_last_failure() {
        let probe = SequenceProbe::new(vec![down(), down(), ProbeOutcome::Down(ProbeFailure::Timeout(5000))]);
        let verifier = Verifier::new(probe, 3, Duration::from_secs(5));

        let verdict = verifier.verify("https://example.com", "api", true).await;

        assert_eq!(verdict, Verdict::ConfirmedDown { last_failure: Some(ProbeFailure::Timeout(5000)) });
    }
}
