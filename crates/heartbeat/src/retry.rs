//! Bounded asynchronous retry with a fixed delay before every attempt.

use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T, E> {
    /// `attempt` is 1-based
    Succeeded { attempt: u32, value: T },
    Exhausted { attempts: u32, last_error: Option<E> },
}

/// Sleep `delay`, run `op`, and repeat up to `attempts` times. Stops at the
/// first success; no further attempt is made after it.
pub async fn retry_with_delay<T, E, F, Fut>(attempts: u32, delay: Duration, mut op: F) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last_error = None;

    for attempt in 1..=attempts {
        tokio::time::sleep(delay).await;

        match op(attempt).await {
            Ok(value) => return RetryOutcome::Succeeded { attempt, value },
            Err(e) => last_error = Some(e),
        }
    }

    RetryOutcome::Exhausted { attempts, last_error }
}
