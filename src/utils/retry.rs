// src/utils/retry.rs
// Shared retry-with-backoff helpers. Two policies are used across the
// crate, matching the two distinct formulas in spec 4.1 and 4.3.

use rand::Rng;
use std::time::Duration;
use tracing::warn;

/// Fixed-step doubling backoff: delay = base * 2^attempt. Used by the
/// token counter's precise-count retries (spec 4.1: 250ms, doubling, 5
/// attempts) and message-batch persistence (spec 4.4: 1s, doubling, 3
/// attempts).
pub async fn retry_with_doubling_backoff<F, Fut, T, E>(
    max_attempts: u32,
    base_delay: Duration,
    label: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(e);
                }
                let delay = base_delay * 2u32.pow(attempt - 1);
                warn!(
                    "{} failed (attempt {}/{}): {} — retrying in {:?}",
                    label, attempt, max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Exponential backoff with uniform jitter: delay = 2^attempt + U(0, 2)
/// seconds. Used by the embedding client (spec 4.3: up to 10 attempts).
pub fn jittered_exponential_backoff(attempt: u32) -> Duration {
    let base = 2u64.saturating_pow(attempt.min(20));
    let jitter: f64 = rand::rng().random_range(0.0..2.0);
    Duration::from_secs_f64(base as f64 + jitter)
}
