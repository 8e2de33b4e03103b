// tests/retry_test.rs
// Retry/backoff policies (spec 4.1, 4.3, 4.4).

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use threadloom::utils::retry::{jittered_exponential_backoff, retry_with_doubling_backoff};

#[tokio::test]
async fn succeeds_without_retry_when_the_first_attempt_works() {
    let calls = AtomicU32::new(0);
    let result: Result<&str, String> = retry_with_doubling_backoff(
        3,
        Duration::from_millis(1),
        "test_op",
        |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok("ok") }
        },
    )
    .await;

    assert_eq!(result.unwrap(), "ok");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn retries_until_success_within_max_attempts() {
    let calls = AtomicU32::new(0);
    let result: Result<&str, String> = retry_with_doubling_backoff(
        5,
        Duration::from_millis(1),
        "test_op",
        |_attempt| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient".to_string())
                } else {
                    Ok("recovered")
                }
            }
        },
    )
    .await;

    assert_eq!(result.unwrap(), "recovered");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn gives_up_after_max_attempts_and_returns_the_last_error() {
    let calls = AtomicU32::new(0);
    let result: Result<&str, String> = retry_with_doubling_backoff(
        3,
        Duration::from_millis(1),
        "test_op",
        |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("always fails".to_string()) }
        },
    )
    .await;

    assert_eq!(result.unwrap_err(), "always fails");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn jittered_backoff_grows_with_attempt_and_stays_above_the_exponential_floor() {
    let d0 = jittered_exponential_backoff(0);
    let d3 = jittered_exponential_backoff(3);

    assert!(d0.as_secs_f64() >= 1.0); // 2^0 = 1, plus jitter in [0, 2)
    assert!(d0.as_secs_f64() < 3.0);
    assert!(d3.as_secs_f64() >= 8.0); // 2^3 = 8, plus jitter in [0, 2)
    assert!(d3.as_secs_f64() < 10.0);
}

#[test]
fn jittered_backoff_never_overflows_for_large_attempt_numbers() {
    let d = jittered_exponential_backoff(u32::MAX);
    assert!(d.as_secs_f64().is_finite());
}
