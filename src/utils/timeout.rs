// src/utils/timeout.rs
// Timeout utilities

use anyhow::Result;
use futures::Future;
use std::time::Duration;

/// Runs `operation` under a deadline, regardless of what it resolves to.
/// Resolves to `Err` on elapsed deadline rather than the operation's own
/// output — callers that need to distinguish "timed out" from "ran and
/// failed" should have `operation` return a `Result` itself.
pub async fn with_timeout<F, T>(duration: Duration, operation: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(duration, operation).await {
        Ok(result) => Ok(result),
        Err(_) => Err(anyhow::anyhow!(
            "{} timed out after {:?}",
            operation_name,
            duration
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_with_inner_value_before_deadline() {
        let result = with_timeout(Duration::from_millis(50), async { 42 }, "quick").await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn errors_when_operation_outlives_deadline() {
        let result = with_timeout(
            Duration::from_millis(5),
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "never"
            },
            "slow",
        )
        .await;
        assert!(result.is_err());
    }
}
