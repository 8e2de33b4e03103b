// src/tokens/precise.rs
// Remote precise token counting (spec 4.1). Dependency-injected so tests
// and the chunking engine never need a live network call.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::utils::retry::retry_with_doubling_backoff;

const MAX_ATTEMPTS: u32 = 5;
const BASE_DELAY: Duration = Duration::from_millis(250);

#[async_trait]
pub trait PreciseTokenCounter: Send + Sync {
    async fn count(&self, text: &str) -> anyhow::Result<usize>;
}

/// Always fails, forcing callers onto the local estimate. Used in tests and
/// as a safe default when no precise-counting endpoint is configured.
pub struct NoopPreciseCounter;

#[async_trait]
impl PreciseTokenCounter for NoopPreciseCounter {
    async fn count(&self, _text: &str) -> anyhow::Result<usize> {
        anyhow::bail!("no precise token counter configured")
    }
}

#[derive(Deserialize)]
struct CountTokensResponse {
    #[serde(rename = "totalTokens")]
    total_tokens: usize,
}

/// Calls the generative model's countTokens endpoint, retrying with fixed
/// doubling backoff (250ms base, 5 attempts) before giving up.
pub struct GeminiTokenCounter {
    client: reqwest::Client,
    api_keys: Vec<String>,
    model: String,
}

impl GeminiTokenCounter {
    pub fn new(client: reqwest::Client, api_keys: Vec<String>, model: String) -> Self {
        Self {
            client,
            api_keys,
            model,
        }
    }

    fn pick_key(&self) -> &str {
        use rand::Rng;
        let idx = rand::rng().random_range(0..self.api_keys.len());
        &self.api_keys[idx]
    }
}

#[async_trait]
impl PreciseTokenCounter for GeminiTokenCounter {
    async fn count(&self, text: &str) -> anyhow::Result<usize> {
        if self.api_keys.is_empty() {
            anyhow::bail!("no API keys configured for token counting");
        }

        retry_with_doubling_backoff(MAX_ATTEMPTS, BASE_DELAY, "count_tokens", |_attempt| async {
            let key = self.pick_key();
            let url = format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{}:countTokens?key={}",
                self.model, key
            );
            let body = serde_json::json!({
                "contents": [{ "parts": [{ "text": text }] }]
            });

            let response = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| anyhow::anyhow!("countTokens request failed: {e}"))?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                anyhow::bail!("countTokens returned {status}: {text}");
            }

            let parsed: CountTokensResponse = response
                .json()
                .await
                .map_err(|e| anyhow::anyhow!("countTokens response parse failed: {e}"))?;
            Ok(parsed.total_tokens)
        })
        .await
    }
}
