// src/llm/embeddings.rs
// Embedding Client (spec 4.3): key rotation, jittered exponential backoff,
// retryable-signal classification. Two entry points — embed_window and
// embed_query — share identical retry semantics but distinct log labels.

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::warn;

use crate::utils::retry::jittered_exponential_backoff;

const MAX_ATTEMPTS: u32 = 10;

const RETRYABLE_MESSAGE_MARKERS: &[&str] = &[
    "rate limit",
    "overloaded",
    "UNAVAILABLE",
    "RESOURCE_EXHAUSTED",
    "DEADLINE_EXCEEDED",
    "fetch failed",
    "ECONNRESET",
    "ETIMEDOUT",
    "timeout",
];

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_message(message: &str) -> bool {
    RETRYABLE_MESSAGE_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed_window(&self, text: &str) -> anyhow::Result<Vec<f32>>;
    async fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// Gemini-backed embedding client. Holds a pool of equivalent API keys; a
/// key is chosen uniformly at random per call — stateless load balancing,
/// no sticky sessions (spec 4.3).
pub struct GeminiEmbeddingClient {
    client: Client,
    api_keys: Vec<String>,
    model: String,
    dim: usize,
    base_url: String,
}

impl GeminiEmbeddingClient {
    pub fn new(client: Client, api_keys: Vec<String>, model: String, dim: usize) -> Self {
        Self {
            client,
            api_keys,
            model,
            dim,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }

    fn pick_key(&self) -> &str {
        let idx = rand::rng().random_range(0..self.api_keys.len());
        &self.api_keys[idx]
    }

    async fn embed_with_retry(&self, text: &str, label: &str) -> anyhow::Result<Vec<f32>> {
        if self.api_keys.is_empty() {
            anyhow::bail!("no Gemini API keys configured for embedding");
        }

        let mut attempt = 0u32;
        loop {
            match self.embed_request(text).await {
                Ok(vector) => return Ok(vector),
                Err((status, message)) => {
                    attempt += 1;
                    let retryable = status.map(is_retryable_status).unwrap_or(false)
                        || is_retryable_message(&message);

                    if !retryable {
                        return Err(anyhow::anyhow!("{label} failed (non-retryable): {message}"));
                    }
                    if attempt >= MAX_ATTEMPTS {
                        return Err(anyhow::anyhow!(
                            "{label} exhausted {MAX_ATTEMPTS} attempts: {message}"
                        ));
                    }

                    let delay = jittered_exponential_backoff(attempt);
                    warn!(
                        "{label} attempt {attempt}/{MAX_ATTEMPTS} failed: {message} — retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn embed_request(&self, text: &str) -> Result<Vec<f32>, (Option<u16>, String)> {
        let key = self.pick_key();
        let url = format!(
            "{}/models/{}:embedContent?key={}",
            self.base_url, self.model, key
        );

        let body = json!({
            "model": format!("models/{}", self.model),
            "content": { "parts": [{ "text": text }] },
            "outputDimensionality": self.dim,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| (None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err((Some(status.as_u16()), body_text));
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| (None, format!("response parse failed: {e}")))?;

        let values = raw
            .get("embedding")
            .and_then(|e| e.get("values"))
            .and_then(|v| v.as_array())
            .ok_or_else(|| (None, "no embedding values in Gemini response".to_string()))?
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect();

        Ok(values)
    }
}

#[async_trait]
impl EmbeddingClient for GeminiEmbeddingClient {
    async fn embed_window(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_with_retry(text, "embed_window").await
    }

    async fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_with_retry(text, "embed_query").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(401));
    }

    #[test]
    fn classifies_retryable_messages() {
        assert!(is_retryable_message("model is overloaded, try again"));
        assert!(is_retryable_message("RESOURCE_EXHAUSTED: quota"));
        assert!(!is_retryable_message("invalid api key"));
    }
}
