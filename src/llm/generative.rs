// src/llm/generative.rs
// Generative model collaborator (spec 4.6 step 6). Request shape only —
// the chat-service-facing prompt assembly lives in `retrieval::prompt`.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

pub struct GenerationRequest {
    pub prompt: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: usize,
}

pub struct GenerationResult {
    pub text: String,
}

#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> anyhow::Result<GenerationResult>;
}

pub struct GeminiGenerativeProvider {
    client: Client,
    api_keys: Vec<String>,
    model: String,
    base_url: String,
}

impl GeminiGenerativeProvider {
    pub fn new(client: Client, api_keys: Vec<String>, model: String) -> Self {
        Self {
            client,
            api_keys,
            model,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }

    fn pick_key(&self) -> anyhow::Result<&str> {
        use rand::Rng;
        if self.api_keys.is_empty() {
            anyhow::bail!("no Gemini API keys configured for generation");
        }
        let idx = rand::rng().random_range(0..self.api_keys.len());
        Ok(&self.api_keys[idx])
    }
}

#[async_trait]
impl GenerativeProvider for GeminiGenerativeProvider {
    async fn generate(&self, request: GenerationRequest) -> anyhow::Result<GenerationResult> {
        let key = self.pick_key()?;
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, key
        );

        let body = json!({
            "contents": [{ "parts": [{ "text": request.prompt }] }],
            "generationConfig": {
                "temperature": request.temperature,
                "topP": request.top_p,
                "maxOutputTokens": request.max_output_tokens,
            }
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini generation error {status}: {error_text}");
        }

        let raw: Value = response.json().await?;
        let parts = raw
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array())
            .ok_or_else(|| anyhow::anyhow!("no candidates in Gemini generation response"))?;

        let text = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("");

        Ok(GenerationResult { text })
    }
}
