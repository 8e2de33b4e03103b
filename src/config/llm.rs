// src/config/llm.rs
// Gemini embedding/chat credential pool and rerank collaborator configuration.

use serde::{Deserialize, Serialize};

/// Pool of equivalent Gemini API keys (GEMINI_API_KEY, GEMINI_API_KEY2..20).
/// A key is chosen uniformly at random per call — stateless load balancing,
/// no sticky sessions (spec 4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_keys: Vec<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub embedding_dim: usize,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let mut api_keys = Vec::new();
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.is_empty() {
                api_keys.push(key);
            }
        }
        for i in 2..=20 {
            if let Ok(key) = std::env::var(format!("GEMINI_API_KEY{i}")) {
                if !key.is_empty() {
                    api_keys.push(key);
                }
            }
        }

        Self {
            api_keys,
            chat_model: super::helpers::env_or("CHAT_MODEL", "gemini-2.5-flash-lite"),
            embedding_model: super::helpers::env_or("EMBEDDING_MODEL", "gemini-embedding-001"),
            embedding_dim: super::helpers::env_usize("EMBEDDING_DIM", 3072),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_keys.is_empty() {
            return Err(anyhow::anyhow!(
                "at least one GEMINI_API_KEY (or GEMINI_API_KEY2..20) is required"
            ));
        }
        Ok(())
    }
}

/// Rerank collaborator configuration. `provider = "none"` disables the step
/// entirely (spec 4.6 step 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    pub provider: String,
    pub model: String,
    pub top_k: usize,
    pub cohere_api_key: String,
}

impl RerankConfig {
    pub fn from_env() -> Self {
        Self {
            provider: super::helpers::env_or("RERANK_PROVIDER", "none"),
            model: super::helpers::env_or("RERANK_MODEL", ""),
            top_k: super::helpers::env_usize("RERANK_TOPK", 5),
            cohere_api_key: super::helpers::env_or("COHERE_API_KEY", ""),
        }
    }

    pub fn enabled(&self) -> bool {
        self.provider != "none"
    }
}
