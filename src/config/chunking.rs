// src/config/chunking.rs
// Chunking engine and token-counter configuration (spec 4.1, 4.2).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub max_tokens_per_window: usize,
    pub soft_gap_minutes: i64,
    pub overlap_messages: usize,
}

impl ChunkingConfig {
    pub fn from_env() -> Self {
        Self {
            max_tokens_per_window: super::helpers::env_usize("MAX_TOKENS_PER_WINDOW", 1200),
            soft_gap_minutes: super::helpers::env_u64("SOFT_GAP_MINUTES", 5) as i64,
            overlap_messages: super::helpers::env_usize("OVERLAP_MESSAGES", 0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub max_tokens: usize,
    pub safety_margin: usize,
}

impl TokenConfig {
    pub fn from_env() -> Self {
        Self {
            max_tokens: super::helpers::env_usize("MAX_INPUT_TOKENS", 2048),
            safety_margin: super::helpers::env_usize("LLM_TOKEN_SAFETY_MARGIN", 128),
        }
    }
}
