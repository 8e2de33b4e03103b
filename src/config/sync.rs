// src/config/sync.rs
// Sync orchestrator and retrieval-path tuning knobs (spec 4.4, 4.6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub fetch_concurrency: usize,
    pub top_candidates_limit: usize,
    pub message_save_batch_size: usize,
    pub message_save_max_retries: u32,
    pub embed_queue_batch_size: usize,
    pub thread_fetch_timeout_secs: u64,
    pub embed_wait_poll_interval_secs: u64,
    pub embed_wait_timeout_secs: u64,
}

impl SyncConfig {
    pub fn from_env() -> Self {
        Self {
            fetch_concurrency: super::helpers::env_usize("DISCORD_FETCH_CONCURRENCY", 15),
            top_candidates_limit: super::helpers::env_usize("TOP_CANDIDATES_LIMIT", 50),
            message_save_batch_size: super::helpers::env_usize("MESSAGE_SAVE_BATCH_SIZE", 50),
            message_save_max_retries: super::helpers::env_u32("MESSAGE_SAVE_MAX_RETRIES", 3),
            embed_queue_batch_size: super::helpers::env_usize("EMBED_QUEUE_ID_BATCH_SIZE", 500),
            thread_fetch_timeout_secs: super::helpers::env_u64("THREAD_FETCH_TIMEOUT_SECS", 30),
            embed_wait_poll_interval_secs: super::helpers::env_u64(
                "EMBED_WAIT_POLL_INTERVAL_SECS",
                5,
            ),
            embed_wait_timeout_secs: super::helpers::env_u64("EMBED_WAIT_TIMEOUT_SECS", 1800),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedWorkerConfig {
    pub batch_size: usize,
    pub concurrency: usize,
    pub max_attempts: u32,
    pub poll_interval_ms: u64,
    pub max_idle_backoff_secs: u64,
}

impl EmbedWorkerConfig {
    pub fn from_env() -> Self {
        Self {
            batch_size: super::helpers::env_usize("EMBED_WORKER_BATCH_SIZE", 500),
            concurrency: super::helpers::env_usize("EMBED_WORKER_CONCURRENCY", 20),
            max_attempts: super::helpers::env_u32("EMBED_WORKER_MAX_ATTEMPTS", 5),
            poll_interval_ms: super::helpers::env_u64("EMBED_WORKER_POLL_INTERVAL_MS", 1000),
            max_idle_backoff_secs: super::helpers::env_u64("EMBED_WORKER_MAX_IDLE_BACKOFF_SECS", 30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub vector_rpc_limit: usize,
    pub candidate_limit: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: usize,
    pub citation_count: usize,
}

impl RetrievalConfig {
    pub fn from_env() -> Self {
        Self {
            vector_rpc_limit: super::helpers::env_usize("VECTOR_RPC_LIMIT", 200),
            candidate_limit: super::helpers::env_usize("RETRIEVAL_CANDIDATE_LIMIT", 15),
            temperature: super::helpers::env_f32("RETRIEVAL_TEMPERATURE", 0.3),
            top_p: super::helpers::env_f32("RETRIEVAL_TOP_P", 0.9),
            max_output_tokens: super::helpers::env_usize("RETRIEVAL_MAX_OUTPUT_TOKENS", 2048),
            citation_count: super::helpers::env_usize("RETRIEVAL_CITATION_COUNT", 3),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaleJobSweepConfig {
    pub enabled: bool,
    pub stale_after_minutes: i64,
}

impl StaleJobSweepConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: super::helpers::env_bool("STALE_JOB_SWEEP_ENABLED", true),
            stale_after_minutes: super::helpers::env_u64("STALE_JOB_SWEEP_AFTER_MINUTES", 60)
                as i64,
        }
    }
}
