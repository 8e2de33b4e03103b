// src/config/mod.rs
// Central configuration for threadloom — composes all domain configs so
// business logic never reads std::env directly.

pub mod chunking;
pub mod datastore;
pub mod discord;
pub mod helpers;
pub mod llm;
pub mod server;
pub mod sync;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub static CONFIG: Lazy<Config> = Lazy::new(Config::from_env);

/// Top-level configuration structure — composes all domain configs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub discord: discord::DiscordConfig,
    pub datastore: datastore::DataStoreConfig,
    pub llm: llm::LlmConfig,
    pub rerank: llm::RerankConfig,
    pub chunking: chunking::ChunkingConfig,
    pub tokens: chunking::TokenConfig,
    pub sync: sync::SyncConfig,
    pub embed_worker: sync::EmbedWorkerConfig,
    pub retrieval: sync::RetrievalConfig,
    pub stale_job_sweep: sync::StaleJobSweepConfig,
    pub server: server::ServerConfig,
    pub logging: server::LoggingConfig,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok(); // absence is fine outside development

        Self {
            discord: discord::DiscordConfig::from_env(),
            datastore: datastore::DataStoreConfig::from_env(),
            llm: llm::LlmConfig::from_env(),
            rerank: llm::RerankConfig::from_env(),
            chunking: chunking::ChunkingConfig::from_env(),
            tokens: chunking::TokenConfig::from_env(),
            sync: sync::SyncConfig::from_env(),
            embed_worker: sync::EmbedWorkerConfig::from_env(),
            retrieval: sync::RetrievalConfig::from_env(),
            stale_job_sweep: sync::StaleJobSweepConfig::from_env(),
            server: server::ServerConfig::from_env(),
            logging: server::LoggingConfig::from_env(),
        }
    }

    /// Validate config on startup; failure here is a fail-fast bootstrap
    /// error (spec 7: "Credentials missing" -> exit 1).
    pub fn validate(&self) -> anyhow::Result<()> {
        self.discord.validate()?;
        self.datastore.validate()?;
        self.llm.validate()?;
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        self.server.bind_address()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
