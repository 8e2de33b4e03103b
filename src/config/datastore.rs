// src/config/datastore.rs
// Relational store with vector index (Supabase/Postgres). Schema and the
// match_windows_in_guild RPC are assumed to already exist — see store::vector.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataStoreConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub database_url: String,
    pub max_connections: u32,
}

impl DataStoreConfig {
    pub fn from_env() -> Self {
        Self {
            supabase_url: super::helpers::env_or("SUPABASE_URL", ""),
            supabase_anon_key: super::helpers::env_or("SUPABASE_ANON_KEY", ""),
            database_url: super::helpers::require_env("DATABASE_URL"),
            max_connections: super::helpers::env_u32("DATABASE_MAX_CONNECTIONS", 10),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database_url.is_empty() {
            return Err(anyhow::anyhow!("DATABASE_URL is required"));
        }
        Ok(())
    }
}
