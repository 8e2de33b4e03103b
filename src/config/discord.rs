// src/config/discord.rs
// Credentials for the chat-service client (fetch primitives live outside this crate).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub token: String,
    pub app_id: String,
    pub public_key: String,
}

impl DiscordConfig {
    pub fn from_env() -> Self {
        Self {
            token: super::helpers::require_env("DISCORD_TOKEN"),
            app_id: super::helpers::require_env("DISCORD_APP_ID"),
            public_key: super::helpers::require_env("DISCORD_PUBLIC_KEY"),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.token.is_empty() {
            return Err(anyhow::anyhow!("DISCORD_TOKEN is required"));
        }
        Ok(())
    }
}
