// src/config/server.rs
// Health endpoint and logging configuration.

use serde::{Deserialize, Serialize};

/// Health endpoint configuration (spec 6 — GET /healthz).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: super::helpers::env_or("HOST", "0.0.0.0"),
            port: super::helpers::env_u32("PORT", 8080) as u16,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Logging configuration, driven by tracing-subscriber's EnvFilter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            level: super::helpers::env_or("RUST_LOG", "info"),
        }
    }
}
