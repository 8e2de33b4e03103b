// src/store/mod.rs
// Relational store (spec 3, 6). Postgres + pgvector; the Sync Orchestrator
// exclusively mutates sync_operations/sync_cursors/messages/message_windows
// and inserts embed_queue rows; the Embed Worker exclusively mutates
// embed_queue.status and message_embeddings. No other writer touches them.

pub mod channels;
pub mod cursors;
pub mod messages;
pub mod models;
pub mod operations;
pub mod queue;
pub mod vector;
pub mod windows;

use sqlx::postgres::PgPoolOptions;

pub type Pool = sqlx::PgPool;

pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Pool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|e| anyhow::anyhow!("failed to connect to database: {e}"))
}
