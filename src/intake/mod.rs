// src/intake/mod.rs
// Job Intake (spec 2, 6): accepts sync/chat requests, enqueues sync
// operations, and reads status. The command dispatcher itself (the thin
// controller layer mapping chat-service slash commands to these calls) is
// out of scope (spec 1).

use std::sync::Arc;

use crate::retrieval::{AnswerResult, RetrievalRequest, RetrievalService};
use crate::store::models::SyncOperation;
use crate::store::{cursors, operations, Pool};

pub struct JobIntake {
    pool: Pool,
    retrieval: Arc<RetrievalService>,
}

impl JobIntake {
    pub fn new(pool: Pool, retrieval: Arc<RetrievalService>) -> Self {
        Self { pool, retrieval }
    }

    /// Enqueues a guild-scope sync operation. Mode is `delta` iff a cursor
    /// already exists for the guild (spec 3: "mode = delta iff a cursor
    /// exists for the guild").
    pub async fn enqueue_sync(
        &self,
        guild_id: &str,
        requested_by: Option<&str>,
    ) -> anyhow::Result<SyncOperation> {
        let cursor = cursors::get(&self.pool, guild_id).await?;
        let (mode, since) = match &cursor {
            Some(c) if c.last_synced_at.is_some() => ("delta", c.last_synced_at),
            _ => ("full", None),
        };

        operations::enqueue(&self.pool, guild_id, "guild", mode, None, since, requested_by).await
    }

    pub async fn get_status(&self, job_id: &str) -> anyhow::Result<Option<SyncOperation>> {
        operations::get(&self.pool, job_id).await
    }

    pub async fn enqueue_chat(&self, request: RetrievalRequest) -> anyhow::Result<AnswerResult> {
        self.retrieval.answer(request).await
    }
}
