// src/embed_worker/mod.rs
// Embed Worker (spec 4.5): drains embed_queue, resolves window text,
// embeds it, upserts the vector, and marks the row done or failed.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::config::sync::EmbedWorkerConfig;
use crate::llm::EmbeddingClient;
use crate::store::models::EmbedQueueRow;
use crate::store::{messages, queue, windows, vector, Pool};
use crate::tokens::TokenCounter;

pub struct EmbedWorker {
    pool: Pool,
    embedding_client: Arc<dyn EmbeddingClient>,
    token_counter: Arc<TokenCounter>,
    config: EmbedWorkerConfig,
}

impl EmbedWorker {
    pub fn new(
        pool: Pool,
        embedding_client: Arc<dyn EmbeddingClient>,
        token_counter: Arc<TokenCounter>,
        config: EmbedWorkerConfig,
    ) -> Self {
        Self {
            pool,
            embedding_client,
            token_counter,
            config,
        }
    }

    /// Runs the drain loop forever. Exits only on an unrecoverable error
    /// claiming a batch (e.g. pool exhaustion); per-row failures are
    /// handled internally and never stop the loop.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut idle_count: u32 = 0;

        loop {
            if *shutdown.borrow() {
                info!("embed worker shutting down");
                return;
            }

            let batch = match queue::claim_batch(&self.pool, self.config.batch_size as i64).await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(error = %e, "failed to claim embed_queue batch, backing off");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            if batch.is_empty() {
                idle_count += 1;
                let backoff_ms = idle_backoff_ms(
                    self.config.poll_interval_ms,
                    idle_count,
                    self.config.max_idle_backoff_secs,
                );
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(backoff_ms)) => {}
                    _ = shutdown.changed() => {}
                }
                continue;
            }

            idle_count = 0;
            debug!(batch_size = batch.len(), "processing embed_queue batch");

            let concurrency = self.config.concurrency.max(1);
            stream::iter(batch)
                .map(|row| self.process_window(row))
                .buffer_unordered(concurrency)
                .collect::<Vec<_>>()
                .await;
        }
    }

    /// Resolves text, ensures it fits the token budget, embeds it, upserts
    /// the vector, and transitions the queue row (spec 4.5 "processWindow").
    async fn process_window(&self, row: EmbedQueueRow) {
        let text = match self.resolve_text(&row.window_id).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                warn!(window_id = %row.window_id, "no resolvable text for window, marking failed");
                if let Err(e) = queue::mark_failed(&self.pool, &row.id).await {
                    warn!(row_id = %row.id, error = %e, "failed to mark queue row failed");
                }
                crate::metrics::record_embed_attempt("failed");
                return;
            }
            Err(e) => {
                warn!(window_id = %row.window_id, error = %e, "failed to resolve window text");
                self.fail_or_retry(&row).await;
                return;
            }
        };

        let ensured = self.token_counter.ensure_within_limit(&text).await;
        if ensured.truncated {
            debug!(window_id = %row.window_id, "window text truncated before embedding");
        }

        let embedding = match self.embedding_client.embed_window(&ensured.text).await {
            Ok(v) => v,
            Err(e) => {
                warn!(window_id = %row.window_id, error = %e, "embedding failed");
                self.fail_or_retry(&row).await;
                return;
            }
        };

        if let Err(e) = vector::upsert_embedding(&self.pool, &row.window_id, &embedding).await {
            warn!(window_id = %row.window_id, error = %e, "failed to upsert embedding");
            self.fail_or_retry(&row).await;
            return;
        }

        if let Err(e) = queue::mark_done(&self.pool, &row.id).await {
            warn!(row_id = %row.id, error = %e, "failed to mark queue row done");
        }
        crate::metrics::record_embed_attempt("done");
    }

    async fn resolve_text(&self, window_id: &str) -> anyhow::Result<Option<String>> {
        if let Some(text) = windows::fetch_text(&self.pool, window_id).await? {
            if !text.is_empty() {
                return Ok(Some(text));
            }
        }

        let message_ids = windows::fetch_message_ids(&self.pool, window_id).await?;
        if message_ids.is_empty() {
            return Ok(None);
        }

        let content_by_id = messages::fetch_content_by_ids(&self.pool, &message_ids).await?;
        let parts: Vec<&str> = message_ids
            .iter()
            .filter_map(|id| content_by_id.get(id).map(|s| s.as_str()))
            .collect();

        if parts.is_empty() {
            return Ok(None);
        }

        Ok(Some(parts.join("\n")))
    }

    /// Increments attempts; transitions to failed at `max_attempts`,
    /// otherwise leaves the row ready. The DB write itself is not retried
    /// on failure (spec 4.5 "Failure policy").
    async fn fail_or_retry(&self, row: &EmbedQueueRow) {
        match queue::record_attempt_and_maybe_fail(
            &self.pool,
            &row.id,
            self.config.max_attempts as i32,
        )
        .await
        {
            Ok(true) => {
                warn!(window_id = %row.window_id, "embed_queue row exhausted retries, marked failed");
                crate::metrics::record_embed_attempt("failed");
            }
            Ok(false) => crate::metrics::record_embed_attempt("retry"),
            Err(e) => warn!(row_id = %row.id, error = %e, "failed to record embed attempt"),
        }
    }
}

/// Exponential idle backoff (x1.5 per empty poll), capped at
/// `max_idle_backoff_secs` (spec 4.5: "back off when the queue is empty").
fn idle_backoff_ms(poll_interval_ms: u64, idle_count: u32, max_idle_backoff_secs: u64) -> u64 {
    let backoff = poll_interval_ms as f64 * 1.5f64.powi(idle_count as i32);
    backoff.min((max_idle_backoff_secs * 1000) as f64) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_with_consecutive_idle_polls() {
        let first = idle_backoff_ms(1000, 1, 30);
        let second = idle_backoff_ms(1000, 2, 30);
        let third = idle_backoff_ms(1000, 3, 30);
        assert!(first < second);
        assert!(second < third);
    }

    #[test]
    fn backoff_is_capped_at_the_configured_maximum() {
        let backoff = idle_backoff_ms(1000, 100, 30);
        assert_eq!(backoff, 30_000);
    }

    #[test]
    fn first_idle_poll_backs_off_from_the_base_poll_interval() {
        let backoff = idle_backoff_ms(1000, 1, 30);
        assert_eq!(backoff, 1500);
    }
}
