// src/sync/mod.rs
// Sync Orchestrator / Runner (spec 4.4): claims queued jobs, fans out
// fetches, persists messages, chunks and enqueues windows, waits for the
// embed worker to drain them, and advances the per-guild cursor.

pub mod fanout;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use crate::chunking::{ChunkInput, ChunkingEngine, Window};
use crate::config::sync::SyncConfig;
use crate::error::PipelineError;
use crate::fetch::{ChatFetcher, FetchedContainer, FetchedMessage};
use crate::store::models::{Message, SyncProgress};
use crate::store::{channels, cursors, messages, operations, queue, windows, Pool};
use crate::tokens::TokenCounter;
use crate::utils::retry::retry_with_doubling_backoff;
use crate::utils::timeout::with_timeout;

pub struct SyncRunner {
    pool: Pool,
    fetcher: Arc<dyn ChatFetcher>,
    chunker: ChunkingEngine,
    token_counter: Arc<TokenCounter>,
    config: SyncConfig,
}

impl SyncRunner {
    pub fn new(
        pool: Pool,
        fetcher: Arc<dyn ChatFetcher>,
        chunker: ChunkingEngine,
        token_counter: Arc<TokenCounter>,
        config: SyncConfig,
    ) -> Self {
        Self {
            pool,
            fetcher,
            chunker,
            token_counter,
            config,
        }
    }

    /// Claims the next queued job (if any) and runs it to completion. No-op
    /// if the queue is empty or a concurrent claimer won the race.
    pub async fn run_once(&self) -> anyhow::Result<bool> {
        let Some(op) = operations::claim_next(&self.pool).await? else {
            return Ok(false);
        };

        info!(job_id = %op.id, guild_id = %op.guild_id, scope = %op.scope, "sync job claimed");
        let started = std::time::Instant::now();

        match self.run_job(&op).await {
            Ok(()) => {
                operations::complete(&self.pool, &op.id).await?;
                info!(job_id = %op.id, "sync job completed");
                crate::metrics::record_sync_job("completed");
            }
            Err(e) => {
                warn!(job_id = %op.id, error = %e, "sync job failed");
                operations::fail(&self.pool, &op.id, &e.to_string()).await?;
                crate::metrics::record_sync_job("failed");
            }
        }
        crate::metrics::record_sync_job_duration(started.elapsed().as_secs_f64());

        Ok(true)
    }

    async fn progress(&self, op_id: &str, processed: i32, message: impl Into<String>) {
        let progress = SyncProgress {
            processed,
            total: 100,
            message: message.into(),
        };
        if let Err(e) = operations::update_progress(&self.pool, op_id, &progress).await {
            warn!(job_id = %op_id, error = %e, "failed to update sync progress");
        }
    }

    async fn run_job(&self, op: &crate::store::models::SyncOperation) -> anyhow::Result<()> {
        self.progress(&op.id, 0, "fetching").await;
        let containers = self.resolve_containers(op).await?;
        let (channels, threads): (Vec<_>, Vec<_>) =
            containers.into_iter().partition(|c| !c.is_thread);
        let total_containers = channels.len() + threads.len();

        self.register_containers(op, &channels, &threads).await;

        let since = op.since;
        let guild_id = op.guild_id.clone();
        let fetcher = self.fetcher.clone();
        let channel_messages = fanout::run_bounded(channels, self.config.fetch_concurrency, {
            let fetcher = fetcher.clone();
            let guild_id = guild_id.clone();
            move |c: FetchedContainer| {
                let fetcher = fetcher.clone();
                let guild_id = guild_id.clone();
                async move { fetch_container(&fetcher, &c, &guild_id, since).await }
            }
        })
        .await;

        let thread_timeout = Duration::from_secs(self.config.thread_fetch_timeout_secs);
        let thread_messages = fanout::run_bounded(threads, self.config.fetch_concurrency, {
            let fetcher = fetcher.clone();
            let guild_id = guild_id.clone();
            move |c: FetchedContainer| {
                let fetcher = fetcher.clone();
                let guild_id = guild_id.clone();
                async move {
                    match with_timeout(
                        thread_timeout,
                        fetch_container(&fetcher, &c, &guild_id, since),
                        "thread_fetch",
                    )
                    .await
                    {
                        Ok(messages) => messages,
                        Err(e) => {
                            warn!(container_id = %c.id, error = %e, "thread fetch timed out, skipping");
                            Vec::new()
                        }
                    }
                }
            }
        })
        .await;

        let mut all_messages: Vec<FetchedMessage> = channel_messages.into_iter().flatten().collect();
        all_messages.extend(thread_messages.into_iter().flatten());
        all_messages.sort_by_key(|m| m.created_at);

        self.progress(
            &op.id,
            30,
            format!(
                "fetched {} messages across {} containers",
                all_messages.len(),
                total_containers
            ),
        )
        .await;

        if all_messages.is_empty() {
            self.progress(&op.id, 99, "no new messages").await;
            return Ok(());
        }

        self.persist_messages(op, &all_messages).await?;
        self.progress(&op.id, 50, "messages persisted").await;

        let window_ids = self.chunk_and_enqueue(op, &all_messages).await?;
        self.progress(
            &op.id,
            90,
            format!("enqueued {} windows for embedding", window_ids.len()),
        )
        .await;

        self.await_embeddings(op).await?;
        self.progress(&op.id, 99, "embeddings settled").await;

        self.update_cursor(op, &all_messages).await?;
        Ok(())
    }

    async fn resolve_containers(
        &self,
        op: &crate::store::models::SyncOperation,
    ) -> anyhow::Result<Vec<FetchedContainer>> {
        match op.scope.as_str() {
            "guild" => self
                .fetcher
                .fetch_containers(&op.guild_id)
                .await
                .map_err(|e| PipelineError::sync_enqueue_failed(e.to_string()).into()),
            "channel" | "thread" => {
                let ids = op.target_ids.clone().unwrap_or_default();
                Ok(ids
                    .into_iter()
                    .map(|id| FetchedContainer {
                        id,
                        is_thread: op.scope == "thread",
                        parent_channel_id: None,
                        name: None,
                        archived: false,
                    })
                    .collect())
            }
            other => anyhow::bail!("unknown sync scope: {other}"),
        }
    }

    /// Upserts the channels/threads registry on observation (spec 3:
    /// "upserted on observation; never hard-deleted"). Best-effort: a
    /// registry write failure is logged but never fails the job, since the
    /// registry is a convenience index over containers, not part of the
    /// message/window/queue write chain spec 5 calls ordering-critical.
    async fn register_containers(
        &self,
        op: &crate::store::models::SyncOperation,
        channels: &[FetchedContainer],
        threads: &[FetchedContainer],
    ) {
        for channel in channels {
            if let Err(e) = channels::upsert_channel(
                &self.pool,
                &channel.id,
                &op.guild_id,
                None,
                channel.name.as_deref(),
                None,
            )
            .await
            {
                warn!(channel_id = %channel.id, error = %e, "failed to register channel");
            }
        }

        for thread in threads {
            let parent_channel_id = thread.parent_channel_id.as_deref().unwrap_or(&thread.id);
            if let Err(e) = channels::upsert_thread(
                &self.pool,
                &thread.id,
                &op.guild_id,
                parent_channel_id,
                thread.name.as_deref(),
                thread.archived,
            )
            .await
            {
                warn!(thread_id = %thread.id, error = %e, "failed to register thread");
            }
        }
    }

    async fn persist_messages(
        &self,
        op: &crate::store::models::SyncOperation,
        fetched: &[FetchedMessage],
    ) -> anyhow::Result<()> {
        let rows: Vec<Message> = fetched
            .iter()
            .map(|m| Message {
                message_id: m.message_id.clone(),
                guild_id: op.guild_id.clone(),
                category_id: None,
                channel_id: m.channel_id.clone(),
                thread_id: m.thread_id.clone(),
                author_id: m.author_id.clone(),
                content_md: m.content_md.clone(),
                content_plain: m.content_plain.clone(),
                created_at: Some(m.created_at),
                edited_at: m.edited_at,
                deleted_at: None,
                jump_link: m.jump_link.clone(),
            })
            .collect();

        for batch in rows.chunks(self.config.message_save_batch_size) {
            let pool = &self.pool;
            let result = retry_with_doubling_backoff(
                self.config.message_save_max_retries,
                Duration::from_secs(1),
                "message_batch_persist",
                |_attempt| messages::upsert_batch(pool, batch),
            )
            .await;

            if let Err(e) = result {
                return Err(PipelineError::message_save_failed(e.to_string()).into());
            }
        }

        let _ = op;
        Ok(())
    }

    async fn chunk_and_enqueue(
        &self,
        op: &crate::store::models::SyncOperation,
        messages: &[FetchedMessage],
    ) -> anyhow::Result<Vec<String>> {
        let mut partitions: HashMap<(String, Option<String>, NaiveDate), Vec<ChunkInput>> =
            HashMap::new();

        for message in messages {
            partitions
                .entry(partition_key(message))
                .or_default()
                .push(ChunkInput {
                    id: message.message_id.clone(),
                    content: message.content_plain.clone().unwrap_or_default(),
                    created_at: message.created_at,
                    is_top_level: message.is_top_level,
                });
        }

        let channel_by_partition: HashMap<String, String> = messages
            .iter()
            .map(|m| {
                let key = m.thread_id.clone().unwrap_or_else(|| m.channel_id.clone());
                (key, m.channel_id.clone())
            })
            .collect();

        // window_seq must be monotonic per (channel_id, date), not per
        // partition: a channel with both top-level messages and a thread
        // active on the same date produces two partitions here, and a
        // thread's windows are stored under its *parent* channel_id. Chunk
        // each partition independently (the chunker numbers its own output
        // starting at 1), then renumber across all partitions that resolve
        // to the same (channel_id, date) before persisting, so the
        // upsert's (channel_id, date, window_seq) conflict target can't
        // collide two unrelated windows into one row.
        let mut chunked: Vec<(String, Option<String>, NaiveDate, Window)> = Vec::new();

        for ((partition_key, thread_id, date), mut inputs) in partitions {
            inputs.sort_by_key(|m| m.created_at);
            let windows = self.chunker.chunk(inputs, &self.token_counter).await;
            let channel_id = channel_by_partition
                .get(&partition_key)
                .cloned()
                .unwrap_or(partition_key);

            for window in windows {
                chunked.push((channel_id.clone(), thread_id.clone(), date, window));
            }
        }

        let mut by_channel_date: HashMap<(String, NaiveDate), Vec<(Option<String>, Window)>> =
            HashMap::new();
        for (channel_id, thread_id, date, window) in chunked {
            by_channel_date
                .entry((channel_id, date))
                .or_default()
                .push((thread_id, window));
        }

        let mut window_ids = Vec::new();

        for ((channel_id, date), mut group) in by_channel_date {
            group.sort_by_key(|(thread_id, window)| {
                (thread_id.clone().unwrap_or_default(), window.start_at)
            });

            for (seq, (thread_id, mut window)) in (1i64..).zip(group.into_iter()) {
                window.window_seq = seq;
                let window_id = windows::upsert_window(
                    &self.pool,
                    &op.guild_id,
                    None,
                    &channel_id,
                    thread_id.as_deref(),
                    date,
                    &window,
                )
                .await
                .map_err(|e| PipelineError::window_save_failed(e.to_string()))?;
                window_ids.push(window_id);
            }
        }

        queue::insert_ready(&self.pool, &window_ids)
            .await
            .map_err(|e| PipelineError::window_save_failed(e.to_string()))?;

        Ok(window_ids)
    }

    async fn await_embeddings(&self, op: &crate::store::models::SyncOperation) -> anyhow::Result<()> {
        let poll_interval = Duration::from_secs(self.config.embed_wait_poll_interval_secs);
        let deadline = tokio::time::Instant::now()
            + Duration::from_secs(self.config.embed_wait_timeout_secs);
        let mut consecutive_errors = 0u32;

        loop {
            if tokio::time::Instant::now() >= deadline {
                warn!(job_id = %op.id, "embed-wait timed out, proceeding");
                return Ok(());
            }

            match queue::count_ready_for_guild(&self.pool, &op.guild_id).await {
                Ok(0) => return Ok(()),
                Ok(remaining) => {
                    consecutive_errors = 0;
                    self.progress(&op.id, 95, format!("{remaining} windows remaining")).await;
                }
                Err(e) => {
                    consecutive_errors += 1;
                    warn!(job_id = %op.id, error = %e, "embed-wait query failed");
                    if consecutive_errors >= 3 {
                        warn!(job_id = %op.id, "assuming embedding completion after repeated query errors");
                        return Ok(());
                    }
                }
            }

            tokio::time::sleep(poll_interval).await;
        }
    }

    async fn update_cursor(
        &self,
        op: &crate::store::models::SyncOperation,
        messages: &[FetchedMessage],
    ) -> anyhow::Result<()> {
        let Some(latest) = messages.iter().max_by_key(|m| m.created_at) else {
            return Ok(());
        };

        cursors::upsert(&self.pool, &op.guild_id, &latest.message_id, Utc::now())
            .await
            .map_err(|e| PipelineError::sync_cursor_read_failed(e.to_string()).into())
    }
}

async fn fetch_container(
    fetcher: &Arc<dyn ChatFetcher>,
    container: &FetchedContainer,
    guild_id: &str,
    since: Option<chrono::DateTime<Utc>>,
) -> Vec<FetchedMessage> {
    match fetcher.fetch_messages(container, guild_id, since).await {
        Ok(messages) => messages,
        Err(e) => {
            warn!(container_id = %container.id, error = %e, "container fetch failed, skipping");
            Vec::new()
        }
    }
}

/// Groups a message into its channel-or-thread-per-day partition (spec
/// 4.2: chunking runs "over one channel-date (or thread-date) partition").
fn partition_key(message: &FetchedMessage) -> (String, Option<String>, NaiveDate) {
    let key = message
        .thread_id
        .clone()
        .unwrap_or_else(|| message.channel_id.clone());
    (key, message.thread_id.clone(), message.created_at.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn message(channel_id: &str, thread_id: Option<&str>, minute: i64) -> FetchedMessage {
        FetchedMessage {
            message_id: "m".into(),
            guild_id: "g".into(),
            channel_id: channel_id.into(),
            thread_id: thread_id.map(str::to_string),
            author_id: None,
            content_md: None,
            content_plain: None,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
                + chrono::Duration::minutes(minute),
            edited_at: None,
            jump_link: None,
            is_top_level: false,
        }
    }

    #[test]
    fn messages_in_the_same_channel_and_day_share_a_partition() {
        let a = message("c1", None, 0);
        let b = message("c1", None, 60);
        assert_eq!(partition_key(&a), partition_key(&b));
    }

    #[test]
    fn thread_messages_partition_separately_from_their_parent_channel() {
        let channel_msg = message("c1", None, 0);
        let thread_msg = message("c1", Some("t1"), 0);
        assert_ne!(partition_key(&channel_msg), partition_key(&thread_msg));
    }

    #[test]
    fn messages_on_different_days_partition_separately() {
        let day_one = message("c1", None, 0);
        let day_two = message("c1", None, 60 * 30);
        assert_ne!(partition_key(&day_one), partition_key(&day_two));
    }
}
