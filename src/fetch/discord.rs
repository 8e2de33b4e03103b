// src/fetch/discord.rs
// Minimal Discord REST implementation of `ChatFetcher`. The spec treats
// the chat-service client as an external collaborator (spec 1); this is
// just enough of one to make the binary runnable end-to-end — it is not
// a general-purpose Discord client and does not implement gateway events,
// rate-limit bucket tracking, or anything beyond paginated REST reads.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde_json::Value;
use tracing::warn;

use super::{ChatFetcher, FetchedContainer, FetchedMessage};
use crate::utils::retry::retry_with_doubling_backoff;

const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;
const API_BASE: &str = "https://discord.com/api/v10";
const PAGE_SIZE: u32 = 100;
const GUILD_TEXT: i64 = 0;
const GUILD_ANNOUNCEMENT: i64 = 5;
const THREAD_STARTER_MESSAGE: i64 = 21;

/// Discord's global REST rate limit is generous per-route but this keeps
/// the fan-out fetch concurrency (spec 4.4, default 15) from hammering a
/// single guild's routes in a burst.
const REQUESTS_PER_SECOND: u32 = 20;

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

fn timestamp_to_snowflake(ts: DateTime<Utc>) -> u64 {
    let ms = ts.timestamp_millis() - DISCORD_EPOCH_MS;
    ((ms.max(0) as u64) << 22).max(0)
}

fn snowflake_to_timestamp(id: &str) -> Option<DateTime<Utc>> {
    let raw: u64 = id.parse().ok()?;
    let ms = (raw >> 22) as i64 + DISCORD_EPOCH_MS;
    Utc.timestamp_millis_opt(ms).single()
}

pub struct DiscordFetcher {
    client: Client,
    token: String,
    rate_limiter: DirectRateLimiter,
}

impl DiscordFetcher {
    pub fn new(token: String) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(REQUESTS_PER_SECOND).unwrap());
        Self {
            client: Client::new(),
            token,
            rate_limiter: RateLimiter::direct(quota),
        }
    }

    async fn get_json(&self, path: &str) -> anyhow::Result<Value> {
        retry_with_doubling_backoff(3, Duration::from_millis(500), "discord_get", |_attempt| async {
            self.rate_limiter.until_ready().await;

            let response = self
                .client
                .get(format!("{API_BASE}{path}"))
                .header("Authorization", format!("Bot {}", self.token))
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("discord GET {path} returned {status}: {body}");
            }

            response
                .json::<Value>()
                .await
                .map_err(|e| anyhow::anyhow!("discord GET {path} response parse failed: {e}"))
        })
        .await
    }

    /// `channel_id`/`thread_id` are derived from the container, not the
    /// Discord channel id the message was fetched from (which, inside a
    /// thread, *is* the thread id) — spec 3's `channel_id`-is-never-null,
    /// `thread_id`-is-the-thread's-parent invariant.
    fn parse_message(&self, raw: &Value, guild_id: &str, container: &FetchedContainer) -> Option<FetchedMessage> {
        let message_id = raw.get("id")?.as_str()?.to_string();
        let created_at = snowflake_to_timestamp(&message_id)?;
        let content = raw.get("content").and_then(|c| c.as_str()).map(str::to_string);
        let author_id = raw
            .get("author")
            .and_then(|a| a.get("id"))
            .and_then(|id| id.as_str())
            .map(str::to_string);
        let edited_at = raw
            .get("edited_timestamp")
            .and_then(|t| t.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let (channel_id, thread_id) = if container.is_thread {
            (
                container
                    .parent_channel_id
                    .clone()
                    .unwrap_or_else(|| container.id.clone()),
                Some(container.id.clone()),
            )
        } else {
            (container.id.clone(), None)
        };

        // Discord marks the system message that carries the thread's
        // originating post with type 21 (THREAD_STARTER_MESSAGE) when it
        // is read back through the thread's own channel history; treat it
        // as the chunker's top-level boundary so a thread's root post
        // never merges into the reply window that follows it.
        let is_top_level = raw.get("type").and_then(|t| t.as_i64()) == Some(THREAD_STARTER_MESSAGE);

        Some(FetchedMessage {
            message_id: message_id.clone(),
            guild_id: guild_id.to_string(),
            channel_id: channel_id.clone(),
            thread_id,
            author_id,
            content_md: content.clone(),
            content_plain: content,
            created_at,
            edited_at,
            jump_link: Some(format!(
                "https://discord.com/channels/{guild_id}/{channel_id}/{message_id}"
            )),
            is_top_level,
        })
    }
}

#[async_trait]
impl ChatFetcher for DiscordFetcher {
    async fn fetch_containers(&self, guild_id: &str) -> anyhow::Result<Vec<FetchedContainer>> {
        let mut containers = Vec::new();

        let channels = self.get_json(&format!("/guilds/{guild_id}/channels")).await?;
        let channel_ids: Vec<String> = channels
            .as_array()
            .into_iter()
            .flatten()
            .filter(|c| {
                matches!(
                    c.get("type").and_then(|t| t.as_i64()),
                    Some(GUILD_TEXT) | Some(GUILD_ANNOUNCEMENT)
                )
            })
            .filter_map(|c| c.get("id").and_then(|id| id.as_str()).map(str::to_string))
            .collect();

        for channel in channels.as_array().into_iter().flatten() {
            if let Some(id) = channel.get("id").and_then(|id| id.as_str()) {
                if channel_ids.contains(&id.to_string()) {
                    containers.push(FetchedContainer {
                        id: id.to_string(),
                        is_thread: false,
                        parent_channel_id: None,
                        name: channel.get("name").and_then(|n| n.as_str()).map(str::to_string),
                        archived: false,
                    });
                }
            }
        }

        if let Ok(active) = self.get_json(&format!("/guilds/{guild_id}/threads/active")).await {
            for thread in active.get("threads").and_then(|t| t.as_array()).into_iter().flatten() {
                push_thread(&mut containers, thread, false);
            }
        } else {
            warn!(guild_id, "failed to list active threads");
        }

        for channel_id in &channel_ids {
            match self
                .get_json(&format!("/channels/{channel_id}/threads/archived/public"))
                .await
            {
                Ok(archived) => {
                    for thread in archived.get("threads").and_then(|t| t.as_array()).into_iter().flatten() {
                        push_thread(&mut containers, thread, true);
                    }
                }
                Err(e) => warn!(channel_id, error = %e, "failed to list archived threads"),
            }
        }

        Ok(containers)
    }

    async fn fetch_messages(
        &self,
        container: &FetchedContainer,
        guild_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<FetchedMessage>> {
        let mut after = since.map(timestamp_to_snowflake).unwrap_or(0);
        let mut all = Vec::new();

        loop {
            let page = self
                .get_json(&format!(
                    "/channels/{}/messages?limit={PAGE_SIZE}&after={after}",
                    container.id
                ))
                .await?;

            let Some(entries) = page.as_array() else { break };
            if entries.is_empty() {
                break;
            }

            let page_len = entries.len();
            for raw in entries {
                if let Some(message) = self.parse_message(raw, guild_id, container) {
                    after = after.max(message.message_id.parse().unwrap_or(0));
                    all.push(message);
                }
            }

            if page_len < PAGE_SIZE as usize {
                break;
            }
        }

        Ok(all)
    }
}

fn push_thread(containers: &mut Vec<FetchedContainer>, thread: &Value, archived: bool) {
    if let Some(id) = thread.get("id").and_then(|id| id.as_str()) {
        containers.push(FetchedContainer {
            id: id.to_string(),
            is_thread: true,
            parent_channel_id: thread
                .get("parent_id")
                .and_then(|p| p.as_str())
                .map(str::to_string),
            name: thread.get("name").and_then(|n| n.as_str()).map(str::to_string),
            archived,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snowflake_roundtrip_preserves_second_precision() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let snowflake = timestamp_to_snowflake(ts);
        let recovered = snowflake_to_timestamp(&snowflake.to_string()).unwrap();
        assert_eq!(recovered.timestamp(), ts.timestamp());
    }

    fn fetcher() -> DiscordFetcher {
        DiscordFetcher::new("test-token".to_string())
    }

    #[test]
    fn thread_messages_carry_the_parent_channel_id_not_the_thread_id() {
        let container = FetchedContainer {
            id: "thread1".to_string(),
            is_thread: true,
            parent_channel_id: Some("channel1".to_string()),
            name: Some("discussion".to_string()),
            archived: false,
        };
        let raw = json!({ "id": "1000000000000000000", "type": 0, "content": "hi" });

        let message = fetcher().parse_message(&raw, "g1", &container).unwrap();
        assert_eq!(message.channel_id, "channel1");
        assert_eq!(message.thread_id, Some("thread1".to_string()));
        assert!(!message.is_top_level);
    }

    #[test]
    fn channel_messages_have_no_thread_id() {
        let container = FetchedContainer {
            id: "channel1".to_string(),
            is_thread: false,
            parent_channel_id: None,
            name: Some("general".to_string()),
            archived: false,
        };
        let raw = json!({ "id": "1000000000000000000", "type": 0, "content": "hi" });

        let message = fetcher().parse_message(&raw, "g1", &container).unwrap();
        assert_eq!(message.channel_id, "channel1");
        assert_eq!(message.thread_id, None);
    }

    #[test]
    fn thread_starter_message_is_marked_top_level() {
        let container = FetchedContainer {
            id: "thread1".to_string(),
            is_thread: true,
            parent_channel_id: Some("channel1".to_string()),
            name: None,
            archived: false,
        };
        let raw = json!({ "id": "1000000000000000000", "type": 21, "content": "original post" });

        let message = fetcher().parse_message(&raw, "g1", &container).unwrap();
        assert!(message.is_top_level);
    }
}
