// src/fetch/mod.rs
// Chat-service fetch collaborator. The fetcher's own HTTP/gateway
// primitives are out of scope (spec 1: "deliberately out of scope") — only
// the interface the Sync Orchestrator depends on is specified here, so the
// core pipeline can be tested against a fake (spec 9: dependency injection).

pub mod discord;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use discord::DiscordFetcher;

/// One message as returned by the chat service, before persistence.
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    pub message_id: String,
    pub guild_id: String,
    pub channel_id: String,
    pub thread_id: Option<String>,
    pub author_id: Option<String>,
    pub content_md: Option<String>,
    pub content_plain: Option<String>,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub jump_link: Option<String>,
    pub is_top_level: bool,
}

/// One container (channel or thread) discovered during fan-out.
#[derive(Debug, Clone)]
pub struct FetchedContainer {
    pub id: String,
    pub is_thread: bool,
    pub parent_channel_id: Option<String>,
    pub name: Option<String>,
    pub archived: bool,
}

/// Progress callback signature used during fetch fan-out (spec 4.4 step 1):
/// `(completed_containers, total_containers, phase_label)`.
pub type FetchProgress<'a> = dyn Fn(usize, usize, &str) + Send + Sync + 'a;

#[async_trait]
pub trait ChatFetcher: Send + Sync {
    /// Lists the containers (channels, and active + archived threads) to
    /// fan out over for a guild-scope sync.
    async fn fetch_containers(&self, guild_id: &str) -> anyhow::Result<Vec<FetchedContainer>>;

    /// Fetches messages for one container, optionally bounded below by
    /// `since` (delta mode). Returns an empty list on a per-thread timeout
    /// rather than propagating an error (spec 4.4: "Cancellation &
    /// timeouts"). Takes the full container (not just its id) so an
    /// implementation can tell a thread from a channel and set
    /// `channel_id`/`thread_id` on the returned messages accordingly (spec
    /// 3: "`channel_id` is never null; `thread_id` may be set when the
    /// message belongs to a thread whose parent is `channel_id`"). Takes
    /// `guild_id` separately since `FetchedContainer` doesn't carry it, and
    /// a jump link needs the guild segment.
    async fn fetch_messages(
        &self,
        container: &FetchedContainer,
        guild_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<FetchedMessage>>;
}

#[cfg(any(test, feature = "test-fakes"))]
pub mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory fetcher for tests: containers and their messages are
    /// preloaded, `fetch_messages` is pure.
    pub struct FakeChatFetcher {
        pub containers: Vec<FetchedContainer>,
        pub messages: Mutex<HashMap<String, Vec<FetchedMessage>>>,
    }

    impl FakeChatFetcher {
        pub fn new(containers: Vec<FetchedContainer>, messages: HashMap<String, Vec<FetchedMessage>>) -> Self {
            Self {
                containers,
                messages: Mutex::new(messages),
            }
        }
    }

    #[async_trait]
    impl ChatFetcher for FakeChatFetcher {
        async fn fetch_containers(&self, _guild_id: &str) -> anyhow::Result<Vec<FetchedContainer>> {
            Ok(self.containers.clone())
        }

        async fn fetch_messages(
            &self,
            container: &FetchedContainer,
            _guild_id: &str,
            since: Option<DateTime<Utc>>,
        ) -> anyhow::Result<Vec<FetchedMessage>> {
            let messages = self.messages.lock().unwrap();
            let all = messages.get(&container.id).cloned().unwrap_or_default();
            Ok(match since {
                Some(cutoff) => all.into_iter().filter(|m| m.created_at > cutoff).collect(),
                None => all,
            })
        }
    }
}
