// src/store/models.rs
// Row types for the entities in spec 3 and 6. These are plain data; query
// logic lives alongside each entity's module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub channel_id: String,
    pub guild_id: String,
    pub category_id: Option<String>,
    pub name: Option<String>,
    pub channel_type: Option<String>,
    pub last_scanned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub thread_id: String,
    pub guild_id: String,
    pub channel_id: String,
    pub name: Option<String>,
    pub archived: bool,
    pub last_scanned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub guild_id: String,
    pub category_id: Option<String>,
    pub channel_id: String,
    pub thread_id: Option<String>,
    pub author_id: Option<String>,
    pub content_md: Option<String>,
    pub content_plain: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub jump_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageWindow {
    pub window_id: String,
    pub guild_id: String,
    pub category_id: Option<String>,
    pub channel_id: String,
    pub thread_id: Option<String>,
    pub date: chrono::NaiveDate,
    pub window_seq: i64,
    pub message_ids: Vec<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub token_est: Option<i64>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEmbedding {
    pub window_id: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Ready,
    Done,
    Failed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for QueueStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ready" => Ok(Self::Ready),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            other => Err(anyhow::anyhow!("unknown embed_queue status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedQueueRow {
    pub id: String,
    pub window_id: String,
    pub priority: i32,
    pub status: String,
    pub attempts: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncScope {
    Guild,
    Channel,
    Thread,
}

impl SyncScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guild => "guild",
            Self::Channel => "channel",
            Self::Thread => "thread",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Full,
    Delta,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Delta => "delta",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncProgress {
    pub processed: i32,
    pub total: i32,
    pub message: String,
}

impl Default for SyncProgress {
    fn default() -> Self {
        Self {
            processed: 0,
            total: 0,
            message: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOperation {
    pub id: String,
    pub guild_id: String,
    pub scope: String,
    pub mode: String,
    pub target_ids: Option<Vec<String>>,
    pub since: Option<DateTime<Utc>>,
    pub requested_by: Option<String>,
    pub status: String,
    pub progress: SyncProgress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncCursor {
    pub guild_id: String,
    pub last_message_id: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
}
