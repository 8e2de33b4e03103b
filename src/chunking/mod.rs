// src/chunking/mod.rs
// Chunking Engine (spec 4.2): single-pass, token-bounded windowing with
// soft temporal/top-level breaks over one channel-date (or thread-date)
// partition.

use chrono::{DateTime, Utc};

use crate::config::chunking::ChunkingConfig;
use crate::tokens::TokenCounter;

/// One message as seen by the chunker. The engine only needs enough to
/// decide boundaries and concatenate text — persistence details live in
/// the `store` module.
#[derive(Debug, Clone)]
pub struct ChunkInput {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub is_top_level: bool,
}

/// An emitted window, ready for the caller to assign guild/channel/thread
/// context and persist.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub window_seq: i64,
    pub message_ids: Vec<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub token_est: usize,
    pub text: String,
    pub truncated: bool,
}

struct Buffer {
    messages: Vec<ChunkInput>,
    budget: usize,
}

impl Buffer {
    fn new() -> Self {
        Self {
            messages: Vec::new(),
            budget: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn push(&mut self, msg: ChunkInput, tokens: usize) {
        self.budget += tokens;
        self.messages.push(msg);
    }
}

pub struct ChunkingEngine {
    config: ChunkingConfig,
}

impl ChunkingEngine {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Runs the single-pass windowing algorithm over one partition's
    /// messages, already sorted ascending by `created_at`.
    pub async fn chunk(&self, messages: Vec<ChunkInput>, counter: &TokenCounter) -> Vec<Window> {
        let mut windows = Vec::new();
        let mut buffer = Buffer::new();
        let mut last_timestamp: Option<DateTime<Utc>> = None;
        let mut window_seq: i64 = 1;

        for message in messages {
            let tokens = counter.estimate(&message.content);
            let gap_minutes = last_timestamp
                .map(|last| (message.created_at - last).num_seconds() as f64 / 60.0)
                .unwrap_or(0.0);

            let would_overflow = buffer.budget + tokens > self.config.max_tokens_per_window;
            let soft_break =
                gap_minutes > self.config.soft_gap_minutes as f64 || message.is_top_level;

            if !buffer.is_empty() && (would_overflow || soft_break) {
                let emitted = self.flush(&mut buffer, window_seq, counter).await;
                windows.push(emitted);
                window_seq += 1;
            }

            last_timestamp = Some(message.created_at);
            buffer.push(message, tokens);
        }

        if !buffer.is_empty() {
            let emitted = self.flush(&mut buffer, window_seq, counter).await;
            windows.push(emitted);
        }

        windows
    }

    async fn flush(&self, buffer: &mut Buffer, window_seq: i64, counter: &TokenCounter) -> Window {
        let text = buffer
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let ensured = counter.ensure_within_limit(&text).await;

        let start_at = buffer.messages.first().expect("buffer non-empty").created_at;
        let end_at = buffer.messages.last().expect("buffer non-empty").created_at;
        let message_ids = buffer.messages.iter().map(|m| m.id.clone()).collect();

        let overlap = self.config.overlap_messages.min(buffer.messages.len());
        let carry: Vec<ChunkInput> = if overlap > 0 {
            buffer.messages[buffer.messages.len() - overlap..].to_vec()
        } else {
            Vec::new()
        };

        let window = Window {
            window_seq,
            message_ids,
            start_at,
            end_at,
            token_est: ensured.tokens,
            text: ensured.text,
            truncated: ensured.truncated,
        };

        buffer.messages = carry;
        buffer.budget = buffer
            .messages
            .iter()
            .map(|m| counter.estimate(&m.content))
            .sum();

        window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::precise::NoopPreciseCounter;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn ts(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(minute)
    }

    fn counter(max_tokens_per_window: usize) -> (ChunkingEngine, TokenCounter) {
        let engine = ChunkingEngine::new(ChunkingConfig {
            max_tokens_per_window,
            soft_gap_minutes: 5,
            overlap_messages: 0,
        });
        let tc = TokenCounter::new(
            Arc::new(NoopPreciseCounter),
            crate::config::chunking::TokenConfig {
                max_tokens: 1_000_000,
                safety_margin: 0,
            },
        );
        (engine, tc)
    }

    #[tokio::test]
    async fn soft_gap_break_splits_on_time_gap() {
        let (engine, tc) = counter(1200);
        let messages = vec![
            ChunkInput {
                id: "1".into(),
                content: "hello".into(),
                created_at: ts(0),
                is_top_level: false,
            },
            ChunkInput {
                id: "2".into(),
                content: "world".into(),
                created_at: ts(1),
                is_top_level: false,
            },
            ChunkInput {
                id: "3".into(),
                content: "later".into(),
                created_at: ts(10),
                is_top_level: false,
            },
        ];

        let windows = engine.chunk(messages, &tc).await;
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].message_ids, vec!["1", "2"]);
        assert_eq!(windows[1].message_ids, vec!["3"]);
        assert_eq!(windows[0].window_seq, 1);
        assert_eq!(windows[1].window_seq, 2);
    }

    #[tokio::test]
    async fn top_level_flag_forces_break() {
        let (engine, tc) = counter(1200);
        let messages = vec![
            ChunkInput {
                id: "1".into(),
                content: "hello".into(),
                created_at: ts(0),
                is_top_level: false,
            },
            ChunkInput {
                id: "2".into(),
                content: "world".into(),
                created_at: ts(1),
                is_top_level: true,
            },
        ];

        let windows = engine.chunk(messages, &tc).await;
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].message_ids, vec!["1"]);
        assert_eq!(windows[1].message_ids, vec!["2"]);
    }

    #[tokio::test]
    async fn ordering_is_ascending_and_window_seq_increments() {
        let (engine, tc) = counter(1200);
        let messages = (0..5)
            .map(|i| ChunkInput {
                id: i.to_string(),
                content: format!("msg {i}"),
                created_at: ts(i * 20),
                is_top_level: false,
            })
            .collect::<Vec<_>>();

        let windows = engine.chunk(messages, &tc).await;
        assert!(windows.len() > 1);
        for (idx, w) in windows.iter().enumerate() {
            assert_eq!(w.window_seq, (idx + 1) as i64);
            assert!(w.start_at <= w.end_at);
        }
    }

    #[tokio::test]
    async fn token_overflow_splits_buffer() {
        let (engine, tc) = counter(3);
        let messages = vec![
            ChunkInput {
                id: "1".into(),
                content: "one two three four five".into(),
                created_at: ts(0),
                is_top_level: false,
            },
            ChunkInput {
                id: "2".into(),
                content: "six seven eight nine ten".into(),
                created_at: ts(1),
                is_top_level: false,
            },
        ];

        let windows = engine.chunk(messages, &tc).await;
        assert_eq!(windows.len(), 2);
    }

    #[tokio::test]
    async fn idempotent_rechunking_is_byte_identical() {
        let (engine, tc) = counter(1200);
        let messages = vec![
            ChunkInput {
                id: "1".into(),
                content: "alpha".into(),
                created_at: ts(0),
                is_top_level: false,
            },
            ChunkInput {
                id: "2".into(),
                content: "beta".into(),
                created_at: ts(1),
                is_top_level: false,
            },
        ];

        let first = engine.chunk(messages.clone(), &tc).await;
        let second = engine.chunk(messages, &tc).await;
        assert_eq!(first, second);
    }
}
