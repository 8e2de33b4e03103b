// src/store/windows.rs
// message_windows: unique on (channel_id, date, window_seq), making
// re-chunking idempotent (spec 3, 8 invariant 3).

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::models::MessageWindow;
use super::Pool;
use crate::chunking::Window;

#[allow(clippy::too_many_arguments)]
pub async fn upsert_window(
    pool: &Pool,
    guild_id: &str,
    category_id: Option<&str>,
    channel_id: &str,
    thread_id: Option<&str>,
    date: NaiveDate,
    window: &Window,
) -> anyhow::Result<String> {
    let window_id = Uuid::new_v4().to_string();

    let row = sqlx::query(
        r#"
        INSERT INTO message_windows (
            window_id, guild_id, category_id, channel_id, thread_id, date, window_seq,
            message_ids, start_at, end_at, token_est, text
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (channel_id, date, window_seq) DO UPDATE SET
            message_ids = EXCLUDED.message_ids,
            start_at = EXCLUDED.start_at,
            end_at = EXCLUDED.end_at,
            token_est = EXCLUDED.token_est,
            text = EXCLUDED.text
        RETURNING window_id
        "#,
    )
    .bind(&window_id)
    .bind(guild_id)
    .bind(category_id)
    .bind(channel_id)
    .bind(thread_id)
    .bind(date)
    .bind(window.window_seq)
    .bind(&window.message_ids)
    .bind(window.start_at)
    .bind(window.end_at)
    .bind(window.token_est as i64)
    .bind(&window.text)
    .fetch_one(pool)
    .await?;

    Ok(row.get("window_id"))
}

pub async fn fetch_by_ids(
    pool: &Pool,
    window_ids: &[String],
) -> anyhow::Result<Vec<MessageWindow>> {
    if window_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query(
        r#"
        SELECT window_id, guild_id, category_id, channel_id, thread_id, date, window_seq,
               message_ids, start_at, end_at, token_est, text
        FROM message_windows
        WHERE window_id = ANY($1)
        "#,
    )
    .bind(window_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_window).collect())
}

pub async fn fetch_text(pool: &Pool, window_id: &str) -> anyhow::Result<Option<String>> {
    let row = sqlx::query("SELECT text FROM message_windows WHERE window_id = $1")
        .bind(window_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.and_then(|r| r.get::<Option<String>, _>("text")))
}

pub async fn fetch_message_ids(pool: &Pool, window_id: &str) -> anyhow::Result<Vec<String>> {
    let row = sqlx::query("SELECT message_ids FROM message_windows WHERE window_id = $1")
        .bind(window_id)
        .fetch_optional(pool)
        .await?;

    Ok(row
        .map(|r| r.get::<Vec<String>, _>("message_ids"))
        .unwrap_or_default())
}

fn row_to_window(row: sqlx::postgres::PgRow) -> MessageWindow {
    MessageWindow {
        window_id: row.get("window_id"),
        guild_id: row.get("guild_id"),
        category_id: row.get("category_id"),
        channel_id: row.get("channel_id"),
        thread_id: row.get("thread_id"),
        date: row.get("date"),
        window_seq: row.get("window_seq"),
        message_ids: row.get("message_ids"),
        start_at: row.get::<DateTime<Utc>, _>("start_at"),
        end_at: row.get::<DateTime<Utc>, _>("end_at"),
        token_est: row.get("token_est"),
        text: row.get("text"),
    }
}
