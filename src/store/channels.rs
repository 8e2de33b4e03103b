// src/store/channels.rs
// channels / threads: upserted on observation, never hard-deleted (spec 3).

use chrono::Utc;
use sqlx::Row;

use super::Pool;

pub async fn upsert_channel(
    pool: &Pool,
    channel_id: &str,
    guild_id: &str,
    category_id: Option<&str>,
    name: Option<&str>,
    channel_type: Option<&str>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO channels (channel_id, guild_id, category_id, name, type, last_scanned_at, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $6)
        ON CONFLICT (channel_id) DO UPDATE SET
            category_id = EXCLUDED.category_id,
            name = EXCLUDED.name,
            type = EXCLUDED.type,
            last_scanned_at = EXCLUDED.last_scanned_at
        "#,
    )
    .bind(channel_id)
    .bind(guild_id)
    .bind(category_id)
    .bind(name)
    .bind(channel_type)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn upsert_thread(
    pool: &Pool,
    thread_id: &str,
    guild_id: &str,
    channel_id: &str,
    name: Option<&str>,
    archived: bool,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO threads (thread_id, guild_id, channel_id, name, archived, last_scanned_at, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $6)
        ON CONFLICT (thread_id) DO UPDATE SET
            name = EXCLUDED.name,
            archived = EXCLUDED.archived,
            last_scanned_at = EXCLUDED.last_scanned_at
        "#,
    )
    .bind(thread_id)
    .bind(guild_id)
    .bind(channel_id)
    .bind(name)
    .bind(archived)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Active + archived thread ids registered for a channel, used by the fetch
/// fan-out (spec 4.4 step 1).
pub async fn list_thread_ids(pool: &Pool, channel_id: &str) -> anyhow::Result<Vec<String>> {
    let rows = sqlx::query("SELECT thread_id FROM threads WHERE channel_id = $1")
        .bind(channel_id)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(|r| r.get("thread_id")).collect())
}
