// src/store/messages.rs
// messages: upserted in batches by the sync runner's persist phase
// (spec 4.4 step 2). Edits overwrite by message_id.

use super::models::Message;
use super::Pool;

/// Upserts one batch on conflict key `message_id`. Callers retry the whole
/// batch on failure (spec 4.4: 3 attempts, exponential 2^attempt seconds);
/// this function itself does not retry.
pub async fn upsert_batch(pool: &Pool, messages: &[Message]) -> anyhow::Result<()> {
    if messages.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    for message in messages {
        sqlx::query(
            r#"
            INSERT INTO messages (
                message_id, guild_id, category_id, channel_id, thread_id, author_id,
                content_md, content_plain, created_at, edited_at, deleted_at, jump_link
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (message_id) DO UPDATE SET
                content_md = EXCLUDED.content_md,
                content_plain = EXCLUDED.content_plain,
                edited_at = EXCLUDED.edited_at,
                deleted_at = EXCLUDED.deleted_at,
                jump_link = EXCLUDED.jump_link
            "#,
        )
        .bind(&message.message_id)
        .bind(&message.guild_id)
        .bind(&message.category_id)
        .bind(&message.channel_id)
        .bind(&message.thread_id)
        .bind(&message.author_id)
        .bind(&message.content_md)
        .bind(&message.content_plain)
        .bind(message.created_at)
        .bind(message.edited_at)
        .bind(message.deleted_at)
        .bind(&message.jump_link)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Fetches `content_plain` for a set of message ids, preserving no
/// particular order — callers that need array order must re-sort (spec 4.5
/// step 1: "preserving the array order").
pub async fn fetch_content_by_ids(
    pool: &Pool,
    message_ids: &[String],
) -> anyhow::Result<std::collections::HashMap<String, String>> {
    if message_ids.is_empty() {
        return Ok(std::collections::HashMap::new());
    }

    let rows = sqlx::query(
        r#"
        SELECT message_id, content_plain
        FROM messages
        WHERE message_id = ANY($1) AND content_plain IS NOT NULL
        "#,
    )
    .bind(message_ids)
    .fetch_all(pool)
    .await?;

    use sqlx::Row;
    Ok(rows
        .into_iter()
        .map(|r| {
            let id: String = r.get("message_id");
            let content: String = r.get("content_plain");
            (id, content)
        })
        .collect())
}
