// src/store/cursors.rs
// sync_cursors: per-guild delta-mode bookmark, updated at successful job
// completion (spec 3, 4.4 phase 5).

use chrono::{DateTime, Utc};
use sqlx::Row;

use super::models::SyncCursor;
use super::Pool;

pub async fn get(pool: &Pool, guild_id: &str) -> anyhow::Result<Option<SyncCursor>> {
    let row = sqlx::query(
        "SELECT guild_id, last_message_id, last_synced_at FROM sync_cursors WHERE guild_id = $1",
    )
    .bind(guild_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| SyncCursor {
        guild_id: r.get("guild_id"),
        last_message_id: r.get("last_message_id"),
        last_synced_at: r.get("last_synced_at"),
    }))
}

/// Upserts the cursor. Callers must pass the max `created_at` across
/// fetched messages, not the last array element, to avoid the
/// fan-out-order non-determinism flagged in spec 9.
pub async fn upsert(
    pool: &Pool,
    guild_id: &str,
    last_message_id: &str,
    last_synced_at: DateTime<Utc>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sync_cursors (guild_id, last_message_id, last_synced_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (guild_id) DO UPDATE SET
            last_message_id = EXCLUDED.last_message_id,
            last_synced_at = EXCLUDED.last_synced_at
        "#,
    )
    .bind(guild_id)
    .bind(last_message_id)
    .bind(last_synced_at)
    .execute(pool)
    .await?;

    Ok(())
}
