// src/store/queue.rs
// embed_queue: a durable FIFO+priority queue of windows awaiting vector
// computation (spec 3, 4.5). The Embed Worker exclusively mutates
// embed_queue.status; the Sync Orchestrator only inserts rows.

use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use super::models::EmbedQueueRow;
use super::Pool;

/// Inserts one row per newly created window, `priority = 0`,
/// `status = ready`. `window_id` is UNIQUE so a window is queued at most
/// once — duplicate inserts are ignored (spec 4.4 step 3).
pub async fn insert_ready(pool: &Pool, window_ids: &[String]) -> anyhow::Result<()> {
    if window_ids.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for window_id in window_ids {
        sqlx::query(
            r#"
            INSERT INTO embed_queue (id, window_id, priority, status, attempts, updated_at)
            VALUES ($1, $2, 0, 'ready', 0, $3)
            ON CONFLICT (window_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(window_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(())
}

/// Selects up to `batch_size` ready rows, ordered by `priority DESC,
/// updated_at ASC` (spec 4.5 step 1). There is a single Embed Worker per
/// process (spec 5); this does not guard against concurrent claimers.
pub async fn claim_batch(pool: &Pool, batch_size: i64) -> anyhow::Result<Vec<EmbedQueueRow>> {
    let rows = sqlx::query(
        r#"
        SELECT id, window_id, priority, status, attempts, updated_at
        FROM embed_queue
        WHERE status = 'ready'
        ORDER BY priority DESC, updated_at ASC
        LIMIT $1
        "#,
    )
    .bind(batch_size)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| EmbedQueueRow {
            id: r.get("id"),
            window_id: r.get("window_id"),
            priority: r.get("priority"),
            status: r.get("status"),
            attempts: r.get("attempts"),
            updated_at: r.get("updated_at"),
        })
        .collect())
}

pub async fn mark_done(pool: &Pool, id: &str) -> anyhow::Result<()> {
    sqlx::query("UPDATE embed_queue SET status = 'done', updated_at = $2 WHERE id = $1")
        .bind(id)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(())
}

/// Marks a row terminally failed regardless of attempt count (used when the
/// window has no resolvable text — spec 4.5 step 1, terminal).
pub async fn mark_failed(pool: &Pool, id: &str) -> anyhow::Result<()> {
    sqlx::query("UPDATE embed_queue SET status = 'failed', updated_at = $2 WHERE id = $1")
        .bind(id)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(())
}

/// Increments `attempts`; if the result reaches `max_attempts`, transitions
/// to `failed`, otherwise stays `ready` for a later retry (spec 4.5
/// "Failure policy").
pub async fn record_attempt_and_maybe_fail(
    pool: &Pool,
    id: &str,
    max_attempts: i32,
) -> anyhow::Result<bool> {
    let row = sqlx::query(
        r#"
        UPDATE embed_queue
        SET attempts = attempts + 1,
            status = CASE WHEN attempts + 1 >= $2 THEN 'failed' ELSE 'ready' END,
            updated_at = $3
        WHERE id = $1
        RETURNING status
        "#,
    )
    .bind(id)
    .bind(max_attempts)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    let status: String = row.get("status");
    Ok(status == "failed")
}

/// Counts `ready` rows whose window belongs to `guild_id`, batching the
/// `IN` lookup by up to 500 ids at a time is unnecessary here since the
/// join runs server-side; the 500-id batching in spec 4.4 step 4 applies
/// to the windows fetched for a specific set of ids, not this count.
pub async fn count_ready_for_guild(pool: &Pool, guild_id: &str) -> anyhow::Result<i64> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS n
        FROM embed_queue eq
        JOIN message_windows mw ON mw.window_id = eq.window_id
        WHERE mw.guild_id = $1 AND eq.status = 'ready'
        "#,
    )
    .bind(guild_id)
    .fetch_one(pool)
    .await?;

    Ok(row.get("n"))
}
