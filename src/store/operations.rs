// src/store/operations.rs
// sync_operations: job claim-and-run semantics. The status transition
// queued -> running must be conditional on the row still being queued, so
// a losing updater (in a multi-runner deployment) skips the job (spec 4.4).

use chrono::Utc;
use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

use super::models::{SyncOperation, SyncProgress};
use super::Pool;

#[allow(clippy::too_many_arguments)]
pub async fn enqueue(
    pool: &Pool,
    guild_id: &str,
    scope: &str,
    mode: &str,
    target_ids: Option<&[String]>,
    since: Option<chrono::DateTime<Utc>>,
    requested_by: Option<&str>,
) -> anyhow::Result<SyncOperation> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let progress = SyncProgress::default();
    let progress_json = serde_json::to_value(&progress)?;

    sqlx::query(
        r#"
        INSERT INTO sync_operations (
            id, guild_id, scope, mode, target_ids, since, requested_by, status, progress, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'queued', $8, $9, $9)
        "#,
    )
    .bind(&id)
    .bind(guild_id)
    .bind(scope)
    .bind(mode)
    .bind(target_ids)
    .bind(since)
    .bind(requested_by)
    .bind(&progress_json)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(SyncOperation {
        id,
        guild_id: guild_id.to_string(),
        scope: scope.to_string(),
        mode: mode.to_string(),
        target_ids: target_ids.map(|t| t.to_vec()),
        since,
        requested_by: requested_by.map(|s| s.to_string()),
        status: "queued".to_string(),
        progress,
        created_at: now,
        updated_at: now,
    })
}

/// Polls for the oldest `queued` row and conditionally transitions it to
/// `running`. Returns `None` if no queued row exists or a concurrent
/// claimer won the race.
pub async fn claim_next(pool: &Pool) -> anyhow::Result<Option<SyncOperation>> {
    let candidate = sqlx::query(
        r#"
        SELECT id FROM sync_operations
        WHERE status = 'queued'
        ORDER BY created_at ASC
        LIMIT 1
        "#,
    )
    .fetch_optional(pool)
    .await?;

    let Some(candidate) = candidate else {
        return Ok(None);
    };
    let id: String = candidate.get("id");

    let row = sqlx::query(
        r#"
        UPDATE sync_operations
        SET status = 'running', updated_at = $2
        WHERE id = $1 AND status = 'queued'
        RETURNING id, guild_id, scope, mode, target_ids, since, requested_by, status, progress, created_at, updated_at
        "#,
    )
    .bind(&id)
    .bind(Utc::now())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(row_to_operation))
}

pub async fn update_progress(pool: &Pool, id: &str, progress: &SyncProgress) -> anyhow::Result<()> {
    let progress_json = serde_json::to_value(progress)?;
    sqlx::query("UPDATE sync_operations SET progress = $2, updated_at = $3 WHERE id = $1")
        .bind(id)
        .bind(progress_json)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn complete(pool: &Pool, id: &str) -> anyhow::Result<()> {
    let progress = SyncProgress {
        processed: 100,
        total: 100,
        message: "completed".to_string(),
    };
    let progress_json = serde_json::to_value(&progress)?;
    sqlx::query(
        "UPDATE sync_operations SET status = 'completed', progress = $2, updated_at = $3 WHERE id = $1",
    )
    .bind(id)
    .bind(progress_json)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fail(pool: &Pool, id: &str, error_message: &str) -> anyhow::Result<()> {
    let row = sqlx::query("SELECT progress FROM sync_operations WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    let mut progress: SyncProgress = row
        .and_then(|r| r.get::<Option<Value>, _>("progress"))
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    progress.message = error_message.to_string();

    let progress_json = serde_json::to_value(&progress)?;
    sqlx::query(
        "UPDATE sync_operations SET status = 'failed', progress = $2, updated_at = $3 WHERE id = $1",
    )
    .bind(id)
    .bind(progress_json)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get(pool: &Pool, id: &str) -> anyhow::Result<Option<SyncOperation>> {
    let row = sqlx::query(
        r#"
        SELECT id, guild_id, scope, mode, target_ids, since, requested_by, status, progress, created_at, updated_at
        FROM sync_operations
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(row_to_operation))
}

/// Startup sweep: resets `running` jobs older than `stale_after_minutes`
/// back to `queued`. Resolves the crash-recovery open question (spec 9) —
/// there is no lease/heartbeat, so a restart cannot distinguish a dead
/// runner from a slow one; we accept re-running a job that was actually
/// still in flight as the safer failure mode (duplicate work is idempotent
/// via the unique constraints in spec 3, abandoned jobs are not).
pub async fn sweep_stale_running(pool: &Pool, stale_after_minutes: i64) -> anyhow::Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE sync_operations
        SET status = 'queued', updated_at = $1
        WHERE status = 'running' AND updated_at < $1 - make_interval(mins => $2)
        "#,
    )
    .bind(Utc::now())
    .bind(stale_after_minutes as i32)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

fn row_to_operation(row: sqlx::postgres::PgRow) -> SyncOperation {
    let progress_json: Value = row.get("progress");
    let progress: SyncProgress = serde_json::from_value(progress_json).unwrap_or_default();

    SyncOperation {
        id: row.get("id"),
        guild_id: row.get("guild_id"),
        scope: row.get("scope"),
        mode: row.get("mode"),
        target_ids: row.get("target_ids"),
        since: row.get("since"),
        requested_by: row.get("requested_by"),
        status: row.get("status"),
        progress,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
