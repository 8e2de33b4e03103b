// src/store/vector.rs
// message_embeddings + the match_windows_in_guild RPC (spec 6). The vector
// column is a 3072-dimension half-precision embedding; the HNSW index and
// the RPC itself are assumed to already exist in the schema.

use chrono::Utc;
use pgvector::HalfVector;
use sqlx::Row;

use super::Pool;

/// One row of the RPC's result, ordered by ascending cosine distance
/// (`similarity = 1 - cosine_distance`, spec 4.6 step 2).
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub window_id: String,
    pub similarity: f64,
}

pub async fn upsert_embedding(pool: &Pool, window_id: &str, embedding: &[f32]) -> anyhow::Result<()> {
    let vector = HalfVector::from(embedding.to_vec());

    sqlx::query(
        r#"
        INSERT INTO message_embeddings (window_id, embedding, updated_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (window_id) DO UPDATE SET
            embedding = EXCLUDED.embedding,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(window_id)
    .bind(vector)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Calls the `match_windows_in_guild` RPC (spec 6). Read-only, stable.
pub async fn match_windows_in_guild(
    pool: &Pool,
    query_embedding: &[f32],
    guild_id: &str,
    limit: i64,
) -> anyhow::Result<Vec<VectorMatch>> {
    let vector = HalfVector::from(query_embedding.to_vec());

    let rows = sqlx::query(
        "SELECT window_id, similarity FROM match_windows_in_guild($1, $2, $3)",
    )
    .bind(vector)
    .bind(guild_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| VectorMatch {
            window_id: r.get("window_id"),
            similarity: r.get("similarity"),
        })
        .collect())
}
