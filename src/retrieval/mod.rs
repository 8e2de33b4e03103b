// src/retrieval/mod.rs
// Retrieval & Answering (spec 4.6): embed the query, call the vector RPC,
// reconstruct ordering, optionally rerank, build a prompt, and invoke the
// generative model.

pub mod prompt;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::warn;

use crate::config::sync::RetrievalConfig;
use crate::error::PipelineError;
use crate::llm::rerank::{rerank_with_fallback, RerankCandidate};
use crate::llm::{EmbeddingClient, GenerationRequest, GenerativeProvider, Reranker};
use crate::store::models::MessageWindow;
use crate::store::{vector, windows, Pool};

const NO_CONTEXT_ANSWER: &str =
    "このサーバーにはまだ同期済みの会話データがありません。`sync` コマンドで同期を実行してから、もう一度お試しください。";
const CHAT_BASE_URL: &str = "https://discord.com";

pub struct RetrievalRequest {
    pub guild_id: String,
    pub channel_id: String,
    pub user_id: String,
    pub query: String,
}

#[derive(Debug, Clone)]
pub struct Citation {
    pub label: String,
    pub jump_link: String,
}

pub struct AnswerResult {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub latency_ms: u64,
}

pub struct RetrievalService {
    pool: Pool,
    embedding_client: Arc<dyn EmbeddingClient>,
    reranker: Arc<dyn Reranker>,
    reranker_enabled: bool,
    rerank_top_k: usize,
    generative: Arc<dyn GenerativeProvider>,
    config: RetrievalConfig,
}

impl RetrievalService {
    pub fn new(
        pool: Pool,
        embedding_client: Arc<dyn EmbeddingClient>,
        reranker: Arc<dyn Reranker>,
        reranker_enabled: bool,
        rerank_top_k: usize,
        generative: Arc<dyn GenerativeProvider>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            pool,
            embedding_client,
            reranker,
            reranker_enabled,
            rerank_top_k,
            generative,
            config,
        }
    }

    pub async fn answer(&self, request: RetrievalRequest) -> anyhow::Result<AnswerResult> {
        let started = Instant::now();

        let query_embedding = self.embedding_client.embed_query(&request.query).await?;

        let matches = vector::match_windows_in_guild(
            &self.pool,
            &query_embedding,
            &request.guild_id,
            self.config.vector_rpc_limit as i64,
        )
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "vector RPC failed, returning empty candidate set");
            Vec::new()
        });

        if matches.is_empty() {
            crate::metrics::record_retrieval(started.elapsed().as_secs_f64(), false);
            return Ok(AnswerResult {
                answer: NO_CONTEXT_ANSWER.to_string(),
                citations: Vec::new(),
                latency_ms: started.elapsed().as_millis() as u64,
            });
        }

        let window_ids: Vec<String> = matches.iter().map(|m| m.window_id.clone()).collect();
        let rows = windows::fetch_by_ids(&self.pool, &window_ids).await?;
        let ordered = reconstruct_rpc_order(&matches, &rows, self.config.candidate_limit);

        if ordered.is_empty() {
            crate::metrics::record_retrieval(started.elapsed().as_secs_f64(), false);
            return Ok(AnswerResult {
                answer: NO_CONTEXT_ANSWER.to_string(),
                citations: Vec::new(),
                latency_ms: started.elapsed().as_millis() as u64,
            });
        }

        let selected = if self.reranker_enabled {
            let candidates: Vec<RerankCandidate> = ordered
                .iter()
                .enumerate()
                .map(|(i, w)| RerankCandidate {
                    index: i,
                    text: w.text.clone().unwrap_or_default(),
                })
                .collect();

            let top_indices = rerank_with_fallback(
                self.reranker.as_ref(),
                &request.query,
                &candidates,
                self.rerank_top_k,
            )
            .await;

            top_indices
                .into_iter()
                .filter_map(|i| ordered.get(i).copied())
                .collect::<Vec<_>>()
        } else {
            ordered.clone()
        };

        let prompt_text = prompt::build(&selected, &request.user_id, &request.query);

        let generation = self
            .generative
            .generate(GenerationRequest {
                prompt: prompt_text,
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                max_output_tokens: self.config.max_output_tokens,
            })
            .await
            .map_err(|e| PipelineError::chat_failed(e.to_string()))?;

        let citations = selected
            .iter()
            .take(self.config.citation_count)
            .enumerate()
            .map(|(i, w)| Citation {
                label: format!("[#{}] {}", i + 1, w.start_at.to_rfc3339()),
                jump_link: format!(
                    "{CHAT_BASE_URL}/channels/{}/{}/{}",
                    w.guild_id,
                    w.channel_id,
                    w.message_ids.first().cloned().unwrap_or_default()
                ),
            })
            .collect();

        crate::metrics::record_retrieval(started.elapsed().as_secs_f64(), true);

        Ok(AnswerResult {
            answer: generation.text,
            citations,
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }
}

/// Reconstructs the RPC's similarity ordering over the fetched rows,
/// dropping any match whose window row is missing (referential drift,
/// spec 4.6 step 3), then truncates to `limit`.
fn reconstruct_rpc_order<'a>(
    matches: &[vector::VectorMatch],
    rows: &'a [MessageWindow],
    limit: usize,
) -> Vec<&'a MessageWindow> {
    let by_id: HashMap<&str, &MessageWindow> =
        rows.iter().map(|w| (w.window_id.as_str(), w)).collect();

    matches
        .iter()
        .filter_map(|m| by_id.get(m.window_id.as_str()).copied())
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn window(id: &str) -> MessageWindow {
        MessageWindow {
            window_id: id.to_string(),
            guild_id: "g1".to_string(),
            category_id: None,
            channel_id: "c1".to_string(),
            thread_id: None,
            date: Utc::now().date_naive(),
            window_seq: 1,
            message_ids: vec!["m1".to_string()],
            start_at: Utc::now(),
            end_at: Utc::now(),
            token_est: Some(10),
            text: Some("hello".to_string()),
        }
    }

    fn vmatch(id: &str) -> vector::VectorMatch {
        vector::VectorMatch {
            window_id: id.to_string(),
            similarity: 0.9,
        }
    }

    #[test]
    fn preserves_rpc_order_over_row_fetch_order() {
        let matches = vec![vmatch("b"), vmatch("a"), vmatch("c")];
        // Rows come back in an unrelated order (e.g. primary-key order).
        let rows = vec![window("a"), window("b"), window("c")];

        let ordered = reconstruct_rpc_order(&matches, &rows, 10);
        let ids: Vec<&str> = ordered.iter().map(|w| w.window_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn drops_matches_with_no_corresponding_row() {
        let matches = vec![vmatch("a"), vmatch("missing"), vmatch("c")];
        let rows = vec![window("a"), window("c")];

        let ordered = reconstruct_rpc_order(&matches, &rows, 10);
        let ids: Vec<&str> = ordered.iter().map(|w| w.window_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn truncates_to_limit() {
        let matches = vec![vmatch("a"), vmatch("b"), vmatch("c")];
        let rows = vec![window("a"), window("b"), window("c")];

        let ordered = reconstruct_rpc_order(&matches, &rows, 2);
        assert_eq!(ordered.len(), 2);
    }
}
