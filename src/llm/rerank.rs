// src/llm/rerank.rs
// Rerank collaborator (spec 4.6 step 4). `RERANK_PROVIDER = none` disables
// the step; any other provider re-scores up to 15 candidates and returns
// its top-K. Rerank errors fall back to slice-top-K, never to a hard
// failure — the retrieval path always has an ordering to answer from.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RerankCandidate {
    pub index: usize,
    pub text: String,
}

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Returns indices into `candidates`, most relevant first, truncated to
    /// `top_k`. Implementations should never panic — any internal failure
    /// should be surfaced as an `Err` so the caller can fall back.
    async fn rerank(
        &self,
        query: &str,
        candidates: &[RerankCandidate],
        top_k: usize,
    ) -> anyhow::Result<Vec<usize>>;
}

/// The default no-op reranker: preserves vector-similarity order, simply
/// truncating to `top_k`.
pub struct NoneReranker;

#[async_trait]
impl Reranker for NoneReranker {
    async fn rerank(
        &self,
        _query: &str,
        candidates: &[RerankCandidate],
        top_k: usize,
    ) -> anyhow::Result<Vec<usize>> {
        Ok(candidates.iter().take(top_k).map(|c| c.index).collect())
    }
}

/// Cohere-style rerank collaborator: re-scores candidates against the
/// query and returns indices ordered by descending relevance.
pub struct CohereReranker {
    client: Client,
    api_key: String,
    model: String,
}

impl CohereReranker {
    pub fn new(client: Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
        }
    }
}

#[derive(serde::Deserialize)]
struct CohereRerankResponse {
    results: Vec<CohereRerankResult>,
}

#[derive(serde::Deserialize)]
struct CohereRerankResult {
    index: usize,
    #[allow(dead_code)]
    relevance_score: f32,
}

#[async_trait]
impl Reranker for CohereReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: &[RerankCandidate],
        top_k: usize,
    ) -> anyhow::Result<Vec<usize>> {
        if self.api_key.is_empty() {
            anyhow::bail!("no Cohere API key configured");
        }

        let documents: Vec<&str> = candidates.iter().map(|c| c.text.as_str()).collect();
        let body = json!({
            "model": self.model,
            "query": query,
            "documents": documents,
            "top_n": top_k,
        });

        let response = self
            .client
            .post("https://api.cohere.com/v2/rerank")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Cohere rerank error {status}: {text}");
        }

        let parsed: CohereRerankResponse = response.json().await?;
        Ok(parsed
            .results
            .into_iter()
            .map(|r| candidates[r.index].index)
            .collect())
    }
}

/// Applies `reranker` to `candidates`, falling back to slice-top-K on any
/// error (spec 4.6: "fall back to slice-top-K on any rerank error").
pub async fn rerank_with_fallback(
    reranker: &dyn Reranker,
    query: &str,
    candidates: &[RerankCandidate],
    top_k: usize,
) -> Vec<usize> {
    match reranker.rerank(query, candidates, top_k).await {
        Ok(indices) => indices,
        Err(e) => {
            warn!("rerank failed, falling back to vector order: {e}");
            crate::metrics::record_rerank_fallback();
            candidates.iter().take(top_k).map(|c| c.index).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(n: usize) -> Vec<RerankCandidate> {
        (0..n)
            .map(|i| RerankCandidate {
                index: i,
                text: format!("candidate {i}"),
            })
            .collect()
    }

    #[tokio::test]
    async fn none_reranker_preserves_order_and_truncates() {
        let reranker = NoneReranker;
        let cands = candidates(10);
        let result = reranker.rerank("query", &cands, 5).await.unwrap();
        assert_eq!(result, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn fallback_helper_preserves_order_on_error() {
        struct AlwaysFails;
        #[async_trait]
        impl Reranker for AlwaysFails {
            async fn rerank(
                &self,
                _q: &str,
                _c: &[RerankCandidate],
                _k: usize,
            ) -> anyhow::Result<Vec<usize>> {
                anyhow::bail!("boom")
            }
        }

        let cands = candidates(8);
        let result = rerank_with_fallback(&AlwaysFails, "q", &cands, 3).await;
        assert_eq!(result, vec![0, 1, 2]);
    }
}
