// tests/embed_worker_test.rs
// Embedding-client collaborator contract (spec 4.3, 4.5), exercised against
// fakes rather than a live model endpoint or database.

use async_trait::async_trait;
use threadloom::llm::EmbeddingClient;

struct FakeEmbeddingClient {
    dim: usize,
}

#[async_trait]
impl EmbeddingClient for FakeEmbeddingClient {
    async fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(vec![text.len() as f32; self.dim])
    }

    async fn embed_window(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(vec![text.len() as f32; self.dim])
    }
}

struct AlwaysFailsEmbeddingClient;

#[async_trait]
impl EmbeddingClient for AlwaysFailsEmbeddingClient {
    async fn embed_query(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("embedding service unavailable")
    }

    async fn embed_window(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("embedding service unavailable")
    }
}

#[tokio::test]
async fn embed_window_returns_a_vector_of_the_configured_dimension() {
    let client = FakeEmbeddingClient { dim: 768 };
    let embedding = client.embed_window("some window text").await.unwrap();
    assert_eq!(embedding.len(), 768);
}

#[tokio::test]
async fn embedding_failure_surfaces_as_an_error_rather_than_an_empty_vector() {
    let client = AlwaysFailsEmbeddingClient;
    let result = client.embed_window("text").await;
    assert!(result.is_err());
}
