// src/llm/mod.rs
// Embedding, generative, and rerank collaborators (spec 4.3, 4.6). Each is
// a trait so the sync runner, embed worker, and retrieval path can be
// exercised against fakes in tests (spec 9: "Dependency injection").

pub mod embeddings;
pub mod generative;
pub mod rerank;

pub use embeddings::{EmbeddingClient, GeminiEmbeddingClient};
pub use generative::{GenerativeProvider, GeminiGenerativeProvider, GenerationRequest, GenerationResult};
pub use rerank::{NoneReranker, Reranker};
