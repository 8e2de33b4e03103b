// src/main.rs
// threadloom entrypoint: loads config, connects the store, wires the
// Sync Orchestrator / Embed Worker / Retrieval collaborators, starts the
// background task manager, and serves the health/metrics HTTP surface.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use threadloom::api;
use threadloom::chunking::ChunkingEngine;
use threadloom::config::Config;
use threadloom::embed_worker::EmbedWorker;
use threadloom::fetch::DiscordFetcher;
use threadloom::intake::JobIntake;
use threadloom::llm::embeddings::GeminiEmbeddingClient;
use threadloom::llm::generative::GeminiGenerativeProvider;
use threadloom::llm::rerank::{CohereReranker, NoneReranker, Reranker};
use threadloom::metrics::init_metrics;
use threadloom::retrieval::RetrievalService;
use threadloom::state::AppState;
use threadloom::store;
use threadloom::sync::SyncRunner;
use threadloom::tasks::TaskManager;
use threadloom::tokens::precise::GeminiTokenCounter;
use threadloom::tokens::TokenCounter;

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.logging.level.clone()))
        .init();

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "bootstrap validation failed");
        std::process::exit(1);
    }

    let config = Arc::new(config);

    let pool = match store::connect(&config.datastore.database_url, config.datastore.max_connections).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect to the data store");
            std::process::exit(1);
        }
    };

    init_metrics();

    let http_client = reqwest::Client::new();

    let precise_counter = Arc::new(GeminiTokenCounter::new(
        http_client.clone(),
        config.llm.api_keys.clone(),
        config.llm.chat_model.clone(),
    ));
    let token_counter = Arc::new(TokenCounter::new(precise_counter, config.tokens.clone()));

    let chunker = ChunkingEngine::new(config.chunking.clone());

    let embedding_client: Arc<dyn threadloom::llm::EmbeddingClient> = Arc::new(GeminiEmbeddingClient::new(
        http_client.clone(),
        config.llm.api_keys.clone(),
        config.llm.embedding_model.clone(),
        config.llm.embedding_dim,
    ));

    let reranker: Arc<dyn Reranker> = if config.rerank.enabled() {
        match config.rerank.provider.as_str() {
            "cohere" => Arc::new(CohereReranker::new(
                http_client.clone(),
                config.rerank.cohere_api_key.clone(),
                config.rerank.model.clone(),
            )),
            other => {
                tracing::warn!(provider = other, "unknown RERANK_PROVIDER, disabling rerank");
                Arc::new(NoneReranker)
            }
        }
    } else {
        Arc::new(NoneReranker)
    };

    let generative = Arc::new(GeminiGenerativeProvider::new(
        http_client.clone(),
        config.llm.api_keys.clone(),
        config.llm.chat_model.clone(),
    ));

    let fetcher: Arc<dyn threadloom::fetch::ChatFetcher> =
        Arc::new(DiscordFetcher::new(config.discord.token.clone()));

    let sync_runner = Arc::new(SyncRunner::new(
        pool.clone(),
        fetcher,
        chunker,
        token_counter.clone(),
        config.sync.clone(),
    ));

    let embed_worker = Arc::new(EmbedWorker::new(
        pool.clone(),
        embedding_client.clone(),
        token_counter,
        config.embed_worker.clone(),
    ));

    let retrieval = Arc::new(RetrievalService::new(
        pool.clone(),
        embedding_client,
        reranker,
        config.rerank.enabled(),
        config.rerank.top_k,
        generative,
        config.retrieval.clone(),
    ));

    let intake = Arc::new(JobIntake::new(pool.clone(), retrieval));

    let app_state = Arc::new(AppState::new(
        config.clone(),
        pool,
        sync_runner,
        embed_worker,
        intake,
    ));

    let mut task_manager = TaskManager::new(app_state.clone());
    task_manager.start().await;

    let router = api::router(app_state.clone());
    let listener = match tokio::net::TcpListener::bind(config.bind_address()).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, address = %config.bind_address(), "failed to bind health endpoint");
            std::process::exit(1);
        }
    };

    tracing::info!(address = %config.bind_address(), "threadloom listening");

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    if let Err(e) = axum::serve(listener, router).with_graceful_shutdown(shutdown).await {
        tracing::error!(error = %e, "health server exited with an error");
    }

    task_manager.shutdown().await;
}
