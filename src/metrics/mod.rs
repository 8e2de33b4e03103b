// src/metrics/mod.rs
// Prometheus metrics for threadloom's sync/embed/retrieval pipeline.

use axum::{http::StatusCode, response::IntoResponse};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing::info;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn init_metrics() {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    PROMETHEUS_HANDLE
        .set(handle)
        .expect("Prometheus handle already initialized");

    info!("Prometheus metrics initialized");
}

/// GET /metrics
pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics not initialized".to_string(),
        ),
    }
}

pub fn record_sync_job(status: &str) {
    counter!("threadloom_sync_jobs_total", "status" => status.to_string()).increment(1);
}

pub fn record_sync_job_duration(duration_seconds: f64) {
    histogram!("threadloom_sync_job_duration_seconds").record(duration_seconds);
}

pub fn record_embed_attempt(outcome: &str) {
    counter!("threadloom_embed_attempts_total", "outcome" => outcome.to_string()).increment(1);
}

pub fn set_embed_queue_depth(guild_id: &str, depth: i64) {
    gauge!("threadloom_embed_queue_depth", "guild" => guild_id.to_string()).set(depth as f64);
}

pub fn record_retrieval(duration_seconds: f64, had_context: bool) {
    let outcome = if had_context { "answered" } else { "no_context" };
    counter!("threadloom_retrieval_total", "outcome" => outcome.to_string()).increment(1);
    histogram!("threadloom_retrieval_duration_seconds").record(duration_seconds);
}

pub fn record_rerank_fallback() {
    counter!("threadloom_rerank_fallback_total").increment(1);
}
