// src/api/mod.rs
// HTTP surface: the health endpoint from spec §6 plus a Prometheus
// /metrics endpoint (SPEC_FULL.md §D). The command surface itself (the
// chat-service slash-command dispatcher) is out of scope (spec §1) — it is
// a thin controller that calls into `intake::JobIntake`.

pub mod http;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use crate::metrics::metrics_handler;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(http::health::health_check))
        .route("/metrics", get(metrics_handler))
        .fallback(http::health::generic_banner)
        .with_state(state)
}
