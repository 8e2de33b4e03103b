// src/api/http/health.rs
// GET /healthz (spec §6): 200 "ok". Any other path falls back to a
// generic banner, also 200. A DB ping is attempted internally and logged
// on failure, but never changes the response — spec §6 defines no
// degraded-health status code, only the bootstrap-failure exit(1) path in
// `main`.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use tracing::warn;

use crate::state::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if let Err(e) = sqlx::query("SELECT 1").execute(&state.pool).await {
        warn!(error = %e, "healthz DB ping failed");
    }

    "ok"
}

pub async fn generic_banner() -> impl IntoResponse {
    "threadloom"
}
