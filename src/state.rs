// src/state.rs
// Shared application state, composed once at startup and handed to the
// task manager, the HTTP server, and job intake.

use std::sync::Arc;

use crate::config::Config;
use crate::embed_worker::EmbedWorker;
use crate::intake::JobIntake;
use crate::retrieval::RetrievalService;
use crate::store::Pool;
use crate::sync::SyncRunner;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: Pool,
    pub sync_runner: Arc<SyncRunner>,
    pub embed_worker: Arc<EmbedWorker>,
    pub intake: Arc<JobIntake>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        pool: Pool,
        sync_runner: Arc<SyncRunner>,
        embed_worker: Arc<EmbedWorker>,
        intake: Arc<JobIntake>,
    ) -> Self {
        Self {
            config,
            pool,
            sync_runner,
            embed_worker,
            intake,
        }
    }
}
