// src/tasks/mod.rs
// Background task management: the Sync Runner poll loop, the Embed Worker
// drain loop, the stale-job startup sweep, and a periodic metrics report.

pub mod metrics;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{error, info};

use crate::state::AppState;
use metrics::TaskMetrics;

const SYNC_POLL_INTERVAL: Duration = Duration::from_secs(2);
const METRICS_REPORT_INTERVAL: Duration = Duration::from_secs(3600);

pub struct TaskManager {
    app_state: Arc<AppState>,
    metrics: Arc<TaskMetrics>,
    handles: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl TaskManager {
    pub fn new(app_state: Arc<AppState>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            app_state,
            metrics: Arc::new(TaskMetrics::new()),
            handles: Vec::new(),
            shutdown_tx,
        }
    }

    /// Starts all background tasks. Runs the stale-job sweep once,
    /// synchronously, before spawning the long-lived loops (spec 9: crash
    /// recovery for `running` jobs).
    pub async fn start(&mut self) {
        info!("starting background task manager");

        self.run_stale_job_sweep().await;

        self.handles.push(self.spawn_sync_runner());
        self.handles.push(self.spawn_embed_worker());
        self.handles.push(self.spawn_metrics_reporter());

        info!(tasks = self.handles.len(), "background tasks started");
    }

    /// Signals all loops to stop and waits for them to exit.
    pub async fn shutdown(self) {
        info!("shutting down background task manager");
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
    }

    async fn run_stale_job_sweep(&self) {
        if !self.app_state.config.stale_job_sweep.enabled {
            return;
        }

        let minutes = self.app_state.config.stale_job_sweep.stale_after_minutes;
        match crate::store::operations::sweep_stale_running(&self.app_state.pool, minutes).await {
            Ok(count) if count > 0 => {
                info!(count, "reset stale running sync jobs back to queued");
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "stale job sweep failed"),
        }
    }

    fn spawn_sync_runner(&self) -> JoinHandle<()> {
        let sync_runner = self.app_state.sync_runner.clone();
        let metrics = self.metrics.clone();
        let mut shutdown = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("sync runner loop started");

            loop {
                if *shutdown.borrow() {
                    info!("sync runner shutting down");
                    return;
                }

                let start = std::time::Instant::now();
                match sync_runner.run_once().await {
                    Ok(true) => {
                        metrics.record_task_duration("sync_job", start.elapsed());
                        metrics.add_processed_items("sync_job", 1);
                    }
                    Ok(false) => {}
                    Err(e) => {
                        error!(error = %e, "sync runner tick failed");
                        metrics.record_error("sync_job");
                    }
                }

                tokio::select! {
                    _ = tokio::time::sleep(SYNC_POLL_INTERVAL) => {}
                    _ = shutdown.changed() => {}
                }
            }
        })
    }

    fn spawn_embed_worker(&self) -> JoinHandle<()> {
        let embed_worker = self.app_state.embed_worker.clone();
        let shutdown = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            embed_worker.run(shutdown).await;
        })
    }

    fn spawn_metrics_reporter(&self) -> JoinHandle<()> {
        let metrics = self.metrics.clone();
        let mut shutdown = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut interval_timer = time::interval(METRICS_REPORT_INTERVAL);
            interval_timer.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => metrics.report(),
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return;
                        }
                    }
                }
            }
        })
    }
}
