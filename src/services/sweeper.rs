//! Background sweep of expired session tokens.
//!
//! One sweeper runs for the lifetime of the daemon. Each pass deletes every
//! token row older than the session TTL; a failed pass is logged and the
//! next interval retries, so cleanup is eventually consistent and never
//! fatal. A verification racing a sweep on the same row is accepted: at
//! worst a token survives one interval past logical expiry.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, interval};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::SessionsConfig;
use crate::db::Store;

pub struct Sweeper {
    store: Store,
    config: SessionsConfig,
    running: Arc<RwLock<bool>>,
}

impl Sweeper {
    pub fn new(store: Store, config: SessionsConfig) -> Self {
        Self {
            store,
            config,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        if !self.config.sweep_enabled {
            info!("Session sweep is disabled in config");
            return Ok(());
        }

        *self.running.write().await = true;
        info!("Starting session sweeper");

        if let Some(cron_expr) = &self.config.sweep_cron {
            self.run_with_cron(cron_expr).await
        } else {
            self.run_with_interval().await
        }
    }

    async fn run_with_cron(&self, cron_expr: &str) -> Result<()> {
        let mut sched = JobScheduler::new().await?;

        let store = self.store.clone();
        let running = Arc::clone(&self.running);
        let ttl_secs = self.config.ttl_secs();

        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let store = store.clone();
            let running = Arc::clone(&running);
            Box::pin(async move {
                if !*running.read().await {
                    return;
                }
                sweep_once(&store, ttl_secs).await;
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!("Session sweeper running with cron: {}", cron_expr);

        loop {
            if !*self.running.read().await {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        sched.shutdown().await?;
        Ok(())
    }

    async fn run_with_interval(&self) -> Result<()> {
        let interval_mins = self.config.sweep_interval_minutes.max(1);

        info!("Session sweeper running every {} minutes", interval_mins);

        let mut sweep_interval = interval(Duration::from_secs(u64::from(interval_mins) * 60));
        let ttl_secs = self.config.ttl_secs();

        loop {
            sweep_interval.tick().await;
            if !*self.running.read().await {
                break;
            }

            sweep_once(&self.store, ttl_secs).await;
        }

        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping session sweeper...");
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Run one sweep pass immediately and return how many rows were removed.
    pub async fn run_once(&self) -> Result<u64> {
        let cutoff = chrono::Utc::now().timestamp() - self.config.ttl_secs();
        let deleted = self.store.delete_session_tokens_older_than(cutoff).await?;
        Ok(deleted)
    }
}

/// One sweep pass. Store errors are swallowed on purpose; the next pass
/// retries.
async fn sweep_once(store: &Store, ttl_secs: i64) {
    let start = std::time::Instant::now();
    info!(event = "job_started", job_name = "sweep_sessions", "Starting session sweep");

    let cutoff = chrono::Utc::now().timestamp() - ttl_secs;
    match store.delete_session_tokens_older_than(cutoff).await {
        Ok(deleted) => {
            metrics::counter!("session_sweep_deleted_total").increment(deleted);
            info!(
                event = "job_finished",
                job_name = "sweep_sessions",
                deleted,
                duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                "Session sweep finished"
            );
        }
        Err(e) => {
            error!(
                event = "job_failed",
                job_name = "sweep_sessions",
                error = %e,
                "Session sweep failed; will retry next interval"
            );
        }
    }
}
