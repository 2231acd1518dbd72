//! Periodic background jobs.
//!
//! The composition root owns a [`JobScheduler`] and hands it every recurring
//! component. Components only implement [`Job::run`] for a single cycle, so
//! tests and the CLI can drive a cycle directly without a clock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    /// One cycle. An error is logged and counted; the job keeps its schedule.
    async fn run(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub name: String,
    pub runs: u64,
    pub failures: u64,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

type StatusMap = Arc<RwLock<HashMap<String, JobStatus>>>;

/// Shared read view of the scheduler's per-job status, for `/health`.
#[derive(Clone, Default)]
pub struct JobStatusBoard {
    statuses: StatusMap,
}

impl JobStatusBoard {
    /// Every registered job, sorted by name.
    pub async fn snapshot(&self) -> Vec<JobStatus> {
        let mut statuses: Vec<JobStatus> = self.statuses.read().await.values().cloned().collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }
}

pub struct JobScheduler {
    shutdown_tx: watch::Sender<bool>,
    statuses: StatusMap,
    handles: Vec<JoinHandle<()>>,
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl JobScheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            statuses: Arc::new(RwLock::new(HashMap::new())),
            handles: Vec::new(),
        }
    }

    /// Starts `job` after `initial_delay`, then runs it every `interval`.
    /// A cycle that overruns its interval delays the next one instead of
    /// stacking up missed ticks.
    pub fn spawn(&mut self, job: Arc<dyn Job>, initial_delay: Duration, interval: Duration) {
        let shutdown_rx = self.shutdown_tx.subscribe();
        let statuses = Arc::clone(&self.statuses);

        let handle = tokio::spawn(async move {
            run_job(job, initial_delay, interval, shutdown_rx, statuses).await;
        });
        self.handles.push(handle);
    }

    pub fn board(&self) -> JobStatusBoard {
        JobStatusBoard {
            statuses: Arc::clone(&self.statuses),
        }
    }

    pub async fn statuses(&self) -> Vec<JobStatus> {
        self.board().snapshot().await
    }

    pub fn job_count(&self) -> usize {
        self.handles.len()
    }

    /// Signals every job to stop and waits for in-flight cycles to finish.
    pub async fn shutdown(self) {
        info!(jobs = self.handles.len(), "Stopping scheduled jobs");
        let _ = self.shutdown_tx.send(true);
        for result in join_all(self.handles).await {
            if let Err(e) = result {
                error!(error = %e, "Scheduled job task ended abnormally");
            }
        }
    }
}

async fn run_job(
    job: Arc<dyn Job>,
    initial_delay: Duration,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    statuses: StatusMap,
) {
    let name = job.name().to_string();
    statuses.write().await.insert(
        name.clone(),
        JobStatus {
            name: name.clone(),
            ..JobStatus::default()
        },
    );

    info!(
        job = %name,
        initial_delay_secs = initial_delay.as_secs(),
        interval_secs = period.as_secs(),
        "Scheduled job registered"
    );

    tokio::select! {
        _ = tokio::time::sleep(initial_delay) => {}
        _ = shutdown_requested(&mut shutdown_rx) => {
            info!(job = %name, "Scheduled job stopped before first run");
            return;
        }
    }

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_once(job.as_ref(), &name, &statuses).await;
            }
            _ = shutdown_requested(&mut shutdown_rx) => {
                info!(job = %name, "Scheduled job stopped");
                break;
            }
        }
    }
}

/// Resolves once shutdown is signalled or the scheduler is gone.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        let stop = *rx.borrow();
        if stop {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn run_once(job: &dyn Job, name: &str, statuses: &StatusMap) {
    let started_at = Utc::now();
    debug!(job = %name, "Running scheduled job");

    let result = job.run().await;

    let mut statuses = statuses.write().await;
    let status = statuses.entry(name.to_string()).or_default();
    status.name = name.to_string();
    status.runs += 1;
    status.last_started_at = Some(started_at);
    status.last_finished_at = Some(Utc::now());

    match result {
        Ok(()) => status.last_error = None,
        Err(e) => {
            status.failures += 1;
            status.last_error = Some(e.to_string());
            error!(job = %name, error = %e, "Scheduled job failed");
        }
    }
}
