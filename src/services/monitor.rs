//! Pending transaction monitor.
//!
//! Each cycle loads every `PENDING` record and either times it out or asks the
//! network's finality checker for a verdict. Records are grouped into one lane
//! per network. Lanes run concurrently and each lane checks its records one
//! after another, so a slow network only delays its own records and no record
//! is ever checked twice at once.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::domain::{is_synthetic, LedgerTransaction, Network, TxStatus};
use crate::error::AppError;
use crate::finality::{FinalityChecker, FinalityCheckers};
use crate::services::recorder::TransactionRecorder;
use crate::services::scheduler::Job;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Records older than this are moved to `TIMEOUT` without a network call.
    pub max_age: ChronoDuration,
    /// Upper bound on a single checker call.
    pub check_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_age: ChronoDuration::hours(24),
            check_timeout: Duration::from_secs(15),
        }
    }
}

/// Tally of one monitor cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub examined: usize,
    pub confirmed: usize,
    pub failed: usize,
    pub timed_out: usize,
    /// Checked this cycle, not final yet.
    pub still_pending: usize,
    /// Not dispatched: synthetic reference, no reference, or no checker for the network.
    pub skipped: usize,
    pub errors: usize,
}

impl CycleReport {
    fn tally(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Settled(TxStatus::Confirmed) => self.confirmed += 1,
            Outcome::Settled(TxStatus::Failed) => self.failed += 1,
            Outcome::Settled(TxStatus::Timeout) => self.timed_out += 1,
            Outcome::Settled(TxStatus::Pending) | Outcome::StillPending => {
                self.still_pending += 1
            }
            Outcome::Skipped => self.skipped += 1,
            Outcome::Error => self.errors += 1,
        }
    }

    pub fn settled(&self) -> usize {
        self.confirmed + self.failed + self.timed_out
    }
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Settled(TxStatus),
    StillPending,
    Skipped,
    Error,
}

pub struct PendingTransactionMonitor {
    recorder: TransactionRecorder,
    checkers: FinalityCheckers,
    config: MonitorConfig,
}

impl PendingTransactionMonitor {
    pub fn new(
        recorder: TransactionRecorder,
        checkers: FinalityCheckers,
        config: MonitorConfig,
    ) -> Self {
        Self {
            recorder,
            checkers,
            config,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub async fn run_cycle(&self) -> Result<CycleReport, AppError> {
        self.run_cycle_at(Utc::now()).await
    }

    /// Runs one cycle as if the clock read `now`. Only the age check uses it.
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleReport, AppError> {
        let pending = self
            .recorder
            .repository()
            .find_by_status(TxStatus::Pending)
            .await?;

        let mut report = CycleReport {
            examined: pending.len(),
            ..CycleReport::default()
        };

        let mut lanes: HashMap<Network, Vec<LedgerTransaction>> = HashMap::new();
        for tx in pending {
            if now - tx.created_at > self.config.max_age {
                report.tally(self.settle(&tx, TxStatus::Timeout).await);
                continue;
            }
            lanes.entry(tx.network).or_default().push(tx);
        }

        let lane_outcomes = join_all(
            lanes
                .into_iter()
                .map(|(network, txs)| self.run_lane(network, txs)),
        )
        .await;

        for outcome in lane_outcomes.into_iter().flatten() {
            report.tally(outcome);
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                confirmed = report.confirmed,
                failed = report.failed,
                timed_out = report.timed_out,
                still_pending = report.still_pending,
                skipped = report.skipped,
                errors = report.errors,
                "Monitor cycle complete"
            );
        } else {
            debug!("Monitor cycle complete, nothing pending");
        }

        Ok(report)
    }

    async fn run_lane(&self, network: Network, txs: Vec<LedgerTransaction>) -> Vec<Outcome> {
        let Some(checker) = self.checkers.get(network) else {
            warn!(
                network = %network,
                count = txs.len(),
                "No finality checker configured for network, skipping records"
            );
            return vec![Outcome::Skipped; txs.len()];
        };

        let mut outcomes = Vec::with_capacity(txs.len());
        for tx in &txs {
            outcomes.push(self.check_one(checker, tx).await);
        }
        outcomes
    }

    async fn check_one(
        &self,
        checker: &Arc<dyn FinalityChecker>,
        tx: &LedgerTransaction,
    ) -> Outcome {
        let Some(reference) = tx.reference.as_deref() else {
            warn!(id = %tx.id, owner = %tx.owner_id, "Pending record has no reference, skipping");
            return Outcome::Skipped;
        };

        if is_synthetic(reference) {
            debug!(id = %tx.id, reference, "Synthetic reference, waiting for timeout");
            return Outcome::Skipped;
        }

        let check = tokio::time::timeout(self.config.check_timeout, checker.check(reference));
        let verdict = match check.await {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => {
                warn!(
                    reference,
                    network = %tx.network,
                    owner = %tx.owner_id,
                    error = %e,
                    "Finality check failed"
                );
                return Outcome::Error;
            }
            Err(_) => {
                warn!(
                    reference,
                    network = %tx.network,
                    owner = %tx.owner_id,
                    timeout_ms = self.config.check_timeout.as_millis() as u64,
                    "Finality check timed out"
                );
                return Outcome::Error;
            }
        };

        match verdict.settled_status() {
            Some(status) => self.settle(tx, status).await,
            None => {
                debug!(reference, network = %tx.network, ?verdict, "Not final yet");
                Outcome::StillPending
            }
        }
    }

    async fn settle(&self, tx: &LedgerTransaction, status: TxStatus) -> Outcome {
        match self.recorder.update_status(tx.id, status).await {
            Ok(updated) => Outcome::Settled(updated.status),
            Err(e) => {
                error!(
                    id = %tx.id,
                    reference = tx.reference.as_deref().unwrap_or("-"),
                    network = %tx.network,
                    owner = %tx.owner_id,
                    status = %status,
                    error = %e,
                    "Failed to apply status"
                );
                Outcome::Error
            }
        }
    }
}

#[async_trait]
impl Job for PendingTransactionMonitor {
    fn name(&self) -> &str {
        "pending-monitor"
    }

    async fn run(&self) -> anyhow::Result<()> {
        self.run_cycle().await?;
        Ok(())
    }
}
