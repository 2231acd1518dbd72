//! Wires configuration, storage and chain clients into the running engine.

use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};

use crate::adapters::{PostgresTransactionRepository, PostgresWalletDirectory};
use crate::chains::{ChainProbe, EvmRpcClient, RpcTransport, SolanaRpcClient, XrplRpcClient};
use crate::config::{Config, ReconcilerConfig};
use crate::finality::{
    FinalityCheckers, ReceiptDepthChecker, SignatureChecker, ValidatedLedgerChecker,
};
use crate::health::{ChainChecker, HealthState, PostgresChecker};
use crate::ports::{TransactionRepository, WalletDirectory};
use crate::services::{
    ExternalDepositScanner, JobScheduler, JobStatusBoard, PendingTransactionMonitor,
    TransactionRecorder,
};

pub struct Engine {
    pub recorder: TransactionRecorder,
    pub monitor: Arc<PendingTransactionMonitor>,
    /// Present only when an EVM node is configured.
    pub scanner: Option<Arc<ExternalDepositScanner<EvmRpcClient>>>,
    pub probes: Vec<Arc<dyn ChainProbe>>,
}

fn transport(url: &str, reconciler: &ReconcilerConfig) -> RpcTransport {
    RpcTransport::with_circuit_breaker(
        url.to_string(),
        reconciler.rpc_failure_threshold,
        reconciler.rpc_reset_timeout_secs,
    )
}

pub fn build_engine(config: &Config, pool: &PgPool) -> anyhow::Result<Engine> {
    let repository: Arc<dyn TransactionRepository> =
        Arc::new(PostgresTransactionRepository::new(pool.clone()));
    let wallets: Arc<dyn WalletDirectory> = Arc::new(PostgresWalletDirectory::new(pool.clone()));
    let recorder = TransactionRecorder::new(repository);
    let reconciler = &config.reconciler;

    let mut checkers = FinalityCheckers::new();
    let mut probes: Vec<Arc<dyn ChainProbe>> = Vec::new();
    let mut scanner = None;

    if let Some(url) = &config.evm_rpc_url {
        let client = Arc::new(EvmRpcClient::new(transport(url, reconciler)));
        checkers.register(Arc::new(ReceiptDepthChecker::with_confirmations(
            Arc::clone(&client),
            reconciler.confirmations,
        )));
        scanner = Some(Arc::new(
            ExternalDepositScanner::new(
                Arc::clone(&client),
                wallets,
                recorder.clone(),
                config.evm_native_token.clone(),
            )
            .with_window(reconciler.scanner_window_blocks),
        ));
        probes.push(client);
        info!(url = %url, confirmations = reconciler.confirmations, "EVM client configured");
    }

    if let Some(url) = &config.xrpl_rpc_url {
        let client = Arc::new(XrplRpcClient::new(transport(url, reconciler)));
        checkers.register(Arc::new(ValidatedLedgerChecker::new(Arc::clone(&client))));
        probes.push(client);
        info!(url = %url, "XRPL client configured");
    }

    if let Some(url) = &config.solana_rpc_url {
        let client = Arc::new(SolanaRpcClient::new(transport(url, reconciler)));
        checkers.register(Arc::new(SignatureChecker::new(Arc::clone(&client))));
        probes.push(client);
        info!(url = %url, "Solana client configured");
    }

    if checkers.is_empty() {
        warn!("No chain RPC URLs configured, pending records will only time out");
    } else {
        info!(networks = ?checkers.networks(), "Finality checkers registered");
    }

    let monitor = Arc::new(PendingTransactionMonitor::new(
        recorder.clone(),
        checkers,
        reconciler.monitor_config()?,
    ));

    Ok(Engine {
        recorder,
        monitor,
        scanner,
        probes,
    })
}

impl Engine {
    pub fn schedule(&self, scheduler: &mut JobScheduler, reconciler: &ReconcilerConfig) {
        scheduler.spawn(
            self.monitor.clone(),
            reconciler.initial_delay(),
            reconciler.interval(),
        );
        if let Some(scanner) = &self.scanner {
            scheduler.spawn(
                scanner.clone(),
                reconciler.initial_delay(),
                reconciler.scanner_interval(),
            );
        }
    }

    pub fn health_state(&self, pool: &PgPool, jobs: JobStatusBoard) -> HealthState {
        let mut builder = HealthState::builder()
            .dependency(
                "postgres",
                true,
                Arc::new(PostgresChecker::new(pool.clone())),
            )
            .jobs(jobs);
        for probe in &self.probes {
            builder = builder.dependency(
                probe.network().as_str(),
                false,
                Arc::new(ChainChecker::new(Arc::clone(probe))),
            );
        }
        builder.build()
    }
}
