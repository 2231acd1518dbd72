//! External deposit scanner.
//!
//! Walks a trailing window of recent EVM blocks looking for value sent to a
//! tracked wallet that the application did not originate itself. Matches are
//! recorded as confirmed `EXTERNAL_FUNDING`. De-duplication is left to the
//! recorder, so overlapping windows and concurrent submissions are safe.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::chains::{ChainError, EvmChain, EvmTransfer};
use crate::domain::{Network, NewTransaction, Proof, TxType};
use crate::ports::{InsertOutcome, RepositoryError, TrackedWallet, WalletDirectory};
use crate::services::recorder::TransactionRecorder;
use crate::services::scheduler::Job;

pub const DEFAULT_SCAN_WINDOW: u64 = 10;
const WEI_DECIMALS: u32 = 18;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Chain height unavailable: {0}")]
    Height(#[source] ChainError),

    #[error("Tracked wallets unavailable: {0}")]
    Wallets(#[from] RepositoryError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub blocks_scanned: usize,
    pub deposits_recorded: usize,
    pub already_known: usize,
    pub errors: usize,
}

/// Exact native amount for a wei value.
pub fn wei_to_native(value_wei: u128) -> BigDecimal {
    BigDecimal::new(value_wei.into(), WEI_DECIMALS as i64)
}

/// Inclusive block range covering the last `window` blocks up to `height`.
pub fn scan_range(height: u64, window: u64) -> std::ops::RangeInclusive<u64> {
    let start = height.saturating_sub(window.saturating_sub(1));
    start..=height
}

pub struct ExternalDepositScanner<C> {
    chain: Arc<C>,
    wallets: Arc<dyn WalletDirectory>,
    recorder: TransactionRecorder,
    window: u64,
    token: String,
}

impl<C: EvmChain> ExternalDepositScanner<C> {
    pub fn new(
        chain: Arc<C>,
        wallets: Arc<dyn WalletDirectory>,
        recorder: TransactionRecorder,
        token: impl Into<String>,
    ) -> Self {
        Self {
            chain,
            wallets,
            recorder,
            window: DEFAULT_SCAN_WINDOW,
            token: token.into(),
        }
    }

    pub fn with_window(mut self, window: u64) -> Self {
        self.window = window.max(1);
        self
    }

    /// One scan over the trailing window. Fails only when the chain height or
    /// the tracked wallet list cannot be read; nothing is recorded in that case.
    pub async fn run_cycle(&self) -> Result<ScanReport, ScanError> {
        let height = self.chain.block_number().await.map_err(|e| {
            warn!(network = %Network::Evm, error = %e, "Cannot read chain height, skipping scan");
            ScanError::Height(e)
        })?;

        let wallets = self.wallets.tracked_wallets(Network::Evm).await?;
        let mut report = ScanReport::default();
        if wallets.is_empty() {
            debug!("No tracked EVM wallets, nothing to scan");
            return Ok(report);
        }

        for number in scan_range(height, self.window) {
            let block = match self.chain.block_with_transactions(number).await {
                Ok(Some(block)) => block,
                Ok(None) => {
                    debug!(block = number, "Block not available yet");
                    continue;
                }
                Err(e) => {
                    warn!(block = number, error = %e, "Failed to fetch block, continuing scan");
                    report.errors += 1;
                    continue;
                }
            };
            report.blocks_scanned += 1;

            for transfer in &block.transactions {
                let Some(wallet) = match_wallet(&wallets, transfer) else {
                    continue;
                };
                if transfer.value_wei == 0 {
                    continue;
                }
                self.record_deposit(number, wallet, transfer, &mut report).await;
            }
        }

        if report.deposits_recorded > 0 || report.errors > 0 {
            info!(
                height,
                blocks_scanned = report.blocks_scanned,
                deposits_recorded = report.deposits_recorded,
                already_known = report.already_known,
                errors = report.errors,
                "Deposit scan complete"
            );
        }

        Ok(report)
    }

    async fn record_deposit(
        &self,
        block: u64,
        wallet: &TrackedWallet,
        transfer: &EvmTransfer,
        report: &mut ScanReport,
    ) {
        match self.recorder.find_by_reference(&transfer.hash).await {
            Ok(Some(_)) => {
                report.already_known += 1;
                return;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(
                    reference = %transfer.hash,
                    owner = %wallet.owner_id,
                    block,
                    error = %e,
                    "Lookup failed for observed deposit"
                );
                report.errors += 1;
                return;
            }
        }

        let deposit = NewTransaction {
            owner_id: wallet.owner_id.clone(),
            counterparty_address: wallet.address.clone(),
            amount: wei_to_native(transfer.value_wei),
            token: self.token.clone(),
            network: Network::Evm,
            reference: Some(transfer.hash.clone()),
            tx_type: TxType::ExternalFunding,
            proof: Proof::Confirmed,
        };

        match self.recorder.record_outcome(deposit).await {
            Ok(InsertOutcome::Existing(tx)) => {
                debug!(
                    id = %tx.id,
                    reference = %transfer.hash,
                    owner = %wallet.owner_id,
                    "Deposit reference recorded concurrently, leaving existing record"
                );
                report.already_known += 1;
            }
            Ok(InsertOutcome::Inserted(tx)) => {
                info!(
                    id = %tx.id,
                    reference = %transfer.hash,
                    owner = %wallet.owner_id,
                    amount = %tx.amount,
                    block,
                    "Recorded external deposit"
                );
                report.deposits_recorded += 1;
            }
            Err(e) => {
                warn!(
                    reference = %transfer.hash,
                    owner = %wallet.owner_id,
                    block,
                    error = %e,
                    "Failed to record external deposit"
                );
                report.errors += 1;
            }
        }
    }
}

fn match_wallet<'a>(
    wallets: &'a [TrackedWallet],
    transfer: &EvmTransfer,
) -> Option<&'a TrackedWallet> {
    let to = transfer.to.as_deref()?;
    wallets
        .iter()
        .find(|wallet| Network::Evm.addresses_match(&wallet.address, to))
}

#[async_trait]
impl<C: EvmChain + 'static> Job for ExternalDepositScanner<C> {
    fn name(&self) -> &str {
        "deposit-scanner"
    }

    async fn run(&self) -> anyhow::Result<()> {
        self.run_cycle().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryTransactionRepository, MemoryWalletDirectory};
    use crate::chains::mock::MockEvmChain;
    use crate::domain::{LedgerTransaction, TransactionDraft, TxStatus};
    use crate::ports::{RepositoryResult, TransactionRepository};
    use std::str::FromStr;
    use uuid::Uuid;

    const OWNER_ADDRESS: &str = "0xAbCdEf0000000000000000000000000000000001";
    const TWO_AND_A_HALF_ETH: u128 = 2_500_000_000_000_000_000;

    struct Harness {
        chain: MockEvmChain,
        recorder: TransactionRecorder,
        scanner: ExternalDepositScanner<MockEvmChain>,
    }

    async fn harness() -> Harness {
        let chain = MockEvmChain::new();
        let wallets = MemoryWalletDirectory::new();
        wallets.track("alice", Network::Evm, OWNER_ADDRESS).await;
        let recorder = TransactionRecorder::new(Arc::new(MemoryTransactionRepository::new()));
        let scanner = ExternalDepositScanner::new(
            Arc::new(chain.clone()),
            Arc::new(wallets),
            recorder.clone(),
            "ETH",
        );
        Harness {
            chain,
            recorder,
            scanner,
        }
    }

    #[test]
    fn window_is_clamped_at_genesis() {
        assert_eq!(scan_range(500, 10), 491..=500);
        assert_eq!(scan_range(3, 10), 0..=3);
        assert_eq!(scan_range(7, 1), 7..=7);
    }

    #[test]
    fn converts_wei_exactly() {
        assert_eq!(
            wei_to_native(TWO_AND_A_HALF_ETH),
            BigDecimal::from_str("2.5").unwrap()
        );
        assert_eq!(
            wei_to_native(1),
            BigDecimal::from_str("0.000000000000000001").unwrap()
        );
    }

    #[tokio::test]
    async fn records_deposit_once_across_overlapping_scans() {
        let h = harness().await;
        h.chain.set_height(500);
        h.chain.insert_transfer(
            500,
            "0xDEP",
            "0xfaucet",
            &OWNER_ADDRESS.to_lowercase(),
            TWO_AND_A_HALF_ETH,
        );

        let first = h.scanner.run_cycle().await.unwrap();
        assert_eq!(first.deposits_recorded, 1);
        assert_eq!(first.blocks_scanned, 10);

        h.chain.set_height(505);
        let second = h.scanner.run_cycle().await.unwrap();
        assert_eq!(second.deposits_recorded, 0);
        assert_eq!(second.already_known, 1);

        let records = h.recorder.query("alice", &[TxType::ExternalFunding]).await.unwrap();
        assert_eq!(records.len(), 1);
        let deposit = &records[0];
        assert_eq!(deposit.reference.as_deref(), Some("0xDEP"));
        assert_eq!(deposit.status, TxStatus::Confirmed);
        assert_eq!(deposit.amount, BigDecimal::from_str("2.5").unwrap());
        assert_eq!(deposit.token, "ETH");
        assert_eq!(deposit.counterparty_address, OWNER_ADDRESS);
    }

    #[tokio::test]
    async fn known_submission_is_not_recorded_again() {
        let h = harness().await;
        h.recorder
            .record(NewTransaction {
                owner_id: "alice".to_string(),
                counterparty_address: OWNER_ADDRESS.to_string(),
                amount: BigDecimal::from(1),
                token: "ETH".to_string(),
                network: Network::Evm,
                reference: Some("0xFUND".to_string()),
                tx_type: TxType::Funding,
                proof: Proof::Pending,
            })
            .await
            .unwrap();

        h.chain.set_height(20);
        h.chain
            .insert_transfer(20, "0xFUND", "0xtreasury", OWNER_ADDRESS, 10u128.pow(18));

        let report = h.scanner.run_cycle().await.unwrap();
        assert_eq!(report.already_known, 1);
        assert_eq!(report.deposits_recorded, 0);
        assert!(h
            .recorder
            .query("alice", &[TxType::ExternalFunding])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn ignores_untracked_and_zero_value_transfers() {
        let h = harness().await;
        h.chain.set_height(9);
        h.chain.insert_transfer(9, "0xOTHER", "0xa", "0xsomeone-else", 5);
        h.chain.insert_transfer(9, "0xZERO", "0xa", OWNER_ADDRESS, 0);

        let report = h.scanner.run_cycle().await.unwrap();
        assert_eq!(report.deposits_recorded, 0);
        assert!(h.recorder.query("alice", &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreachable_height_skips_the_cycle() {
        let h = harness().await;
        h.chain.set_height(500);
        h.chain
            .insert_transfer(500, "0xDEP", "0xfaucet", OWNER_ADDRESS, TWO_AND_A_HALF_ETH);
        h.chain.set_height_unreachable(true);

        let err = h.scanner.run_cycle().await.unwrap_err();
        assert!(matches!(err, ScanError::Height(_)));
        assert!(h.recorder.query("alice", &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_block_does_not_abort_the_scan() {
        let h = harness().await;
        h.chain.set_height(100);
        h.chain.fail_block(99);
        h.chain
            .insert_transfer(100, "0xDEP", "0xfaucet", OWNER_ADDRESS, TWO_AND_A_HALF_ETH);

        let report = h.scanner.run_cycle().await.unwrap();
        assert_eq!(report.errors, 1);
        assert_eq!(report.blocks_scanned, 9);
        assert_eq!(report.deposits_recorded, 1);
    }

    /// Store whose reference lookup misses, as if a submission landed between
    /// the scanner's lookup and its insert.
    struct LateSubmission(MemoryTransactionRepository);

    #[async_trait]
    impl TransactionRepository for LateSubmission {
        async fn insert_if_absent(
            &self,
            draft: &TransactionDraft,
        ) -> RepositoryResult<InsertOutcome> {
            self.0.insert_if_absent(draft).await
        }

        async fn transition_status(
            &self,
            id: Uuid,
            from: TxStatus,
            to: TxStatus,
        ) -> RepositoryResult<Option<LedgerTransaction>> {
            self.0.transition_status(id, from, to).await
        }

        async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<LedgerTransaction>> {
            self.0.find_by_id(id).await
        }

        async fn find_by_reference(
            &self,
            _reference: &str,
        ) -> RepositoryResult<Option<LedgerTransaction>> {
            Ok(None)
        }

        async fn find_by_status(&self, status: TxStatus) -> RepositoryResult<Vec<LedgerTransaction>> {
            self.0.find_by_status(status).await
        }

        async fn find_by_owner_and_status(
            &self,
            owner_id: &str,
            status: TxStatus,
        ) -> RepositoryResult<Vec<LedgerTransaction>> {
            self.0.find_by_owner_and_status(owner_id, status).await
        }

        async fn find_by_owner_and_types(
            &self,
            owner_id: &str,
            types: &[TxType],
        ) -> RepositoryResult<Vec<LedgerTransaction>> {
            self.0.find_by_owner_and_types(owner_id, types).await
        }
    }

    #[tokio::test]
    async fn concurrent_submission_counts_as_already_known() {
        let chain = MockEvmChain::new();
        let wallets = MemoryWalletDirectory::new();
        wallets.track("alice", Network::Evm, OWNER_ADDRESS).await;
        let recorder =
            TransactionRecorder::new(Arc::new(LateSubmission(MemoryTransactionRepository::new())));
        let scanner = ExternalDepositScanner::new(
            Arc::new(chain.clone()),
            Arc::new(wallets),
            recorder.clone(),
            "ETH",
        );

        let submitted = recorder
            .record(NewTransaction {
                owner_id: "alice".to_string(),
                counterparty_address: OWNER_ADDRESS.to_string(),
                amount: BigDecimal::from(1),
                token: "ETH".to_string(),
                network: Network::Evm,
                reference: Some("0xRACE".to_string()),
                tx_type: TxType::Funding,
                proof: Proof::Pending,
            })
            .await
            .unwrap();

        chain.set_height(30);
        chain.insert_transfer(30, "0xRACE", "0xtreasury", OWNER_ADDRESS, 10u128.pow(18));

        let report = scanner.run_cycle().await.unwrap();
        assert_eq!(report.deposits_recorded, 0);
        assert_eq!(report.already_known, 1);

        let stored = recorder.get(submitted.id).await.unwrap();
        assert_eq!(stored.tx_type, TxType::Funding);
        assert!(recorder
            .query("alice", &[TxType::ExternalFunding])
            .await
            .unwrap()
            .is_empty());
    }
}
