//! Receipt + confirmation depth finality for account/nonce chains.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::checker::{FinalityChecker, FinalityResult, Verdict};
use crate::chains::EvmChain;
use crate::domain::Network;

pub const DEFAULT_REQUIRED_CONFIRMATIONS: u64 = 3;

/// A successful receipt is final once `latest - receipt_block + 1 >= required_confirmations`.
pub struct ReceiptDepthChecker<C> {
    client: Arc<C>,
    required_confirmations: u64,
}

impl<C: EvmChain> ReceiptDepthChecker<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self::with_confirmations(client, DEFAULT_REQUIRED_CONFIRMATIONS)
    }

    pub fn with_confirmations(client: Arc<C>, required_confirmations: u64) -> Self {
        Self {
            client,
            required_confirmations: required_confirmations.max(1),
        }
    }

    pub fn required_confirmations(&self) -> u64 {
        self.required_confirmations
    }
}

/// The receipt's own block counts as the first confirmation.
pub fn confirmation_depth(latest_block: u64, receipt_block: u64) -> u64 {
    if latest_block < receipt_block {
        return 0;
    }
    latest_block - receipt_block + 1
}

#[async_trait]
impl<C: EvmChain + 'static> FinalityChecker for ReceiptDepthChecker<C> {
    fn network(&self) -> Network {
        Network::Evm
    }

    async fn check(&self, reference: &str) -> FinalityResult<Verdict> {
        let Some(receipt) = self.client.transaction_receipt(reference).await? else {
            return Ok(Verdict::Unknown);
        };

        if !receipt.success {
            return Ok(Verdict::Failed);
        }

        let latest = self.client.block_number().await?;
        let depth = confirmation_depth(latest, receipt.block_number);
        debug!(
            reference,
            receipt_block = receipt.block_number,
            latest,
            depth,
            required = self.required_confirmations,
            "Receipt depth check"
        );

        if depth >= self.required_confirmations {
            Ok(Verdict::Confirmed)
        } else {
            Ok(Verdict::Pending)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::mock::MockEvmChain;

    fn checker(chain: &MockEvmChain) -> ReceiptDepthChecker<MockEvmChain> {
        ReceiptDepthChecker::new(Arc::new(chain.clone()))
    }

    #[test]
    fn depth_counts_receipt_block() {
        assert_eq!(confirmation_depth(100, 100), 1);
        assert_eq!(confirmation_depth(102, 100), 3);
        assert_eq!(confirmation_depth(99, 100), 0);
    }

    #[tokio::test]
    async fn no_receipt_is_unknown() {
        let chain = MockEvmChain::new();
        chain.set_height(10);
        assert_eq!(checker(&chain).check("0xnone").await.unwrap(), Verdict::Unknown);
    }

    #[tokio::test]
    async fn reverted_receipt_fails_regardless_of_depth() {
        let chain = MockEvmChain::new();
        chain.set_height(100);
        chain.insert_receipt("0xbad", 100, false);
        assert_eq!(checker(&chain).check("0xbad").await.unwrap(), Verdict::Failed);
    }

    #[tokio::test]
    async fn confirms_exactly_at_threshold() {
        let chain = MockEvmChain::new();
        let h = 100;
        let required = DEFAULT_REQUIRED_CONFIRMATIONS;
        chain.insert_receipt("0xAAA", h, true);

        chain.set_height(h + required - 2);
        assert_eq!(checker(&chain).check("0xAAA").await.unwrap(), Verdict::Pending);

        chain.set_height(h + required - 1);
        assert_eq!(checker(&chain).check("0xAAA").await.unwrap(), Verdict::Confirmed);
    }

    #[tokio::test]
    async fn unreachable_node_is_an_error() {
        let chain = MockEvmChain::new();
        chain.fail_receipt("0xAAA");
        assert!(checker(&chain).check("0xAAA").await.is_err());
    }
}
