//! Signature lookup with inline execution metadata.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::checker::{FinalityChecker, FinalityResult, Verdict};
use crate::chains::SolanaChain;
use crate::domain::Network;

pub struct SignatureChecker<C> {
    client: Arc<C>,
}

impl<C: SolanaChain> SignatureChecker<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: SolanaChain + 'static> FinalityChecker for SignatureChecker<C> {
    fn network(&self) -> Network {
        Network::Solana
    }

    async fn check(&self, reference: &str) -> FinalityResult<Verdict> {
        let Some(tx) = self.client.transaction(reference).await? else {
            return Ok(Verdict::Pending);
        };

        match tx.error {
            None => Ok(Verdict::Confirmed),
            Some(err) => {
                debug!(signature = reference, slot = tx.slot, error = %err, "Transaction failed on-chain");
                Ok(Verdict::Failed)
            }
        }
    }
}
