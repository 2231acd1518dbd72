//! Validated-ledger finality.
//!
//! The ledger exposes no "will never succeed" signal distinct from "not found
//! yet", so this checker never returns `Failed`. Transactions that never
//! validate are resolved by the monitor's max-age rule.

use async_trait::async_trait;
use std::sync::Arc;

use super::checker::{FinalityChecker, FinalityResult, Verdict};
use crate::chains::XrplLedger;
use crate::domain::Network;

pub struct ValidatedLedgerChecker<C> {
    client: Arc<C>,
}

impl<C: XrplLedger> ValidatedLedgerChecker<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: XrplLedger + 'static> FinalityChecker for ValidatedLedgerChecker<C> {
    fn network(&self) -> Network {
        Network::Xrpl
    }

    async fn check(&self, reference: &str) -> FinalityResult<Verdict> {
        match self.client.transaction(reference).await? {
            None => Ok(Verdict::Unknown),
            Some(tx) if tx.validated => Ok(Verdict::Confirmed),
            Some(_) => Ok(Verdict::Pending),
        }
    }
}
