//! In-process ledger store and wallet directory.
//!
//! Holds everything behind a single `RwLock`, so each operation is atomic with
//! respect to the others, matching the single-row atomicity of the Postgres store.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{LedgerTransaction, Network, TransactionDraft, TxStatus, TxType};
use crate::ports::{
    InsertOutcome, RepositoryResult, TrackedWallet, TransactionRepository, WalletDirectory,
};

#[derive(Default)]
struct LedgerState {
    rows: HashMap<Uuid, LedgerTransaction>,
    by_reference: HashMap<String, Uuid>,
}

#[derive(Default)]
pub struct MemoryTransactionRepository {
    state: RwLock<LedgerState>,
}

impl MemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn newest_first(mut rows: Vec<LedgerTransaction>) -> Vec<LedgerTransaction> {
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    rows
}

#[async_trait]
impl TransactionRepository for MemoryTransactionRepository {
    async fn insert_if_absent(&self, draft: &TransactionDraft) -> RepositoryResult<InsertOutcome> {
        let mut state = self.state.write().await;

        if let Some(reference) = draft.reference.as_deref() {
            if let Some(id) = state.by_reference.get(reference) {
                if let Some(existing) = state.rows.get(id) {
                    return Ok(InsertOutcome::Existing(existing.clone()));
                }
            }
        }

        let tx = LedgerTransaction::from_draft(Uuid::new_v4(), draft);
        if let Some(reference) = tx.reference.clone() {
            state.by_reference.insert(reference, tx.id);
        }
        state.rows.insert(tx.id, tx.clone());
        Ok(InsertOutcome::Inserted(tx))
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: TxStatus,
        to: TxStatus,
    ) -> RepositoryResult<Option<LedgerTransaction>> {
        let mut state = self.state.write().await;
        match state.rows.get_mut(&id) {
            Some(tx) if tx.status == from => {
                tx.status = to;
                tx.updated_at = Utc::now();
                Ok(Some(tx.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<LedgerTransaction>> {
        Ok(self.state.read().await.rows.get(&id).cloned())
    }

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> RepositoryResult<Option<LedgerTransaction>> {
        let state = self.state.read().await;
        Ok(state
            .by_reference
            .get(reference)
            .and_then(|id| state.rows.get(id))
            .cloned())
    }

    async fn find_by_status(&self, status: TxStatus) -> RepositoryResult<Vec<LedgerTransaction>> {
        let state = self.state.read().await;
        let mut rows: Vec<LedgerTransaction> = state
            .rows
            .values()
            .filter(|tx| tx.status == status)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rows)
    }

    async fn find_by_owner_and_status(
        &self,
        owner_id: &str,
        status: TxStatus,
    ) -> RepositoryResult<Vec<LedgerTransaction>> {
        let state = self.state.read().await;
        Ok(newest_first(
            state
                .rows
                .values()
                .filter(|tx| tx.owner_id == owner_id && tx.status == status)
                .cloned()
                .collect(),
        ))
    }

    async fn find_by_owner_and_types(
        &self,
        owner_id: &str,
        types: &[TxType],
    ) -> RepositoryResult<Vec<LedgerTransaction>> {
        let state = self.state.read().await;
        Ok(newest_first(
            state
                .rows
                .values()
                .filter(|tx| tx.owner_id == owner_id)
                .filter(|tx| types.is_empty() || types.contains(&tx.tx_type))
                .cloned()
                .collect(),
        ))
    }
}

#[derive(Default)]
pub struct MemoryWalletDirectory {
    wallets: RwLock<Vec<TrackedWallet>>,
}

impl MemoryWalletDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn track(&self, owner_id: &str, network: Network, address: &str) {
        self.wallets.write().await.push(TrackedWallet {
            owner_id: owner_id.to_string(),
            network,
            address: address.to_string(),
        });
    }
}

#[async_trait]
impl WalletDirectory for MemoryWalletDirectory {
    async fn tracked_wallets(&self, network: Network) -> RepositoryResult<Vec<TrackedWallet>> {
        Ok(self
            .wallets
            .read()
            .await
            .iter()
            .filter(|w| w.network == network)
            .cloned()
            .collect())
    }
}
