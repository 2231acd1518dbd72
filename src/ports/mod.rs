//! Storage contracts the engine depends on.
//! Adapters in `crate::adapters` provide Postgres and in-memory implementations.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{LedgerTransaction, Network, TransactionDraft, TxStatus, TxType};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Corrupt row {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Result of an idempotent insert keyed by reference.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(LedgerTransaction),
    /// A row with the same reference already existed and was left untouched.
    Existing(LedgerTransaction),
}

impl InsertOutcome {
    pub fn into_inner(self) -> LedgerTransaction {
        match self {
            InsertOutcome::Inserted(tx) | InsertOutcome::Existing(tx) => tx,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Insert unless a row with the same non-null reference exists.
    /// Drafts without a reference are always inserted.
    async fn insert_if_absent(&self, draft: &TransactionDraft) -> RepositoryResult<InsertOutcome>;

    /// Single conditional write: moves `id` to `to` only if it is currently `from`.
    /// Returns `None` when the guard did not match.
    async fn transition_status(
        &self,
        id: Uuid,
        from: TxStatus,
        to: TxStatus,
    ) -> RepositoryResult<Option<LedgerTransaction>>;

    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<LedgerTransaction>>;

    async fn find_by_reference(&self, reference: &str)
        -> RepositoryResult<Option<LedgerTransaction>>;

    async fn find_by_status(&self, status: TxStatus) -> RepositoryResult<Vec<LedgerTransaction>>;

    async fn find_by_owner_and_status(
        &self,
        owner_id: &str,
        status: TxStatus,
    ) -> RepositoryResult<Vec<LedgerTransaction>>;

    /// Newest first. An empty `types` slice matches every type.
    async fn find_by_owner_and_types(
        &self,
        owner_id: &str,
        types: &[TxType],
    ) -> RepositoryResult<Vec<LedgerTransaction>>;
}

/// An address whose inbound transfers belong to `owner_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedWallet {
    pub owner_id: String,
    pub network: Network,
    pub address: String,
}

#[async_trait]
pub trait WalletDirectory: Send + Sync {
    async fn tracked_wallets(&self, network: Network) -> RepositoryResult<Vec<TrackedWallet>>;
}
