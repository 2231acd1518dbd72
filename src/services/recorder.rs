//! Single write path into the ledger store.
//!
//! Submission code, the pending monitor and the deposit scanner all record and
//! transition through here, so de-duplication by reference and the one-way
//! status machine hold no matter which path gets to a transaction first.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{LedgerTransaction, NewTransaction, Proof, TransactionDraft, TxStatus, TxType};
use crate::error::AppError;
use crate::ports::{InsertOutcome, TransactionRepository};
use crate::validation::validate_new_transaction;

#[derive(Clone)]
pub struct TransactionRecorder {
    repository: Arc<dyn TransactionRepository>,
}

/// Status a new record starts in, given what the submitter knows.
fn initial_status(proof: Proof) -> TxStatus {
    match proof {
        Proof::Confirmed => TxStatus::Confirmed,
        Proof::Pending => TxStatus::Pending,
        Proof::Failed => TxStatus::Failed,
    }
}

impl TransactionRecorder {
    pub fn new(repository: Arc<dyn TransactionRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<dyn TransactionRepository> {
        &self.repository
    }

    /// Records a transaction. If the reference is already known, the existing
    /// record is returned unchanged.
    pub async fn record(&self, input: NewTransaction) -> Result<LedgerTransaction, AppError> {
        Ok(self.record_outcome(input).await?.into_inner())
    }

    /// Like [`record`](Self::record), but tells the caller whether this call
    /// inserted the row or found it already stored.
    pub async fn record_outcome(&self, input: NewTransaction) -> Result<InsertOutcome, AppError> {
        validate_new_transaction(&input)?;

        let draft = TransactionDraft {
            owner_id: input.owner_id,
            counterparty_address: input.counterparty_address,
            amount: input.amount,
            token: input.token,
            network: input.network,
            reference: input.reference,
            status: initial_status(input.proof),
            tx_type: input.tx_type,
            created_at: Utc::now(),
        };

        let outcome = self.repository.insert_if_absent(&draft).await?;
        match &outcome {
            InsertOutcome::Inserted(tx) => {
                info!(
                    id = %tx.id,
                    owner = %tx.owner_id,
                    network = %tx.network,
                    reference = tx.reference.as_deref().unwrap_or("-"),
                    tx_type = %tx.tx_type,
                    status = %tx.status,
                    "Recorded transaction"
                );
            }
            InsertOutcome::Existing(tx) => {
                debug!(
                    id = %tx.id,
                    reference = tx.reference.as_deref().unwrap_or("-"),
                    "Reference already recorded, returning existing record"
                );
            }
        }

        Ok(outcome)
    }

    /// Applies `PENDING -> terminal`. Any other transition is logged and
    /// ignored, and the current record is returned.
    pub async fn update_status(
        &self,
        id: Uuid,
        new_status: TxStatus,
    ) -> Result<LedgerTransaction, AppError> {
        let current = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transaction {}", id)))?;

        if !current.status.can_transition_to(new_status) {
            warn!(
                id = %id,
                reference = current.reference.as_deref().unwrap_or("-"),
                from = %current.status,
                to = %new_status,
                "Rejected status transition"
            );
            return Ok(current);
        }

        match self
            .repository
            .transition_status(id, current.status, new_status)
            .await?
        {
            Some(updated) => {
                info!(
                    id = %id,
                    reference = updated.reference.as_deref().unwrap_or("-"),
                    network = %updated.network,
                    from = %current.status,
                    to = %updated.status,
                    "Transaction status updated"
                );
                Ok(updated)
            }
            None => {
                // Another writer settled it first. Report what is stored now.
                let stored = self
                    .repository
                    .find_by_id(id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Transaction {}", id)))?;
                debug!(id = %id, status = %stored.status, "Lost status race, record already settled");
                Ok(stored)
            }
        }
    }

    /// Records owned by `owner_id` with a type in `types`, newest first.
    /// An empty `types` slice returns every type.
    pub async fn query(
        &self,
        owner_id: &str,
        types: &[TxType],
    ) -> Result<Vec<LedgerTransaction>, AppError> {
        Ok(self
            .repository
            .find_by_owner_and_types(owner_id, types)
            .await?)
    }

    pub async fn pending_for_owner(
        &self,
        owner_id: &str,
    ) -> Result<Vec<LedgerTransaction>, AppError> {
        Ok(self
            .repository
            .find_by_owner_and_status(owner_id, TxStatus::Pending)
            .await?)
    }

    pub async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<LedgerTransaction>, AppError> {
        Ok(self.repository.find_by_reference(reference).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<LedgerTransaction, AppError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transaction {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryTransactionRepository;
    use crate::domain::{synthetic_reference, Network};
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    fn recorder() -> TransactionRecorder {
        TransactionRecorder::new(Arc::new(MemoryTransactionRepository::new()))
    }

    fn transfer(reference: Option<&str>, proof: Proof) -> NewTransaction {
        NewTransaction {
            owner_id: "alice".to_string(),
            counterparty_address: "0xbob".to_string(),
            amount: BigDecimal::from_str("0.25").unwrap(),
            token: "ETH".to_string(),
            network: Network::Evm,
            reference: reference.map(str::to_string),
            tx_type: TxType::Transfer,
            proof,
        }
    }

    #[tokio::test]
    async fn initial_status_follows_proof() {
        let recorder = recorder();

        let confirmed = recorder
            .record(transfer(Some("0x1"), Proof::Confirmed))
            .await
            .unwrap();
        let pending = recorder
            .record(transfer(Some("0x2"), Proof::Pending))
            .await
            .unwrap();
        let failed = recorder.record(transfer(None, Proof::Failed)).await.unwrap();

        assert_eq!(confirmed.status, TxStatus::Confirmed);
        assert_eq!(pending.status, TxStatus::Pending);
        assert_eq!(failed.status, TxStatus::Failed);
        assert!(failed.reference.is_none());
    }

    #[tokio::test]
    async fn missing_reference_without_failure_is_rejected() {
        let err = recorder()
            .record(transfer(None, Proof::Pending))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn recording_same_reference_twice_returns_first_record() {
        let recorder = recorder();
        let first = recorder
            .record(transfer(Some("0xAAA"), Proof::Pending))
            .await
            .unwrap();

        let mut again = transfer(Some("0xAAA"), Proof::Confirmed);
        again.amount = BigDecimal::from(99);
        let second = recorder.record(again).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(recorder.query("alice", &[]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn record_outcome_reports_existing_reference() {
        let recorder = recorder();
        let first = recorder
            .record_outcome(transfer(Some("0xdup"), Proof::Pending))
            .await
            .unwrap();
        assert!(first.was_inserted());

        let second = recorder
            .record_outcome(transfer(Some("0xdup"), Proof::Confirmed))
            .await
            .unwrap();
        assert!(!second.was_inserted());
        assert_eq!(second.into_inner().status, TxStatus::Pending);
    }

    #[tokio::test]
    async fn terminal_status_never_changes() {
        let recorder = recorder();
        let tx = recorder
            .record(transfer(Some("0xAAA"), Proof::Pending))
            .await
            .unwrap();

        let confirmed = recorder
            .update_status(tx.id, TxStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, TxStatus::Confirmed);

        for next in [TxStatus::Failed, TxStatus::Timeout, TxStatus::Pending] {
            let unchanged = recorder.update_status(tx.id, next).await.unwrap();
            assert_eq!(unchanged.status, TxStatus::Confirmed);
        }
    }

    #[tokio::test]
    async fn pending_cannot_be_reentered() {
        let recorder = recorder();
        let tx = recorder
            .record(transfer(Some("0xAAA"), Proof::Pending))
            .await
            .unwrap();

        let same = recorder.update_status(tx.id, TxStatus::Pending).await.unwrap();
        assert_eq!(same.status, TxStatus::Pending);
        assert_eq!(same.updated_at, tx.updated_at);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let err = recorder()
            .update_status(Uuid::new_v4(), TxStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn query_filters_types_newest_first() {
        let recorder = recorder();
        recorder
            .record(transfer(Some("0x1"), Proof::Confirmed))
            .await
            .unwrap();

        let mut faucet = transfer(None, Proof::Pending);
        faucet.tx_type = TxType::FaucetFunding;
        faucet.reference = Some(synthetic_reference(Network::Evm, &faucet.counterparty_address));
        recorder.record(faucet).await.unwrap();

        let mut mint = transfer(Some("0x3"), Proof::Confirmed);
        mint.tx_type = TxType::Minting;
        recorder.record(mint).await.unwrap();

        let all = recorder.query("alice", &[]).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at));

        let funding = recorder
            .query("alice", &[TxType::FaucetFunding, TxType::Minting])
            .await
            .unwrap();
        assert_eq!(funding.len(), 2);
        assert!(funding.iter().all(|tx| tx.tx_type != TxType::Transfer));

        assert!(recorder.query("mallory", &[]).await.unwrap().is_empty());
        assert_eq!(recorder.pending_for_owner("alice").await.unwrap().len(), 1);
    }
}
