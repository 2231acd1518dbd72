//! Postgres implementation of TransactionRepository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{LedgerTransaction, TransactionDraft, TxStatus, TxType};
use crate::ports::{InsertOutcome, RepositoryError, RepositoryResult, TransactionRepository};

const COLUMNS: &str = "id, owner_id, counterparty_address, amount, token, network, reference, \
                       status, tx_type, created_at, updated_at";

/// Postgres-backed ledger store.
#[derive(Clone)]
pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_many(
        &self,
        query: sqlx::query::QueryAs<'_, sqlx::Postgres, TransactionRow, sqlx::postgres::PgArguments>,
    ) -> RepositoryResult<Vec<LedgerTransaction>> {
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(into_domain_skipping_corrupt(rows))
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn insert_if_absent(&self, draft: &TransactionDraft) -> RepositoryResult<InsertOutcome> {
        // The partial unique index on `reference` makes this a single atomic write.
        let sql = format!(
            r#"
            INSERT INTO ledger_transactions (
                owner_id, counterparty_address, amount, token, network,
                reference, status, tx_type, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            ON CONFLICT (reference) WHERE reference IS NOT NULL DO NOTHING
            RETURNING {COLUMNS}
            "#
        );
        let inserted = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(&draft.owner_id)
            .bind(&draft.counterparty_address)
            .bind(&draft.amount)
            .bind(&draft.token)
            .bind(draft.network.as_str())
            .bind(&draft.reference)
            .bind(draft.status.as_str())
            .bind(draft.tx_type.as_str())
            .bind(draft.created_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        if let Some(row) = inserted {
            return Ok(InsertOutcome::Inserted(row.try_into_domain()?));
        }

        // Conflict: only possible with a non-null reference.
        let reference = draft.reference.as_deref().unwrap_or_default();
        match self.find_by_reference(reference).await? {
            Some(existing) => Ok(InsertOutcome::Existing(existing)),
            None => Err(RepositoryError::NotFound(format!(
                "reference {} conflicted but could not be read back",
                reference
            ))),
        }
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: TxStatus,
        to: TxStatus,
    ) -> RepositoryResult<Option<LedgerTransaction>> {
        let sql = format!(
            "UPDATE ledger_transactions SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND status = $2 RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.map(TransactionRow::try_into_domain).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<LedgerTransaction>> {
        let sql = format!("SELECT {COLUMNS} FROM ledger_transactions WHERE id = $1");
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.map(TransactionRow::try_into_domain).transpose()
    }

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> RepositoryResult<Option<LedgerTransaction>> {
        let sql = format!("SELECT {COLUMNS} FROM ledger_transactions WHERE reference = $1");
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(reference)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.map(TransactionRow::try_into_domain).transpose()
    }

    async fn find_by_status(&self, status: TxStatus) -> RepositoryResult<Vec<LedgerTransaction>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM ledger_transactions WHERE status = $1 ORDER BY created_at ASC"
        );
        self.fetch_many(sqlx::query_as::<_, TransactionRow>(&sql).bind(status.as_str()))
            .await
    }

    async fn find_by_owner_and_status(
        &self,
        owner_id: &str,
        status: TxStatus,
    ) -> RepositoryResult<Vec<LedgerTransaction>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM ledger_transactions \
             WHERE owner_id = $1 AND status = $2 ORDER BY created_at DESC"
        );
        self.fetch_many(
            sqlx::query_as::<_, TransactionRow>(&sql)
                .bind(owner_id)
                .bind(status.as_str()),
        )
        .await
    }

    async fn find_by_owner_and_types(
        &self,
        owner_id: &str,
        types: &[TxType],
    ) -> RepositoryResult<Vec<LedgerTransaction>> {
        let types: Vec<String> = types.iter().map(|t| t.as_str().to_string()).collect();
        let sql = format!(
            "SELECT {COLUMNS} FROM ledger_transactions \
             WHERE owner_id = $1 AND (cardinality($2::text[]) = 0 OR tx_type = ANY($2)) \
             ORDER BY created_at DESC"
        );
        self.fetch_many(
            sqlx::query_as::<_, TransactionRow>(&sql)
                .bind(owner_id)
                .bind(types),
        )
        .await
    }
}

fn into_domain_skipping_corrupt(rows: Vec<TransactionRow>) -> Vec<LedgerTransaction> {
    rows.into_iter()
        .filter_map(|row| match row.try_into_domain() {
            Ok(tx) => Some(tx),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable ledger row");
                None
            }
        })
        .collect()
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    owner_id: String,
    counterparty_address: String,
    amount: bigdecimal::BigDecimal,
    token: String,
    network: String,
    reference: Option<String>,
    status: String,
    tx_type: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TransactionRow {
    fn try_into_domain(self) -> RepositoryResult<LedgerTransaction> {
        let corrupt = |e: crate::domain::ParseEnumError| RepositoryError::Corrupt {
            id: self.id.to_string(),
            reason: e.to_string(),
        };
        let network = self.network.parse().map_err(corrupt)?;
        let status = self.status.parse().map_err(corrupt)?;
        let tx_type = self.tx_type.parse().map_err(corrupt)?;

        Ok(LedgerTransaction {
            id: self.id,
            owner_id: self.owner_id,
            counterparty_address: self.counterparty_address,
            amount: self.amount,
            token: self.token,
            network,
            reference: self.reference,
            status,
            tx_type,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
