//! Postgres implementation of WalletDirectory.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::Network;
use crate::ports::{RepositoryError, RepositoryResult, TrackedWallet, WalletDirectory};

#[derive(Clone)]
pub struct PostgresWalletDirectory {
    pool: PgPool,
}

impl PostgresWalletDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WalletDirectory for PostgresWalletDirectory {
    async fn tracked_wallets(&self, network: Network) -> RepositoryResult<Vec<TrackedWallet>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT owner_id, address FROM tracked_wallets WHERE network = $1 ORDER BY owner_id",
        )
        .bind(network.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows
            .into_iter()
            .map(|(owner_id, address)| TrackedWallet {
                owner_id,
                network,
                address,
            })
            .collect())
    }
}
