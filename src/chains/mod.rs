//! Network clients, one per finality model.
//!
//! Each chain is consumed through a narrow trait so the finality checkers and
//! the deposit scanner can run against the JSON-RPC clients in production and
//! against `mock` clients in tests.

pub mod evm;
pub mod mock;
pub mod rpc;
pub mod solana;
pub mod xrpl;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Network;

pub use evm::EvmRpcClient;
pub use rpc::RpcTransport;
pub use solana::SolanaRpcClient;
pub use xrpl::XrplRpcClient;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Circuit breaker open: {0}")]
    CircuitOpen(String),
}

pub type ChainResult<T> = Result<T, ChainError>;

/// Receipt of a mined EVM transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmReceipt {
    pub transaction_hash: String,
    pub block_number: u64,
    pub success: bool,
}

/// A value transfer carried by an EVM block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmTransfer {
    pub hash: String,
    pub from: String,
    /// `None` for contract creation.
    pub to: Option<String>,
    pub value_wei: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmBlock {
    pub number: u64,
    pub transactions: Vec<EvmTransfer>,
}

/// XRPL transaction as returned by the `tx` method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrplTransaction {
    pub hash: String,
    pub validated: bool,
    pub ledger_index: Option<u64>,
}

/// Solana transaction as returned by `getTransaction`.
#[derive(Debug, Clone, PartialEq)]
pub struct SolanaTransaction {
    pub signature: String,
    pub slot: u64,
    /// `meta.err`; `None` when the transaction executed successfully.
    pub error: Option<serde_json::Value>,
}

#[async_trait]
pub trait EvmChain: Send + Sync {
    async fn block_number(&self) -> ChainResult<u64>;

    /// `None` when the node has no receipt yet.
    async fn transaction_receipt(&self, hash: &str) -> ChainResult<Option<EvmReceipt>>;

    async fn block_with_transactions(&self, number: u64) -> ChainResult<Option<EvmBlock>>;
}

#[async_trait]
pub trait XrplLedger: Send + Sync {
    /// `None` when the server reports `txnNotFound`.
    async fn transaction(&self, hash: &str) -> ChainResult<Option<XrplTransaction>>;
}

#[async_trait]
pub trait SolanaChain: Send + Sync {
    async fn transaction(&self, signature: &str) -> ChainResult<Option<SolanaTransaction>>;
}

/// Cheap liveness probe used by the health endpoint.
#[async_trait]
pub trait ChainProbe: Send + Sync {
    fn network(&self) -> Network;

    /// Current block height, ledger index or slot.
    async fn latest_height(&self) -> ChainResult<u64>;
}
