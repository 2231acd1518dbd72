//! Ledger transaction entity.
//! Storage-agnostic representation of one value transfer on one network.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Lifecycle state of a ledger transaction.
///
/// `Pending` is the only non-terminal state. Every other state is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
    Timeout,
}

impl TxStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "PENDING",
            TxStatus::Confirmed => "CONFIRMED",
            TxStatus::Failed => "FAILED",
            TxStatus::Timeout => "TIMEOUT",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxStatus::Pending)
    }

    /// `PENDING -> {CONFIRMED, FAILED, TIMEOUT}` and nothing else.
    pub fn can_transition_to(&self, next: TxStatus) -> bool {
        *self == TxStatus::Pending && next.is_terminal()
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TxStatus::Pending),
            "CONFIRMED" => Ok(TxStatus::Confirmed),
            "FAILED" => Ok(TxStatus::Failed),
            "TIMEOUT" => Ok(TxStatus::Timeout),
            other => Err(ParseEnumError::new("status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxType {
    /// User-initiated outbound transfer.
    Transfer,
    /// System-initiated native asset funding.
    Funding,
    /// System-issued test asset creation.
    Minting,
    /// Funding requested from a third-party faucet.
    FaucetFunding,
    /// Inbound deposit discovered on-chain with no originating record.
    ExternalFunding,
}

impl TxType {
    pub const ALL: [TxType; 5] = [
        TxType::Transfer,
        TxType::Funding,
        TxType::Minting,
        TxType::FaucetFunding,
        TxType::ExternalFunding,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            TxType::Transfer => "TRANSFER",
            TxType::Funding => "FUNDING",
            TxType::Minting => "MINTING",
            TxType::FaucetFunding => "FAUCET_FUNDING",
            TxType::ExternalFunding => "EXTERNAL_FUNDING",
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TxType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("transaction type", s))
    }
}

/// How a network signals that a submitted operation is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FinalityModel {
    /// Receipt plus a number of confirming blocks on top of it.
    ReceiptDepth,
    /// Transaction carries a `validated` flag once in a closed ledger.
    ValidatedLedger,
    /// Transaction looked up by signature, success or error in its metadata.
    SignatureMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Evm,
    Xrpl,
    Solana,
}

impl Network {
    pub const ALL: [Network; 3] = [Network::Evm, Network::Xrpl, Network::Solana];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Network::Evm => "evm",
            Network::Xrpl => "xrpl",
            Network::Solana => "solana",
        }
    }

    pub const fn finality_model(&self) -> FinalityModel {
        match self {
            Network::Evm => FinalityModel::ReceiptDepth,
            Network::Xrpl => FinalityModel::ValidatedLedger,
            Network::Solana => FinalityModel::SignatureMetadata,
        }
    }

    /// EVM addresses are hex and compare case-insensitively. Base58 addresses do not.
    pub fn addresses_match(&self, a: &str, b: &str) -> bool {
        match self {
            Network::Evm => a.eq_ignore_ascii_case(b),
            Network::Xrpl | Network::Solana => a == b,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Network::ALL
            .into_iter()
            .find(|n| n.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseEnumError::new("network", s))
    }
}

/// What the submitting code knows about the outcome at the time it records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proof {
    /// The network returned a final, successful result synchronously.
    Confirmed,
    /// A reference exists but finality is not yet known.
    Pending,
    /// Submission failed.
    Failed,
}

/// Input to the recorder.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub owner_id: String,
    pub counterparty_address: String,
    pub amount: BigDecimal,
    pub token: String,
    pub network: Network,
    pub reference: Option<String>,
    pub tx_type: TxType,
    pub proof: Proof,
}

/// A fully resolved row waiting to be stored. The store assigns the id.
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    pub owner_id: String,
    pub counterparty_address: String,
    pub amount: BigDecimal,
    pub token: String,
    pub network: Network,
    pub reference: Option<String>,
    pub status: TxStatus,
    pub tx_type: TxType,
    pub created_at: DateTime<Utc>,
}

/// Domain entity representing a recorded transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: Uuid,
    pub owner_id: String,
    pub counterparty_address: String,
    pub amount: BigDecimal,
    pub token: String,
    pub network: Network,
    pub reference: Option<String>,
    pub status: TxStatus,
    pub tx_type: TxType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerTransaction {
    pub fn from_draft(id: Uuid, draft: &TransactionDraft) -> Self {
        Self {
            id,
            owner_id: draft.owner_id.clone(),
            counterparty_address: draft.counterparty_address.clone(),
            amount: draft.amount.clone(),
            token: draft.token.clone(),
            network: draft.network,
            reference: draft.reference.clone(),
            status: draft.status,
            tx_type: draft.tx_type,
            created_at: draft.created_at,
            updated_at: draft.created_at,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
