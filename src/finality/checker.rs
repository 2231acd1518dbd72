//! Core finality checker trait and types

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::chains::ChainError;
use crate::domain::{Network, TxStatus};

/// Result type for finality operations
pub type FinalityResult<T> = Result<T, FinalityError>;

/// Errors that can occur during finality checking
#[derive(Debug, Error)]
pub enum FinalityError {
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),
}

/// What a checker observed for one reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Visible on-chain but not final yet.
    Pending,
    Confirmed,
    Failed,
    /// Not observable yet. Treated exactly like `Pending`.
    Unknown,
}

impl Verdict {
    /// The terminal status this verdict settles on, if any.
    pub fn settled_status(&self) -> Option<TxStatus> {
        match self {
            Verdict::Confirmed => Some(TxStatus::Confirmed),
            Verdict::Failed => Some(TxStatus::Failed),
            Verdict::Pending | Verdict::Unknown => None,
        }
    }
}

/// One strategy per finality model.
///
/// Implementors hold whatever network-specific context they need (a client,
/// a confirmation threshold) so the monitor only ever passes a reference.
#[async_trait]
pub trait FinalityChecker: Send + Sync {
    /// Network whose records this checker handles
    fn network(&self) -> Network;

    async fn check(&self, reference: &str) -> FinalityResult<Verdict>;
}

/// Checkers keyed by network. A network without an entry is skipped by the monitor.
#[derive(Clone, Default)]
pub struct FinalityCheckers {
    checkers: HashMap<Network, Arc<dyn FinalityChecker>>,
}

impl FinalityCheckers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, checker: Arc<dyn FinalityChecker>) -> Self {
        self.register(checker);
        self
    }

    pub fn register(&mut self, checker: Arc<dyn FinalityChecker>) {
        self.checkers.insert(checker.network(), checker);
    }

    pub fn get(&self, network: Network) -> Option<&Arc<dyn FinalityChecker>> {
        self.checkers.get(&network)
    }

    pub fn networks(&self) -> Vec<Network> {
        self.checkers.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }
}
