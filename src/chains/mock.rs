//! Scriptable in-memory chain clients for tests and local runs.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{
    ChainError, ChainProbe, ChainResult, EvmBlock, EvmChain, EvmReceipt, EvmTransfer,
    SolanaChain, SolanaTransaction, XrplLedger, XrplTransaction,
};
use crate::domain::Network;

fn unreachable_node(what: &str) -> ChainError {
    ChainError::InvalidResponse(format!("mock node unreachable: {}", what))
}

#[derive(Clone, Default)]
pub struct MockEvmChain {
    height: Arc<AtomicU64>,
    height_unreachable: Arc<AtomicBool>,
    receipts: Arc<Mutex<HashMap<String, EvmReceipt>>>,
    failing_receipts: Arc<Mutex<HashSet<String>>>,
    blocks: Arc<Mutex<HashMap<u64, EvmBlock>>>,
    failing_blocks: Arc<Mutex<HashSet<u64>>>,
    receipt_calls: Arc<AtomicUsize>,
}

impl MockEvmChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    pub fn set_height_unreachable(&self, unreachable: bool) {
        self.height_unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn insert_receipt(&self, hash: &str, block_number: u64, success: bool) {
        self.receipts.lock().unwrap().insert(
            hash.to_string(),
            EvmReceipt {
                transaction_hash: hash.to_string(),
                block_number,
                success,
            },
        );
    }

    pub fn fail_receipt(&self, hash: &str) {
        self.failing_receipts
            .lock()
            .unwrap()
            .insert(hash.to_string());
    }

    /// Adds a transfer to block `number`, creating the block if needed.
    pub fn insert_transfer(&self, number: u64, hash: &str, from: &str, to: &str, value_wei: u128) {
        let mut blocks = self.blocks.lock().unwrap();
        let block = blocks.entry(number).or_insert_with(|| EvmBlock {
            number,
            transactions: Vec::new(),
        });
        block.transactions.push(EvmTransfer {
            hash: hash.to_string(),
            from: from.to_string(),
            to: Some(to.to_string()),
            value_wei,
        });
    }

    pub fn fail_block(&self, number: u64) {
        self.failing_blocks.lock().unwrap().insert(number);
    }

    pub fn receipt_calls(&self) -> usize {
        self.receipt_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EvmChain for MockEvmChain {
    async fn block_number(&self) -> ChainResult<u64> {
        if self.height_unreachable.load(Ordering::SeqCst) {
            return Err(unreachable_node("eth_blockNumber"));
        }
        Ok(self.height.load(Ordering::SeqCst))
    }

    async fn transaction_receipt(&self, hash: &str) -> ChainResult<Option<EvmReceipt>> {
        self.receipt_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_receipts.lock().unwrap().contains(hash) {
            return Err(unreachable_node(hash));
        }
        Ok(self.receipts.lock().unwrap().get(hash).cloned())
    }

    async fn block_with_transactions(&self, number: u64) -> ChainResult<Option<EvmBlock>> {
        if self.failing_blocks.lock().unwrap().contains(&number) {
            return Err(unreachable_node(&format!("block {}", number)));
        }
        let block = self.blocks.lock().unwrap().get(&number).cloned();
        // Blocks that exist but carry nothing are returned empty.
        Ok(block.or_else(|| {
            (number <= self.height.load(Ordering::SeqCst)).then(|| EvmBlock {
                number,
                transactions: Vec::new(),
            })
        }))
    }
}

#[async_trait]
impl ChainProbe for MockEvmChain {
    fn network(&self) -> Network {
        Network::Evm
    }

    async fn latest_height(&self) -> ChainResult<u64> {
        self.block_number().await
    }
}

#[derive(Clone, Default)]
pub struct MockXrplLedger {
    transactions: Arc<Mutex<HashMap<String, XrplTransaction>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl MockXrplLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_transaction(&self, hash: &str, validated: bool) {
        self.transactions.lock().unwrap().insert(
            hash.to_string(),
            XrplTransaction {
                hash: hash.to_string(),
                validated,
                ledger_index: validated.then_some(1),
            },
        );
    }

    pub fn fail(&self, hash: &str) {
        self.failing.lock().unwrap().insert(hash.to_string());
    }
}

#[async_trait]
impl XrplLedger for MockXrplLedger {
    async fn transaction(&self, hash: &str) -> ChainResult<Option<XrplTransaction>> {
        if self.failing.lock().unwrap().contains(hash) {
            return Err(unreachable_node(hash));
        }
        Ok(self.transactions.lock().unwrap().get(hash).cloned())
    }
}

#[derive(Clone, Default)]
pub struct MockSolanaChain {
    transactions: Arc<Mutex<HashMap<String, SolanaTransaction>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl MockSolanaChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_transaction(&self, signature: &str, error: Option<serde_json::Value>) {
        self.transactions.lock().unwrap().insert(
            signature.to_string(),
            SolanaTransaction {
                signature: signature.to_string(),
                slot: 1,
                error,
            },
        );
    }

    pub fn fail(&self, signature: &str) {
        self.failing.lock().unwrap().insert(signature.to_string());
    }
}

#[async_trait]
impl SolanaChain for MockSolanaChain {
    async fn transaction(&self, signature: &str) -> ChainResult<Option<SolanaTransaction>> {
        if self.failing.lock().unwrap().contains(signature) {
            return Err(unreachable_node(signature));
        }
        Ok(self.transactions.lock().unwrap().get(signature).cloned())
    }
}
