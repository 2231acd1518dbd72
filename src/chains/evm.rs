use async_trait::async_trait;
use serde_json::{json, Value};

use super::rpc::RpcTransport;
use super::{ChainError, ChainProbe, ChainResult, EvmBlock, EvmChain, EvmReceipt, EvmTransfer};
use crate::domain::Network;

/// Ethereum-style JSON-RPC client.
#[derive(Clone)]
pub struct EvmRpcClient {
    transport: RpcTransport,
}

impl EvmRpcClient {
    pub fn new(transport: RpcTransport) -> Self {
        Self { transport }
    }
}

fn hex_str<'a>(value: &'a Value, field: &str) -> ChainResult<&'a str> {
    value
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ChainError::InvalidResponse(format!("missing hex field '{}'", field)))
}

fn strip_0x(raw: &str) -> &str {
    raw.strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw)
}

pub(crate) fn parse_quantity(raw: &str) -> ChainResult<u64> {
    let digits = strip_0x(raw);
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| ChainError::InvalidResponse(format!("bad quantity '{}': {}", raw, e)))
}

pub(crate) fn parse_wei(raw: &str) -> ChainResult<u128> {
    let digits = strip_0x(raw);
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| ChainError::InvalidResponse(format!("bad value '{}': {}", raw, e)))
}

fn parse_receipt(value: &Value) -> ChainResult<Option<EvmReceipt>> {
    // Some nodes return a receipt shell with a null block number while pending.
    let Some(block_number) = value.get("blockNumber").and_then(Value::as_str) else {
        return Ok(None);
    };
    // Pre-Byzantium receipts carry no status; treat them as successful.
    let success = match value.get("status").and_then(Value::as_str) {
        Some(status) => parse_quantity(status)? == 1,
        None => true,
    };

    Ok(Some(EvmReceipt {
        transaction_hash: hex_str(value, "transactionHash")?.to_string(),
        block_number: parse_quantity(block_number)?,
        success,
    }))
}

fn parse_block(value: &Value) -> ChainResult<EvmBlock> {
    let number = parse_quantity(hex_str(value, "number")?)?;
    let transactions = value
        .get("transactions")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .map(|tx| {
            Ok(EvmTransfer {
                hash: hex_str(tx, "hash")?.to_string(),
                from: hex_str(tx, "from")?.to_string(),
                to: tx.get("to").and_then(Value::as_str).map(str::to_string),
                value_wei: parse_wei(hex_str(tx, "value")?)?,
            })
        })
        .collect::<ChainResult<Vec<_>>>()?;

    Ok(EvmBlock {
        number,
        transactions,
    })
}

#[async_trait]
impl EvmChain for EvmRpcClient {
    async fn block_number(&self) -> ChainResult<u64> {
        let result = self.transport.call("eth_blockNumber", json!([])).await?;
        let raw = result
            .as_str()
            .ok_or_else(|| ChainError::InvalidResponse("eth_blockNumber: not a string".into()))?;
        parse_quantity(raw)
    }

    async fn transaction_receipt(&self, hash: &str) -> ChainResult<Option<EvmReceipt>> {
        let result = self
            .transport
            .call("eth_getTransactionReceipt", json!([hash]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        parse_receipt(&result)
    }

    async fn block_with_transactions(&self, number: u64) -> ChainResult<Option<EvmBlock>> {
        let result = self
            .transport
            .call("eth_getBlockByNumber", json!([format!("0x{:x}", number), true]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        parse_block(&result).map(Some)
    }
}

#[async_trait]
impl ChainProbe for EvmRpcClient {
    fn network(&self) -> Network {
        Network::Evm
    }

    async fn latest_height(&self) -> ChainResult<u64> {
        self.block_number().await
    }
}
