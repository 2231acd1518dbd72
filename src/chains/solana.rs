use async_trait::async_trait;
use serde_json::{json, Value};

use super::rpc::RpcTransport;
use super::{ChainError, ChainProbe, ChainResult, SolanaChain, SolanaTransaction};
use crate::domain::Network;

/// Solana JSON-RPC client.
#[derive(Clone)]
pub struct SolanaRpcClient {
    transport: RpcTransport,
    commitment: String,
}

impl SolanaRpcClient {
    pub fn new(transport: RpcTransport) -> Self {
        Self {
            transport,
            commitment: "confirmed".to_string(),
        }
    }
}

#[async_trait]
impl SolanaChain for SolanaRpcClient {
    async fn transaction(&self, signature: &str) -> ChainResult<Option<SolanaTransaction>> {
        let result = self
            .transport
            .call(
                "getTransaction",
                json!([
                    signature,
                    {
                        "encoding": "json",
                        "commitment": self.commitment,
                        "maxSupportedTransactionVersion": 0
                    }
                ]),
            )
            .await?;

        if result.is_null() {
            return Ok(None);
        }

        let slot = result
            .get("slot")
            .and_then(Value::as_u64)
            .ok_or_else(|| ChainError::InvalidResponse("getTransaction: missing slot".into()))?;
        let error = result
            .get("meta")
            .and_then(|meta| meta.get("err"))
            .filter(|err| !err.is_null())
            .cloned();

        Ok(Some(SolanaTransaction {
            signature: signature.to_string(),
            slot,
            error,
        }))
    }
}

#[async_trait]
impl ChainProbe for SolanaRpcClient {
    fn network(&self) -> Network {
        Network::Solana
    }

    async fn latest_height(&self) -> ChainResult<u64> {
        let result = self.transport.call("getSlot", json!([])).await?;
        result
            .as_u64()
            .ok_or_else(|| ChainError::InvalidResponse("getSlot: not a number".into()))
    }
}
