use async_trait::async_trait;
use serde_json::{json, Value};

use super::rpc::RpcTransport;
use super::{ChainError, ChainProbe, ChainResult, XrplLedger, XrplTransaction};
use crate::domain::Network;

const TXN_NOT_FOUND: &str = "txnNotFound";

/// rippled JSON-RPC client. rippled uses its own envelope (`{"method", "params": [{..}]}`
/// with errors reported inside `result`), so it talks to the transport directly.
#[derive(Clone)]
pub struct XrplRpcClient {
    transport: RpcTransport,
}

impl XrplRpcClient {
    pub fn new(transport: RpcTransport) -> Self {
        Self { transport }
    }

    async fn request(&self, method: &str, params: Value) -> ChainResult<Value> {
        let mut body = self
            .transport
            .post(json!({ "method": method, "params": [params] }))
            .await?;

        body.get_mut("result")
            .map(Value::take)
            .ok_or_else(|| ChainError::InvalidResponse(format!("{}: missing result", method)))
    }
}

fn rippled_error(result: &Value) -> Option<(&str, i64, String)> {
    if result.get("status").and_then(Value::as_str) != Some("error") {
        return None;
    }
    let error = result
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let code = result
        .get("error_code")
        .and_then(Value::as_i64)
        .unwrap_or_default();
    let message = result
        .get("error_message")
        .and_then(Value::as_str)
        .unwrap_or(error)
        .to_string();
    Some((error, code, message))
}

#[async_trait]
impl XrplLedger for XrplRpcClient {
    async fn transaction(&self, hash: &str) -> ChainResult<Option<XrplTransaction>> {
        let result = self
            .request("tx", json!({ "transaction": hash, "binary": false }))
            .await?;

        if let Some((error, code, message)) = rippled_error(&result) {
            if error == TXN_NOT_FOUND {
                return Ok(None);
            }
            return Err(ChainError::Rpc { code, message });
        }

        Ok(Some(XrplTransaction {
            hash: result
                .get("hash")
                .and_then(Value::as_str)
                .unwrap_or(hash)
                .to_string(),
            validated: result
                .get("validated")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            ledger_index: result.get("ledger_index").and_then(Value::as_u64),
        }))
    }
}

#[async_trait]
impl ChainProbe for XrplRpcClient {
    fn network(&self) -> Network {
        Network::Xrpl
    }

    async fn latest_height(&self) -> ChainResult<u64> {
        let result = self.request("ledger_current", json!({})).await?;
        if let Some((_, code, message)) = rippled_error(&result) {
            return Err(ChainError::Rpc { code, message });
        }
        result
            .get("ledger_current_index")
            .and_then(Value::as_u64)
            .ok_or_else(|| ChainError::InvalidResponse("ledger_current: no index".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn client_returning(
        body: &str,
    ) -> (mockito::ServerGuard, mockito::Mock, XrplRpcClient) {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;
        let client = XrplRpcClient::new(RpcTransport::new(server.url()));
        (server, mock, client)
    }

    #[tokio::test]
    async fn not_found_is_none() {
        let (_server, _mock, client) = client_returning(
            r#"{"result":{"error":"txnNotFound","error_code":29,"error_message":"Transaction not found.","status":"error"}}"#,
        )
        .await;

        assert!(client.transaction("tx123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reads_validated_flag() {
        let (_server, _mock, client) = client_returning(
            r#"{"result":{"hash":"tx123","ledger_index":56865245,"validated":true,"status":"success"}}"#,
        )
        .await;

        let tx = client.transaction("tx123").await.unwrap().unwrap();
        assert!(tx.validated);
        assert_eq!(tx.ledger_index, Some(56_865_245));
    }

    #[tokio::test]
    async fn other_errors_propagate() {
        let (_server, _mock, client) = client_returning(
            r#"{"result":{"error":"notReady","error_code":13,"status":"error"}}"#,
        )
        .await;

        let err = client.transaction("tx123").await.unwrap_err();
        assert!(matches!(err, ChainError::Rpc { code: 13, .. }));
    }

    #[tokio::test]
    async fn reads_current_ledger_index() {
        let (_server, _mock, client) = client_returning(
            r#"{"result":{"ledger_current_index":8696243,"status":"success"}}"#,
        )
        .await;

        assert_eq!(client.latest_height().await.unwrap(), 8_696_243);
    }
}
