use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{ChainError, ChainResult};

/// HTTP transport shared by the JSON-RPC clients.
///
/// Every request goes through a consecutive-failures circuit breaker so an
/// unreachable node fails fast instead of holding up a reconciliation cycle.
#[derive(Clone)]
pub struct RpcTransport {
    client: Client,
    url: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
    next_id: Arc<AtomicU64>,
}

impl RpcTransport {
    pub fn new(url: String) -> Self {
        Self::with_circuit_breaker(url, 3, 60)
    }

    pub fn with_circuit_breaker(url: String, failure_threshold: u32, reset_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        RpcTransport {
            client,
            url,
            circuit_breaker,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }

    /// POSTs a raw JSON body and returns the decoded response body.
    pub async fn post(&self, body: Value) -> ChainResult<Value> {
        let client = self.client.clone();
        let url = self.url.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client.post(&url).json(&body).send().await?;
                let response = response.error_for_status()?;
                let value = response.json::<Value>().await?;
                Ok::<Value, ChainError>(value)
            })
            .await;

        match result {
            Ok(value) => Ok(value),
            Err(FailsafeError::Rejected) => Err(ChainError::CircuitOpen(self.url.clone())),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    /// JSON-RPC 2.0 call. Returns `result`, which may be `null`.
    pub async fn call(&self, method: &str, params: Value) -> ChainResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let mut envelope = self.post(body).await?;

        if let Some(error) = envelope.get("error").filter(|e| !e.is_null()) {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(ChainError::Rpc { code, message });
        }

        Ok(envelope
            .get_mut("result")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }
}
