//! Wallet-provider transport

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::{json, Value};
use twinroute_core::ProviderError;

/// A request/response wallet connection (EIP-1193 shaped).
///
/// Implementations return the JSON-RPC `result` on success and map the
/// provider's `error` object to [`ProviderError::Rpc`].
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    /// Human-readable endpoint for status output
    fn endpoint(&self) -> String;
}

/// JSON-RPC over HTTP, e.g. a local signer such as Frame or a node with
/// unlocked accounts
pub struct JsonRpcProvider {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcProvider {
    pub fn new(url: &str) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ProviderError::Unreachable {
                url: format!("{}: {}", url, e),
            })?;
        Ok(Self {
            url: url.to_string(),
            http,
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl WalletProvider for JsonRpcProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        let response = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::Unreachable {
                url: format!("{}: {}", self.url, e),
            })?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        parse_rpc_response(body)
    }

    fn endpoint(&self) -> String {
        self.url.clone()
    }
}

/// Split a JSON-RPC envelope into its result or error
pub fn parse_rpc_response(mut body: Value) -> Result<Value, ProviderError> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        return Err(rpc_error(error));
    }
    match body.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(ProviderError::ParseError(format!(
            "response has neither result nor error: {}",
            body
        ))),
    }
}

fn rpc_error(error: &Value) -> ProviderError {
    let code = error.get("code").and_then(Value::as_i64).unwrap_or(-32603);
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown provider error")
        .to_string();
    // Revert payloads arrive either as a hex string or a nested object
    let data = error.get("data").filter(|d| !d.is_null()).map(|d| match d {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    });
    ProviderError::Rpc {
        code,
        message,
        data,
    }
}
