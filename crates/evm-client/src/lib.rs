//! evm-client: wallet-provider client with capability detection
//!
//! Every read and write goes through a single [`WalletProvider`] connection.
//! [`EvmClient`] wraps it with request timeouts, hex-quantity decoding and
//! typed ABI calls; [`queries`] builds the contract reads on top.

pub mod abi;
pub mod capabilities;
pub mod provider;
pub mod queries;
pub mod retry;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, TxHash, U256};
use alloy_sol_types::SolCall;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use twinroute_core::{ProviderConfig, ProviderError};

pub use capabilities::{CapabilityTier, ProviderCapabilities};
pub use provider::{JsonRpcProvider, WalletProvider};

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Transaction to estimate or broadcast through the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    #[serde(default)]
    pub value: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<u64>,
}

impl TransactionRequest {
    pub fn new(from: Address, to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            from,
            to,
            data: data.into(),
            value: U256::ZERO,
            gas: None,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }

    /// JSON-RPC transaction object with hex quantities
    fn to_rpc(&self) -> Value {
        let mut tx = json!({
            "from": self.from,
            "to": self.to,
            "data": self.data,
            "value": format!("{:#x}", self.value),
        });
        if let Some(gas) = self.gas {
            tx["gas"] = json!(format!("{:#x}", gas));
        }
        tx
    }
}

/// Mined transaction receipt, reduced to what confirmation needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub transaction_hash: TxHash,
    /// `true` when the transaction executed without reverting
    pub success: bool,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
}

/// High-level EVM client over a single wallet-provider connection
#[derive(Clone)]
pub struct EvmClient {
    provider: Arc<dyn WalletProvider>,
    timeout: Duration,
    capabilities: Arc<RwLock<Option<ProviderCapabilities>>>,
}

impl EvmClient {
    /// Connect to a JSON-RPC wallet endpoint and probe it
    pub async fn connect(config: &ProviderConfig, expected_chain_id: u64) -> Result<Self> {
        let provider = JsonRpcProvider::new(&config.url)?;
        let client = Self::with_provider(
            Arc::new(provider),
            Duration::from_secs(config.request_timeout_secs),
        );
        client.refresh_capabilities(expected_chain_id).await;
        Ok(client)
    }

    /// Wrap an existing provider without probing
    pub fn with_provider(provider: Arc<dyn WalletProvider>, timeout: Duration) -> Self {
        Self {
            provider,
            timeout,
            capabilities: Arc::new(RwLock::new(None)),
        }
    }

    /// Provider endpoint description (for status reporting)
    pub fn endpoint(&self) -> String {
        self.provider.endpoint()
    }

    pub async fn refresh_capabilities(&self, expected_chain_id: u64) {
        let caps = capabilities::detect_capabilities(self, expected_chain_id).await;
        let mut lock = self.capabilities.write().await;
        *lock = Some(caps);
    }

    /// Last probed capabilities (may be stale)
    pub async fn capabilities(&self) -> Option<ProviderCapabilities> {
        self.capabilities.read().await.clone()
    }

    /// Issue a raw request with the configured timeout
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        tracing::trace!(method, "provider request");
        timed_request(self.timeout, self.provider.request(method, params)).await
    }

    /// `eth_call` against the latest block
    pub async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let result = self
            .request("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await?;
        parse_bytes(&result)
    }

    /// Encode, call and decode a typed contract read
    pub async fn call_typed<C: SolCall>(&self, to: Address, call: &C) -> Result<C::Return> {
        let raw = self.call(to, Bytes::from(call.abi_encode())).await?;
        C::abi_decode_returns(&raw, true).map_err(|e| {
            ProviderError::ParseError(format!("{} returned malformed data: {}", C::SIGNATURE, e))
        })
    }

    /// Broadcast through the wallet; returns as soon as a hash is known
    pub async fn send_transaction(&self, tx: &TransactionRequest) -> Result<TxHash> {
        let result = self
            .request("eth_sendTransaction", json!([tx.to_rpc()]))
            .await?;
        parse_hash(&result)
    }

    /// `None` while the transaction is pending
    pub async fn get_transaction_receipt(&self, hash: TxHash) -> Result<Option<TxReceipt>> {
        let result = self
            .request("eth_getTransactionReceipt", json!([hash]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }

        let status = result
            .get("status")
            .map(parse_u64)
            .transpose()?
            .ok_or_else(|| ProviderError::ParseError("receipt has no status".to_string()))?;
        let block_number = result
            .get("blockNumber")
            .filter(|v| !v.is_null())
            .map(parse_u64)
            .transpose()?;
        let gas_used = result
            .get("gasUsed")
            .filter(|v| !v.is_null())
            .map(parse_u64)
            .transpose()?;

        Ok(Some(TxReceipt {
            transaction_hash: hash,
            success: status == 1,
            block_number,
            gas_used,
        }))
    }

    pub async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64> {
        let result = self.request("eth_estimateGas", json!([tx.to_rpc()])).await?;
        parse_u64(&result)
    }

    pub async fn chain_id(&self) -> Result<u64> {
        let result = self.request("eth_chainId", json!([])).await?;
        parse_u64(&result)
    }

    pub async fn accounts(&self) -> Result<Vec<Address>> {
        let result = self.request("eth_accounts", json!([])).await?;
        serde_json::from_value(result).map_err(|e| ProviderError::ParseError(e.to_string()))
    }

    /// Native balance in wei
    pub async fn get_balance(&self, owner: Address) -> Result<U256> {
        let result = self
            .request("eth_getBalance", json!([owner, "latest"]))
            .await?;
        parse_u256(&result)
    }
}

/// Apply a timeout to a provider future
async fn timed_request<T>(
    limit: Duration,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| ProviderError::Timeout {
            secs: limit.as_secs(),
        })?
}

fn as_hex_str(value: &Value) -> Result<&str> {
    value
        .as_str()
        .ok_or_else(|| ProviderError::ParseError(format!("expected hex string, got {}", value)))
}

/// Parse a `0x` quantity into a U256
pub fn parse_u256(value: &Value) -> Result<U256> {
    let raw = as_hex_str(value)?;
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16)
        .map_err(|e| ProviderError::ParseError(format!("bad quantity {}: {}", raw, e)))
}

/// Parse a `0x` quantity that must fit in a u64
pub fn parse_u64(value: &Value) -> Result<u64> {
    let wide = parse_u256(value)?;
    u64::try_from(wide)
        .map_err(|_| ProviderError::ParseError(format!("quantity {} exceeds u64", wide)))
}

fn parse_bytes(value: &Value) -> Result<Bytes> {
    let raw = as_hex_str(value)?;
    raw.parse::<Bytes>()
        .map_err(|e| ProviderError::ParseError(format!("bad data {}: {}", raw, e)))
}

fn parse_hash(value: &Value) -> Result<TxHash> {
    let raw = as_hex_str(value)?;
    raw.parse::<TxHash>()
        .map_err(|e| ProviderError::ParseError(format!("bad transaction hash {}: {}", raw, e)))
}
