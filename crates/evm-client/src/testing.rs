//! Scriptable in-memory wallet provider for tests

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use alloy_primitives::{keccak256, Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use serde_json::{json, Value};
use twinroute_core::ProviderError;

use crate::{EvmClient, WalletProvider};

type CallKey = (Address, Bytes);

struct SendHook {
    to: Address,
    key: CallKey,
    response: Bytes,
}

struct MockState {
    chain_id: u64,
    accounts: Vec<Address>,
    calls: HashMap<CallKey, Bytes>,
    balances: HashMap<Address, U256>,
    receipts: HashMap<TxHash, bool>,
    auto_receipt: Option<bool>,
    gas_estimate: Option<u64>,
    send_failures: VecDeque<ProviderError>,
    send_hooks: Vec<SendHook>,
    sent: Vec<Value>,
    methods: Vec<String>,
    nonce: u64,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            chain_id: 1,
            accounts: Vec::new(),
            calls: HashMap::new(),
            balances: HashMap::new(),
            receipts: HashMap::new(),
            auto_receipt: None,
            gas_estimate: Some(150_000),
            send_failures: VecDeque::new(),
            send_hooks: Vec::new(),
            sent: Vec::new(),
            methods: Vec::new(),
            nonce: 0,
        }
    }
}

/// Provider whose `eth_call` answers are scripted by (to, calldata).
///
/// Unscripted calls revert. Sends are recorded and receive deterministic
/// hashes; receipts exist only once scripted or when `auto_receipt` is on.
#[derive(Clone, Default)]
pub struct MockProvider {
    state: Arc<Mutex<MockState>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client over this mock with a short timeout
    pub fn client(&self) -> EvmClient {
        EvmClient::with_provider(Arc::new(self.clone()), Duration::from_secs(5))
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_chain_id(&self, chain_id: u64) {
        self.state().chain_id = chain_id;
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        self.state().accounts = accounts;
    }

    pub fn set_call(&self, to: Address, calldata: impl Into<Bytes>, response: impl Into<Bytes>) {
        self.state()
            .calls
            .insert((to, calldata.into()), response.into());
    }

    pub fn set_native_balance(&self, owner: Address, balance: U256) {
        self.state().balances.insert(owner, balance);
    }

    pub fn set_receipt(&self, hash: TxHash, success: bool) {
        self.state().receipts.insert(hash, success);
    }

    /// Mine every subsequent send immediately with the given status
    pub fn set_auto_receipt(&self, success: Option<bool>) {
        self.state().auto_receipt = success;
    }

    /// `None` makes `eth_estimateGas` revert
    pub fn set_gas_estimate(&self, gas: Option<u64>) {
        self.state().gas_estimate = gas;
    }

    /// Fail the next send with this error (queued, one per send)
    pub fn fail_next_send(&self, error: ProviderError) {
        self.state().send_failures.push_back(error);
    }

    /// After a successful send to `to`, rescript one `eth_call` answer
    pub fn on_send(
        &self,
        to: Address,
        call_to: Address,
        calldata: impl Into<Bytes>,
        response: impl Into<Bytes>,
    ) {
        self.state().send_hooks.push(SendHook {
            to,
            key: (call_to, calldata.into()),
            response: response.into(),
        });
    }

    /// Transaction objects passed to `eth_sendTransaction`, in order
    pub fn sent_transactions(&self) -> Vec<Value> {
        self.state().sent.clone()
    }

    /// How many times a JSON-RPC method was requested
    pub fn request_count(&self, method: &str) -> usize {
        self.state().methods.iter().filter(|m| *m == method).count()
    }

    fn handle(&self, method: &str, params: &Value) -> Result<Value, ProviderError> {
        let mut state = self.state();
        state.methods.push(method.to_string());

        match method {
            "eth_chainId" => Ok(json!(format!("{:#x}", state.chain_id))),
            "eth_accounts" => Ok(json!(state.accounts)),
            "eth_getBalance" => {
                let owner = param_address(&params[0])?;
                let balance = state.balances.get(&owner).copied().unwrap_or_default();
                Ok(json!(format!("{:#x}", balance)))
            }
            "eth_call" => {
                let key = call_key(&params[0])?;
                match state.calls.get(&key) {
                    Some(response) => Ok(json!(response)),
                    None => Err(reverted()),
                }
            }
            "eth_estimateGas" => match state.gas_estimate {
                Some(gas) => Ok(json!(format!("{:#x}", gas))),
                None => Err(reverted()),
            },
            "eth_sendTransaction" => {
                if let Some(error) = state.send_failures.pop_front() {
                    return Err(error);
                }
                let tx = params[0].clone();
                let to = param_address(&tx["to"])?;
                state.nonce += 1;
                let hash = keccak256(state.nonce.to_be_bytes());

                let fired: Vec<(CallKey, Bytes)> = state
                    .send_hooks
                    .iter()
                    .filter(|hook| hook.to == to)
                    .map(|hook| (hook.key.clone(), hook.response.clone()))
                    .collect();
                for (key, response) in fired {
                    state.calls.insert(key, response);
                }
                if let Some(success) = state.auto_receipt {
                    state.receipts.insert(hash, success);
                }
                state.sent.push(tx);
                Ok(json!(hash))
            }
            "eth_getTransactionReceipt" => {
                let hash: TxHash = serde_json::from_value(params[0].clone())
                    .map_err(|e| ProviderError::ParseError(e.to_string()))?;
                Ok(match state.receipts.get(&hash) {
                    Some(success) => json!({
                        "transactionHash": hash,
                        "status": if *success { "0x1" } else { "0x0" },
                        "blockNumber": "0x10",
                        "gasUsed": "0x5208",
                    }),
                    None => Value::Null,
                })
            }
            other => Err(ProviderError::Rpc {
                code: -32601,
                message: format!("method {} not supported", other),
                data: None,
            }),
        }
    }
}

#[async_trait]
impl WalletProvider for MockProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.handle(method, &params)
    }

    fn endpoint(&self) -> String {
        "mock://provider".to_string()
    }
}

fn reverted() -> ProviderError {
    ProviderError::Rpc {
        code: 3,
        message: "execution reverted".to_string(),
        data: None,
    }
}

fn param_address(value: &Value) -> Result<Address, ProviderError> {
    serde_json::from_value(value.clone()).map_err(|e| ProviderError::ParseError(e.to_string()))
}

fn call_key(tx: &Value) -> Result<CallKey, ProviderError> {
    let to = param_address(&tx["to"])?;
    let data: Bytes = serde_json::from_value(tx["data"].clone())
        .map_err(|e| ProviderError::ParseError(e.to_string()))?;
    Ok((to, data))
}
