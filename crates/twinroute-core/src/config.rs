//! Configuration types for twinroute

use std::path::Path;

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};

use crate::types::{RouterId, NATIVE_SENTINEL};
use crate::Error;

/// Wallet-provider connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// JSON-RPC endpoint of the wallet provider (e.g., "http://127.0.0.1:1248")
    pub url: String,

    /// Per-request timeout
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:1248".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Chain identity and the native/wrapped-native pair
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub wrapped_native: Address,
    pub native_sentinel: Address,
    pub native_symbol: String,
    pub native_name: String,
    pub wrapped_symbol: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            wrapped_native: address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"),
            native_sentinel: NATIVE_SENTINEL,
            native_symbol: "ETH".to_string(),
            native_name: "Ether".to_string(),
            wrapped_symbol: "WETH".to_string(),
        }
    }
}

impl ChainConfig {
    /// Whether `address` stands for the chain's native coin
    pub fn is_native(&self, address: Address) -> bool {
        address == self.native_sentinel
    }
}

/// One router contract and the factory it resolves pairs through
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub name: String,
    pub router: Address,
    pub factory: Address,
    /// Swap fee in basis points (30 = 0.3%)
    pub fee_bps: u16,
}

/// Exactly two routers, primary evaluated first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterSet {
    pub primary: RouterConfig,
    pub secondary: RouterConfig,
}

impl RouterSet {
    pub fn get(&self, id: RouterId) -> &RouterConfig {
        match id {
            RouterId::Primary => &self.primary,
            RouterId::Secondary => &self.secondary,
        }
    }

    /// Which router owns a given router contract address
    pub fn id_of(&self, router: Address) -> Option<RouterId> {
        RouterId::PRIORITY
            .into_iter()
            .find(|id| self.get(*id).router == router)
    }
}

impl Default for RouterSet {
    fn default() -> Self {
        Self {
            primary: RouterConfig {
                name: "Uniswap V2".to_string(),
                router: address!("7a250d5630b4cf539739df2c5dacb4c659f2488d"),
                factory: address!("5c69bee701ef814a2b6a3edd4b1652cb9cc5aa6f"),
                fee_bps: 30,
            },
            secondary: RouterConfig {
                name: "SushiSwap".to_string(),
                router: address!("d9e1ce17f2641f24ae83637ab66a2cca9c378b9f"),
                factory: address!("c0aee478e3658e2610c5f7a4a2e1777ce9e4f2ac"),
                fee_bps: 30,
            },
        }
    }
}

/// Quoting policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteConfig {
    /// Slippage used when the caller does not pass one (50 = 0.5%)
    pub default_slippage_bps: u16,
    /// Price impact above which a recommended slippage is surfaced
    pub high_impact_threshold_bps: u16,
    /// Added on top of the impact when recommending slippage
    pub slippage_safety_margin_bps: u16,
    /// Upper bound on concurrent reads per fan-out
    pub max_read_concurrency: usize,
    /// Slippage suggested at least for fee-on-transfer swaps, whose tax
    /// the pool math cannot see
    pub fee_on_transfer_slippage_bps: u16,
    /// Prepared quotes older than this are refused at confirmation
    pub quote_ttl_secs: u64,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            default_slippage_bps: 50,
            high_impact_threshold_bps: 300,
            slippage_safety_margin_bps: 100,
            max_read_concurrency: 4,
            fee_on_transfer_slippage_bps: 1_200,
            quote_ttl_secs: 60,
        }
    }
}

/// Transaction orchestration policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Upward buffer on required allowance (100 = 1%)
    pub allowance_buffer_bps: u16,
    /// Gas estimate multiplier in percent (120 = +20%)
    pub gas_multiplier_pct: u64,
    pub receipt_poll_interval_ms: u64,
    pub receipt_poll_attempts: u32,
    pub send_retry_attempts: u32,
    pub send_retry_backoff_ms: u64,
    pub allowance_read_attempts: u32,
    /// Treat confirmation-poll exhaustion as an unconfirmed terminal state
    /// rather than an error
    pub optimistic_confirmation: bool,
    /// Router call deadline, seconds from submission
    pub deadline_secs: u64,
    /// Idle flows are dropped this long after being prepared
    pub flow_retention_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            allowance_buffer_bps: 100,
            gas_multiplier_pct: 120,
            receipt_poll_interval_ms: 2_000,
            receipt_poll_attempts: 30,
            send_retry_attempts: 3,
            send_retry_backoff_ms: 1_500,
            allowance_read_attempts: 3,
            optimistic_confirmation: true,
            deadline_secs: 20 * 60,
            flow_retention_secs: 10 * 60,
        }
    }
}

/// Fee-on-transfer detection data
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeTokenConfig {
    /// Tokens previously observed to charge a transfer fee
    pub known_tokens: Vec<Address>,
    /// Zero-argument view functions whose non-zero result marks a fee token
    pub probe_functions: Vec<String>,
}

impl Default for FeeTokenConfig {
    fn default() -> Self {
        Self {
            known_tokens: vec![
                // PAX Gold
                address!("45804880de22913dafe09f4980848ece6ecbaf78"),
                // Statera
                address!("a7de087329bfcda5639247f96140f9dabe3deed1"),
            ],
            probe_functions: [
                "_taxFee()",
                "_liquidityFee()",
                "taxFee()",
                "liquidityFee()",
                "_reflectionFee()",
                "reflectionFee()",
                "totalFee()",
                "_totalFee()",
                "buyTax()",
                "sellTax()",
                "transferFee()",
                "_transferFee()",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub chain: ChainConfig,

    #[serde(default)]
    pub routers: RouterSet,

    #[serde(default)]
    pub quote: QuoteConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub fee_tokens: FeeTokenConfig,

    /// API server port
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

fn default_api_port() -> u16 {
    19_545
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            chain: ChainConfig::default(),
            routers: RouterSet::default(),
            quote: QuoteConfig::default(),
            execution: ExecutionConfig::default(),
            fee_tokens: FeeTokenConfig::default(),
            api_port: default_api_port(),
        }
    }
}

impl AppConfig {
    /// Load from a JSON file. Missing sections fall back to defaults.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let config: AppConfig =
            serde_json::from_str(&raw).map_err(|e| Error::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.routers.primary.router == self.routers.secondary.router {
            return Err(Error::Config(
                "primary and secondary routers must differ".to_string(),
            ));
        }
        for router in [&self.routers.primary, &self.routers.secondary] {
            if router.fee_bps >= 10_000 {
                return Err(Error::Config(format!(
                    "{} fee_bps must be below 10000",
                    router.name
                )));
            }
        }
        if self.chain.wrapped_native == self.chain.native_sentinel {
            return Err(Error::Config(
                "wrapped-native address cannot equal the native sentinel".to_string(),
            ));
        }
        if self.execution.flow_retention_secs < self.quote.quote_ttl_secs {
            return Err(Error::Config(
                "flow_retention_secs must be at least quote_ttl_secs".to_string(),
            ));
        }
        if self.quote.max_read_concurrency == 0 {
            return Err(Error::Config(
                "max_read_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
