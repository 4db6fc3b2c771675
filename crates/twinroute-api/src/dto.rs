//! Data Transfer Objects for API requests and responses
//!
//! Amounts cross the API as decimal strings in token units. Embedded quotes
//! carry raw base units.

use alloy_primitives::Address;
use amm::{AddLiquidityQuote, QuoteOutcome, RemoveLiquidityQuote, SwapDirection, TokenBalance};
use evm_tx::{FlowOutcome, TransactionState};
use serde::{Deserialize, Serialize};
use twinroute_core::{RouterId, Token, WalletKind};
use uuid::Uuid;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Provider status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStatusResponse {
    pub connected: bool,
    pub endpoint: String,
    pub chain_id: Option<u64>,
    pub expected_chain_id: u64,
    pub accounts: Vec<Address>,
    pub capability_tier: String,
    pub can_quote: bool,
    pub can_transact: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokensResponse {
    pub tokens: Vec<Token>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportTokenRequest {
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeTokenRequest {
    pub address: String,
}

/// Swap quote request. `token_in`/`token_out` are symbols or addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub token_in: String,
    pub token_out: String,
    /// Input amount for exact-in, desired output for exact-out
    pub amount: String,
    #[serde(default = "default_direction")]
    pub direction: SwapDirection,
    pub slippage_bps: Option<u16>,
}

fn default_direction() -> SwapDirection {
    SwapDirection::ExactIn
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteResponse {
    pub token_in: Token,
    pub token_out: Token,
    pub outcome: QuoteOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_in: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_out: Option<String>,
    /// Price impact in percent when computed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_impact_percent: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddLiquidityRequest {
    pub token_a: String,
    pub token_b: String,
    pub amount_a: String,
    /// Required for a first deposit
    pub amount_b: Option<String>,
    #[serde(default = "default_router")]
    pub router: RouterId,
    pub slippage_bps: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveLiquidityRequest {
    pub token_a: String,
    pub token_b: String,
    /// LP tokens to burn, decimal string (18 decimals)
    pub liquidity: String,
    #[serde(default = "default_router")]
    pub router: RouterId,
    pub slippage_bps: Option<u16>,
}

fn default_router() -> RouterId {
    RouterId::Primary
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddLiquidityQuoteResponse {
    pub token_a: Token,
    pub token_b: Token,
    pub quote: AddLiquidityQuote,
    pub amount_a: String,
    pub amount_b: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveLiquidityQuoteResponse {
    pub token_a: Token,
    pub token_b: Token,
    pub quote: RemoveLiquidityQuote,
    pub amount_a: String,
    pub amount_b: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancesQuery {
    pub account: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancesResponse {
    pub account: Address,
    pub balances: Vec<TokenBalance>,
}

/// Common fields for preparing a flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionFields {
    /// Account to act for; defaults to the provider's selected account
    pub account: Option<String>,
    pub wallet: Option<WalletKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareSwapRequest {
    #[serde(flatten)]
    pub session: SessionFields,
    #[serde(flatten)]
    pub quote: QuoteRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareAddLiquidityRequest {
    #[serde(flatten)]
    pub session: SessionFields,
    #[serde(flatten)]
    pub quote: AddLiquidityRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareRemoveLiquidityRequest {
    #[serde(flatten)]
    pub session: SessionFields,
    #[serde(flatten)]
    pub quote: RemoveLiquidityRequest,
}

/// Identifies a prepared flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowIdRequest {
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowResponse {
    pub id: Uuid,
    pub kind: String,
    pub account: Address,
    pub state: TransactionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<FlowOutcome>,
    /// Quote the flow will execute
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowsResponse {
    pub flows: Vec<FlowResponse>,
    pub busy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub id: Uuid,
    pub cancelled: bool,
}

/// Generic API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("bad_request", message)
    }
}
