//! AMM State Types
//!
//! Data structures for pools, pair lookups and quotes.

use std::fmt;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use twinroute_core::{lowercase_hex, ProviderError, RouterId};

use crate::constants::fees::PPM;

/// Constant-product pool state, in the pair's own sorted order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub address: Address,
    pub router: RouterId,
    pub token0: Address,
    pub token1: Address,
    pub reserve0: U256,
    pub reserve1: U256,
    /// LP token supply
    pub total_supply: U256,
    pub fee_bps: u16,
}

impl Pool {
    pub fn has_liquidity(&self) -> bool {
        !self.reserve0.is_zero() && !self.reserve1.is_zero()
    }

    /// (reserve_in, reserve_out) for a swap that sells `token_in`
    pub fn reserves_for(&self, token_in: Address) -> Option<(U256, U256)> {
        if token_in == self.token0 {
            Some((self.reserve0, self.reserve1))
        } else if token_in == self.token1 {
            Some((self.reserve1, self.reserve0))
        } else {
            None
        }
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pool {} | {}: {} | {}: {}",
            self.router,
            lowercase_hex(&self.address),
            lowercase_hex(&self.token0),
            self.reserve0,
            lowercase_hex(&self.token1),
            self.reserve1
        )
    }
}

/// Result of resolving a token pair on one router.
///
/// Reserves are in the caller's (token_a, token_b) order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairInfo {
    pub router: RouterId,
    pub token_a: Address,
    pub token_b: Address,
    pub pair_exists: bool,
    pub has_liquidity: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserves: Option<(U256, U256)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_supply: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_address: Option<Address>,
}

impl PairInfo {
    /// No pool on this router (or the lookup failed)
    pub fn missing(router: RouterId, token_a: Address, token_b: Address) -> Self {
        Self {
            router,
            token_a,
            token_b,
            pair_exists: false,
            has_liquidity: false,
            reserves: None,
            total_supply: None,
            pool_address: None,
        }
    }

    /// (reserve_a, reserve_b) when the pool exists and holds liquidity
    pub fn liquid_reserves(&self) -> Option<(U256, U256)> {
        if self.has_liquidity {
            self.reserves
        } else {
            None
        }
    }
}

/// Which side of the swap the user fixed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapDirection {
    /// Input fixed, output estimated
    ExactIn,
    /// Output fixed, input estimated
    ExactOut,
}

/// Price impact of a quote.
///
/// `NotComputed` means reserves were not available, which is not the same as
/// an impact of zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PriceImpact {
    NotComputed,
    Computed { ppm: u32 },
}

impl PriceImpact {
    /// Impact as a percentage, for display
    pub fn percent(&self) -> Option<f64> {
        match self {
            Self::NotComputed => None,
            Self::Computed { ppm } => Some(*ppm as f64 * 100.0 / PPM as f64),
        }
    }

    /// Impact in basis points, rounded up
    pub fn bps_ceil(&self) -> Option<u32> {
        match self {
            Self::NotComputed => None,
            Self::Computed { ppm } => Some(ppm.div_ceil(100)),
        }
    }
}

/// A priced route through one router
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteQuote {
    pub direction: SwapDirection,
    pub amount_in: U256,
    pub amount_out: U256,
    /// Output per input in display units
    pub exchange_rate: f64,
    pub price_impact: PriceImpact,
    /// Set for exact-input quotes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_received: Option<U256>,
    /// Set for exact-output quotes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_input: Option<U256>,
    pub slippage_bps: u16,
    /// Surfaced when the impact exceeds the configured threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_slippage_bps: Option<u16>,
    pub router: RouterId,
    pub router_address: Address,
    pub gas_estimate: u64,
    pub fee_on_transfer: bool,
    /// Router path; native legs appear as the wrapped-native address
    pub path: Vec<Address>,
    pub liquidity_available: bool,
}

impl RouteQuote {
    pub fn hop_count(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    /// Slippage-protected bound sent to the router
    pub fn amount_limit(&self) -> U256 {
        match self.direction {
            SwapDirection::ExactIn => self.minimum_received.unwrap_or(self.amount_out),
            SwapDirection::ExactOut => self.maximum_input.unwrap_or(self.amount_in),
        }
    }
}

/// Native <-> wrapped-native conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapKind {
    Wrap,
    Unwrap,
}

/// 1:1 conversion through the wrapped-native contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrapQuote {
    pub kind: WrapKind,
    pub amount_in: U256,
    pub amount_out: U256,
    pub contract: Address,
    pub gas_estimate: u64,
}

/// Outcome of a quote request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuoteOutcome {
    Wrap(WrapQuote),
    Route(RouteQuote),
    NoRoute { reason: String },
}

impl QuoteOutcome {
    pub fn no_route(reason: impl Into<String>) -> Self {
        Self::NoRoute {
            reason: reason.into(),
        }
    }

    pub fn route(&self) -> Option<&RouteQuote> {
        match self {
            Self::Route(quote) => Some(quote),
            _ => None,
        }
    }
}

/// AMM protocol errors
#[derive(Debug, Clone, Error)]
pub enum AmmError {
    #[error("Pool not found: {0}")]
    PoolNotFound(String),

    #[error("Insufficient liquidity for swap")]
    InsufficientLiquidity,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Arithmetic overflow in {0}")]
    Overflow(&'static str),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl AmmError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::PoolNotFound(_) => "pool_not_found",
            Self::InsufficientLiquidity => "insufficient_liquidity",
            Self::InvalidToken(_) => "invalid_token",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::Overflow(_) => "overflow",
            Self::Provider(_) => "provider_error",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidToken(_) | Self::InvalidAmount(_) | Self::Overflow(_) => 400,
            Self::PoolNotFound(_) => 404,
            Self::InsufficientLiquidity => 422,
            Self::Provider(_) => 503,
        }
    }
}
