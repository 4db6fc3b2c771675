//! Liquidity quoting
//!
//! Mirrors the router's own amount selection for `addLiquidity` and the
//! pair's proportional payout for `removeLiquidity`, so the quoted minimums
//! are the ones the router will enforce.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use twinroute_core::{RouterId, Token};

use crate::calculator;
use crate::constants::lp::MINIMUM_LIQUIDITY;
use crate::router::QuoteEngine;
use crate::slippage;
use crate::state::{AmmError, PairInfo};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLiquidityQuote {
    pub router: RouterId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_address: Option<Address>,
    /// No liquidity yet; the deposit sets the price
    pub first_provider: bool,
    pub amount_a: U256,
    pub amount_b: U256,
    pub amount_a_min: U256,
    pub amount_b_min: U256,
    pub lp_minted: U256,
    /// Share of the pool after the deposit
    pub pool_share_ppm: u32,
    pub slippage_bps: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLiquidityQuote {
    pub router: RouterId,
    pub pool_address: Address,
    pub liquidity: U256,
    pub amount_a: U256,
    pub amount_b: U256,
    pub amount_a_min: U256,
    pub amount_b_min: U256,
    /// Share of the pool being withdrawn
    pub pool_share_ppm: u32,
    pub slippage_bps: u16,
}

/// Plan a deposit against resolved pair state.
///
/// With liquidity present, `amount_a` is matched at the pool price; if
/// `amount_b` is given and too small for that, `amount_b` is kept and
/// `amount_a` is reduced instead. A first deposit needs both amounts.
pub fn plan_add_liquidity(
    pair: &PairInfo,
    amount_a: U256,
    amount_b: Option<U256>,
    slippage_bps: u16,
) -> Result<AddLiquidityQuote, AmmError> {
    slippage::validate_slippage(slippage_bps)?;
    if amount_a.is_zero() {
        return Err(AmmError::InvalidAmount("deposit amount is zero".to_string()));
    }

    let (amount_a, amount_b, reserves, supply) = match pair.liquid_reserves() {
        Some((reserve_a, reserve_b)) => {
            let optimal_b = calculator::quote_proportional(amount_a, reserve_a, reserve_b)?;
            let (a, b) = match amount_b {
                Some(desired_b) if optimal_b > desired_b => {
                    let optimal_a = calculator::quote_proportional(desired_b, reserve_b, reserve_a)?;
                    (optimal_a, desired_b)
                }
                _ => (amount_a, optimal_b),
            };
            (a, b, (reserve_a, reserve_b), pair.total_supply.unwrap_or_default())
        }
        None => {
            let b = amount_b.filter(|b| !b.is_zero()).ok_or_else(|| {
                AmmError::InvalidAmount("first deposit needs both token amounts".to_string())
            })?;
            (amount_a, b, (U256::ZERO, U256::ZERO), U256::ZERO)
        }
    };

    let lp_minted = calculator::calculate_lp_minted(amount_a, amount_b, reserves.0, reserves.1, supply)?;
    let supply_after = if supply.is_zero() {
        lp_minted + U256::from(MINIMUM_LIQUIDITY)
    } else {
        supply + lp_minted
    };

    Ok(AddLiquidityQuote {
        router: pair.router,
        pool_address: pair.pool_address,
        first_provider: supply.is_zero(),
        amount_a,
        amount_b,
        amount_a_min: slippage::minimum_received(amount_a, slippage_bps),
        amount_b_min: slippage::minimum_received(amount_b, slippage_bps),
        lp_minted,
        pool_share_ppm: calculator::calculate_pool_share_ppm(lp_minted, supply_after),
        slippage_bps,
    })
}

/// Plan burning `liquidity` LP tokens
pub fn plan_remove_liquidity(
    pair: &PairInfo,
    liquidity: U256,
    slippage_bps: u16,
) -> Result<RemoveLiquidityQuote, AmmError> {
    slippage::validate_slippage(slippage_bps)?;
    let pool_address = pair
        .pool_address
        .filter(|_| pair.pair_exists)
        .ok_or_else(|| AmmError::PoolNotFound(format!("no {} pool for pair", pair.router)))?;
    let (reserve_a, reserve_b) = pair.reserves.ok_or(AmmError::InsufficientLiquidity)?;
    let supply = pair.total_supply.unwrap_or_default();

    let (amount_a, amount_b) =
        calculator::calculate_redeem_shares(liquidity, reserve_a, reserve_b, supply)?;

    Ok(RemoveLiquidityQuote {
        router: pair.router,
        pool_address,
        liquidity,
        amount_a,
        amount_b,
        amount_a_min: slippage::minimum_received(amount_a, slippage_bps),
        amount_b_min: slippage::minimum_received(amount_b, slippage_bps),
        pool_share_ppm: calculator::calculate_pool_share_ppm(liquidity, supply),
        slippage_bps,
    })
}

impl QuoteEngine {
    /// Quote a deposit into the pair on `router`
    pub async fn quote_add_liquidity(
        &self,
        token_a: &Token,
        token_b: &Token,
        amount_a: U256,
        amount_b: Option<U256>,
        router: RouterId,
        slippage_bps: Option<u16>,
    ) -> Result<AddLiquidityQuote, AmmError> {
        let pair = self.resolve_for_liquidity(token_a, token_b, router).await?;
        plan_add_liquidity(
            &pair,
            amount_a,
            amount_b,
            slippage_bps.unwrap_or(self.default_slippage_bps()),
        )
    }

    /// Quote burning LP tokens of the pair on `router`
    pub async fn quote_remove_liquidity(
        &self,
        token_a: &Token,
        token_b: &Token,
        liquidity: U256,
        router: RouterId,
        slippage_bps: Option<u16>,
    ) -> Result<RemoveLiquidityQuote, AmmError> {
        let pair = self.resolve_for_liquidity(token_a, token_b, router).await?;
        plan_remove_liquidity(
            &pair,
            liquidity,
            slippage_bps.unwrap_or(self.default_slippage_bps()),
        )
    }

    async fn resolve_for_liquidity(
        &self,
        token_a: &Token,
        token_b: &Token,
        router: RouterId,
    ) -> Result<PairInfo, AmmError> {
        let a = self.resolver().canonical(token_a.address);
        let b = self.resolver().canonical(token_b.address);
        if a == b {
            return Err(AmmError::InvalidToken(
                "liquidity needs two different tokens".to_string(),
            ));
        }
        Ok(self.resolver().resolve(a, b, router).await)
    }
}
