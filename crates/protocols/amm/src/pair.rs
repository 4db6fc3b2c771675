//! Pair Resolver
//!
//! Per router, determines whether a pool exists for a token pair, whether it
//! holds liquidity, and reads its reserves and LP supply. Lookup failures are
//! logged and reported as "no pool"; they never propagate.

use alloy_primitives::Address;
use evm_client::{queries, EvmClient};
use twinroute_core::{lowercase_hex, ChainConfig, ProviderError, RouterId, RouterSet};

use crate::state::{PairInfo, Pool};

/// Resolves pairs on the two configured routers
#[derive(Clone)]
pub struct PairResolver {
    client: EvmClient,
    routers: RouterSet,
    wrapped_native: Address,
    native_sentinel: Address,
}

impl PairResolver {
    pub fn new(client: EvmClient, routers: RouterSet, chain: &ChainConfig) -> Self {
        Self {
            client,
            routers,
            wrapped_native: chain.wrapped_native,
            native_sentinel: chain.native_sentinel,
        }
    }

    pub fn routers(&self) -> &RouterSet {
        &self.routers
    }

    /// Replace the native sentinel with the wrapped-native address
    pub fn canonical(&self, token: Address) -> Address {
        if token == self.native_sentinel {
            self.wrapped_native
        } else {
            token
        }
    }

    /// Resolve a pair on one router. Never fails.
    pub async fn resolve(&self, token_a: Address, token_b: Address, router: RouterId) -> PairInfo {
        let a = self.canonical(token_a);
        let b = self.canonical(token_b);
        match self.try_resolve(a, b, router).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(
                    router = %router,
                    token_a = %lowercase_hex(&a),
                    token_b = %lowercase_hex(&b),
                    error = %e,
                    "Pair lookup failed, treating as no pool"
                );
                PairInfo::missing(router, a, b)
            }
        }
    }

    /// Resolve on both routers concurrently, in priority order
    pub async fn resolve_both(&self, token_a: Address, token_b: Address) -> [PairInfo; 2] {
        let (primary, secondary) = futures::join!(
            self.resolve(token_a, token_b, RouterId::Primary),
            self.resolve(token_a, token_b, RouterId::Secondary),
        );
        [primary, secondary]
    }

    /// Full pool state for a resolved, existing pair
    pub fn to_pool(&self, info: &PairInfo) -> Option<Pool> {
        let address = info.pool_address?;
        let (reserve_a, reserve_b) = info.reserves?;
        let (token0, token1) = sort_tokens(info.token_a, info.token_b);
        let (reserve0, reserve1) = if token0 == info.token_a {
            (reserve_a, reserve_b)
        } else {
            (reserve_b, reserve_a)
        };
        Some(Pool {
            address,
            router: info.router,
            token0,
            token1,
            reserve0,
            reserve1,
            total_supply: info.total_supply.unwrap_or_default(),
            fee_bps: self.routers.get(info.router).fee_bps,
        })
    }

    async fn try_resolve(
        &self,
        a: Address,
        b: Address,
        router: RouterId,
    ) -> Result<PairInfo, ProviderError> {
        if a == b {
            return Ok(PairInfo::missing(router, a, b));
        }

        let factory = self.routers.get(router).factory;
        let pair = queries::get_pair(&self.client, factory, a, b).await?;
        if pair == Address::ZERO {
            tracing::debug!(router = %router, "No pool for pair");
            return Ok(PairInfo::missing(router, a, b));
        }

        let ((reserve0, reserve1), token0, total_supply) = tokio::try_join!(
            queries::get_reserves(&self.client, pair),
            queries::pair_token0(&self.client, pair),
            queries::total_supply(&self.client, pair),
        )?;

        let (expected0, _) = sort_tokens(a, b);
        if token0 != expected0 {
            if token0 != a && token0 != b {
                return Err(ProviderError::ParseError(format!(
                    "pair {} reports token0 {} outside the requested pair",
                    lowercase_hex(&pair),
                    lowercase_hex(&token0)
                )));
            }
            tracing::warn!(
                pair = %lowercase_hex(&pair),
                token0 = %lowercase_hex(&token0),
                "Pair token0 disagrees with address sort order, using on-chain value"
            );
        }

        let reserves = if token0 == a {
            (reserve0, reserve1)
        } else {
            (reserve1, reserve0)
        };
        let has_liquidity = !reserves.0.is_zero() && !reserves.1.is_zero();

        tracing::debug!(
            router = %router,
            pair = %lowercase_hex(&pair),
            reserve_a = %reserves.0,
            reserve_b = %reserves.1,
            "Resolved pair"
        );

        Ok(PairInfo {
            router,
            token_a: a,
            token_b: b,
            pair_exists: true,
            has_liquidity,
            reserves: Some(reserves),
            total_supply: Some(total_supply),
            pool_address: Some(pair),
        })
    }
}

/// Sort two addresses the way V2 factories do (ascending, which matches
/// lowercase-hex order)
pub fn sort_tokens(a: Address, b: Address) -> (Address, Address) {
    if lowercase_hex(&a) <= lowercase_hex(&b) {
        (a, b)
    } else {
        (b, a)
    }
}

/// First liquid pair in router priority order
pub fn select_liquid(pairs: &[PairInfo]) -> Option<&PairInfo> {
    RouterId::PRIORITY
        .iter()
        .find_map(|id| pairs.iter().find(|p| p.router == *id && p.has_liquidity))
}
