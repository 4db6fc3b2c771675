//! Typed contract reads

use alloy_primitives::{Address, Bytes, FixedBytes, U256};
use twinroute_core::ProviderError;

use crate::abi::{IUniswapV2Factory, IUniswapV2Pair, IERC20};
use crate::{EvmClient, Result};

/// ERC-20 metadata read from the token contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

/// Factory `getPair`; the zero address means no pool exists
pub async fn get_pair(
    client: &EvmClient,
    factory: Address,
    token_a: Address,
    token_b: Address,
) -> Result<Address> {
    let ret = client
        .call_typed(
            factory,
            &IUniswapV2Factory::getPairCall {
                tokenA: token_a,
                tokenB: token_b,
            },
        )
        .await?;
    Ok(ret.pair)
}

/// Pair reserves in the pair's own token0/token1 order
pub async fn get_reserves(client: &EvmClient, pair: Address) -> Result<(U256, U256)> {
    let ret = client
        .call_typed(pair, &IUniswapV2Pair::getReservesCall {})
        .await?;
    Ok((U256::from(ret.reserve0), U256::from(ret.reserve1)))
}

pub async fn pair_token0(client: &EvmClient, pair: Address) -> Result<Address> {
    let ret = client.call_typed(pair, &IUniswapV2Pair::token0Call {}).await?;
    Ok(ret._0)
}

pub async fn total_supply(client: &EvmClient, token: Address) -> Result<U256> {
    let ret = client.call_typed(token, &IERC20::totalSupplyCall {}).await?;
    Ok(ret._0)
}

pub async fn balance_of(client: &EvmClient, token: Address, owner: Address) -> Result<U256> {
    let ret = client
        .call_typed(token, &IERC20::balanceOfCall { owner })
        .await?;
    Ok(ret._0)
}

pub async fn allowance(
    client: &EvmClient,
    token: Address,
    owner: Address,
    spender: Address,
) -> Result<U256> {
    let ret = client
        .call_typed(token, &IERC20::allowanceCall { owner, spender })
        .await?;
    Ok(ret._0)
}

pub async fn token_metadata(client: &EvmClient, token: Address) -> Result<TokenMetadata> {
    let (symbol, name, decimals) = tokio::try_join!(
        client.call_typed(token, &IERC20::symbolCall {}),
        client.call_typed(token, &IERC20::nameCall {}),
        client.call_typed(token, &IERC20::decimalsCall {}),
    )?;
    Ok(TokenMetadata {
        symbol: symbol._0,
        name: name._0,
        decimals: decimals._0,
    })
}

/// Call a zero-argument view function by selector and read one 32-byte word.
///
/// Returns `None` when the contract answered with anything other than a
/// single word (including an empty return from a missing function).
pub async fn probe_word(
    client: &EvmClient,
    token: Address,
    selector: FixedBytes<4>,
) -> Result<Option<U256>> {
    let data = Bytes::copy_from_slice(selector.as_slice());
    let raw = match client.call(token, data).await {
        Ok(raw) => raw,
        // A revert just means the function is absent
        Err(ProviderError::Rpc { .. }) => return Ok(None),
        Err(e) => return Err(e),
    };
    if raw.len() != 32 {
        return Ok(None);
    }
    Ok(Some(U256::from_be_slice(&raw)))
}
