//! Wallet balance reads
//!
//! One failing token never fails the whole batch; its entry carries the error.

use alloy_primitives::{Address, U256};
use evm_client::{queries, EvmClient};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use twinroute_core::Token;

use crate::units;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub token: Token,
    pub raw: U256,
    /// Decimal string in token units
    pub formatted: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Read `owner`'s balance of each token, at most `concurrency` reads in flight.
/// Results keep the order of `tokens`; the token at `native` reads the coin balance.
pub async fn fetch_balances(
    client: &EvmClient,
    owner: Address,
    tokens: &[Token],
    native: Address,
    concurrency: usize,
) -> Vec<TokenBalance> {
    stream::iter(tokens.iter().cloned())
        .map(|token| async move {
            let read = if token.address == native {
                client.get_balance(owner).await
            } else {
                queries::balance_of(client, token.address, owner).await
            };
            match read {
                Ok(raw) => TokenBalance {
                    formatted: units::format_amount(raw, token.decimals),
                    raw,
                    error: None,
                    token,
                },
                Err(e) => {
                    tracing::warn!(token = %token.symbol, error = %e, "Balance read failed");
                    TokenBalance {
                        raw: U256::ZERO,
                        formatted: "0".to_string(),
                        error: Some(e.to_string()),
                        token,
                    }
                }
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}
