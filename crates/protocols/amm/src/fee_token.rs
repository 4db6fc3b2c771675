//! Fee-on-transfer token detection
//!
//! A token is treated as fee-on-transfer when it is in the known-token list
//! or when any catalogued fee/reflection view function returns a non-zero
//! word. Anything inconclusive is reported as a standard token.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use alloy_primitives::Address;
use evm_client::{abi::selector, queries, EvmClient};
use futures::future::join_all;
use twinroute_core::{lowercase_hex, FeeTokenConfig};

/// Source of fee-on-transfer detection data
pub trait FeeTokenSource: Send + Sync {
    fn is_known_fee_token(&self, token: Address) -> bool;

    /// Zero-argument view function signatures, e.g. `"_taxFee()"`
    fn probe_signatures(&self) -> Vec<String>;
}

/// In-memory catalog seeded from configuration; can be extended at runtime
pub struct FeeTokenCatalog {
    inner: RwLock<CatalogData>,
}

struct CatalogData {
    known: HashSet<Address>,
    probes: Vec<String>,
}

impl FeeTokenCatalog {
    pub fn from_config(config: &FeeTokenConfig) -> Self {
        Self {
            inner: RwLock::new(CatalogData {
                known: config.known_tokens.iter().copied().collect(),
                probes: config.probe_functions.clone(),
            }),
        }
    }

    pub fn add_known_token(&self, token: Address) {
        let mut data = self.inner.write().unwrap_or_else(|e| e.into_inner());
        data.known.insert(token);
    }

    pub fn add_probe(&self, signature: impl Into<String>) {
        let signature = signature.into();
        let mut data = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if !data.probes.contains(&signature) {
            data.probes.push(signature);
        }
    }
}

impl FeeTokenSource for FeeTokenCatalog {
    fn is_known_fee_token(&self, token: Address) -> bool {
        let data = self.inner.read().unwrap_or_else(|e| e.into_inner());
        data.known.contains(&token)
    }

    fn probe_signatures(&self) -> Vec<String> {
        let data = self.inner.read().unwrap_or_else(|e| e.into_inner());
        data.probes.clone()
    }
}

/// Probes token contracts against a [`FeeTokenSource`]
#[derive(Clone)]
pub struct FeeOnTransferDetector {
    client: EvmClient,
    source: Arc<dyn FeeTokenSource>,
}

impl FeeOnTransferDetector {
    pub fn new(client: EvmClient, source: Arc<dyn FeeTokenSource>) -> Self {
        Self { client, source }
    }

    pub fn source(&self) -> &Arc<dyn FeeTokenSource> {
        &self.source
    }

    /// `true` if the token charges a transfer fee. Never fails.
    pub async fn probe(&self, token: Address) -> bool {
        if self.source.is_known_fee_token(token) {
            tracing::debug!(token = %lowercase_hex(&token), "Known fee-on-transfer token");
            return true;
        }

        let signatures = self.source.probe_signatures();
        let results = join_all(
            signatures
                .iter()
                .map(|sig| queries::probe_word(&self.client, token, selector(sig))),
        )
        .await;

        let mut failures = 0usize;
        for (sig, result) in signatures.iter().zip(results) {
            match result {
                Ok(Some(word)) if !word.is_zero() => {
                    tracing::info!(
                        token = %lowercase_hex(&token),
                        function = %sig,
                        value = %word,
                        "Detected fee-on-transfer token"
                    );
                    return true;
                }
                Ok(_) => {}
                Err(_) => failures += 1,
            }
        }

        if failures > 0 {
            tracing::warn!(
                token = %lowercase_hex(&token),
                failures,
                "Fee-on-transfer probe inconclusive, assuming standard token"
            );
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, U256};
    use evm_client::testing::MockProvider;

    const TOKEN: Address = address!("5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a");

    fn detector(mock: &MockProvider) -> (FeeOnTransferDetector, Arc<FeeTokenCatalog>) {
        let catalog = Arc::new(FeeTokenCatalog::from_config(&FeeTokenConfig::default()));
        (
            FeeOnTransferDetector::new(mock.client(), catalog.clone()),
            catalog,
        )
    }

    #[tokio::test]
    async fn test_known_token_short_circuits() {
        let mock = MockProvider::new();
        let (d, _) = detector(&mock);
        let paxg = FeeTokenConfig::default().known_tokens[0];
        assert!(d.probe(paxg).await);
        assert_eq!(mock.request_count("eth_call"), 0);
    }

    #[tokio::test]
    async fn test_nonzero_fee_function_detected() {
        let mock = MockProvider::new();
        mock.set_call(
            TOKEN,
            selector("_taxFee()").to_vec(),
            U256::from(2u64).to_be_bytes::<32>().to_vec(),
        );
        let (d, _) = detector(&mock);
        assert!(d.probe(TOKEN).await);
    }

    #[tokio::test]
    async fn test_zero_fee_is_standard() {
        let mock = MockProvider::new();
        mock.set_call(
            TOKEN,
            selector("taxFee()").to_vec(),
            U256::ZERO.to_be_bytes::<32>().to_vec(),
        );
        let (d, _) = detector(&mock);
        assert!(!d.probe(TOKEN).await);
    }

    #[tokio::test]
    async fn test_catalog_is_updatable() {
        let mock = MockProvider::new();
        mock.set_call(
            TOKEN,
            selector("marketingFee()").to_vec(),
            U256::from(3u64).to_be_bytes::<32>().to_vec(),
        );
        let (d, catalog) = detector(&mock);
        assert!(!d.probe(TOKEN).await);
        catalog.add_probe("marketingFee()");
        assert!(d.probe(TOKEN).await);

        let other = Address::repeat_byte(0x6b);
        catalog.add_known_token(other);
        assert!(d.probe(other).await);
    }
}
