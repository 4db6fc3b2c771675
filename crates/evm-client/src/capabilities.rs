//! Provider capability detection
//!
//! Detects whether the wallet provider is reachable, which chain it is on and
//! whether it exposes an account to sign with.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::EvmClient;

/// Capability tier based on what the provider can do for us
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CapabilityTier {
    /// Right chain and an unlocked account - quotes and transactions
    Full,
    /// Right chain but no account - quotes only
    ReadOnly,
    /// Reachable but on another chain - nothing is safe to do
    WrongChain,
    /// Unreachable
    Offline,
}

impl CapabilityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "Full",
            Self::ReadOnly => "ReadOnly",
            Self::WrongChain => "WrongChain",
            Self::Offline => "Offline",
        }
    }

    pub fn can_quote(&self) -> bool {
        matches!(self, Self::Full | Self::ReadOnly)
    }

    pub fn can_transact(&self) -> bool {
        matches!(self, Self::Full)
    }
}

/// Provider capabilities detected through probing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    pub is_online: bool,
    pub chain_id: Option<u64>,
    pub expected_chain_id: u64,
    pub accounts: Vec<Address>,
    pub capability_tier: CapabilityTier,
}

impl ProviderCapabilities {
    pub fn chain_matches(&self) -> bool {
        self.chain_id == Some(self.expected_chain_id)
    }

    /// First exposed account, the one wallets treat as selected
    pub fn primary_account(&self) -> Option<Address> {
        self.accounts.first().copied()
    }
}

/// Probe `eth_chainId` and `eth_accounts`
pub async fn detect_capabilities(client: &EvmClient, expected_chain_id: u64) -> ProviderCapabilities {
    let chain_id = match client.chain_id().await {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(endpoint = %client.endpoint(), error = %e, "Provider unreachable");
            return ProviderCapabilities {
                is_online: false,
                chain_id: None,
                expected_chain_id,
                accounts: Vec::new(),
                capability_tier: CapabilityTier::Offline,
            };
        }
    };

    // Locked wallets answer eth_accounts with an empty list or an error
    let accounts = client.accounts().await.unwrap_or_else(|e| {
        tracing::debug!(error = %e, "eth_accounts failed, treating as no accounts");
        Vec::new()
    });

    let capability_tier = if chain_id != expected_chain_id {
        tracing::warn!(
            chain_id,
            expected_chain_id,
            "Provider is connected to an unexpected chain"
        );
        CapabilityTier::WrongChain
    } else if accounts.is_empty() {
        CapabilityTier::ReadOnly
    } else {
        CapabilityTier::Full
    };

    tracing::info!(
        chain_id,
        accounts = accounts.len(),
        tier = capability_tier.as_str(),
        "Provider capabilities detected"
    );

    ProviderCapabilities {
        is_online: true,
        chain_id: Some(chain_id),
        expected_chain_id,
        accounts,
        capability_tier,
    }
}
