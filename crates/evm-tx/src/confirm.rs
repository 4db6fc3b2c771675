//! Receipt polling
//!
//! Running out of attempts is not an error here: the transaction may still
//! be mined later. Callers decide what an exhausted budget means.

use std::time::Duration;

use alloy_primitives::TxHash;
use evm_client::{EvmClient, TxReceipt};
use twinroute_core::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, attempts: u32) -> Self {
        Self { interval, attempts }
    }

    /// Total wait budget
    pub fn budget(&self) -> Duration {
        self.interval * self.attempts
    }
}

/// Poll for a receipt until mined or the attempts are used up.
///
/// Transient read errors count as a pending poll; any other provider error
/// is returned.
pub async fn wait_for_receipt(
    client: &EvmClient,
    hash: TxHash,
    policy: PollPolicy,
) -> Result<Option<TxReceipt>, ProviderError> {
    for attempt in 1..=policy.attempts {
        match client.get_transaction_receipt(hash).await {
            Ok(Some(receipt)) => {
                tracing::debug!(
                    tx = %hash,
                    attempt,
                    success = receipt.success,
                    block = ?receipt.block_number,
                    "Receipt found"
                );
                return Ok(Some(receipt));
            }
            Ok(None) => {}
            Err(e) if e.is_transient() => {
                tracing::warn!(tx = %hash, attempt, error = %e, "Receipt poll failed, will retry");
            }
            Err(e) => return Err(e),
        }
        if attempt < policy.attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    tracing::info!(
        tx = %hash,
        attempts = policy.attempts,
        "No receipt within polling budget"
    );
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use evm_client::testing::MockProvider;

    fn policy() -> PollPolicy {
        PollPolicy::new(Duration::from_millis(2_000), 3)
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_scripted_receipt() {
        let mock = MockProvider::new();
        let hash = TxHash::repeat_byte(0xab);
        mock.set_receipt(hash, false);

        let receipt = wait_for_receipt(&mock.client(), hash, policy())
            .await
            .unwrap()
            .unwrap();
        assert!(!receipt.success);
        assert_eq!(mock.request_count("eth_getTransactionReceipt"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_budget() {
        let mock = MockProvider::new();
        let hash = TxHash::repeat_byte(0xcd);

        let receipt = wait_for_receipt(&mock.client(), hash, policy()).await.unwrap();
        assert!(receipt.is_none());
        assert_eq!(mock.request_count("eth_getTransactionReceipt"), 3);
    }

    #[test]
    fn test_budget() {
        assert_eq!(policy().budget(), Duration::from_secs(6));
    }
}
