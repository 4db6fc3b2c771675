//! Wrap/Unwrap detection
//!
//! Native <-> wrapped-native requests convert 1:1 through the wrapped-native
//! contract and never touch a router.

use alloy_primitives::{Address, U256};
use twinroute_core::ChainConfig;

use crate::constants::gas;
use crate::state::{WrapKind, WrapQuote};

#[derive(Debug, Clone, Copy)]
pub struct WrapDetector {
    native: Address,
    wrapped: Address,
}

impl WrapDetector {
    pub fn new(chain: &ChainConfig) -> Self {
        Self {
            native: chain.native_sentinel,
            wrapped: chain.wrapped_native,
        }
    }

    pub fn classify(&self, token_in: Address, token_out: Address) -> Option<WrapKind> {
        if token_in == self.native && token_out == self.wrapped {
            Some(WrapKind::Wrap)
        } else if token_in == self.wrapped && token_out == self.native {
            Some(WrapKind::Unwrap)
        } else {
            None
        }
    }

    /// 1:1 quote; `amount` is the fixed side regardless of direction
    pub fn quote(&self, kind: WrapKind, amount: U256) -> WrapQuote {
        WrapQuote {
            kind,
            amount_in: amount,
            amount_out: amount,
            contract: self.wrapped,
            gas_estimate: gas::WRAP_ESTIMATE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> (WrapDetector, ChainConfig) {
        let chain = ChainConfig::default();
        (WrapDetector::new(&chain), chain)
    }

    #[test]
    fn test_classify() {
        let (d, chain) = detector();
        let other = Address::repeat_byte(0x77);
        assert_eq!(
            d.classify(chain.native_sentinel, chain.wrapped_native),
            Some(WrapKind::Wrap)
        );
        assert_eq!(
            d.classify(chain.wrapped_native, chain.native_sentinel),
            Some(WrapKind::Unwrap)
        );
        assert_eq!(d.classify(chain.native_sentinel, other), None);
        assert_eq!(d.classify(chain.wrapped_native, chain.wrapped_native), None);
    }

    #[test]
    fn test_wrap_quote_is_one_to_one() {
        let (d, chain) = detector();
        let q = d.quote(WrapKind::Unwrap, U256::from(10u64).pow(U256::from(18)));
        assert_eq!(q.amount_in, q.amount_out);
        assert_eq!(q.contract, chain.wrapped_native);
        assert_eq!(q.gas_estimate, gas::WRAP_ESTIMATE);
    }
}
