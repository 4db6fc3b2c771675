//! AMM Constants
//!
//! Fee arithmetic, LP bootstrap and gas parameters for V2-style pools.

/// Fee constants
pub mod fees {
    /// Denominator for `fee_bps` (30 = 0.3%)
    pub const FEE_DENOM: u64 = 10_000;

    /// Basis-point denominator for slippage and buffers
    pub const BPS_DENOM: u64 = 10_000;

    /// Price impact resolution (parts per million)
    pub const PPM: u64 = 1_000_000;
}

/// LP token constants
pub mod lp {
    /// Liquidity permanently locked by the pair on first mint
    pub const MINIMUM_LIQUIDITY: u64 = 1_000;
}

/// Gas figures
///
/// Estimates are shown in quotes. Ceilings are sent when `eth_estimateGas`
/// fails and must cover the worst case of each router function.
pub mod gas {
    /// `deposit()` / `withdraw()` on the wrapped-native contract
    pub const WRAP_ESTIMATE: u64 = 50_000;
    pub const DIRECT_SWAP_ESTIMATE: u64 = 130_000;
    pub const ONE_HOP_SWAP_ESTIMATE: u64 = 190_000;
    /// Extra for the balance-diff logic of fee-on-transfer variants
    pub const FEE_ON_TRANSFER_EXTRA: u64 = 60_000;

    pub const SWAP_CEILING: u64 = 250_000;
    pub const FEE_ON_TRANSFER_SWAP_CEILING: u64 = 350_000;
    pub const ADD_LIQUIDITY_CEILING: u64 = 300_000;
    pub const REMOVE_LIQUIDITY_CEILING: u64 = 350_000;
    pub const APPROVE_CEILING: u64 = 100_000;
    pub const WRAP_CEILING: u64 = 60_000;
}
