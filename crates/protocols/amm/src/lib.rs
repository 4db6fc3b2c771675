//! Constant-product AMM routing over two Uniswap-V2-style routers
//!
//! Pair resolution, quote math, slippage limits, wrap detection,
//! fee-on-transfer probing, liquidity quotes and router calldata.

pub mod balances;
pub mod calculator;
pub mod constants;
pub mod fee_token;
pub mod liquidity;
pub mod pair;
pub mod router;
pub mod slippage;
pub mod state;
pub mod tokens;
pub mod tx_builder;
pub mod units;
pub mod wrap;

// Re-exports
pub use balances::{fetch_balances, TokenBalance};
pub use calculator::{calculate_input, calculate_output, calculate_price_impact_ppm, Leg};
pub use constants::{fees, gas, lp};
pub use fee_token::{FeeOnTransferDetector, FeeTokenCatalog, FeeTokenSource};
pub use liquidity::{plan_add_liquidity, plan_remove_liquidity, AddLiquidityQuote, RemoveLiquidityQuote};
pub use pair::{select_liquid, sort_tokens, PairResolver};
pub use router::{QuoteEngine, RoutePlan};
pub use state::{
    AmmError, PairInfo, Pool, PriceImpact, QuoteOutcome, RouteQuote, SwapDirection, WrapKind,
    WrapQuote,
};
pub use tokens::TokenRegistry;
pub use tx_builder::{
    build_add_liquidity_call, build_approve_call, build_remove_liquidity_call, build_swap_call,
    build_wrap_call, deadline_from_now, ContractCall, LiquiditySide, RouterFunction,
    SwapCallParams,
};
pub use units::{format_amount, parse_amount};
pub use wrap::WrapDetector;
