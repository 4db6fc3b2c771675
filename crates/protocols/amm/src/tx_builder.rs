//! Router call builder
//!
//! Selects the router function for a swap from the nativeness of each side,
//! the direction and the fee-on-transfer flag, and encodes calldata for it.
//! Also encodes approvals, wraps and liquidity calls.
//!
//! | input  | output | exact-in                         | exact-out              |
//! |--------|--------|----------------------------------|------------------------|
//! | native | token  | swapExactETHForTokens*           | swapETHForExactTokens  |
//! | token  | native | swapExactTokensForETH*           | swapTokensForExactETH  |
//! | token  | token  | swapExactTokensForTokens*        | swapTokensForExactTokens |
//!
//! `*` switches to the `SupportingFeeOnTransferTokens` variant for fee tokens.
//! Fee tokens cannot be swapped exact-out.

use std::time::{SystemTime, UNIX_EPOCH};

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use evm_client::abi::{IUniswapV2Router02 as Router, IERC20, IWETH};
use serde::{Deserialize, Serialize};

use crate::constants::gas;
use crate::state::{AmmError, SwapDirection, WrapKind};

/// Every contract function the engine sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouterFunction {
    SwapExactETHForTokens,
    SwapExactETHForTokensSupportingFeeOnTransferTokens,
    SwapETHForExactTokens,
    SwapExactTokensForETH,
    SwapExactTokensForETHSupportingFeeOnTransferTokens,
    SwapTokensForExactETH,
    SwapExactTokensForTokens,
    SwapExactTokensForTokensSupportingFeeOnTransferTokens,
    SwapTokensForExactTokens,
    AddLiquidity,
    AddLiquidityETH,
    RemoveLiquidity,
    RemoveLiquidityETH,
    RemoveLiquidityETHSupportingFeeOnTransferTokens,
    Approve,
    Deposit,
    Withdraw,
}

impl RouterFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SwapExactETHForTokens => "swapExactETHForTokens",
            Self::SwapExactETHForTokensSupportingFeeOnTransferTokens => {
                "swapExactETHForTokensSupportingFeeOnTransferTokens"
            }
            Self::SwapETHForExactTokens => "swapETHForExactTokens",
            Self::SwapExactTokensForETH => "swapExactTokensForETH",
            Self::SwapExactTokensForETHSupportingFeeOnTransferTokens => {
                "swapExactTokensForETHSupportingFeeOnTransferTokens"
            }
            Self::SwapTokensForExactETH => "swapTokensForExactETH",
            Self::SwapExactTokensForTokens => "swapExactTokensForTokens",
            Self::SwapExactTokensForTokensSupportingFeeOnTransferTokens => {
                "swapExactTokensForTokensSupportingFeeOnTransferTokens"
            }
            Self::SwapTokensForExactTokens => "swapTokensForExactTokens",
            Self::AddLiquidity => "addLiquidity",
            Self::AddLiquidityETH => "addLiquidityETH",
            Self::RemoveLiquidity => "removeLiquidity",
            Self::RemoveLiquidityETH => "removeLiquidityETH",
            Self::RemoveLiquidityETHSupportingFeeOnTransferTokens => {
                "removeLiquidityETHSupportingFeeOnTransferTokens"
            }
            Self::Approve => "approve",
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
        }
    }

    /// Gas limit used when estimation fails
    pub fn gas_ceiling(&self) -> u64 {
        match self {
            Self::SwapExactETHForTokensSupportingFeeOnTransferTokens
            | Self::SwapExactTokensForETHSupportingFeeOnTransferTokens
            | Self::SwapExactTokensForTokensSupportingFeeOnTransferTokens => {
                gas::FEE_ON_TRANSFER_SWAP_CEILING
            }
            Self::SwapExactETHForTokens
            | Self::SwapETHForExactTokens
            | Self::SwapExactTokensForETH
            | Self::SwapTokensForExactETH
            | Self::SwapExactTokensForTokens
            | Self::SwapTokensForExactTokens => gas::SWAP_CEILING,
            Self::AddLiquidity | Self::AddLiquidityETH => gas::ADD_LIQUIDITY_CEILING,
            Self::RemoveLiquidity
            | Self::RemoveLiquidityETH
            | Self::RemoveLiquidityETHSupportingFeeOnTransferTokens => {
                gas::REMOVE_LIQUIDITY_CEILING
            }
            Self::Approve => gas::APPROVE_CEILING,
            Self::Deposit | Self::Withdraw => gas::WRAP_CEILING,
        }
    }
}

/// Encoded contract call ready to be estimated and sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub function: RouterFunction,
    pub to: Address,
    pub data: Bytes,
    /// Native value attached
    pub value: U256,
}

impl ContractCall {
    fn new(function: RouterFunction, to: Address, data: Vec<u8>, value: U256) -> Self {
        Self {
            function,
            to,
            data: Bytes::from(data),
            value,
        }
    }

    pub fn gas_ceiling(&self) -> u64 {
        self.function.gas_ceiling()
    }
}

/// Swap parameters after quoting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapCallParams {
    pub router: Address,
    pub direction: SwapDirection,
    pub native_in: bool,
    pub native_out: bool,
    pub fee_on_transfer: bool,
    /// Exact input (exact-in) or maximum input (exact-out)
    pub amount_in: U256,
    /// Minimum output (exact-in) or exact output (exact-out)
    pub amount_out: U256,
    /// Router path with the wrapped-native address for native legs
    pub path: Vec<Address>,
    pub recipient: Address,
    pub deadline: U256,
}

/// Unix timestamp `secs` from now
pub fn deadline_from_now(secs: u64) -> U256 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    U256::from(now.saturating_add(secs))
}

pub fn build_swap_call(params: &SwapCallParams) -> Result<ContractCall, AmmError> {
    if params.path.len() < 2 {
        return Err(AmmError::PoolNotFound("swap path needs two tokens".to_string()));
    }
    if params.native_in && params.native_out {
        return Err(AmmError::InvalidToken("both sides are native".to_string()));
    }
    if params.fee_on_transfer && params.direction == SwapDirection::ExactOut {
        return Err(AmmError::InvalidToken(
            "exact-output swaps are not supported for fee-on-transfer tokens".to_string(),
        ));
    }

    let p = params;
    let path = p.path.clone();
    let exact_in = p.direction == SwapDirection::ExactIn;
    let fot = p.fee_on_transfer;

    let call = if p.native_in {
        if exact_in && fot {
            ContractCall::new(
                RouterFunction::SwapExactETHForTokensSupportingFeeOnTransferTokens,
                p.router,
                Router::swapExactETHForTokensSupportingFeeOnTransferTokensCall {
                    amountOutMin: p.amount_out,
                    path,
                    to: p.recipient,
                    deadline: p.deadline,
                }
                .abi_encode(),
                p.amount_in,
            )
        } else if exact_in {
            ContractCall::new(
                RouterFunction::SwapExactETHForTokens,
                p.router,
                Router::swapExactETHForTokensCall {
                    amountOutMin: p.amount_out,
                    path,
                    to: p.recipient,
                    deadline: p.deadline,
                }
                .abi_encode(),
                p.amount_in,
            )
        } else {
            // Unused native is refunded by the router
            ContractCall::new(
                RouterFunction::SwapETHForExactTokens,
                p.router,
                Router::swapETHForExactTokensCall {
                    amountOut: p.amount_out,
                    path,
                    to: p.recipient,
                    deadline: p.deadline,
                }
                .abi_encode(),
                p.amount_in,
            )
        }
    } else if p.native_out {
        if exact_in && fot {
            ContractCall::new(
                RouterFunction::SwapExactTokensForETHSupportingFeeOnTransferTokens,
                p.router,
                Router::swapExactTokensForETHSupportingFeeOnTransferTokensCall {
                    amountIn: p.amount_in,
                    amountOutMin: p.amount_out,
                    path,
                    to: p.recipient,
                    deadline: p.deadline,
                }
                .abi_encode(),
                U256::ZERO,
            )
        } else if exact_in {
            ContractCall::new(
                RouterFunction::SwapExactTokensForETH,
                p.router,
                Router::swapExactTokensForETHCall {
                    amountIn: p.amount_in,
                    amountOutMin: p.amount_out,
                    path,
                    to: p.recipient,
                    deadline: p.deadline,
                }
                .abi_encode(),
                U256::ZERO,
            )
        } else {
            ContractCall::new(
                RouterFunction::SwapTokensForExactETH,
                p.router,
                Router::swapTokensForExactETHCall {
                    amountOut: p.amount_out,
                    amountInMax: p.amount_in,
                    path,
                    to: p.recipient,
                    deadline: p.deadline,
                }
                .abi_encode(),
                U256::ZERO,
            )
        }
    } else if exact_in && fot {
        ContractCall::new(
            RouterFunction::SwapExactTokensForTokensSupportingFeeOnTransferTokens,
            p.router,
            Router::swapExactTokensForTokensSupportingFeeOnTransferTokensCall {
                amountIn: p.amount_in,
                amountOutMin: p.amount_out,
                path,
                to: p.recipient,
                deadline: p.deadline,
            }
            .abi_encode(),
            U256::ZERO,
        )
    } else if exact_in {
        ContractCall::new(
            RouterFunction::SwapExactTokensForTokens,
            p.router,
            Router::swapExactTokensForTokensCall {
                amountIn: p.amount_in,
                amountOutMin: p.amount_out,
                path,
                to: p.recipient,
                deadline: p.deadline,
            }
            .abi_encode(),
            U256::ZERO,
        )
    } else {
        ContractCall::new(
            RouterFunction::SwapTokensForExactTokens,
            p.router,
            Router::swapTokensForExactTokensCall {
                amountOut: p.amount_out,
                amountInMax: p.amount_in,
                path,
                to: p.recipient,
                deadline: p.deadline,
            }
            .abi_encode(),
            U256::ZERO,
        )
    };

    Ok(call)
}

pub fn build_approve_call(token: Address, spender: Address, amount: U256) -> ContractCall {
    ContractCall::new(
        RouterFunction::Approve,
        token,
        IERC20::approveCall { spender, amount }.abi_encode(),
        U256::ZERO,
    )
}

pub fn build_wrap_call(wrapped_native: Address, kind: WrapKind, amount: U256) -> ContractCall {
    match kind {
        WrapKind::Wrap => ContractCall::new(
            RouterFunction::Deposit,
            wrapped_native,
            IWETH::depositCall {}.abi_encode(),
            amount,
        ),
        WrapKind::Unwrap => ContractCall::new(
            RouterFunction::Withdraw,
            wrapped_native,
            IWETH::withdrawCall { wad: amount }.abi_encode(),
            U256::ZERO,
        ),
    }
}

/// One side of a liquidity call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquiditySide {
    /// Token address, or the native sentinel handled by the caller via `native`
    pub token: Address,
    pub native: bool,
    pub amount: U256,
    pub amount_min: U256,
}

pub fn build_add_liquidity_call(
    router: Address,
    a: LiquiditySide,
    b: LiquiditySide,
    recipient: Address,
    deadline: U256,
) -> Result<ContractCall, AmmError> {
    match (a.native, b.native) {
        (true, true) => Err(AmmError::InvalidToken("both sides are native".to_string())),
        (false, false) => Ok(ContractCall::new(
            RouterFunction::AddLiquidity,
            router,
            Router::addLiquidityCall {
                tokenA: a.token,
                tokenB: b.token,
                amountADesired: a.amount,
                amountBDesired: b.amount,
                amountAMin: a.amount_min,
                amountBMin: b.amount_min,
                to: recipient,
                deadline,
            }
            .abi_encode(),
            U256::ZERO,
        )),
        (a_native, _) => {
            let (native, token) = if a_native { (a, b) } else { (b, a) };
            Ok(ContractCall::new(
                RouterFunction::AddLiquidityETH,
                router,
                Router::addLiquidityETHCall {
                    token: token.token,
                    amountTokenDesired: token.amount,
                    amountTokenMin: token.amount_min,
                    amountETHMin: native.amount_min,
                    to: recipient,
                    deadline,
                }
                .abi_encode(),
                native.amount,
            ))
        }
    }
}

/// `amount` fields carry the expected payouts; only `amount_min` is encoded
pub fn build_remove_liquidity_call(
    router: Address,
    a: LiquiditySide,
    b: LiquiditySide,
    liquidity: U256,
    fee_on_transfer: bool,
    recipient: Address,
    deadline: U256,
) -> Result<ContractCall, AmmError> {
    match (a.native, b.native) {
        (true, true) => Err(AmmError::InvalidToken("both sides are native".to_string())),
        (false, false) => Ok(ContractCall::new(
            RouterFunction::RemoveLiquidity,
            router,
            Router::removeLiquidityCall {
                tokenA: a.token,
                tokenB: b.token,
                liquidity,
                amountAMin: a.amount_min,
                amountBMin: b.amount_min,
                to: recipient,
                deadline,
            }
            .abi_encode(),
            U256::ZERO,
        )),
        (a_native, _) => {
            let (native, token) = if a_native { (a, b) } else { (b, a) };
            let (function, data) = if fee_on_transfer {
                (
                    RouterFunction::RemoveLiquidityETHSupportingFeeOnTransferTokens,
                    Router::removeLiquidityETHSupportingFeeOnTransferTokensCall {
                        token: token.token,
                        liquidity,
                        amountTokenMin: token.amount_min,
                        amountETHMin: native.amount_min,
                        to: recipient,
                        deadline,
                    }
                    .abi_encode(),
                )
            } else {
                (
                    RouterFunction::RemoveLiquidityETH,
                    Router::removeLiquidityETHCall {
                        token: token.token,
                        liquidity,
                        amountTokenMin: token.amount_min,
                        amountETHMin: native.amount_min,
                        to: recipient,
                        deadline,
                    }
                    .abi_encode(),
                )
            };
            Ok(ContractCall::new(function, router, data, U256::ZERO))
        }
    }
}
