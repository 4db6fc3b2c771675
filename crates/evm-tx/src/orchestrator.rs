//! Transaction orchestrator
//!
//! Turns a quote into broadcast transactions:
//!
//! 1. Pre-flight: the account holds every amount the action spends.
//! 2. Allowances below `spend * (1 + buffer)` are approved one by one; each
//!    approval is polled to a receipt and the allowance is read back.
//! 3. The action is gas-estimated (falling back to a per-function ceiling),
//!    sent with retry on transport errors, then polled to a receipt.
//!
//! Only one flow runs at a time per orchestrator.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, TxHash, U256};
use amm::{
    build_add_liquidity_call, build_approve_call, build_remove_liquidity_call, build_swap_call,
    build_wrap_call, deadline_from_now, format_amount, slippage, AddLiquidityQuote, ContractCall,
    LiquiditySide, QuoteOutcome, RemoveLiquidityQuote, SwapCallParams, SwapDirection,
};
use evm_client::retry::{retry_async, retry_transient};
use evm_client::{queries, EvmClient, TransactionRequest};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use twinroute_core::{
    lowercase_hex, AppConfig, ExecutionConfig, ProviderError, RouterSet, Session, Token,
};

use crate::classify::{TxError, TxErrorKind};
use crate::confirm::{wait_for_receipt, PollPolicy};
use crate::state::{FlowStep, FlowTracker};
use crate::FlowError;

const LP_DECIMALS: u8 = 18;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapParams {
    pub token_in: Token,
    pub token_out: Token,
    pub quote: QuoteOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddLiquidityParams {
    pub token_a: Token,
    pub token_b: Token,
    pub quote: AddLiquidityQuote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveLiquidityParams {
    pub token_a: Token,
    pub token_b: Token,
    pub quote: RemoveLiquidityQuote,
    /// Either token charges a transfer fee
    #[serde(default)]
    pub fee_on_transfer: bool,
}

/// What a prepared flow will do once confirmed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlowRequest {
    Swap(SwapParams),
    AddLiquidity(AddLiquidityParams),
    RemoveLiquidity(RemoveLiquidityParams),
}

impl FlowRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Swap(_) => "swap",
            Self::AddLiquidity(_) => "add_liquidity",
            Self::RemoveLiquidity(_) => "remove_liquidity",
        }
    }
}

/// Exclusive right to run one flow; released on drop
pub struct FlowClaim {
    _guard: OwnedMutexGuard<()>,
}

/// Result of one orchestrated flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowOutcome {
    /// `true` for `success`, and for `unconfirmed` under optimistic confirmation
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<TxHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TxError>,
    pub step: FlowStep,
}

/// Amount the account must hold
#[derive(Debug, Clone)]
struct Spend {
    token: Address,
    native: bool,
    symbol: String,
    decimals: u8,
    amount: U256,
}

impl Spend {
    fn of(token: &Token, amount: U256, native: bool) -> Self {
        Self {
            token: token.address,
            native,
            symbol: token.symbol.clone(),
            decimals: token.decimals,
            amount,
        }
    }
}

/// Allowance the spender must have
#[derive(Debug, Clone)]
struct Approval {
    token: Address,
    spender: Address,
    amount: U256,
}

struct ActionPlan {
    label: &'static str,
    call: ContractCall,
    spends: Vec<Spend>,
    approvals: Vec<Approval>,
}

pub struct Orchestrator {
    client: EvmClient,
    config: ExecutionConfig,
    routers: RouterSet,
    wrapped_native: Address,
    native_sentinel: Address,
    in_flight: Arc<Mutex<()>>,
}

impl Orchestrator {
    pub fn new(client: EvmClient, config: &AppConfig) -> Self {
        Self {
            client,
            config: config.execution.clone(),
            routers: config.routers.clone(),
            wrapped_native: config.chain.wrapped_native,
            native_sentinel: config.chain.native_sentinel,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// A flow is currently holding the wallet
    pub fn is_busy(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    /// Take the single-flight slot without waiting
    pub fn claim(&self) -> Result<FlowClaim, FlowError> {
        let guard = self
            .in_flight
            .clone()
            .try_lock_owned()
            .map_err(|_| FlowError::FlowBusy)?;
        Ok(FlowClaim { _guard: guard })
    }

    /// Run a request under a claim taken earlier with [`Orchestrator::claim`]
    pub async fn execute(
        &self,
        claim: FlowClaim,
        session: &Session,
        request: &FlowRequest,
        tracker: &FlowTracker,
    ) -> Result<FlowOutcome, FlowError> {
        let plan = match request {
            FlowRequest::Swap(params) => self.plan_swap(session, params),
            FlowRequest::AddLiquidity(params) => self.plan_add_liquidity(session, params),
            FlowRequest::RemoveLiquidity(params) => self.plan_remove_liquidity(session, params),
        };
        self.run(claim, session, plan, tracker).await
    }

    pub async fn execute_swap(
        &self,
        session: &Session,
        params: &SwapParams,
        tracker: &FlowTracker,
    ) -> Result<FlowOutcome, FlowError> {
        let claim = self.claim()?;
        let plan = self.plan_swap(session, params);
        self.run(claim, session, plan, tracker).await
    }

    pub async fn add_liquidity(
        &self,
        session: &Session,
        params: &AddLiquidityParams,
        tracker: &FlowTracker,
    ) -> Result<FlowOutcome, FlowError> {
        let claim = self.claim()?;
        let plan = self.plan_add_liquidity(session, params);
        self.run(claim, session, plan, tracker).await
    }

    pub async fn remove_liquidity(
        &self,
        session: &Session,
        params: &RemoveLiquidityParams,
        tracker: &FlowTracker,
    ) -> Result<FlowOutcome, FlowError> {
        let claim = self.claim()?;
        let plan = self.plan_remove_liquidity(session, params);
        self.run(claim, session, plan, tracker).await
    }

    fn plan_swap(&self, session: &Session, params: &SwapParams) -> Result<ActionPlan, TxError> {
        match &params.quote {
            QuoteOutcome::NoRoute { reason } => {
                Err(TxError::new(TxErrorKind::InsufficientLiquidity, reason.clone()))
            }
            QuoteOutcome::Wrap(quote) => Ok(ActionPlan {
                label: "wrap",
                call: build_wrap_call(self.wrapped_native, quote.kind, quote.amount_in),
                spends: vec![self.spend(&params.token_in, quote.amount_in)],
                approvals: Vec::new(),
            }),
            QuoteOutcome::Route(quote) => {
                if self.routers.id_of(quote.router_address).is_none() {
                    return Err(TxError::new(
                        TxErrorKind::QuoteStale,
                        format!("unknown router {}", lowercase_hex(&quote.router_address)),
                    ));
                }
                let first = self.canonical(&params.token_in);
                let last = self.canonical(&params.token_out);
                if quote.path.first() != Some(&first) || quote.path.last() != Some(&last) {
                    return Err(TxError::new(
                        TxErrorKind::QuoteStale,
                        "quote path does not match the requested tokens",
                    ));
                }

                let (amount_in, amount_out) = match quote.direction {
                    SwapDirection::ExactIn => (quote.amount_in, quote.amount_limit()),
                    SwapDirection::ExactOut => (quote.amount_limit(), quote.amount_out),
                };
                let native_in = self.is_native(&params.token_in);
                let call = build_swap_call(&SwapCallParams {
                    router: quote.router_address,
                    direction: quote.direction,
                    native_in,
                    native_out: self.is_native(&params.token_out),
                    fee_on_transfer: quote.fee_on_transfer,
                    amount_in,
                    amount_out,
                    path: quote.path.clone(),
                    recipient: session.account,
                    deadline: deadline_from_now(self.config.deadline_secs),
                })?;

                let approvals = if native_in {
                    Vec::new()
                } else {
                    vec![Approval {
                        token: params.token_in.address,
                        spender: quote.router_address,
                        amount: amount_in,
                    }]
                };
                Ok(ActionPlan {
                    label: "swap",
                    call,
                    spends: vec![self.spend(&params.token_in, amount_in)],
                    approvals,
                })
            }
        }
    }

    fn plan_add_liquidity(
        &self,
        session: &Session,
        params: &AddLiquidityParams,
    ) -> Result<ActionPlan, TxError> {
        let quote = &params.quote;
        let router = self.routers.get(quote.router).router;
        let a = self.side(&params.token_a, quote.amount_a, quote.amount_a_min);
        let b = self.side(&params.token_b, quote.amount_b, quote.amount_b_min);
        let call = build_add_liquidity_call(
            router,
            a,
            b,
            session.account,
            deadline_from_now(self.config.deadline_secs),
        )?;

        let approvals = [(&params.token_a, quote.amount_a), (&params.token_b, quote.amount_b)]
            .into_iter()
            .filter(|(token, _)| !self.is_native(token))
            .map(|(token, amount)| Approval {
                token: token.address,
                spender: router,
                amount,
            })
            .collect();

        Ok(ActionPlan {
            label: "add_liquidity",
            call,
            spends: vec![
                self.spend(&params.token_a, quote.amount_a),
                self.spend(&params.token_b, quote.amount_b),
            ],
            approvals,
        })
    }

    fn plan_remove_liquidity(
        &self,
        session: &Session,
        params: &RemoveLiquidityParams,
    ) -> Result<ActionPlan, TxError> {
        let quote = &params.quote;
        let router = self.routers.get(quote.router).router;
        let call = build_remove_liquidity_call(
            router,
            self.side(&params.token_a, quote.amount_a, quote.amount_a_min),
            self.side(&params.token_b, quote.amount_b, quote.amount_b_min),
            quote.liquidity,
            params.fee_on_transfer,
            session.account,
            deadline_from_now(self.config.deadline_secs),
        )?;

        // The router pulls LP tokens from the pair contract itself
        Ok(ActionPlan {
            label: "remove_liquidity",
            call,
            spends: vec![Spend {
                token: quote.pool_address,
                native: false,
                symbol: format!("{}-{} LP", params.token_a.symbol, params.token_b.symbol),
                decimals: LP_DECIMALS,
                amount: quote.liquidity,
            }],
            approvals: vec![Approval {
                token: quote.pool_address,
                spender: router,
                amount: quote.liquidity,
            }],
        })
    }

    async fn run(
        &self,
        _claim: FlowClaim,
        session: &Session,
        plan: Result<ActionPlan, TxError>,
        tracker: &FlowTracker,
    ) -> Result<FlowOutcome, FlowError> {
        tracker.begin()?;

        let plan = match plan {
            Ok(plan) => plan,
            Err(e) => return Ok(self.reject(tracker, e)),
        };
        let owner = session.account;
        tracing::info!(
            action = plan.label,
            account = %lowercase_hex(&owner),
            wallet = session.wallet.as_str(),
            to = %lowercase_hex(&plan.call.to),
            "Starting transaction flow"
        );

        if let Err(e) = self.check_balances(owner, &plan.spends).await {
            return Ok(self.reject(tracker, e));
        }
        let pending = match self.pending_approvals(owner, &plan.approvals).await {
            Ok(pending) => pending,
            Err(e) => return Ok(self.reject(tracker, e)),
        };

        if !pending.is_empty() {
            tracker.modify(|s| s.needs_approval = true);
            tracker.advance(FlowStep::Approving)?;
            for approval in &pending {
                if let Err(e) = self.approve(owner, approval, tracker).await {
                    return self.fail(tracker, e);
                }
            }
            tracker.advance(FlowStep::Approved)?;
        }

        tracker.advance(FlowStep::Executing)?;
        self.execute_action(owner, &plan, tracker).await
    }

    async fn check_balances(&self, owner: Address, spends: &[Spend]) -> Result<(), TxError> {
        for spend in spends {
            let available = if spend.native {
                self.client.get_balance(owner).await?
            } else {
                queries::balance_of(&self.client, spend.token, owner).await?
            };
            if available < spend.amount {
                return Err(TxError::new(
                    TxErrorKind::InsufficientBalance,
                    format!(
                        "need {} {}, have {}",
                        format_amount(spend.amount, spend.decimals),
                        spend.symbol,
                        format_amount(available, spend.decimals)
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Approvals whose current allowance is short, with the buffered amount to approve
    async fn pending_approvals(
        &self,
        owner: Address,
        approvals: &[Approval],
    ) -> Result<Vec<Approval>, TxError> {
        let mut pending = Vec::new();
        for approval in approvals {
            let required = slippage::maximum_input(approval.amount, self.config.allowance_buffer_bps)?;
            let current = self.read_allowance(owner, approval).await?;
            tracing::debug!(
                token = %lowercase_hex(&approval.token),
                spender = %lowercase_hex(&approval.spender),
                current = %current,
                required = %required,
                "Allowance check"
            );
            if current < required {
                pending.push(Approval {
                    amount: required,
                    ..approval.clone()
                });
            }
        }
        Ok(pending)
    }

    async fn read_allowance(&self, owner: Address, approval: &Approval) -> Result<U256, ProviderError> {
        let client = &self.client;
        retry_transient(
            |_| queries::allowance(client, approval.token, owner, approval.spender),
            self.config.allowance_read_attempts,
            self.backoff(),
        )
        .await
    }

    async fn approve(
        &self,
        owner: Address,
        approval: &Approval,
        tracker: &FlowTracker,
    ) -> Result<(), TxError> {
        let call = build_approve_call(approval.token, approval.spender, approval.amount);
        let hash = self.send(owner, &call).await?;
        tracker.modify(|s| s.record_approval(hash));
        tracing::info!(
            tx = %hash,
            token = %lowercase_hex(&approval.token),
            amount = %approval.amount,
            "Approval sent"
        );

        match wait_for_receipt(&self.client, hash, self.poll_policy()).await? {
            Some(receipt) if !receipt.success => {
                return Err(TxError::new(
                    TxErrorKind::TransactionFailed,
                    format!("approval {} reverted", hash),
                ));
            }
            Some(_) => {}
            None => {
                tracing::warn!(tx = %hash, "Approval not mined within polling budget, checking allowance")
            }
        }

        let granted = self.read_allowance(owner, approval).await?;
        if granted < approval.amount {
            return Err(TxError::new(
                TxErrorKind::InsufficientAllowance,
                format!("allowance is {} after approval, need {}", granted, approval.amount),
            ));
        }
        Ok(())
    }

    async fn execute_action(
        &self,
        owner: Address,
        plan: &ActionPlan,
        tracker: &FlowTracker,
    ) -> Result<FlowOutcome, FlowError> {
        let hash = match self.send(owner, &plan.call).await {
            Ok(hash) => hash,
            Err(e) => return self.fail(tracker, e),
        };
        tracker.modify(|s| s.record_action(hash));
        tracing::info!(
            tx = %hash,
            action = plan.label,
            function = plan.call.function.as_str(),
            "Transaction sent"
        );

        match wait_for_receipt(&self.client, hash, self.poll_policy()).await {
            Ok(Some(receipt)) if receipt.success => {
                tracker.advance(FlowStep::Success)?;
                tracing::info!(tx = %hash, block = ?receipt.block_number, "Transaction confirmed");
                Ok(FlowOutcome {
                    success: true,
                    tx_hash: Some(hash),
                    error: None,
                    step: FlowStep::Success,
                })
            }
            Ok(Some(_)) => self.fail(
                tracker,
                TxError::new(TxErrorKind::TransactionFailed, format!("transaction {} reverted", hash)),
            ),
            Ok(None) => {
                let error = TxError::new(
                    TxErrorKind::ConfirmationTimeout,
                    format!(
                        "transaction {} not confirmed within {}s",
                        hash,
                        self.poll_policy().budget().as_secs()
                    ),
                );
                if !self.config.optimistic_confirmation {
                    return self.fail(tracker, error);
                }
                tracker.advance(FlowStep::Unconfirmed)?;
                Ok(FlowOutcome {
                    success: true,
                    tx_hash: Some(hash),
                    error: Some(error),
                    step: FlowStep::Unconfirmed,
                })
            }
            Err(e) => self.fail(tracker, e.into()),
        }
    }

    /// Estimate, then broadcast with retry on transport failures
    async fn send(&self, owner: Address, call: &ContractCall) -> Result<TxHash, TxError> {
        let request = TransactionRequest::new(owner, call.to, call.data.clone()).with_value(call.value);
        let gas = match self.client.estimate_gas(&request).await {
            Ok(estimate) => estimate.saturating_mul(self.config.gas_multiplier_pct) / 100,
            Err(e) => {
                tracing::warn!(
                    function = call.function.as_str(),
                    error = %e,
                    ceiling = call.gas_ceiling(),
                    "Gas estimation failed, using ceiling"
                );
                call.gas_ceiling()
            }
        };
        let request = request.with_gas(gas);

        let client = &self.client;
        let request = &request;
        retry_async(
            |attempt| async move {
                if attempt > 1 {
                    tracing::warn!(attempt, "Retrying transaction broadcast");
                }
                client.send_transaction(request).await
            },
            self.config.send_retry_attempts.max(1),
            self.backoff(),
            ProviderError::is_transient,
        )
        .await
        .map_err(TxError::from)
    }

    fn reject(&self, tracker: &FlowTracker, error: TxError) -> FlowOutcome {
        tracing::warn!(kind = %error.kind, error = %error.message, "Flow rejected before broadcast");
        tracker.reject(error.clone());
        FlowOutcome {
            success: false,
            tx_hash: None,
            error: Some(error),
            step: FlowStep::Input,
        }
    }

    fn fail(&self, tracker: &FlowTracker, error: TxError) -> Result<FlowOutcome, FlowError> {
        tracing::error!(kind = %error.kind, error = %error.message, step = %tracker.step(), "Flow failed");
        tracker.fail(error.clone())?;
        Ok(FlowOutcome {
            success: false,
            tx_hash: tracker.snapshot().action_hash,
            error: Some(error),
            step: FlowStep::Error,
        })
    }

    fn is_native(&self, token: &Token) -> bool {
        token.address == self.native_sentinel
    }

    fn spend(&self, token: &Token, amount: U256) -> Spend {
        Spend::of(token, amount, self.is_native(token))
    }

    fn side(&self, token: &Token, amount: U256, amount_min: U256) -> LiquiditySide {
        LiquiditySide {
            token: token.address,
            native: self.is_native(token),
            amount,
            amount_min,
        }
    }

    fn canonical(&self, token: &Token) -> Address {
        if self.is_native(token) {
            self.wrapped_native
        } else {
            token.address
        }
    }

    fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_millis(self.config.receipt_poll_interval_ms),
            self.config.receipt_poll_attempts,
        )
    }

    fn backoff(&self) -> Duration {
        Duration::from_millis(self.config.send_retry_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use alloy_sol_types::SolCall;
    use amm::{PriceImpact, RouteQuote, WrapKind, WrapQuote};
    use evm_client::abi::IERC20;
    use evm_client::testing::MockProvider;
    use twinroute_core::{RouterId, WalletKind};

    const OWNER: Address = Address::new([0x42; 20]);
    const USDC: Address = Address::new([0xa0; 20]);
    const DAI: Address = Address::new([0x6b; 20]);

    fn usdc() -> Token {
        Token::from_parts("USDC".into(), "USD Coin".into(), USDC, 6).unwrap()
    }

    fn dai() -> Token {
        Token::from_parts("DAI".into(), "Dai".into(), DAI, 6).unwrap()
    }

    fn eth(config: &AppConfig) -> Token {
        Token::from_parts("ETH".into(), "Ether".into(), config.chain.native_sentinel, 18).unwrap()
    }

    fn session() -> Session {
        Session::new(OWNER, WalletKind::Injected)
    }

    fn route(config: &AppConfig, path: Vec<Address>) -> RouteQuote {
        RouteQuote {
            direction: SwapDirection::ExactIn,
            amount_in: U256::from(1_000u64),
            amount_out: U256::from(1_992u64),
            exchange_rate: 1.992,
            price_impact: PriceImpact::Computed { ppm: 1_000 },
            minimum_received: Some(U256::from(1_982u64)),
            maximum_input: None,
            slippage_bps: 50,
            recommended_slippage_bps: None,
            router: RouterId::Primary,
            router_address: config.routers.primary.router,
            gas_estimate: 130_000,
            fee_on_transfer: false,
            path,
            liquidity_available: true,
        }
    }

    fn usdc_to_dai(config: &AppConfig) -> SwapParams {
        SwapParams {
            token_in: usdc(),
            token_out: dai(),
            quote: QuoteOutcome::Route(route(config, vec![USDC, DAI])),
        }
    }

    fn script_balance(mock: &MockProvider, token: Address, amount: u64) {
        mock.set_call(
            token,
            IERC20::balanceOfCall { owner: OWNER }.abi_encode(),
            IERC20::balanceOfCall::abi_encode_returns(&(U256::from(amount),)),
        );
    }

    fn allowance_call(spender: Address) -> Vec<u8> {
        IERC20::allowanceCall {
            owner: OWNER,
            spender,
        }
        .abi_encode()
    }

    fn allowance_return(amount: u64) -> Vec<u8> {
        IERC20::allowanceCall::abi_encode_returns(&(U256::from(amount),))
    }

    /// USDC balance 10_000, zero allowance, approval raises it to `granted`
    fn script_approval(mock: &MockProvider, config: &AppConfig, granted: Option<u64>) {
        let router = config.routers.primary.router;
        script_balance(mock, USDC, 10_000);
        mock.set_call(USDC, allowance_call(router), allowance_return(0));
        if let Some(granted) = granted {
            mock.on_send(USDC, USDC, allowance_call(router), allowance_return(granted));
        }
    }

    fn setup(config: &AppConfig) -> (MockProvider, Orchestrator) {
        let mock = MockProvider::new();
        mock.set_accounts(vec![OWNER]);
        let orchestrator = Orchestrator::new(mock.client(), config);
        (mock, orchestrator)
    }

    #[tokio::test(start_paused = true)]
    async fn test_swap_with_approval_happy_path() {
        let config = AppConfig::default();
        let (mock, orchestrator) = setup(&config);
        // 1_000 plus the 1% buffer
        script_approval(&mock, &config, Some(1_010));
        mock.set_auto_receipt(Some(true));

        let tracker = FlowTracker::new();
        let outcome = orchestrator
            .execute_swap(&session(), &usdc_to_dai(&config), &tracker)
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.step, FlowStep::Success);
        let state = tracker.snapshot();
        assert_eq!(
            state.history,
            vec![
                FlowStep::Input,
                FlowStep::Approving,
                FlowStep::Approved,
                FlowStep::Executing,
                FlowStep::Success
            ]
        );
        assert!(state.needs_approval);
        assert_eq!(state.approval_hashes.len(), 1);
        assert_eq!(state.observed_hashes.len(), 2);
        assert_eq!(outcome.tx_hash, state.action_hash);
        assert!(!state.active);

        let sent = mock.sent_transactions();
        assert_eq!(sent.len(), 2);
        let approve = IERC20::approveCall::abi_decode(
            &serde_json::from_value::<alloy_primitives::Bytes>(sent[0]["data"].clone()).unwrap(),
            true,
        )
        .unwrap();
        assert_eq!(approve.amount, U256::from(1_010u64));
        assert_eq!(approve.spender, config.routers.primary.router);
    }

    #[tokio::test(start_paused = true)]
    async fn test_swap_without_approval() {
        let config = AppConfig::default();
        let (mock, orchestrator) = setup(&config);
        script_balance(&mock, USDC, 10_000);
        mock.set_call(
            USDC,
            allowance_call(config.routers.primary.router),
            allowance_return(u64::MAX),
        );
        mock.set_auto_receipt(Some(true));

        let tracker = FlowTracker::new();
        let outcome = orchestrator
            .execute_swap(&session(), &usdc_to_dai(&config), &tracker)
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(
            tracker.snapshot().history,
            vec![FlowStep::Input, FlowStep::Executing, FlowStep::Success]
        );
        assert_eq!(mock.sent_transactions().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reverted_approval_is_transaction_failed() {
        let config = AppConfig::default();
        let (mock, orchestrator) = setup(&config);
        script_approval(&mock, &config, Some(1_010));
        mock.set_auto_receipt(Some(false));

        let tracker = FlowTracker::new();
        let outcome = orchestrator
            .execute_swap(&session(), &usdc_to_dai(&config), &tracker)
            .await
            .unwrap();
        let error = outcome.error.unwrap();
        assert_eq!(error.kind, TxErrorKind::TransactionFailed);
        assert!(!error.message.is_empty());
        assert_eq!(
            tracker.snapshot().history,
            vec![FlowStep::Input, FlowStep::Approving, FlowStep::Error]
        );
        assert_eq!(tracker.snapshot().approval_hashes.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_allowance_not_raised_after_approval() {
        let config = AppConfig::default();
        let (mock, orchestrator) = setup(&config);
        script_approval(&mock, &config, None);
        mock.set_auto_receipt(Some(true));

        let tracker = FlowTracker::new();
        let outcome = orchestrator
            .execute_swap(&session(), &usdc_to_dai(&config), &tracker)
            .await
            .unwrap();
        assert_eq!(outcome.error.unwrap().kind, TxErrorKind::InsufficientAllowance);
        assert_eq!(tracker.step(), FlowStep::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_insufficient_balance_rejected_before_broadcast() {
        let config = AppConfig::default();
        let (mock, orchestrator) = setup(&config);
        script_balance(&mock, USDC, 500);

        let tracker = FlowTracker::new();
        let outcome = orchestrator
            .execute_swap(&session(), &usdc_to_dai(&config), &tracker)
            .await
            .unwrap();
        assert_eq!(outcome.error.unwrap().kind, TxErrorKind::InsufficientBalance);
        assert_eq!(outcome.step, FlowStep::Input);
        assert!(mock.sent_transactions().is_empty());

        let state = tracker.snapshot();
        assert!(!state.active);
        // Still cancellable
        tracker.cancel().unwrap();
    }

    fn eth_to_dai(config: &AppConfig, mock: &MockProvider) -> SwapParams {
        mock.set_native_balance(OWNER, U256::from(1_000_000u64));
        SwapParams {
            token_in: eth(config),
            token_out: dai(),
            quote: QuoteOutcome::Route(route(config, vec![config.chain.wrapped_native, DAI])),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_rejection_not_retried() {
        let config = AppConfig::default();
        let (mock, orchestrator) = setup(&config);
        let params = eth_to_dai(&config, &mock);
        mock.fail_next_send(ProviderError::Rpc {
            code: 4001,
            message: "User rejected the request.".into(),
            data: None,
        });

        let tracker = FlowTracker::new();
        let outcome = orchestrator.execute_swap(&session(), &params, &tracker).await.unwrap();
        assert_eq!(outcome.error.unwrap().kind, TxErrorKind::UserRejected);
        assert_eq!(mock.request_count("eth_sendTransaction"), 1);
        assert_eq!(
            tracker.snapshot().history,
            vec![FlowStep::Input, FlowStep::Executing, FlowStep::Error]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_send_failure_retried() {
        let config = AppConfig::default();
        let (mock, orchestrator) = setup(&config);
        let params = eth_to_dai(&config, &mock);
        mock.fail_next_send(ProviderError::Timeout { secs: 30 });
        mock.set_auto_receipt(Some(true));

        let outcome = orchestrator
            .execute_swap(&session(), &params, &FlowTracker::new())
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(mock.request_count("eth_sendTransaction"), 2);

        let sent = mock.sent_transactions();
        assert_eq!(sent[0]["value"], "0x3e8");
    }

    #[tokio::test(start_paused = true)]
    async fn test_gas_estimate_multiplier_and_fallback() {
        let config = AppConfig::default();
        let (mock, orchestrator) = setup(&config);
        let params = eth_to_dai(&config, &mock);
        mock.set_auto_receipt(Some(true));

        orchestrator
            .execute_swap(&session(), &params, &FlowTracker::new())
            .await
            .unwrap();
        // 150_000 * 120%
        assert_eq!(mock.sent_transactions()[0]["gas"], "0x2bf20");

        mock.set_gas_estimate(None);
        orchestrator
            .execute_swap(&session(), &params, &FlowTracker::new())
            .await
            .unwrap();
        assert_eq!(
            mock.sent_transactions()[1]["gas"],
            format!("{:#x}", amm::gas::SWAP_CEILING)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfirmed_is_optimistic_by_default() {
        let config = AppConfig::default();
        let (mock, orchestrator) = setup(&config);
        let params = eth_to_dai(&config, &mock);

        let tracker = FlowTracker::new();
        let outcome = orchestrator.execute_swap(&session(), &params, &tracker).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.step, FlowStep::Unconfirmed);
        assert_eq!(outcome.error.unwrap().kind, TxErrorKind::ConfirmationTimeout);
        assert!(tracker.snapshot().action_hash.is_some());
        assert_eq!(
            mock.request_count("eth_getTransactionReceipt"),
            config.execution.receipt_poll_attempts as usize
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_strict_confirmation_timeout_is_error() {
        let mut config = AppConfig::default();
        config.execution.optimistic_confirmation = false;
        let (mock, orchestrator) = setup(&config);
        let params = eth_to_dai(&config, &mock);

        let tracker = FlowTracker::new();
        let outcome = orchestrator.execute_swap(&session(), &params, &tracker).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.error.unwrap().kind, TxErrorKind::ConfirmationTimeout);
        assert_eq!(tracker.step(), FlowStep::Error);
        assert!(outcome.tx_hash.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_error() {
        let config = AppConfig::default();
        let (mock, orchestrator) = setup(&config);
        let params = eth_to_dai(&config, &mock);
        mock.set_auto_receipt(Some(false));

        let tracker = FlowTracker::new();
        let outcome = orchestrator.execute_swap(&session(), &params, &tracker).await.unwrap();
        assert_eq!(outcome.error.unwrap().kind, TxErrorKind::TransactionFailed);

        // Error must be retried explicitly before running again
        assert!(matches!(
            orchestrator.execute_swap(&session(), &params, &tracker).await,
            Err(FlowError::InvalidTransition { .. })
        ));

        tracker.retry().unwrap();
        mock.set_auto_receipt(Some(true));
        let outcome = orchestrator.execute_swap(&session(), &params, &tracker).await.unwrap();
        assert!(outcome.success);
        assert_eq!(tracker.snapshot().observed_hashes.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_flow_is_busy() {
        let config = AppConfig::default();
        let (mock, orchestrator) = setup(&config);
        let params = eth_to_dai(&config, &mock);
        let orchestrator = Arc::new(orchestrator);

        let first = FlowTracker::new();
        let mut rx = first.subscribe();
        let handle = {
            let orchestrator = orchestrator.clone();
            let tracker = first.clone();
            let params = params.clone();
            tokio::spawn(async move { orchestrator.execute_swap(&session(), &params, &tracker).await })
        };
        rx.wait_for(|s| s.step == FlowStep::Executing).await.unwrap();

        assert!(orchestrator.is_busy());
        assert!(matches!(
            orchestrator.execute_swap(&session(), &params, &FlowTracker::new()).await,
            Err(FlowError::FlowBusy)
        ));

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.step, FlowStep::Unconfirmed);
        assert!(!orchestrator.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_is_exclusive_until_dropped() {
        let config = AppConfig::default();
        let (mock, orchestrator) = setup(&config);
        let params = eth_to_dai(&config, &mock);

        let claim = orchestrator.claim().unwrap();
        assert!(orchestrator.is_busy());
        assert!(matches!(orchestrator.claim(), Err(FlowError::FlowBusy)));
        assert!(matches!(
            orchestrator.execute_swap(&session(), &params, &FlowTracker::new()).await,
            Err(FlowError::FlowBusy)
        ));

        let tracker = FlowTracker::new();
        let request = FlowRequest::Swap(params);
        let outcome = orchestrator
            .execute(claim, &session(), &request, &tracker)
            .await
            .unwrap();
        assert_eq!(outcome.step, FlowStep::Unconfirmed);
        assert!(!orchestrator.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrap_sends_deposit_with_value() {
        let config = AppConfig::default();
        let (mock, orchestrator) = setup(&config);
        mock.set_native_balance(OWNER, U256::from(5_000u64));
        mock.set_auto_receipt(Some(true));
        let weth = Token::from_parts("WETH".into(), "Wrapped Ether".into(), config.chain.wrapped_native, 18).unwrap();
        let params = SwapParams {
            token_in: eth(&config),
            token_out: weth,
            quote: QuoteOutcome::Wrap(WrapQuote {
                kind: WrapKind::Wrap,
                amount_in: U256::from(5_000u64),
                amount_out: U256::from(5_000u64),
                contract: config.chain.wrapped_native,
                gas_estimate: amm::gas::WRAP_ESTIMATE,
            }),
        };

        let outcome = orchestrator
            .execute_swap(&session(), &params, &FlowTracker::new())
            .await
            .unwrap();
        assert!(outcome.success);
        let sent = mock.sent_transactions();
        assert_eq!(sent[0]["value"], "0x1388");
        assert_eq!(
            serde_json::from_value::<Address>(sent[0]["to"].clone()).unwrap(),
            config.chain.wrapped_native
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrap_with_configured_native_sentinel() {
        let mut config = AppConfig::default();
        config.chain.native_sentinel = Address::repeat_byte(0x01);
        config.validate().unwrap();
        let (mock, orchestrator) = setup(&config);
        mock.set_native_balance(OWNER, U256::from(5_000u64));
        mock.set_auto_receipt(Some(true));
        let weth = Token::from_parts("WETH".into(), "Wrapped Ether".into(), config.chain.wrapped_native, 18).unwrap();
        let params = SwapParams {
            token_in: eth(&config),
            token_out: weth,
            quote: QuoteOutcome::Wrap(WrapQuote {
                kind: WrapKind::Wrap,
                amount_in: U256::from(5_000u64),
                amount_out: U256::from(5_000u64),
                contract: config.chain.wrapped_native,
                gas_estimate: amm::gas::WRAP_ESTIMATE,
            }),
        };

        let outcome = orchestrator
            .execute_swap(&session(), &params, &FlowTracker::new())
            .await
            .unwrap();
        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(outcome.step, FlowStep::Success);
        // Native balance came from eth_getBalance, not an ERC-20 read
        assert_eq!(mock.request_count("eth_getBalance"), 1);
        let sent = mock.sent_transactions();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["value"], "0x1388");
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_route_quote_rejected() {
        let config = AppConfig::default();
        let (mock, orchestrator) = setup(&config);
        let params = SwapParams {
            token_in: usdc(),
            token_out: dai(),
            quote: QuoteOutcome::no_route("no liquid pool on either router"),
        };
        let outcome = orchestrator
            .execute_swap(&session(), &params, &FlowTracker::new())
            .await
            .unwrap();
        assert_eq!(outcome.error.unwrap().kind, TxErrorKind::InsufficientLiquidity);
        assert!(mock.sent_transactions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_liquidity_approves_pool_token() {
        let config = AppConfig::default();
        let (mock, orchestrator) = setup(&config);
        let pool = Address::repeat_byte(0x77);
        let router = config.routers.primary.router;
        script_balance(&mock, pool, 1_000);
        mock.set_call(pool, allowance_call(router), allowance_return(0));
        mock.on_send(pool, pool, allowance_call(router), allowance_return(u64::MAX));
        mock.set_auto_receipt(Some(true));

        let params = RemoveLiquidityParams {
            token_a: usdc(),
            token_b: dai(),
            quote: RemoveLiquidityQuote {
                router: RouterId::Primary,
                pool_address: pool,
                liquidity: U256::from(1_000u64),
                amount_a: U256::from(100u64),
                amount_b: U256::from(200u64),
                amount_a_min: U256::from(99u64),
                amount_b_min: U256::from(198u64),
                pool_share_ppm: 1_000,
                slippage_bps: 100,
            },
            fee_on_transfer: false,
        };

        let tracker = FlowTracker::new();
        let outcome = orchestrator
            .remove_liquidity(&session(), &params, &tracker)
            .await
            .unwrap();
        assert!(outcome.success);
        let sent = mock.sent_transactions();
        assert_eq!(serde_json::from_value::<Address>(sent[0]["to"].clone()).unwrap(), pool);
        assert_eq!(serde_json::from_value::<Address>(sent[1]["to"].clone()).unwrap(), router);
    }
}
