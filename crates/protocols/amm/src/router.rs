//! Quote Engine
//!
//! Routes a swap over the two configured routers:
//!
//! 1. Native <-> wrapped-native requests short-circuit to a 1:1 wrap quote.
//! 2. The direct pair is resolved on both routers concurrently; the first
//!    liquid pool in priority order wins.
//! 3. Otherwise one hop through the wrapped-native token is tried, with both
//!    legs on the same router, primary first.
//!
//! Read failures anywhere surface as [`QuoteOutcome::NoRoute`].

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use evm_client::EvmClient;
use twinroute_core::{lowercase_hex, AppConfig, ChainConfig, QuoteConfig, RouterId, Token};

use crate::calculator::{self, Leg};
use crate::constants::gas;
use crate::fee_token::{FeeOnTransferDetector, FeeTokenSource};
use crate::pair::{select_liquid, PairResolver};
use crate::slippage;
use crate::state::{AmmError, PairInfo, PriceImpact, QuoteOutcome, RouteQuote, SwapDirection};
use crate::units::to_display_f64;
use crate::wrap::WrapDetector;

/// A liquid path on a single router
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePlan {
    pub router: RouterId,
    /// Router path, wrapped-native in place of the native sentinel
    pub path: Vec<Address>,
    pub legs: Vec<Leg>,
}

impl RoutePlan {
    fn from_pairs(router: RouterId, pairs: &[&PairInfo], fee_bps: u16) -> Option<Self> {
        let mut path = Vec::with_capacity(pairs.len() + 1);
        let mut legs = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let (reserve_in, reserve_out) = pair.liquid_reserves()?;
            if path.is_empty() {
                path.push(pair.token_a);
            }
            path.push(pair.token_b);
            legs.push(Leg::new(reserve_in, reserve_out, fee_bps));
        }
        Some(Self { router, path, legs })
    }
}

/// Multi-router quote engine
#[derive(Clone)]
pub struct QuoteEngine {
    resolver: PairResolver,
    wrap: WrapDetector,
    fee_detector: FeeOnTransferDetector,
    chain: ChainConfig,
    config: QuoteConfig,
}

impl QuoteEngine {
    pub fn new(client: EvmClient, config: &AppConfig, fee_source: Arc<dyn FeeTokenSource>) -> Self {
        Self {
            resolver: PairResolver::new(client.clone(), config.routers.clone(), &config.chain),
            wrap: WrapDetector::new(&config.chain),
            fee_detector: FeeOnTransferDetector::new(client, fee_source),
            chain: config.chain.clone(),
            config: config.quote.clone(),
        }
    }

    pub fn resolver(&self) -> &PairResolver {
        &self.resolver
    }

    pub fn wrap_detector(&self) -> &WrapDetector {
        &self.wrap
    }

    pub fn fee_detector(&self) -> &FeeOnTransferDetector {
        &self.fee_detector
    }

    pub fn default_slippage_bps(&self) -> u16 {
        self.config.default_slippage_bps
    }

    /// Quote a swap. `amount` is the input for `ExactIn` and the desired
    /// output for `ExactOut`; `None` slippage uses the configured default.
    pub async fn get_quote(
        &self,
        token_in: &Token,
        token_out: &Token,
        amount: U256,
        direction: SwapDirection,
        slippage_bps: Option<u16>,
    ) -> QuoteOutcome {
        let slippage_bps = slippage_bps.unwrap_or(self.config.default_slippage_bps);
        if let Err(e) = slippage::validate_slippage(slippage_bps) {
            return QuoteOutcome::no_route(e.to_string());
        }
        if amount.is_zero() {
            return QuoteOutcome::no_route("amount must be greater than zero");
        }

        if let Some(kind) = self.wrap.classify(token_in.address, token_out.address) {
            tracing::debug!(?kind, amount = %amount, "Wrap/unwrap request, bypassing routers");
            return QuoteOutcome::Wrap(self.wrap.quote(kind, amount));
        }

        let a = self.resolver.canonical(token_in.address);
        let b = self.resolver.canonical(token_out.address);
        if a == b {
            return QuoteOutcome::no_route("input and output tokens are the same");
        }

        let (plan, fee_in, fee_out) = futures::join!(
            self.find_route(a, b),
            self.probe_fee(a),
            self.probe_fee(b),
        );
        let fee_on_transfer = fee_in || fee_out;

        let Some(plan) = plan else {
            tracing::info!(
                token_in = %lowercase_hex(&a),
                token_out = %lowercase_hex(&b),
                "No liquid route on either router"
            );
            return QuoteOutcome::no_route("no liquid pool on either router");
        };

        if fee_on_transfer && direction == SwapDirection::ExactOut {
            return QuoteOutcome::no_route(
                "exact-output swaps are not supported for fee-on-transfer tokens",
            );
        }

        match self.price_plan(&plan, token_in, token_out, amount, direction, slippage_bps, fee_on_transfer) {
            Ok(quote) => {
                tracing::debug!(
                    router = %quote.router,
                    hops = quote.hop_count(),
                    amount_in = %quote.amount_in,
                    amount_out = %quote.amount_out,
                    "Quote computed"
                );
                QuoteOutcome::Route(quote)
            }
            Err(e) => QuoteOutcome::no_route(e.to_string()),
        }
    }

    /// Direct pair on either router, otherwise one hop via wrapped native
    pub async fn find_route(&self, a: Address, b: Address) -> Option<RoutePlan> {
        let direct = self.resolver.resolve_both(a, b).await;
        if let Some(pair) = select_liquid(&direct) {
            let fee = self.resolver.routers().get(pair.router).fee_bps;
            return RoutePlan::from_pairs(pair.router, &[pair], fee);
        }

        let hub = self.chain.wrapped_native;
        if a == hub || b == hub {
            return None;
        }

        let (primary, secondary) = futures::join!(
            self.resolve_hop(a, hub, b, RouterId::Primary),
            self.resolve_hop(a, hub, b, RouterId::Secondary),
        );
        primary.or(secondary)
    }

    async fn resolve_hop(&self, a: Address, hub: Address, b: Address, router: RouterId) -> Option<RoutePlan> {
        let (first, second) = futures::join!(
            self.resolver.resolve(a, hub, router),
            self.resolver.resolve(hub, b, router),
        );
        let fee = self.resolver.routers().get(router).fee_bps;
        RoutePlan::from_pairs(router, &[&first, &second], fee)
    }

    async fn probe_fee(&self, token: Address) -> bool {
        if token == self.chain.wrapped_native {
            return false;
        }
        self.fee_detector.probe(token).await
    }

    #[allow(clippy::too_many_arguments)]
    fn price_plan(
        &self,
        plan: &RoutePlan,
        token_in: &Token,
        token_out: &Token,
        amount: U256,
        direction: SwapDirection,
        slippage_bps: u16,
        fee_on_transfer: bool,
    ) -> Result<RouteQuote, AmmError> {
        let (amount_in, amount_out, minimum_received, maximum_input) = match direction {
            SwapDirection::ExactIn => {
                let out = calculator::quote_path_output(amount, &plan.legs)?;
                (amount, out, Some(slippage::minimum_received(out, slippage_bps)), None)
            }
            SwapDirection::ExactOut => {
                let input = calculator::quote_path_input(amount, &plan.legs)?;
                (input, amount, None, Some(slippage::maximum_input(input, slippage_bps)?))
            }
        };

        let price_impact = calculator::calculate_price_impact_ppm(amount_in, amount_out, &plan.legs)
            .map(|ppm| PriceImpact::Computed { ppm })
            .unwrap_or(PriceImpact::NotComputed);
        let mut recommended_slippage_bps = slippage::recommended_slippage(
            price_impact,
            self.config.high_impact_threshold_bps,
            self.config.slippage_safety_margin_bps,
        );
        if fee_on_transfer {
            recommended_slippage_bps = slippage::with_transfer_fee_floor(
                recommended_slippage_bps,
                slippage_bps,
                self.config.fee_on_transfer_slippage_bps,
            );
        }

        let display_in = to_display_f64(amount_in, token_in.decimals);
        let exchange_rate = if display_in > 0.0 {
            to_display_f64(amount_out, token_out.decimals) / display_in
        } else {
            0.0
        };

        let mut gas_estimate = if plan.legs.len() > 1 {
            gas::ONE_HOP_SWAP_ESTIMATE
        } else {
            gas::DIRECT_SWAP_ESTIMATE
        };
        if fee_on_transfer {
            gas_estimate += gas::FEE_ON_TRANSFER_EXTRA;
        }

        Ok(RouteQuote {
            direction,
            amount_in,
            amount_out,
            exchange_rate,
            price_impact,
            minimum_received,
            maximum_input,
            slippage_bps,
            recommended_slippage_bps,
            router: plan.router,
            router_address: self.resolver.routers().get(plan.router).router,
            gas_estimate,
            fee_on_transfer,
            path: plan.path.clone(),
            liquidity_available: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fee_token::FeeTokenCatalog;
    use crate::pair::tests::{script_no_pair, script_pair, DAI, USDC};
    use evm_client::testing::MockProvider;

    fn engine(mock: &MockProvider) -> (QuoteEngine, AppConfig) {
        let config = AppConfig::default();
        let mut probe_free = config.clone();
        // Keep probes out of the scripted call set
        probe_free.fee_tokens.probe_functions.clear();
        let catalog = Arc::new(FeeTokenCatalog::from_config(&probe_free.fee_tokens));
        (QuoteEngine::new(mock.client(), &probe_free, catalog), config)
    }

    fn token(symbol: &str, address: Address, decimals: u8) -> Token {
        Token::from_parts(symbol.into(), symbol.into(), address, decimals).unwrap()
    }

    #[tokio::test]
    async fn test_reference_quote_on_primary() {
        let mock = MockProvider::new();
        let (engine, config) = engine(&mock);
        script_pair(&mock, config.routers.primary.factory, Address::repeat_byte(0x11), USDC, DAI, 1_000_000, 2_000_000);
        script_pair(&mock, config.routers.secondary.factory, Address::repeat_byte(0x12), USDC, DAI, 1_000_000, 9_000_000);

        let outcome = engine
            .get_quote(&token("USDC", USDC, 6), &token("DAI", DAI, 6), U256::from(1_000u64), SwapDirection::ExactIn, Some(50))
            .await;
        let quote = outcome.route().unwrap();
        // Primary wins on priority even though the secondary pays more
        assert_eq!(quote.router, RouterId::Primary);
        assert_eq!(quote.amount_out, U256::from(1_992u64));
        assert_eq!(quote.minimum_received, Some(U256::from(1_982u64)));
        assert_eq!(quote.path, vec![USDC, DAI]);
        assert!(matches!(quote.price_impact, PriceImpact::Computed { .. }));
        assert!(quote.liquidity_available);
    }

    #[tokio::test]
    async fn test_falls_back_to_secondary() {
        let mock = MockProvider::new();
        let (engine, config) = engine(&mock);
        script_no_pair(&mock, config.routers.primary.factory, USDC, DAI);
        script_pair(&mock, config.routers.secondary.factory, Address::repeat_byte(0x12), USDC, DAI, 1_000_000, 2_000_000);

        let outcome = engine
            .get_quote(&token("USDC", USDC, 6), &token("DAI", DAI, 6), U256::from(1_000u64), SwapDirection::ExactIn, None)
            .await;
        let quote = outcome.route().unwrap();
        assert_eq!(quote.router, RouterId::Secondary);
        assert_eq!(quote.router_address, config.routers.secondary.router);
        assert!(quote.liquidity_available);
    }

    #[tokio::test]
    async fn test_no_route_when_nothing_liquid() {
        let mock = MockProvider::new();
        let (engine, config) = engine(&mock);
        script_no_pair(&mock, config.routers.primary.factory, USDC, DAI);
        script_no_pair(&mock, config.routers.secondary.factory, USDC, DAI);

        let outcome = engine
            .get_quote(&token("USDC", USDC, 6), &token("DAI", DAI, 6), U256::from(1_000u64), SwapDirection::ExactIn, None)
            .await;
        assert!(matches!(outcome, QuoteOutcome::NoRoute { .. }));
    }

    #[tokio::test]
    async fn test_one_hop_through_wrapped_native() {
        let mock = MockProvider::new();
        let (engine, config) = engine(&mock);
        let weth = config.chain.wrapped_native;
        script_no_pair(&mock, config.routers.primary.factory, USDC, DAI);
        script_no_pair(&mock, config.routers.secondary.factory, USDC, DAI);
        script_pair(&mock, config.routers.primary.factory, Address::repeat_byte(0x21), USDC, weth, 1_000_000, 2_000_000);
        script_pair(&mock, config.routers.primary.factory, Address::repeat_byte(0x22), weth, DAI, 4_000_000, 1_000_000);

        let outcome = engine
            .get_quote(&token("USDC", USDC, 6), &token("DAI", DAI, 6), U256::from(1_000u64), SwapDirection::ExactIn, None)
            .await;
        let quote = outcome.route().unwrap();
        assert_eq!(quote.path, vec![USDC, weth, DAI]);
        assert_eq!(quote.amount_out, U256::from(496u64));
        assert_eq!(quote.hop_count(), 2);
        assert_eq!(quote.gas_estimate, gas::ONE_HOP_SWAP_ESTIMATE);
    }

    #[tokio::test]
    async fn test_exact_out_covers_requested_output() {
        let mock = MockProvider::new();
        let (engine, config) = engine(&mock);
        script_pair(&mock, config.routers.primary.factory, Address::repeat_byte(0x11), USDC, DAI, 1_000_000, 2_000_000);

        let outcome = engine
            .get_quote(&token("USDC", USDC, 6), &token("DAI", DAI, 6), U256::from(1_992u64), SwapDirection::ExactOut, Some(50))
            .await;
        let quote = outcome.route().unwrap();
        assert_eq!(quote.amount_in, U256::from(1_000u64));
        assert_eq!(quote.maximum_input, Some(U256::from(1_005u64)));
        assert_eq!(quote.amount_limit(), U256::from(1_005u64));
    }

    #[tokio::test]
    async fn test_wrap_bypasses_routers() {
        let mock = MockProvider::new();
        let (engine, config) = engine(&mock);
        let eth = token("ETH", config.chain.native_sentinel, 18);
        let weth = token("WETH", config.chain.wrapped_native, 18);

        let outcome = engine
            .get_quote(&eth, &weth, U256::from(5u64), SwapDirection::ExactIn, None)
            .await;
        match outcome {
            QuoteOutcome::Wrap(q) => assert_eq!(q.amount_out, U256::from(5u64)),
            other => panic!("expected wrap, got {:?}", other),
        }
        assert_eq!(mock.request_count("eth_call"), 0);
    }

    #[tokio::test]
    async fn test_fee_on_transfer_blocks_exact_out() {
        let mock = MockProvider::new();
        let config = AppConfig::default();
        let paxg = config.fee_tokens.known_tokens[0];
        let catalog = Arc::new(FeeTokenCatalog::from_config(&config.fee_tokens));
        let engine = QuoteEngine::new(mock.client(), &config, catalog);
        script_pair(&mock, config.routers.primary.factory, Address::repeat_byte(0x31), paxg, USDC, 1_000_000, 2_000_000);

        let paxg_token = token("PAXG", paxg, 18);
        let usdc = token("USDC", USDC, 6);
        let exact_out = engine
            .get_quote(&paxg_token, &usdc, U256::from(10u64), SwapDirection::ExactOut, None)
            .await;
        assert!(matches!(exact_out, QuoteOutcome::NoRoute { .. }));

        let exact_in = engine
            .get_quote(&paxg_token, &usdc, U256::from(10u64), SwapDirection::ExactIn, None)
            .await;
        let quote = exact_in.route().unwrap();
        assert!(quote.fee_on_transfer);
        // The default 0.5% cannot absorb a transfer tax
        assert_eq!(quote.slippage_bps, 50);
        assert_eq!(
            quote.recommended_slippage_bps,
            Some(config.quote.fee_on_transfer_slippage_bps)
        );
    }

    #[tokio::test]
    async fn test_quote_is_idempotent() {
        let mock = MockProvider::new();
        let (engine, config) = engine(&mock);
        script_pair(&mock, config.routers.primary.factory, Address::repeat_byte(0x11), USDC, DAI, 1_000_000, 2_000_000);
        let usdc = token("USDC", USDC, 6);
        let dai = token("DAI", DAI, 6);

        let first = engine.get_quote(&usdc, &dai, U256::from(777u64), SwapDirection::ExactIn, None).await;
        let second = engine.get_quote(&usdc, &dai, U256::from(777u64), SwapDirection::ExactIn, None).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_high_impact_recommends_slippage() {
        let mock = MockProvider::new();
        let (engine, config) = engine(&mock);
        script_pair(&mock, config.routers.primary.factory, Address::repeat_byte(0x11), USDC, DAI, 10_000, 20_000);

        let outcome = engine
            .get_quote(&token("USDC", USDC, 6), &token("DAI", DAI, 6), U256::from(2_000u64), SwapDirection::ExactIn, Some(50))
            .await;
        let quote = outcome.route().unwrap();
        assert!(quote.recommended_slippage_bps.unwrap() > 50);
        // Never auto-applied
        assert_eq!(quote.slippage_bps, 50);
    }
}
