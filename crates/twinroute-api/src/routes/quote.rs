//! Swap quotes

use amm::{format_amount, parse_amount, QuoteOutcome, SwapDirection};
use axum::{extract::State, http::StatusCode, Json};
use twinroute_core::Token;

use crate::dto::{ApiError, QuoteRequest, QuoteResponse};
use crate::routes::{amm_error, state_error, ApiResult};
use crate::AppState;

/// POST /quote - Quote a swap across both routers
pub async fn get_quote(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> ApiResult<QuoteResponse> {
    Ok(Json(quote(&state, &request).await?))
}

/// Resolve tokens, parse the amount, and quote
pub(crate) async fn quote(
    state: &AppState,
    request: &QuoteRequest,
) -> Result<QuoteResponse, (StatusCode, Json<ApiError>)> {
    let token_in = state
        .resolve_token(&request.token_in)
        .await
        .map_err(state_error)?;
    let token_out = state
        .resolve_token(&request.token_out)
        .await
        .map_err(state_error)?;

    // Exact-out amounts are denominated in the output token
    let fixed = match request.direction {
        SwapDirection::ExactIn => &token_in,
        SwapDirection::ExactOut => &token_out,
    };
    let amount = parse_amount(&request.amount, fixed.decimals).map_err(amm_error)?;

    let outcome = state
        .engine()
        .get_quote(
            &token_in,
            &token_out,
            amount,
            request.direction,
            request.slippage_bps,
        )
        .await;

    Ok(build_response(token_in, token_out, outcome))
}

fn build_response(token_in: Token, token_out: Token, outcome: QuoteOutcome) -> QuoteResponse {
    let (amount_in, amount_out, impact) = match &outcome {
        QuoteOutcome::Route(q) => (
            Some(format_amount(q.amount_in, token_in.decimals)),
            Some(format_amount(q.amount_out, token_out.decimals)),
            q.price_impact.percent(),
        ),
        QuoteOutcome::Wrap(q) => (
            Some(format_amount(q.amount_in, token_in.decimals)),
            Some(format_amount(q.amount_out, token_out.decimals)),
            Some(0.0),
        ),
        QuoteOutcome::NoRoute { .. } => (None, None, None),
    };

    QuoteResponse {
        token_in,
        token_out,
        outcome,
        amount_in,
        amount_out,
        price_impact_percent: impact,
    }
}
