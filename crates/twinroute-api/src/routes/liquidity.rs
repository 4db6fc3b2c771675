//! Liquidity quotes

use alloy_primitives::U256;
use amm::{format_amount, parse_amount, AddLiquidityQuote, RemoveLiquidityQuote};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use twinroute_core::Token;

use crate::dto::{
    AddLiquidityQuoteResponse, AddLiquidityRequest, ApiError, RemoveLiquidityQuoteResponse,
    RemoveLiquidityRequest,
};
use crate::routes::{amm_error, state_error, ApiResult};
use crate::AppState;

/// Pool tokens always carry 18 decimals
const LP_DECIMALS: u8 = 18;

/// Create liquidity routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/add/quote", post(quote_add))
        .route("/remove/quote", post(quote_remove))
}

/// POST /liquidity/add/quote - Quote a deposit
async fn quote_add(
    State(state): State<AppState>,
    Json(request): Json<AddLiquidityRequest>,
) -> ApiResult<AddLiquidityQuoteResponse> {
    let (token_a, token_b, quote) = add_quote(&state, &request).await?;
    Ok(Json(AddLiquidityQuoteResponse {
        amount_a: format_amount(quote.amount_a, token_a.decimals),
        amount_b: format_amount(quote.amount_b, token_b.decimals),
        token_a,
        token_b,
        quote,
    }))
}

/// POST /liquidity/remove/quote - Quote a withdrawal
async fn quote_remove(
    State(state): State<AppState>,
    Json(request): Json<RemoveLiquidityRequest>,
) -> ApiResult<RemoveLiquidityQuoteResponse> {
    let (token_a, token_b, quote) = remove_quote(&state, &request).await?;
    Ok(Json(RemoveLiquidityQuoteResponse {
        amount_a: format_amount(quote.amount_a, token_a.decimals),
        amount_b: format_amount(quote.amount_b, token_b.decimals),
        token_a,
        token_b,
        quote,
    }))
}

pub(crate) async fn add_quote(
    state: &AppState,
    request: &AddLiquidityRequest,
) -> Result<(Token, Token, AddLiquidityQuote), (StatusCode, Json<ApiError>)> {
    let (token_a, token_b) = resolve_pair(state, &request.token_a, &request.token_b).await?;
    let amount_a = parse(&request.amount_a, token_a.decimals)?;
    let amount_b = request
        .amount_b
        .as_deref()
        .map(|raw| parse(raw, token_b.decimals))
        .transpose()?;

    let quote = state
        .engine()
        .quote_add_liquidity(
            &token_a,
            &token_b,
            amount_a,
            amount_b,
            request.router,
            request.slippage_bps,
        )
        .await
        .map_err(amm_error)?;
    Ok((token_a, token_b, quote))
}

pub(crate) async fn remove_quote(
    state: &AppState,
    request: &RemoveLiquidityRequest,
) -> Result<(Token, Token, RemoveLiquidityQuote), (StatusCode, Json<ApiError>)> {
    let (token_a, token_b) = resolve_pair(state, &request.token_a, &request.token_b).await?;
    let liquidity = parse(&request.liquidity, LP_DECIMALS)?;

    let quote = state
        .engine()
        .quote_remove_liquidity(
            &token_a,
            &token_b,
            liquidity,
            request.router,
            request.slippage_bps,
        )
        .await
        .map_err(amm_error)?;
    Ok((token_a, token_b, quote))
}

async fn resolve_pair(
    state: &AppState,
    a: &str,
    b: &str,
) -> Result<(Token, Token), (StatusCode, Json<ApiError>)> {
    let token_a = state.resolve_token(a).await.map_err(state_error)?;
    let token_b = state.resolve_token(b).await.map_err(state_error)?;
    Ok((token_a, token_b))
}

fn parse(raw: &str, decimals: u8) -> Result<U256, (StatusCode, Json<ApiError>)> {
    parse_amount(raw, decimals).map_err(amm_error)
}
