//! Token list routes

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use twinroute_core::{lowercase_hex, parse_address, Token};

use crate::dto::{ApiError, FeeTokenRequest, ImportTokenRequest, TokensResponse};
use crate::routes::{state_error, ApiResult};
use crate::AppState;

/// Create token routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tokens))
        .route("/import", post(import_token))
        .route("/fee", post(mark_fee_token))
}

/// GET /tokens - Default and imported tokens
async fn list_tokens(State(state): State<AppState>) -> Json<TokensResponse> {
    let tokens = state.tokens().await;
    let count = tokens.len();
    Json(TokensResponse { tokens, count })
}

/// POST /tokens/import - Import a token by contract address
async fn import_token(
    State(state): State<AppState>,
    Json(request): Json<ImportTokenRequest>,
) -> ApiResult<Token> {
    let address = parse_address(&request.address).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::bad_request(e.to_string())),
        )
    })?;
    let token = state.import_token(address).await.map_err(state_error)?;
    Ok(Json(token))
}

/// POST /tokens/fee - Mark a token as fee-on-transfer
async fn mark_fee_token(
    State(state): State<AppState>,
    Json(request): Json<FeeTokenRequest>,
) -> ApiResult<serde_json::Value> {
    let address = parse_address(&request.address).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::bad_request(e.to_string())),
        )
    })?;
    state.fee_catalog().add_known_token(address);
    tracing::info!(token = %lowercase_hex(&address), "Marked as fee-on-transfer");
    Ok(Json(serde_json::json!({
        "address": lowercase_hex(&address),
        "fee_on_transfer": true,
    })))
}
