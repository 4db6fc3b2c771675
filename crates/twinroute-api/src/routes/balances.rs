//! Token balances for an account

use amm::fetch_balances;
use axum::{
    extract::{Query, State},
    Json,
};

use crate::dto::{BalancesQuery, BalancesResponse};
use crate::routes::{state_error, ApiResult};
use crate::AppState;

/// GET /balances?account=0x... - Balances of every listed token.
///
/// Per-token read failures are reported inline rather than failing the
/// whole request.
pub async fn get_balances(
    State(state): State<AppState>,
    Query(query): Query<BalancesQuery>,
) -> ApiResult<BalancesResponse> {
    let session = state
        .session(query.account.as_deref(), None)
        .await
        .map_err(state_error)?;
    let tokens = state.tokens().await;

    let balances = fetch_balances(
        state.client(),
        session.account,
        &tokens,
        state.config().chain.native_sentinel,
        state.config().quote.max_read_concurrency,
    )
    .await;

    Ok(Json(BalancesResponse {
        account: session.account,
        balances,
    }))
}
