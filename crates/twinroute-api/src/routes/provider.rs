//! Wallet provider status

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use crate::dto::ProviderStatusResponse;
use crate::AppState;

/// Create provider routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/refresh", post(refresh))
}

/// GET /provider/status - Last detected provider capabilities
async fn get_status(State(state): State<AppState>) -> Json<ProviderStatusResponse> {
    Json(status(&state).await)
}

/// POST /provider/refresh - Re-probe chain id and accounts
async fn refresh(State(state): State<AppState>) -> Json<ProviderStatusResponse> {
    state
        .client()
        .refresh_capabilities(state.config().chain.chain_id)
        .await;
    Json(status(&state).await)
}

async fn status(state: &AppState) -> ProviderStatusResponse {
    let endpoint = state.client().endpoint();
    let expected_chain_id = state.config().chain.chain_id;

    match state.client().capabilities().await {
        Some(caps) => ProviderStatusResponse {
            connected: caps.is_online,
            endpoint,
            chain_id: caps.chain_id,
            expected_chain_id,
            accounts: caps.accounts,
            capability_tier: caps.capability_tier.as_str().to_string(),
            can_quote: caps.capability_tier.can_quote(),
            can_transact: caps.capability_tier.can_transact(),
        },
        None => ProviderStatusResponse {
            connected: false,
            endpoint,
            chain_id: None,
            expected_chain_id,
            accounts: Vec::new(),
            capability_tier: "unknown".to_string(),
            can_quote: false,
            can_transact: false,
        },
    }
}
