//! API route handlers

pub mod balances;
pub mod flow;
pub mod health;
pub mod liquidity;
pub mod provider;
pub mod quote;
pub mod tokens;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use evm_tx::FlowError;

use crate::dto::ApiError;
use crate::state::StateError;
use crate::AppState;

pub type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/provider", provider::router())
        .nest("/tokens", tokens::router())
        .route("/quote", post(quote::get_quote))
        .nest("/liquidity", liquidity::router())
        .route("/balances", get(balances::get_balances))
        .nest("/flow", flow::router())
        .with_state(state)
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

pub(crate) fn state_error(e: StateError) -> (StatusCode, Json<ApiError>) {
    (
        status(e.status_code()),
        Json(ApiError::new(e.error_code(), e.to_string())),
    )
}

pub(crate) fn amm_error(e: amm::AmmError) -> (StatusCode, Json<ApiError>) {
    (
        status(e.status_code()),
        Json(ApiError::new(e.error_code(), e.to_string())),
    )
}

pub(crate) fn flow_error(e: FlowError) -> (StatusCode, Json<ApiError>) {
    (
        status(e.status_code()),
        Json(ApiError::new(e.error_code(), e.to_string())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use evm_client::testing::MockProvider;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;
    use twinroute_core::AppConfig;

    fn app(mock: &MockProvider) -> (AppState, Router) {
        let state = AppState::with_client(AppConfig::default(), mock.client()).unwrap();
        (state.clone(), create_router(state))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
        send(app, Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(app, request).await
    }

    fn account() -> Address {
        Address::repeat_byte(0x42)
    }

    #[tokio::test]
    async fn test_health() {
        let (_, app) = app(&MockProvider::new());
        let (status, body) = get(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_provider_refresh() {
        let mock = MockProvider::new();
        mock.set_accounts(vec![account()]);
        let (_, app) = app(&mock);

        let (_, before) = get(&app, "/provider/status").await;
        assert_eq!(before["connected"], false);
        assert_eq!(before["can_transact"], false);

        let (status, after) = post(&app, "/provider/refresh", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(after["connected"], true);
        assert_eq!(after["chain_id"], 1);
        assert_eq!(after["can_transact"], true);
    }

    #[tokio::test]
    async fn test_token_list_has_native_pair() {
        let (_, app) = app(&MockProvider::new());
        let (status, body) = get(&app, "/tokens").await;
        assert_eq!(status, StatusCode::OK);
        let symbols: Vec<&str> = body["tokens"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|t| t["symbol"].as_str())
            .collect();
        assert!(symbols.contains(&"ETH"));
        assert!(symbols.contains(&"WETH"));
    }

    #[tokio::test]
    async fn test_wrap_quote() {
        let (_, app) = app(&MockProvider::new());
        let (status, body) = post(
            &app,
            "/quote",
            json!({ "token_in": "ETH", "token_out": "WETH", "amount": "1.5" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"]["kind"], "wrap");
        assert_eq!(body["amount_out"], "1.5");
    }

    #[tokio::test]
    async fn test_quote_rejects_bad_input() {
        let (_, app) = app(&MockProvider::new());

        let (status, body) = post(
            &app,
            "/quote",
            json!({ "token_in": "NOPE", "token_out": "WETH", "amount": "1" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "unknown_token");

        let (status, body) = post(
            &app,
            "/quote",
            json!({ "token_in": "ETH", "token_out": "WETH", "amount": "-1" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_amount");
    }

    #[tokio::test]
    async fn test_balances_need_an_account() {
        let (_, app) = app(&MockProvider::new());
        let (status, body) = get(&app, "/balances").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "no_account");
    }

    #[tokio::test]
    async fn test_balances_reject_malformed_account() {
        let (_, app) = app(&MockProvider::new());
        let (status, body) = get(&app, "/balances?account=0x12").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_account");
    }

    async fn prepare_wrap(app: &Router) -> String {
        let (status, prepared) = post(
            app,
            "/flow/swap",
            json!({
                "account": format!("{:#x}", account()),
                "token_in": "ETH",
                "token_out": "WETH",
                "amount": "1",
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        prepared["id"].as_str().unwrap().to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_rejects_stale_quote() {
        let mock = MockProvider::new();
        mock.set_native_balance(account(), U256::from(10u64).pow(U256::from(19u64)));
        let (state, app) = app(&mock);
        let id = prepare_wrap(&app).await;

        let ttl = state.config().quote.quote_ttl_secs;
        tokio::time::advance(Duration::from_secs(ttl + 1)).await;

        let (status, body) = post(&app, "/flow/confirm", json!({ "id": id })).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "quote_stale");
        assert!(mock.sent_transactions().is_empty());
        assert!(!state.orchestrator().is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_while_busy_is_refused() {
        let mock = MockProvider::new();
        mock.set_native_balance(account(), U256::from(10u64).pow(U256::from(19u64)));
        mock.set_auto_receipt(Some(true));
        let (state, app) = app(&mock);
        let id = prepare_wrap(&app).await;

        let claim = state.orchestrator().claim().unwrap();
        let (status, body) = post(&app, "/flow/confirm", json!({ "id": id })).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "flow_busy");
        assert!(mock.sent_transactions().is_empty());

        drop(claim);
        let (status, _) = post(&app, "/flow/confirm", json!({ "id": id })).await;
        assert_eq!(status, StatusCode::OK);

        let record = state.flow(id.parse().unwrap()).await.unwrap();
        for _ in 0..100 {
            if record.outcome.read().await.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(record.outcome.read().await.as_ref().map(|o| o.success), Some(true));
        assert!(!state.orchestrator().is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_flows_are_evicted() {
        let (state, app) = app(&MockProvider::new());
        let old = prepare_wrap(&app).await;

        let retention = state.config().execution.flow_retention_secs;
        tokio::time::advance(Duration::from_secs(retention + 1)).await;
        let fresh = prepare_wrap(&app).await;

        assert_eq!(state.evict_flows().await, 1);
        let (status, _) = get(&app, &format!("/flow/status?id={}", old)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, list) = get(&app, "/flow").await;
        let flows = list["flows"].as_array().unwrap();
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0]["id"], fresh);
        assert_eq!(state.evict_flows().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrap_flow_runs_to_success() {
        let mock = MockProvider::new();
        mock.set_native_balance(account(), U256::from(10u64).pow(U256::from(19u64)));
        mock.set_auto_receipt(Some(true));
        let (state, app) = app(&mock);

        let (status, prepared) = post(
            &app,
            "/flow/swap",
            json!({
                "account": format!("{:#x}", account()),
                "token_in": "ETH",
                "token_out": "WETH",
                "amount": "1",
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(prepared["kind"], "swap");
        assert_eq!(prepared["state"]["step"], "input");
        let id = prepared["id"].as_str().unwrap().to_string();

        let (status, _) = post(&app, "/flow/confirm", json!({ "id": id })).await;
        assert_eq!(status, StatusCode::OK);

        let record = state.flow(id.parse().unwrap()).await.unwrap();
        for _ in 0..100 {
            if record.outcome.read().await.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let (status, body) = get(&app, &format!("/flow/status?id={}", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["step"], "success");
        assert_eq!(body["outcome"]["success"], true);
        assert_eq!(mock.sent_transactions().len(), 1);

        // Terminal flows cannot be confirmed again
        let (status, body) = post(&app, "/flow/confirm", json!({ "id": id })).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "invalid_transition");
    }

    #[tokio::test]
    async fn test_cancel_and_retry_rules() {
        let (_, app) = app(&MockProvider::new());
        let (_, prepared) = post(
            &app,
            "/flow/swap",
            json!({
                "account": format!("{:#x}", account()),
                "token_in": "WETH",
                "token_out": "ETH",
                "amount": "0.5",
            }),
        )
        .await;
        let id = prepared["id"].as_str().unwrap().to_string();

        // Only failed flows can be retried
        let (status, body) = post(&app, "/flow/retry", json!({ "id": id })).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "invalid_transition");

        let (status, body) = post(&app, "/flow/cancel", json!({ "id": id })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cancelled"], true);

        let (status, _) = get(&app, &format!("/flow/status?id={}", id)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, list) = get(&app, "/flow").await;
        assert_eq!(list["flows"].as_array().unwrap().len(), 0);
        assert_eq!(list["busy"], false);
    }
}
