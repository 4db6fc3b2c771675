//! Transaction flows
//!
//! A flow is prepared from a fresh quote, then confirmed. Confirmation runs
//! in the background; clients poll `/flow/status` for the step.

use amm::QuoteOutcome;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::time::Duration;

use evm_tx::{
    AddLiquidityParams, FlowError, FlowRequest, FlowStep, RemoveLiquidityParams, SwapParams,
};

use crate::dto::{
    ApiError, CancelResponse, FlowIdRequest, FlowResponse, FlowsResponse,
    PrepareAddLiquidityRequest, PrepareRemoveLiquidityRequest, PrepareSwapRequest,
};
use crate::routes::{flow_error, liquidity, quote, state_error, ApiResult};
use crate::state::FlowRecord;
use crate::AppState;

/// Create flow routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_flows))
        .route("/status", get(get_flow))
        .route("/swap", post(prepare_swap))
        .route("/add-liquidity", post(prepare_add_liquidity))
        .route("/remove-liquidity", post(prepare_remove_liquidity))
        .route("/confirm", post(confirm_flow))
        .route("/cancel", post(cancel_flow))
        .route("/retry", post(retry_flow))
}

/// GET /flow - All known flows
async fn list_flows(State(state): State<AppState>) -> Json<FlowsResponse> {
    let mut flows = Vec::new();
    for record in state.flows().await {
        flows.push(flow_response(&record).await);
    }
    Json(FlowsResponse {
        flows,
        busy: state.orchestrator().is_busy(),
    })
}

/// GET /flow/status?id=... - One flow's state and outcome
async fn get_flow(
    State(state): State<AppState>,
    Query(request): Query<FlowIdRequest>,
) -> ApiResult<FlowResponse> {
    let record = state.flow(request.id).await.map_err(state_error)?;
    Ok(Json(flow_response(&record).await))
}

/// POST /flow/swap - Quote a swap and hold it for confirmation
async fn prepare_swap(
    State(state): State<AppState>,
    Json(request): Json<PrepareSwapRequest>,
) -> ApiResult<FlowResponse> {
    let session = state
        .session(request.session.account.as_deref(), request.session.wallet)
        .await
        .map_err(state_error)?;
    let quoted = quote::quote(&state, &request.quote).await?;

    if let QuoteOutcome::NoRoute { reason } = &quoted.outcome {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiError::new("no_route", reason.clone())),
        ));
    }

    let request = FlowRequest::Swap(SwapParams {
        token_in: quoted.token_in,
        token_out: quoted.token_out,
        quote: quoted.outcome,
    });
    let record = state.insert_flow(session, request).await;
    Ok(Json(flow_response(&record).await))
}

/// POST /flow/add-liquidity - Quote a deposit and hold it for confirmation
async fn prepare_add_liquidity(
    State(state): State<AppState>,
    Json(request): Json<PrepareAddLiquidityRequest>,
) -> ApiResult<FlowResponse> {
    let session = state
        .session(request.session.account.as_deref(), request.session.wallet)
        .await
        .map_err(state_error)?;
    let (token_a, token_b, quote) = liquidity::add_quote(&state, &request.quote).await?;

    let request = FlowRequest::AddLiquidity(AddLiquidityParams {
        token_a,
        token_b,
        quote,
    });
    let record = state.insert_flow(session, request).await;
    Ok(Json(flow_response(&record).await))
}

/// POST /flow/remove-liquidity - Quote a withdrawal and hold it for confirmation
async fn prepare_remove_liquidity(
    State(state): State<AppState>,
    Json(request): Json<PrepareRemoveLiquidityRequest>,
) -> ApiResult<FlowResponse> {
    let session = state
        .session(request.session.account.as_deref(), request.session.wallet)
        .await
        .map_err(state_error)?;
    let (token_a, token_b, quote) = liquidity::remove_quote(&state, &request.quote).await?;

    let detector = state.engine().fee_detector();
    let (fee_a, fee_b) = tokio::join!(
        detector.probe(token_a.address),
        detector.probe(token_b.address)
    );

    let request = FlowRequest::RemoveLiquidity(RemoveLiquidityParams {
        token_a,
        token_b,
        quote,
        fee_on_transfer: fee_a || fee_b,
    });
    let record = state.insert_flow(session, request).await;
    Ok(Json(flow_response(&record).await))
}

/// POST /flow/confirm - Start executing a prepared flow
async fn confirm_flow(
    State(state): State<AppState>,
    Json(request): Json<FlowIdRequest>,
) -> ApiResult<FlowResponse> {
    let record = state.flow(request.id).await.map_err(state_error)?;

    let snapshot = record.tracker.snapshot();
    if snapshot.active || snapshot.step != FlowStep::Input {
        return Err(flow_error(FlowError::InvalidTransition {
            from: snapshot.step,
            to: FlowStep::Executing,
        }));
    }
    let ttl = Duration::from_secs(state.config().quote.quote_ttl_secs);
    record.check_fresh(ttl).map_err(flow_error)?;

    // Claim before answering so a concurrent confirm sees flow_busy
    let orchestrator = state.orchestrator();
    let claim = orchestrator.claim().map_err(flow_error)?;

    *record.outcome.write().await = None;
    let task = record.clone();
    tokio::spawn(async move {
        let result = orchestrator
            .execute(claim, &task.session, &task.request, &task.tracker)
            .await;
        match result {
            Ok(outcome) => {
                tracing::info!(
                    flow = %task.id,
                    success = outcome.success,
                    step = %outcome.step,
                    "Flow finished"
                );
                *task.outcome.write().await = Some(outcome);
            }
            Err(e) => tracing::warn!(flow = %task.id, error = %e, "Flow did not start"),
        }
    });

    Ok(Json(flow_response(&record).await))
}

/// POST /flow/cancel - Abandon a flow that has not started
async fn cancel_flow(
    State(state): State<AppState>,
    Json(request): Json<FlowIdRequest>,
) -> ApiResult<CancelResponse> {
    let record = state.flow(request.id).await.map_err(state_error)?;
    record.tracker.cancel().map_err(flow_error)?;
    state.remove_flow(record.id).await;
    Ok(Json(CancelResponse {
        id: record.id,
        cancelled: true,
    }))
}

/// POST /flow/retry - Return a failed flow to input so it can be confirmed again
async fn retry_flow(
    State(state): State<AppState>,
    Json(request): Json<FlowIdRequest>,
) -> ApiResult<FlowResponse> {
    let record = state.flow(request.id).await.map_err(state_error)?;
    record.tracker.retry().map_err(flow_error)?;
    *record.outcome.write().await = None;
    Ok(Json(flow_response(&record).await))
}

async fn flow_response(record: &FlowRecord) -> FlowResponse {
    let details = match &record.request {
        FlowRequest::Swap(params) => serde_json::to_value(params),
        FlowRequest::AddLiquidity(params) => serde_json::to_value(params),
        FlowRequest::RemoveLiquidity(params) => serde_json::to_value(params),
    }
    .unwrap_or(serde_json::Value::Null);

    FlowResponse {
        id: record.id,
        kind: record.request.kind().to_string(),
        account: record.session.account,
        state: record.tracker.snapshot(),
        outcome: record.outcome.read().await.clone(),
        details,
    }
}
