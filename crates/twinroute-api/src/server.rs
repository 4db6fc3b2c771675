//! HTTP server: middleware stack and listener

use std::net::SocketAddr;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::routes::create_router;
use crate::AppState;

/// Create the full application router with middleware
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    create_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    )
}

/// Serve the API on localhost, sweeping idle flows while it runs
pub async fn start_server(state: AppState, port: u16) -> Result<(), std::io::Error> {
    let cleanup = state.spawn_flow_cleanup();
    let app = create_app(state);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    tracing::info!(%addr, "Starting API server");
    let listener = tokio::net::TcpListener::bind(addr).await;
    let result = match listener {
        Ok(listener) => axum::serve(listener, app).await,
        Err(e) => Err(e),
    };

    cleanup.abort();
    result
}
