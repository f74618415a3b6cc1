use crate::api::{handlers, AppState};
use crate::error::{AppError, Result};
use crate::metrics::track_metrics;
use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/health/live", get(handlers::health_check))
        .route("/health/ready", get(handlers::health_check))
        // Reference data
        .route("/model-info", get(handlers::model_info))
        .route("/crime-types", get(handlers::crime_types))
        .route("/locations", get(handlers::locations))
        // Prediction
        .route("/predict", post(handlers::predict))
        // Prometheus exposition
        .route("/metrics", get(handlers::metrics))
        .route_layer(middleware::from_fn(track_metrics))
        // Add state
        .with_state(state)
        // Add middleware
        .layer(middleware::from_fn_with_state(request_timeout, enforce_timeout))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}

/// Abort requests running past `limit` with a JSON 408
async fn enforce_timeout(
    State(limit): State<Duration>,
    req: Request,
    next: Next,
) -> Result<Response> {
    tokio::time::timeout(limit, next.run(req))
        .await
        .map_err(|_| AppError::Timeout(format!("Request exceeded {} ms", limit.as_millis())))
}
