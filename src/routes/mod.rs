use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    config::Config,
    middleware::{make_span_with_request_id, request_id_middleware},
    services::RecommendationService,
};

pub mod beverages;
pub mod feedback;
pub mod profiles;
pub mod recommendations;

/// Shared state handed to every handler
pub struct AppState {
    pub service: RecommendationService,
    pub config: Config,
}

impl AppState {
    pub fn new(service: RecommendationService, config: Config) -> Self {
        Self { service, config }
    }
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
        // dropping a timed-out request cancels its in-flight store calls
        .layer(TimeoutLayer::new(timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware))
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/recommendations/:category",
            get(recommendations::recommend),
        )
        .route("/beverages/:beverage_id/match", get(beverages::match_score))
        .route(
            "/profiles/:category/recompute",
            post(profiles::recompute),
        )
        .route("/feedback", post(feedback::submit))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
