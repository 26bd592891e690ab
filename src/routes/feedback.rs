use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::{RequestId, UserId},
    models::FeedbackType,
    routes::AppState,
};

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub beverage_id: Uuid,
    pub feedback_type: FeedbackType,
}

/// Handler for explicit recommendation feedback
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    UserId(user_id): UserId,
    body: Result<Json<FeedbackRequest>, JsonRejection>,
) -> AppResult<StatusCode> {
    let Json(request) = body?;

    tracing::info!(
        request_id = %request_id,
        user_id = %user_id,
        beverage_id = %request.beverage_id,
        feedback = %request.feedback_type,
        "Processing feedback"
    );

    state
        .service
        .submit_feedback(user_id, request.beverage_id, request.feedback_type)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
