use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension,
};
use std::sync::Arc;

use crate::{
    error::AppResult,
    middleware::{RequestId, UserId},
    routes::AppState,
};

/// Handler that rebuilds the caller's taste profile for a category
pub async fn recompute(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    UserId(user_id): UserId,
    Path(category): Path<String>,
) -> AppResult<StatusCode> {
    state.service.recompute_profile(user_id, &category).await?;

    tracing::info!(
        request_id = %request_id,
        user_id = %user_id,
        category = %category,
        "Taste profile recomputed"
    );

    Ok(StatusCode::NO_CONTENT)
}
