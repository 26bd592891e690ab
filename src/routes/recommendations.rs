use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middleware::{RequestId, UserId},
    models::RankedBeverage,
    routes::AppState,
};

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub limit: Option<u32>,
}

/// Handler for ranked recommendations in one category
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    UserId(user_id): UserId,
    Path(category): Path<String>,
    Query(query): Query<RecommendationQuery>,
) -> AppResult<Json<Vec<RankedBeverage>>> {
    let limit = state
        .config
        .resolve_limit(query.limit)
        .map_err(AppError::InvalidInput)?;

    tracing::info!(
        request_id = %request_id,
        user_id = %user_id,
        category = %category,
        limit,
        "Processing recommendation request"
    );

    let ranked = state
        .service
        .recommendations(user_id, &category, limit)
        .await?;

    tracing::info!(
        request_id = %request_id,
        returned = ranked.len(),
        "Recommendations ranked"
    );

    Ok(Json(ranked))
}
