use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{error::AppResult, middleware::UserId, models::BeverageMatch, routes::AppState};

/// Handler for a single beverage's match score
pub async fn match_score(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Path(beverage_id): Path<Uuid>,
) -> AppResult<Json<BeverageMatch>> {
    let result = state.service.match_beverage(user_id, beverage_id).await?;
    Ok(Json(result))
}
