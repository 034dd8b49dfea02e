//! Pricing endpoint

use axum::{extract::State, Json};

use crate::{
    error::AppResult, models::PriceBreakdown, services::pricing::PriceEstimateRequest, AppState,
};

/// Price a prospective reservation without storing it
#[utoipa::path(
    post,
    path = "/pricing/estimate",
    tag = "pricing",
    request_body = PriceEstimateRequest,
    responses(
        (status = 200, description = "Price breakdown", body = PriceBreakdown),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Equipment or studio not found")
    )
)]
pub async fn estimate(
    State(state): State<AppState>,
    Json(request): Json<PriceEstimateRequest>,
) -> AppResult<Json<PriceBreakdown>> {
    Ok(Json(state.services.pricing.estimate(&request).await?))
}
